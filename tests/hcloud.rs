#![cfg(feature = "hcloud")]

use node_addrs::{hcloud::HcloudProvider, Discover, DiscoverError, ProviderError, Registry};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn server(id: u64, location: &str) -> Value {
    json!({
        "id": id,
        "name": format!("consul-{}", id),
        "public_net": {
            "ipv4": { "ip": format!("203.0.113.{}", id), "blocked": false },
            "ipv6": { "ip": format!("2001:db8:{}::/64", id), "blocked": false }
        },
        "private_net": [{ "ip": format!("10.0.0.{}", id) }],
        "datacenter": { "location": { "name": location } }
    })
}

fn page(servers: Vec<Value>, next_page: Option<u32>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "servers": servers,
        "meta": { "pagination": { "next_page": next_page } }
    }))
}

fn discover(server: &MockServer) -> Discover {
    let provider = HcloudProvider::with_base_url(server.uri());
    Discover::new(Registry::new().with("hcloud", provider).unwrap())
}

#[tokio::test]
async fn follows_next_page_and_filters_location() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .and(query_param("status", "running"))
        .and(query_param("label_selector", "role=consul"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(page(vec![server(1, "fsn1"), server(2, "nbg1")], Some(2)))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .and(query_param("page", "2"))
        .respond_with(page(vec![server(3, "fsn1")], None))
        .expect(1)
        .mount(&mock)
        .await;

    let addrs = discover(&mock)
        .addrs(
            "provider=hcloud location=fsn1 label_selector=role=consul api_token=token",
            None,
        )
        .await;
    // '=' in an unquoted value is rejected before any request is made
    assert!(matches!(addrs, Err(DiscoverError::Config(_))));

    let addrs = discover(&mock)
        .addrs(
            r#"provider=hcloud location=fsn1 label_selector="role=consul" api_token=token"#,
            None,
        )
        .await
        .unwrap();
    assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.3"]);
}

#[tokio::test]
async fn public_v6_drops_the_prefix_length() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .respond_with(page(vec![server(4, "hel1")], None))
        .mount(&mock)
        .await;

    let addrs = discover(&mock)
        .addrs("provider=hcloud address_type=public_v6 api_token=t", None)
        .await
        .unwrap();
    assert_eq!(addrs, vec!["2001:db8:4::"]);
}

#[tokio::test]
async fn invalid_address_type_falls_back_to_private_v4() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .respond_with(page(vec![server(5, "hel1")], None))
        .mount(&mock)
        .await;

    let addrs = discover(&mock)
        .addrs("provider=hcloud address_type=floating api_token=t", None)
        .await
        .unwrap();
    assert_eq!(addrs, vec!["10.0.0.5"]);
}

#[tokio::test]
async fn api_errors_are_reported() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/servers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock)
        .await;

    let err = discover(&mock)
        .addrs("provider=hcloud api_token=t", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DiscoverError::Provider {
            source: ProviderError::RequestFailed(_),
            ..
        }
    ));
}
