#![cfg(feature = "linode")]

use node_addrs::{linode::LinodeProvider, Discover, DiscoverError, ProviderError, Registry};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

fn instance(id: u64) -> Value {
    json!({
        "id": id,
        "label": format!("linode-{}", id),
        "ipv4": [format!("192.168.128.{}", id), format!("198.51.100.{}", id)],
        "ipv6": format!("2600:3c01::f03c:91ff:fe{}:1/128", id)
    })
}

fn page(data: Vec<Value>, page: u32, pages: u32) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": data,
        "page": page,
        "pages": pages,
        "results": 0
    }))
}

fn discover(server: &MockServer) -> Discover {
    let provider = LinodeProvider::with_base_url(server.uri());
    Discover::new(Registry::new().with("linode", provider).unwrap())
}

#[tokio::test]
async fn sends_filter_and_walks_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances"))
        .and(query_param("page", "1"))
        .and(|req: &Request| {
            req.headers.get("X-Filter").and_then(|v| v.to_str().ok())
                == Some(r#"{"region":"us-west","tags":"consul"}"#)
        })
        .respond_with(page(vec![instance(1)], 1, 2))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances"))
        .and(query_param("page", "2"))
        .respond_with(page(vec![instance(2)], 2, 2))
        .expect(1)
        .mount(&server)
        .await;

    let addrs = discover(&server)
        .addrs(
            "provider=linode region=us-west tag_name=consul api_token=t",
            None,
        )
        .await
        .unwrap();
    assert_eq!(addrs, vec!["192.168.128.1", "192.168.128.2"]);
}

#[tokio::test]
async fn public_addresses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances"))
        .respond_with(page(vec![instance(3)], 1, 1))
        .mount(&server)
        .await;

    let d = discover(&server);
    let v4 = d
        .addrs("provider=linode address_type=public_v4 api_token=t", None)
        .await
        .unwrap();
    assert_eq!(v4, vec!["198.51.100.3"]);

    let v6 = d
        .addrs("provider=linode address_type=public_v6 api_token=t", None)
        .await
        .unwrap();
    assert_eq!(v6, vec!["2600:3c01::f03c:91ff:fe3:1"]);
}

#[tokio::test]
async fn private_v6_reads_link_local_addresses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances"))
        .respond_with(page(vec![instance(4)], 1, 1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances/4/ips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ipv6": { "link_local": { "address": "fe80::f03c:91ff:fe24:3a2f" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let addrs = discover(&server)
        .addrs("provider=linode address_type=private_v6 api_token=t", None)
        .await
        .unwrap();
    assert_eq!(addrs, vec!["fe80::f03c:91ff:fe24:3a2f"]);
}

#[tokio::test]
async fn invalid_address_type() {
    let server = MockServer::start().await;
    let err = discover(&server)
        .addrs("provider=linode address_type=elastic api_token=t", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DiscoverError::Provider {
            source: ProviderError::MalformedArgument(arg, _),
            ..
        } if arg == "address_type=elastic"
    ));
}

#[tokio::test]
async fn api_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/linode/instances"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = discover(&server)
        .addrs("provider=linode api_token=t", None)
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        DiscoverError::Provider {
            source: ProviderError::RequestFailed(msg),
            ..
        } if msg.starts_with("Fetching Linode instances failed")
    ));
}
