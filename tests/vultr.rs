#![cfg(feature = "vultr")]

use node_addrs::{vultr::VultrProvider, Discover, DiscoverError, ProviderError, Registry};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn instance(id: &str, region: &str, internal_ip: &str) -> Value {
    json!({
        "id": id,
        "label": format!("node-{}", id),
        "region": region,
        "internal_ip": internal_ip
    })
}

fn discover(server: &MockServer) -> Discover {
    let provider = VultrProvider::with_base_url(server.uri());
    Discover::new(Registry::new().with("vultr", provider).unwrap())
}

#[tokio::test]
async fn follows_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/instances"))
        .and(query_param("tag", "consul"))
        .and(query_param("cursor", "bmV4dA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instances": [instance("c", "ewr", "10.1.96.5")],
            "meta": { "links": { "next": "" } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/instances"))
        .and(query_param("tag", "consul"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instances": [
                instance("a", "ewr", "10.1.96.3"),
                instance("b", "ams", "10.1.96.4"),
            ],
            "meta": { "links": { "next": "bmV4dA==" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let addrs = discover(&server)
        .addrs("provider=vultr region=ewr tag_name=consul api_token=t", None)
        .await
        .unwrap();
    assert_eq!(addrs, vec!["10.1.96.3", "10.1.96.5"]);
}

#[tokio::test]
async fn instances_without_internal_ip_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instances": [instance("a", "ewr", "")],
            "meta": { "links": { "next": "" } }
        })))
        .mount(&server)
        .await;

    let addrs = discover(&server)
        .addrs("provider=vultr api_token=t", None)
        .await
        .unwrap();
    assert!(addrs.is_empty());
}

#[tokio::test]
async fn api_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/instances"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = discover(&server)
        .addrs("provider=vultr api_token=t", None)
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
