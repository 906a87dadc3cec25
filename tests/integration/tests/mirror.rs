//! Address book refreshes against a mirror node served by wiremock.

use std::sync::Arc;
use std::time::Duration;

use ledger_executor::models::MirrorError;
use ledger_executor::services::signing::Ed25519PrivateKey;
use ledger_executor::{Client, ClientConfig, OpaqueBody, Transaction};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::logging::init_test_logging;
use crate::integration::common::network::{account, nodes, FakeNetwork, NodeBehavior};

fn nodes_page(count: u64) -> Value {
    let nodes: Vec<Value> = (0..count)
        .map(|node_id| {
            json!({
                "node_id": node_id,
                "node_account_id": format!("0.0.{}", node_id + 3),
                "description": format!("node {node_id}"),
                "service_endpoints": [
                    { "ip_address_v4": format!("10.0.0.{node_id}"), "port": 50211 }
                ]
            })
        })
        .collect();
    json!({ "nodes": nodes, "links": { "next": null } })
}

async fn mirror_with_nodes(count: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/network/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes_page(count)))
        .mount(&server)
        .await;
    server
}

fn client(network: Arc<FakeNetwork>, mirror_url: String, initial_nodes: u64) -> Client {
    Client::builder()
        .config(
            ClientConfig::default()
                .with_network_update_period(None)
                .with_mirror_url(mirror_url),
        )
        .network(nodes(initial_nodes))
        .transport(network)
        .operator(account(2), Ed25519PrivateKey::from_seed(&[5; 32]))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_refresh_adds_nodes_from_mirror() {
    init_test_logging();
    let server = mirror_with_nodes(3).await;
    let client = client(FakeNetwork::new(), server.uri(), 1);
    assert!(client.address_book().resolve(2).is_none());

    let count = client.address_book().refresh_now().await.unwrap();

    assert_eq!(count, 3);
    let node = client.address_book().resolve(2).unwrap();
    assert_eq!(node.account_id, account(5));
    assert_eq!(
        client.address_book().resolve_account(&account(4)).map(|n| n.node_id),
        Some(1)
    );
}

#[tokio::test]
async fn test_failed_refresh_keeps_book() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/network/nodes"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let client = client(FakeNetwork::new(), server.uri(), 2);

    let result = client.address_book().refresh_now().await;

    assert!(result.is_err());
    assert_eq!(client.address_book().len(), 2);
}

#[tokio::test]
async fn test_empty_mirror_book_is_ignored() {
    init_test_logging();
    let server = mirror_with_nodes(0).await;
    let client = client(FakeNetwork::new(), server.uri(), 2);

    let err = client.address_book().refresh_now().await.unwrap_err();

    assert!(matches!(err, MirrorError::EmptyAddressBook));
    assert_eq!(client.address_book().len(), 2);
}

#[tokio::test]
async fn test_misrouted_node_triggers_refresh() {
    init_test_logging();
    let server = mirror_with_nodes(3).await;
    let network = FakeNetwork::new();
    network.set(account(3), NodeBehavior::Misrouted);
    let client = client(network.clone(), server.uri(), 2);
    let mut tx = Transaction::new(OpaqueBody::new(&b"transfer"[..]))
        .with_node_account_ids(vec![account(3), account(4)]);

    let response = client.execute(&mut tx).await.unwrap();
    assert_eq!(response.node_account_id, account(4));

    let refreshed = tokio::time::timeout(Duration::from_secs(5), async {
        while client.address_book().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(refreshed.is_ok(), "address book was not refreshed");
    assert!(client.address_book().resolve(2).is_some());
}
