//! Execution through the client against the fake network.

use std::sync::Arc;
use std::time::Duration;

use ledger_executor::models::{ExecutionError, Status};
use ledger_executor::services::signing::Ed25519PrivateKey;
use ledger_executor::{Client, ClientConfig, OpaqueBody, Transaction};
use tokio::time::Instant;

use crate::integration::common::logging::init_test_logging;
use crate::integration::common::network::{
    account, nodes, FakeNetwork, HangingMirror, NodeBehavior,
};

fn config() -> ClientConfig {
    ClientConfig::default().with_network_update_period(None)
}

fn operator_key() -> Ed25519PrivateKey {
    Ed25519PrivateKey::from_seed(&[42; 32])
}

fn client(network: Arc<FakeNetwork>) -> Client {
    Client::builder()
        .config(config())
        .network(nodes(3))
        .transport(network)
        .operator(account(2), operator_key())
        .build()
        .unwrap()
}

fn pinned(accounts: &[u64]) -> Transaction {
    Transaction::new(OpaqueBody::new(&b"transfer"[..]))
        .with_node_account_ids(accounts.iter().map(|num| account(*num)).collect())
}

#[tokio::test(start_paused = true)]
async fn test_execute_and_get_receipt() {
    init_test_logging();
    let network = FakeNetwork::new();
    let client = client(network.clone());
    let mut tx = Transaction::new(OpaqueBody::new(&b"transfer"[..]));

    let response = client.execute(&mut tx).await.unwrap();
    let receipt = response
        .get_receipt(&client, Duration::from_secs(30))
        .await
        .unwrap();
    let record = response
        .get_record(&client, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(receipt.status, Status::Success);
    assert_eq!(receipt.transaction_id, response.transaction_id);
    assert_eq!(record.transaction_fee, 100);
    assert_eq!(network.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deterministic_rejection_sends_once() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set(account(3), NodeBehavior::Reject(Status::InsufficientPayerBalance));
    let client = client(network.clone());
    let mut tx = pinned(&[3, 4, 5]);

    let err = client.execute(&mut tx).await.unwrap_err();

    assert_eq!(err.status(), Some(&Status::InsufficientPayerBalance));
    assert!(!err.is_undetermined());
    assert_eq!(network.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_busy_node_backs_off() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set(account(3), NodeBehavior::BusyFor(3));
    let client = client(network.clone());
    let mut tx = pinned(&[3]);

    client.execute(&mut tx).await.unwrap();

    let times: Vec<Instant> = network.submissions().iter().map(|s| s.at).collect();
    assert_eq!(times.len(), 4);
    assert_eq!(times[1] - times[0], Duration::from_millis(250));
    assert_eq!(times[2] - times[1], Duration::from_millis(500));
    assert_eq!(times[3] - times[2], Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_misrouted_node_rotates_while_refresh_hangs() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set(account(3), NodeBehavior::Misrouted);
    let client = Client::builder()
        .config(config())
        .network(nodes(2))
        .transport(network.clone())
        .mirror(Arc::new(HangingMirror))
        .operator(account(2), operator_key())
        .build()
        .unwrap();
    let mut tx = pinned(&[3, 4]);
    let started = Instant::now();

    let response = client.execute(&mut tx).await.unwrap();

    assert_eq!(response.node_account_id, account(4));
    assert!(network.submissions_to(account(3)) <= 1);
    assert_eq!(network.submissions_to(account(4)), 1);
    assert_eq!(Instant::now() - started, Duration::ZERO);
    assert!(client.address_book().is_refresh_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_all_nodes_down_is_undetermined() {
    init_test_logging();
    let network = FakeNetwork::new();
    for num in 3..6 {
        network.set(account(num), NodeBehavior::Down);
    }
    let client = client(network.clone());
    let mut tx = pinned(&[3, 4, 5]);

    let err = client.execute(&mut tx).await.unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::MaxAttemptsExceeded { attempts: 10, .. }
    ));
    assert!(err.is_undetermined());
}

#[tokio::test(start_paused = true)]
async fn test_failed_consensus_status_is_reported() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set_receipt_status(Status::InvalidAccountId);
    let client = client(network);
    let mut tx = Transaction::new(OpaqueBody::default());

    let response = client.execute(&mut tx).await.unwrap();
    let err = response
        .get_receipt(&client, Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::ReceiptStatus {
            status: Status::InvalidAccountId,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_serialized_transaction_executes_with_its_signatures() {
    init_test_logging();
    let network = FakeNetwork::new();
    let client = client(network.clone());
    let key = operator_key();
    let mut tx = pinned(&[4]).with_transaction_id(
        ledger_executor::TransactionId::generate(account(2)),
    );
    tx.freeze().unwrap();
    tx.sign(key);
    let bytes = tx.to_bytes().unwrap();

    let mut decoded = Transaction::from_bytes(&bytes).unwrap();
    let response = client.execute(&mut decoded).await.unwrap();

    assert_eq!(response.node_account_id, account(4));
    let submission = &network.submissions()[0];
    assert_eq!(submission.signed.signatures.len(), 1);
}
