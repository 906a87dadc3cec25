//! Signature assembly seen from a node.

use std::sync::Arc;

use ledger_executor::models::{Status, TransactionId};
use ledger_executor::services::signing::{Ed25519PrivateKey, TransactionSigner};
use ledger_executor::{Client, ClientConfig, OpaqueBody, Transaction};

use crate::integration::common::logging::init_test_logging;
use crate::integration::common::network::{account, nodes, FakeNetwork};

fn client(network: Arc<FakeNetwork>, operator: Ed25519PrivateKey) -> Client {
    Client::builder()
        .config(ClientConfig::default().with_network_update_period(None))
        .network(nodes(1))
        .transport(network)
        .operator(account(2), operator)
        .build()
        .unwrap()
}

fn frozen_single_node() -> Transaction {
    let mut tx = Transaction::new(OpaqueBody::new(&b"payload"[..]))
        .with_transaction_id(TransactionId::generate(account(2)))
        .with_node_account_ids(vec![account(3)]);
    tx.freeze().unwrap();
    tx
}

#[tokio::test(start_paused = true)]
async fn test_poisoned_signature_is_replaced_by_owner() {
    init_test_logging();
    let network = FakeNetwork::new();
    let operator = Ed25519PrivateKey::from_seed(&[1; 32]);
    let victim = Ed25519PrivateKey::from_seed(&[2; 32]);
    let client = client(network.clone(), operator);
    let mut tx = frozen_single_node();

    // a third party slips in garbage under the victim's key
    tx.add_signature(victim.public_key(), vec![0xde; 64]).unwrap();
    tx.sign(victim.clone());

    let response = client.execute(&mut tx).await.unwrap();

    assert_eq!(response.node_account_id, account(3));
    let signed = &network.submissions()[0].signed;
    let pair = signed
        .signatures
        .iter()
        .find(|pair| pair.public_key == victim.public_key())
        .unwrap();
    victim
        .public_key()
        .verify(&signed.body_bytes, &pair.signature)
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poisoned_operator_key_is_signed_by_client() {
    init_test_logging();
    let network = FakeNetwork::new();
    let operator = Ed25519PrivateKey::from_seed(&[1; 32]);
    let client = client(network.clone(), operator.clone());
    let mut tx = frozen_single_node();

    tx.add_signature(operator.public_key(), vec![0xaa; 64]).unwrap();

    client.execute(&mut tx).await.unwrap();

    let signed = &network.submissions()[0].signed;
    assert_eq!(signed.signatures.len(), 1);
    operator
        .public_key()
        .verify(&signed.body_bytes, &signed.signatures[0].signature)
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unrecovered_poisoning_is_rejected_by_node() {
    init_test_logging();
    let network = FakeNetwork::new();
    let operator = Ed25519PrivateKey::from_seed(&[1; 32]);
    let victim = Ed25519PrivateKey::from_seed(&[2; 32]);
    let client = client(network.clone(), operator);
    let mut tx = frozen_single_node();

    tx.add_signature(victim.public_key(), vec![0xde; 64]).unwrap();

    let err = client.execute(&mut tx).await.unwrap_err();

    assert_eq!(err.status(), Some(&Status::InvalidSignature));
    assert_eq!(network.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offline_signatures_per_node() {
    init_test_logging();
    let network = FakeNetwork::new();
    let operator = Ed25519PrivateKey::from_seed(&[1; 32]);
    let cosigner = Ed25519PrivateKey::from_seed(&[3; 32]);
    let client = client(network.clone(), operator);
    let mut tx = frozen_single_node();

    for body in tx.signable_node_body_bytes().unwrap() {
        tx.add_signature_for(
            cosigner.public_key(),
            cosigner.sign(&body.body),
            body.transaction_id,
            body.node_account_id,
        )
        .unwrap();
    }

    client.execute(&mut tx).await.unwrap();

    let signed = &network.submissions()[0].signed;
    assert_eq!(signed.signatures.len(), 2);
}
