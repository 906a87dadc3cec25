//! Chunked submissions through the client.

use std::sync::Arc;

use ledger_executor::models::{AccountId, ChunkError, ChunkInfo, Status, TransactionId};
use ledger_executor::services::signing::Ed25519PrivateKey;
use ledger_executor::{ChunkSequencing, ChunkedSubmission, Client, ClientConfig, OpaqueBody};
use serde::Deserialize;

use crate::integration::common::logging::init_test_logging;
use crate::integration::common::network::{account, nodes, Call, FakeNetwork, NodeBehavior};

#[derive(Deserialize)]
struct ChunkWire {
    transaction_id: TransactionId,
    #[allow(dead_code)]
    node_account_id: AccountId,
    #[allow(dead_code)]
    memo: String,
    chunk: Option<ChunkInfo>,
    payload: Vec<u8>,
}

fn client(network: Arc<FakeNetwork>) -> Client {
    Client::builder()
        .config(ClientConfig::default().with_network_update_period(None))
        .network(nodes(2))
        .transport(network)
        .operator(account(2), Ed25519PrivateKey::from_seed(&[9; 32]))
        .build()
        .unwrap()
}

fn decode_chunks(network: &FakeNetwork) -> Vec<ChunkWire> {
    network
        .submissions()
        .iter()
        .map(|submission| bincode::deserialize(&submission.signed.body_bytes).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_append_waits_for_each_receipt() {
    init_test_logging();
    let network = FakeNetwork::new();
    let client = client(network.clone());
    let initial = TransactionId::generate(account(2));
    let submission = ChunkedSubmission::append(OpaqueBody::default(), &b"abcde"[..])
        .with_chunk_size(2)
        .with_transaction_id(initial);

    let outcome = client.submit_chunked(submission).await.unwrap();

    assert_eq!(outcome.initial_transaction_id, initial);
    assert_eq!(outcome.chunks.len(), 3);
    assert!(outcome.chunks.iter().all(|chunk| chunk.receipt.is_some()));

    let calls = network.calls();
    assert_eq!(calls.len(), 6);
    for (index, pair) in calls.chunks(2).enumerate() {
        assert!(matches!(pair[0], Call::Submit(_)), "call {} not a submit", 2 * index);
        let expected = if index == 0 { initial } else { initial.child(index as u32) };
        assert_eq!(pair[1], Call::Receipt(expected));
    }

    let chunks = decode_chunks(&network);
    let payload: Vec<u8> = chunks.iter().flat_map(|c| c.payload.clone()).collect();
    assert_eq!(payload, b"abcde");
    for (index, chunk) in chunks.iter().enumerate() {
        let info = chunk.chunk.unwrap();
        assert_eq!(info.initial_transaction_id, initial);
        assert_eq!(info.number, index as u32 + 1);
        assert_eq!(info.total, 3);
        assert_eq!(chunk.transaction_id, outcome.chunks[index].submission.transaction_id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_message_does_not_wait_for_receipts() {
    init_test_logging();
    let network = FakeNetwork::new();
    let client = client(network.clone());
    let submission =
        ChunkedSubmission::message(OpaqueBody::default(), vec![7u8; 2500]).with_chunk_size(1024);

    let outcome = client.submit_chunked(submission).await.unwrap();

    assert_eq!(outcome.chunks.len(), 3);
    assert!(outcome.chunks.iter().all(|chunk| chunk.receipt.is_none()));
    assert!(network
        .calls()
        .iter()
        .all(|call| matches!(call, Call::Submit(_))));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_payload_submits_nothing() {
    init_test_logging();
    let network = FakeNetwork::new();
    let client = client(network.clone());
    let submission = ChunkedSubmission::new(
        OpaqueBody::default(),
        vec![0u8; 130 * 1024],
        ChunkSequencing::AwaitReceipt,
    )
    .with_chunk_size(1024)
    .with_max_chunks(100);

    let err = client.submit_chunked(submission).await.unwrap_err();

    assert!(matches!(
        err,
        ChunkError::TooManyChunks {
            required: 130,
            max: 100
        }
    ));
    assert!(network.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_receipt_stops_remaining_chunks() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set_receipt_status(Status::InvalidTopicId);
    let client = client(network.clone());
    let submission =
        ChunkedSubmission::append(OpaqueBody::default(), &b"abcdef"[..]).with_chunk_size(2);

    let err = client.submit_chunked(submission).await.unwrap_err();

    match err {
        ChunkError::ChunkFailed {
            index, committed, ..
        } => {
            assert_eq!(index, 0);
            assert_eq!(committed, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(network.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_chunk_reports_committed_prefix() {
    init_test_logging();
    let network = FakeNetwork::new();
    network.set(
        account(3),
        NodeBehavior::RejectAfter(2, Status::InvalidChunkNumber),
    );
    let client = client(network.clone());
    let submission = ChunkedSubmission::message(OpaqueBody::default(), &b"abcdef"[..])
        .with_chunk_size(2)
        .with_node_account_ids(vec![account(3)]);

    let err = client.submit_chunked(submission).await.unwrap_err();

    assert!(matches!(
        err,
        ChunkError::ChunkFailed {
            index: 2,
            committed: 2,
            ..
        }
    ));
    assert_eq!(err.committed(), 2);
    assert_eq!(network.submissions_to(account(3)), 3);
}
