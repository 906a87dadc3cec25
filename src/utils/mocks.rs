//! Shared test doubles.
//!
//! [`ScriptedTransport`] answers each call through a closure that receives the
//! target node and the index of the call, and records every call with the
//! (paused) tokio clock so tests can assert on rotation and backoff timing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::services::execution::{BackoffConfig, DispatchSettings};
use crate::services::mirror::MirrorNode;
use crate::services::network::{AddressBook, NodeHealthTracker};
use crate::models::{
    AccountId, Endpoint, NodeEntry, Status, TransactionId, TransactionReceipt, TransactionRecord,
    TransportError,
};
use crate::services::transport::{
    NodeTransport, PrecheckResponse, ReceiptResponse, RecordResponse,
};

type SubmitScript =
    Box<dyn Fn(&NodeEntry, usize) -> Result<PrecheckResponse, TransportError> + Send + Sync>;
type ReceiptScript = Box<
    dyn Fn(&NodeEntry, &TransactionId, usize) -> Result<ReceiptResponse, TransportError>
        + Send
        + Sync,
>;
type RecordScript = Box<
    dyn Fn(&NodeEntry, &TransactionId, usize) -> Result<RecordResponse, TransportError>
        + Send
        + Sync,
>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Submit,
    Receipt,
    Record,
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub node_account_id: AccountId,
    pub transaction_id: Option<TransactionId>,
    pub request: Option<Vec<u8>>,
    pub at: Instant,
}

pub struct ScriptedTransport {
    submit: SubmitScript,
    receipt: ReceiptScript,
    record: RecordScript,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Accepts every submission and reports every receipt as successful.
    pub fn new() -> Self {
        Self {
            submit: Box::new(|_, _| Ok(PrecheckResponse::new(Status::Ok))),
            receipt: Box::new(|node, transaction_id, _| Ok(success_receipt(node, transaction_id))),
            record: Box::new(|node, transaction_id, _| {
                let receipt = success_receipt(node, transaction_id).receipt;
                Ok(RecordResponse {
                    precheck: Status::Ok,
                    record: receipt.map(|receipt| TransactionRecord {
                        receipt,
                        transaction_hash: vec![0xab; 48],
                        consensus_timestamp: None,
                        memo: String::new(),
                        transaction_fee: 1,
                    }),
                })
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_submit<F>(mut self, script: F) -> Self
    where
        F: Fn(&NodeEntry, usize) -> Result<PrecheckResponse, TransportError> + Send + Sync + 'static,
    {
        self.submit = Box::new(script);
        self
    }

    pub fn on_receipt<F>(mut self, script: F) -> Self
    where
        F: Fn(&NodeEntry, &TransactionId, usize) -> Result<ReceiptResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        self.receipt = Box::new(script);
        self
    }

    pub fn on_record<F>(mut self, script: F) -> Self
    where
        F: Fn(&NodeEntry, &TransactionId, usize) -> Result<RecordResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        self.record = Box::new(script);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }

    pub fn submit_times(&self) -> Vec<Instant> {
        self.calls_of(CallKind::Submit)
            .into_iter()
            .map(|call| call.at)
            .collect()
    }

    pub fn submitted_to(&self) -> Vec<AccountId> {
        self.calls_of(CallKind::Submit)
            .into_iter()
            .map(|call| call.node_account_id)
            .collect()
    }

    pub fn submitted_requests(&self) -> Vec<Vec<u8>> {
        self.calls_of(CallKind::Submit)
            .into_iter()
            .filter_map(|call| call.request)
            .collect()
    }

    pub fn receipt_queries(&self) -> Vec<RecordedCall> {
        self.calls_of(CallKind::Receipt)
    }

    /// Records a call and returns its index among calls of the same kind.
    fn record_call(
        &self,
        kind: CallKind,
        node: &NodeEntry,
        transaction_id: Option<TransactionId>,
        request: Option<Vec<u8>>,
    ) -> usize {
        let mut calls = self.calls.lock();
        let index = calls.iter().filter(|call| call.kind == kind).count();
        calls.push(RecordedCall {
            kind,
            node_account_id: node.account_id,
            transaction_id,
            request,
            at: Instant::now(),
        });
        index
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn submit_transaction(
        &self,
        node: &NodeEntry,
        request: Vec<u8>,
        _deadline: Duration,
    ) -> Result<PrecheckResponse, TransportError> {
        let index = self.record_call(CallKind::Submit, node, None, Some(request));
        (self.submit)(node, index)
    }

    async fn get_receipt(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        _deadline: Duration,
    ) -> Result<ReceiptResponse, TransportError> {
        let index = self.record_call(CallKind::Receipt, node, Some(*transaction_id), None);
        (self.receipt)(node, transaction_id, index)
    }

    async fn get_record(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        _deadline: Duration,
    ) -> Result<RecordResponse, TransportError> {
        let index = self.record_call(CallKind::Record, node, Some(*transaction_id), None);
        (self.record)(node, transaction_id, index)
    }
}

pub fn success_receipt(node: &NodeEntry, transaction_id: &TransactionId) -> ReceiptResponse {
    receipt_with_status(node, transaction_id, Status::Success)
}

pub fn receipt_with_status(
    node: &NodeEntry,
    transaction_id: &TransactionId,
    status: Status,
) -> ReceiptResponse {
    let mut receipt = TransactionReceipt::new(*transaction_id, status);
    receipt.node_id = Some(node.node_id);
    ReceiptResponse {
        precheck: Status::Ok,
        receipt: Some(receipt),
    }
}

pub fn account(num: u64) -> AccountId {
    AccountId::new(0, 0, num)
}

/// Node `node_id` reachable under account `0.0.{node_id + 3}`.
pub fn node(node_id: u64) -> NodeEntry {
    NodeEntry::new(
        node_id,
        account(node_id + 3),
        vec![Endpoint::new(format!("10.0.0.{node_id}"), 50211)],
    )
}

/// Address book of `nodes` nodes with the default node backoff.
pub fn address_book(nodes: u64, mirror: Option<Arc<dyn MirrorNode>>) -> Arc<AddressBook> {
    let health = Arc::new(NodeHealthTracker::new(
        Duration::from_secs(8),
        Duration::from_secs(3600),
    ));
    Arc::new(AddressBook::new(
        (0..nodes).map(node).collect(),
        health,
        mirror,
    ))
}

pub fn test_settings() -> DispatchSettings {
    DispatchSettings {
        max_attempts: 10,
        backoff: BackoffConfig::new(Duration::from_millis(250), Duration::from_secs(8)),
        grpc_deadline: Duration::from_secs(10),
        request_timeout: Duration::from_secs(120),
        regenerate_transaction_id: true,
    }
}
