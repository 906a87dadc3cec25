//! In-process fake consensus network and mirror node.
//!
//! Each node account is given a [`NodeBehavior`]. Submissions are decoded and
//! every signature is verified, so tests observe what a real node would
//! reject.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_executor::models::{
    AccountId, Endpoint, MirrorError, NodeEntry, Status, TransactionId, TransactionReceipt,
    TransactionRecord, TransportError,
};
use ledger_executor::services::mirror::{MirrorNode, MirrorReceipt};
use ledger_executor::services::transaction::SignedTransaction;
use ledger_executor::services::transport::{
    NodeTransport, PrecheckResponse, ReceiptResponse, RecordResponse,
};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub enum NodeBehavior {
    Accept,
    /// Answers `BUSY` this many times, then accepts.
    BusyFor(usize),
    /// Answers `INVALID_NODE_ACCOUNT`.
    Misrouted,
    /// Fails at transport level.
    Down,
    Reject(Status),
    /// Accepts this many submissions, then rejects with the status.
    RejectAfter(usize, Status),
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub node_account_id: AccountId,
    pub at: Instant,
    pub signed: SignedTransaction,
}

/// Order in which the network saw requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Submit(AccountId),
    Receipt(TransactionId),
}

#[derive(Default)]
pub struct FakeNetwork {
    behaviors: Mutex<HashMap<AccountId, NodeBehavior>>,
    submissions: Mutex<Vec<Submission>>,
    calls: Mutex<Vec<Call>>,
    receipt_status: Mutex<Option<Status>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, node_account_id: AccountId, behavior: NodeBehavior) {
        self.behaviors.lock().insert(node_account_id, behavior);
    }

    /// Status of every receipt served from now on. Defaults to `SUCCESS`.
    pub fn set_receipt_status(&self, status: Status) {
        *self.receipt_status.lock() = Some(status);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn submissions_to(&self, node_account_id: AccountId) -> usize {
        self.submissions
            .lock()
            .iter()
            .filter(|submission| submission.node_account_id == node_account_id)
            .count()
    }

    fn behavior(&self, node_account_id: &AccountId) -> NodeBehavior {
        let mut behaviors = self.behaviors.lock();
        let behavior = behaviors
            .get(node_account_id)
            .cloned()
            .unwrap_or(NodeBehavior::Accept);
        match behavior {
            NodeBehavior::BusyFor(remaining) => {
                let next = match remaining {
                    0 | 1 => NodeBehavior::Accept,
                    n => NodeBehavior::BusyFor(n - 1),
                };
                behaviors.insert(*node_account_id, next);
                behavior
            }
            NodeBehavior::RejectAfter(0, status) => NodeBehavior::Reject(status),
            NodeBehavior::RejectAfter(remaining, status) => {
                behaviors.insert(
                    *node_account_id,
                    NodeBehavior::RejectAfter(remaining - 1, status),
                );
                NodeBehavior::Accept
            }
            other => other,
        }
    }

    fn receipt(&self, node: &NodeEntry, transaction_id: &TransactionId) -> TransactionReceipt {
        let status = self.receipt_status.lock().clone().unwrap_or(Status::Success);
        let mut receipt = TransactionReceipt::new(*transaction_id, status);
        receipt.node_id = Some(node.node_id);
        receipt
    }
}

fn verify_signatures(signed: &SignedTransaction) -> bool {
    signed.signatures.iter().all(|pair| {
        pair.public_key
            .verify(&signed.body_bytes, &pair.signature)
            .is_ok()
    })
}

#[async_trait]
impl NodeTransport for FakeNetwork {
    async fn submit_transaction(
        &self,
        node: &NodeEntry,
        request: Vec<u8>,
        _deadline: Duration,
    ) -> Result<PrecheckResponse, TransportError> {
        let signed: SignedTransaction = bincode::deserialize(&request)
            .map_err(|e| TransportError::Other(format!("undecodable request: {e}")))?;
        self.calls.lock().push(Call::Submit(node.account_id));
        self.submissions.lock().push(Submission {
            node_account_id: node.account_id,
            at: Instant::now(),
            signed: signed.clone(),
        });

        let status = match self.behavior(&node.account_id) {
            NodeBehavior::Down => {
                return Err(TransportError::Unavailable(format!("{} is down", node.account_id)))
            }
            NodeBehavior::Misrouted => Status::InvalidNodeAccount,
            NodeBehavior::BusyFor(_) => Status::Busy,
            NodeBehavior::Reject(status) | NodeBehavior::RejectAfter(_, status) => status,
            NodeBehavior::Accept if !verify_signatures(&signed) => Status::InvalidSignature,
            NodeBehavior::Accept => Status::Ok,
        };
        Ok(PrecheckResponse::new(status))
    }

    async fn get_receipt(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        _deadline: Duration,
    ) -> Result<ReceiptResponse, TransportError> {
        self.calls.lock().push(Call::Receipt(*transaction_id));
        Ok(ReceiptResponse {
            precheck: Status::Ok,
            receipt: Some(self.receipt(node, transaction_id)),
        })
    }

    async fn get_record(
        &self,
        node: &NodeEntry,
        transaction_id: &TransactionId,
        _deadline: Duration,
    ) -> Result<RecordResponse, TransportError> {
        Ok(RecordResponse {
            precheck: Status::Ok,
            record: Some(TransactionRecord {
                receipt: self.receipt(node, transaction_id),
                transaction_hash: vec![0; 48],
                consensus_timestamp: None,
                memo: String::new(),
                transaction_fee: 100,
            }),
        })
    }
}

/// Mirror node that never answers address book queries.
pub struct HangingMirror;

#[async_trait]
impl MirrorNode for HangingMirror {
    async fn query_current_address_book(&self) -> Result<Vec<NodeEntry>, MirrorError> {
        std::future::pending().await
    }

    async fn query_receipt(
        &self,
        _transaction_id: &TransactionId,
    ) -> Result<MirrorReceipt, MirrorError> {
        Ok(MirrorReceipt::Pending)
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

pub fn nodes(count: u64) -> Vec<NodeEntry> {
    (0..count).map(node).collect()
}
