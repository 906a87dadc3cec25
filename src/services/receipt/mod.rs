//! Receipt Poller
//!
//! Waits for the consensus outcome of an accepted transaction. The node that
//! accepted the submission is asked first. Transport failures move the query on
//! to the other targets, then to any healthy node in the address book. When a
//! whole round fails at transport level the mirror node, if configured, is
//! asked instead.
//!
//! Pending answers back off exponentially. Running out of time yields
//! [`ExecutionError::ReceiptUnavailable`], which callers must treat as
//! "unknown" rather than as a failed transaction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{
    AccountId, ExecutionError, NodeEntry, Status, TransactionId, TransactionReceipt,
    TransactionRecord, TransportError,
};
use crate::services::execution::{BackoffConfig, DispatchSettings};
use crate::services::mirror::MirrorReceipt;
use crate::services::network::AddressBook;
use crate::services::transport::NodeTransport;

/// Answer of one node to a receipt or record query.
#[derive(Debug)]
enum Polled<T> {
    Ready(T),
    Pending(Status),
    Rejected(Status),
}

pub struct ReceiptPoller {
    address_book: Arc<AddressBook>,
    transport: Arc<dyn NodeTransport>,
    backoff: BackoffConfig,
    grpc_deadline: Duration,
}

impl ReceiptPoller {
    pub fn new(
        address_book: Arc<AddressBook>,
        transport: Arc<dyn NodeTransport>,
        backoff: BackoffConfig,
        grpc_deadline: Duration,
    ) -> Self {
        Self {
            address_book,
            transport,
            backoff,
            grpc_deadline,
        }
    }

    pub fn from_settings(
        address_book: Arc<AddressBook>,
        transport: Arc<dyn NodeTransport>,
        settings: &DispatchSettings,
    ) -> Self {
        Self::new(
            address_book,
            transport,
            settings.backoff,
            settings.grpc_deadline,
        )
    }

    /// Polls until the receipt of `transaction_id` is final.
    ///
    /// # Arguments
    /// * `transaction_id` - The accepted transaction
    /// * `target_nodes` - Nodes to ask, the accepting node first
    /// * `timeout` - Total time to wait
    ///
    /// # Returns
    /// * `Ok(TransactionReceipt)` - The final receipt, whatever its status
    /// * `Err(ExecutionError::ReceiptUnavailable)` - Still pending at the timeout
    /// * `Err(ExecutionError::PrecheckStatus)` - A node refused the query itself
    pub async fn poll_until_terminal(
        &self,
        transaction_id: &TransactionId,
        target_nodes: &[AccountId],
        timeout: Duration,
    ) -> Result<TransactionReceipt, ExecutionError> {
        self.poll_until_terminal_with_cancel(
            transaction_id,
            target_nodes,
            timeout,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn poll_until_terminal_with_cancel(
        &self,
        transaction_id: &TransactionId,
        target_nodes: &[AccountId],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TransactionReceipt, ExecutionError> {
        let deadline = Instant::now() + timeout;
        self.poll_nodes(
            transaction_id,
            target_nodes,
            deadline,
            cancel,
            |node, call_deadline| self.query_receipt(node, *transaction_id, call_deadline),
            || self.query_mirror(transaction_id),
        )
        .await
    }

    /// Waits for the receipt, then fetches the full record.
    ///
    /// Both steps share `timeout`.
    pub async fn poll_record(
        &self,
        transaction_id: &TransactionId,
        target_nodes: &[AccountId],
        timeout: Duration,
    ) -> Result<TransactionRecord, ExecutionError> {
        self.poll_record_with_cancel(
            transaction_id,
            target_nodes,
            timeout,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn poll_record_with_cancel(
        &self,
        transaction_id: &TransactionId,
        target_nodes: &[AccountId],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TransactionRecord, ExecutionError> {
        let deadline = Instant::now() + timeout;
        self.poll_nodes(
            transaction_id,
            target_nodes,
            deadline,
            cancel,
            |node, call_deadline| self.query_receipt(node, *transaction_id, call_deadline),
            || self.query_mirror(transaction_id),
        )
        .await?;

        self.poll_nodes(
            transaction_id,
            target_nodes,
            deadline,
            cancel,
            |node, call_deadline| self.query_record(node, *transaction_id, call_deadline),
            || async { None },
        )
        .await
    }

    /// Nodes to query in order: the resolvable targets, then every other
    /// healthy node of the current address book.
    fn query_order(&self, target_nodes: &[AccountId]) -> Vec<NodeEntry> {
        let now = Instant::now();
        let mut nodes: Vec<NodeEntry> = target_nodes
            .iter()
            .filter_map(|account_id| self.address_book.resolve_account(account_id))
            .collect();
        let extra: Vec<NodeEntry> = self
            .address_book
            .entries()
            .into_iter()
            .filter(|entry| entry.health.is_healthy_at(now))
            .filter(|entry| !nodes.iter().any(|node| node.node_id == entry.node_id))
            .collect();
        nodes.extend(extra);
        nodes
    }

    async fn poll_nodes<T, Q, QFut, M, MFut>(
        &self,
        transaction_id: &TransactionId,
        target_nodes: &[AccountId],
        deadline: Instant,
        cancel: &CancellationToken,
        query: Q,
        fallback: M,
    ) -> Result<T, ExecutionError>
    where
        Q: Fn(NodeEntry, Duration) -> QFut,
        QFut: Future<Output = Result<Polled<T>, TransportError>>,
        M: Fn() -> MFut,
        MFut: Future<Output = Option<T>>,
    {
        let started = Instant::now();
        let health = self.address_book.health().clone();
        // account of the node that answered last, asked first next round
        let mut preferred: Option<AccountId> = None;
        let mut round: u32 = 0;

        loop {
            let nodes = self.query_order(target_nodes);
            let start = preferred
                .and_then(|account_id| nodes.iter().position(|node| node.account_id == account_id))
                .unwrap_or(0);
            let mut answered = false;

            for node in nodes[start..].iter().chain(nodes[..start].iter()) {
                if cancel.is_cancelled() {
                    return Err(ExecutionError::Cancelled);
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let call_deadline = self
                    .grpc_deadline
                    .min(deadline.saturating_duration_since(now));

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                    result = timeout(call_deadline, query(node.clone(), call_deadline)) => {
                        result.unwrap_or(Err(TransportError::DeadlineExceeded))
                    }
                };

                match result {
                    Ok(Polled::Ready(value)) => {
                        health.record_success(node.node_id);
                        return Ok(value);
                    }
                    Ok(Polled::Pending(status)) => {
                        health.record_success(node.node_id);
                        debug!(
                            transaction_id = %transaction_id,
                            node_id = %node.node_id,
                            status = %status,
                            round = %round,
                            "consensus result pending"
                        );
                        preferred = Some(node.account_id);
                        answered = true;
                        break;
                    }
                    Ok(Polled::Rejected(status)) => {
                        return Err(ExecutionError::PrecheckStatus {
                            status,
                            transaction_id: *transaction_id,
                        });
                    }
                    Err(err) => {
                        health.record_failure(node.node_id);
                        warn!(
                            transaction_id = %transaction_id,
                            node_id = %node.node_id,
                            error = %err,
                            "receipt query failed, trying next node"
                        );
                    }
                }
            }

            if !answered && Instant::now() < deadline {
                if let Some(value) = fallback().await {
                    return Ok(value);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ExecutionError::ReceiptUnavailable {
                    transaction_id: *transaction_id,
                    waited: now.saturating_duration_since(started),
                });
            }

            let until = (now + self.backoff.delay(round)).min(deadline);
            round = round.saturating_add(1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                _ = tokio::time::sleep_until(until) => {}
            }
        }
    }

    async fn query_receipt(
        &self,
        node: NodeEntry,
        transaction_id: TransactionId,
        deadline: Duration,
    ) -> Result<Polled<TransactionReceipt>, TransportError> {
        let response = self
            .transport
            .get_receipt(&node, &transaction_id, deadline)
            .await?;
        Ok(match (response.precheck, response.receipt) {
            (Status::Ok, Some(receipt)) if receipt.status.is_receipt_pending() => {
                Polled::Pending(receipt.status)
            }
            (Status::Ok, Some(mut receipt)) => {
                receipt.node_id.get_or_insert(node.node_id);
                Polled::Ready(receipt)
            }
            (Status::Ok, None) => Polled::Pending(Status::ReceiptNotFound),
            (status, _) if status.is_query_precheck_pending() => Polled::Pending(status),
            (status, _) => Polled::Rejected(status),
        })
    }

    async fn query_record(
        &self,
        node: NodeEntry,
        transaction_id: TransactionId,
        deadline: Duration,
    ) -> Result<Polled<TransactionRecord>, TransportError> {
        let response = self
            .transport
            .get_record(&node, &transaction_id, deadline)
            .await?;
        Ok(match (response.precheck, response.record) {
            (Status::Ok, Some(record)) if record.receipt.status.is_receipt_pending() => {
                Polled::Pending(record.receipt.status)
            }
            (Status::Ok, Some(record)) => Polled::Ready(record),
            (Status::Ok, None) => Polled::Pending(Status::RecordNotFound),
            (status, _) if status.is_query_precheck_pending() => Polled::Pending(status),
            (status, _) => Polled::Rejected(status),
        })
    }

    async fn query_mirror(&self, transaction_id: &TransactionId) -> Option<TransactionReceipt> {
        let mirror = self.address_book.mirror()?;
        match mirror.query_receipt(transaction_id).await {
            Ok(MirrorReceipt::Final(receipt)) => {
                debug!(transaction_id = %transaction_id, "receipt served by mirror node");
                Some(receipt)
            }
            Ok(MirrorReceipt::Pending) => None,
            Err(e) => {
                warn!(transaction_id = %transaction_id, error = %e, "mirror receipt query failed");
                None
            }
        }
    }
}
