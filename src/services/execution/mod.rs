//! Execution Dispatcher
//!
//! Drives a single frozen transaction to acceptance by some node. Each attempt
//! selects a node among the transaction's candidates, sends the copy addressed
//! to that node and classifies the answer:
//!
//! - transport failures and misrouted nodes mark the node unhealthy and rotate
//!   to the next candidate right away
//! - busy or inactive nodes cause a capped exponential backoff before the next
//!   attempt
//! - an expired id is regenerated when the transaction allows it
//! - any other precheck status is returned to the caller without retrying
//!
//! The loop is bounded by the attempt budget and by the wall-clock request
//! timeout, and stops between attempts when the caller cancels.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod backoff;
pub use backoff::*;

mod state;
pub use state::*;

use crate::config::ClientConfig;
use crate::models::{
    AccountId, AttemptError, ExecutionError, NodeId, Status, TransactionError, TransactionId,
    TransportError,
};
use crate::services::network::{select_node, AddressBook, Candidate};
use crate::services::transaction::{transaction_hash, Transaction};
use crate::services::transport::NodeTransport;

/// Retry settings used by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
    pub grpc_deadline: Duration,
    pub request_timeout: Duration,
    /// Client-wide default for replacing expired ids.
    pub regenerate_transaction_id: bool,
}

impl From<&ClientConfig> for DispatchSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: BackoffConfig::new(config.min_backoff, config.max_backoff),
            grpc_deadline: config.grpc_deadline,
            request_timeout: config.request_timeout,
            regenerate_transaction_id: config.regenerate_transaction_id,
        }
    }
}

/// A submission some node accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    pub transaction_id: TransactionId,
    pub node_id: NodeId,
    pub node_account_id: AccountId,
    pub transaction_hash: Vec<u8>,
    pub attempts: u32,
}

/// Final result of a dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    Accepted(AcceptedSubmission),
    /// A node rejected the transaction with a status retrying cannot fix.
    PrecheckRejected {
        status: Status,
        transaction_id: TransactionId,
    },
    /// The attempt budget ran out.
    TransportFailure {
        attempts: u32,
        last_error: Option<AttemptError>,
    },
    /// The request timeout elapsed.
    TimedOut {
        elapsed: Duration,
        last_error: Option<AttemptError>,
    },
    Cancelled,
    /// The transaction could not be serialized or regenerated.
    Invalid(TransactionError),
}

impl DispatchOutcome {
    pub fn into_result(self) -> Result<AcceptedSubmission, ExecutionError> {
        match self {
            DispatchOutcome::Accepted(submission) => Ok(submission),
            DispatchOutcome::PrecheckRejected {
                status,
                transaction_id,
            } => Err(ExecutionError::PrecheckStatus {
                status,
                transaction_id,
            }),
            DispatchOutcome::TransportFailure {
                attempts,
                last_error,
            } => Err(ExecutionError::MaxAttemptsExceeded {
                attempts,
                last_error,
            }),
            DispatchOutcome::TimedOut {
                elapsed,
                last_error,
            } => Err(ExecutionError::RequestTimeout {
                elapsed,
                last_error,
            }),
            DispatchOutcome::Cancelled => Err(ExecutionError::Cancelled),
            DispatchOutcome::Invalid(err) => Err(ExecutionError::Transaction(err)),
        }
    }
}

/// Per-execution state, owned by one dispatch call.
#[derive(Debug)]
pub struct PendingTransaction<'a> {
    transaction: &'a mut Transaction,
    attempt: u32,
    /// Rotation index into the transaction's node list.
    node_index: usize,
    last_error: Option<AttemptError>,
    started: Instant,
}

impl<'a> PendingTransaction<'a> {
    pub fn new(transaction: &'a mut Transaction) -> Self {
        Self {
            transaction,
            attempt: 0,
            node_index: 0,
            last_error: None,
            started: Instant::now(),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    pub fn transaction(&self) -> &Transaction {
        self.transaction
    }
}

pub struct ExecutionDispatcher {
    address_book: Arc<AddressBook>,
    transport: Arc<dyn NodeTransport>,
    settings: DispatchSettings,
}

impl ExecutionDispatcher {
    pub fn new(
        address_book: Arc<AddressBook>,
        transport: Arc<dyn NodeTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            address_book,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn address_book(&self) -> &Arc<AddressBook> {
        &self.address_book
    }

    /// Dispatches a frozen transaction.
    pub async fn execute(
        &self,
        transaction: &mut Transaction,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let mut pending = PendingTransaction::new(transaction);
        self.dispatch(&mut pending, cancel).await
    }

    /// Runs the retry loop until the transaction is accepted, definitively
    /// rejected, or a budget runs out.
    pub async fn dispatch(
        &self,
        pending: &mut PendingTransaction<'_>,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let deadline = pending.started + self.settings.request_timeout;
        let health = self.address_book.health().clone();

        loop {
            if cancel.is_cancelled() {
                return DispatchOutcome::Cancelled;
            }
            if pending.attempt >= self.settings.max_attempts {
                warn!(
                    attempts = %pending.attempt,
                    "execution exhausted its attempts"
                );
                return DispatchOutcome::TransportFailure {
                    attempts: pending.attempt,
                    last_error: pending.last_error.take(),
                };
            }
            let now = Instant::now();
            if now >= deadline {
                return DispatchOutcome::TimedOut {
                    elapsed: now.saturating_duration_since(pending.started),
                    last_error: pending.last_error.take(),
                };
            }

            let transaction_id = match pending.transaction.transaction_id() {
                Some(id) if pending.transaction.is_frozen() => id,
                _ => {
                    return DispatchOutcome::Invalid(TransactionError::Validation(
                        "transaction must be frozen before execution".into(),
                    ))
                }
            };

            let candidates = self.resolve_candidates(pending.transaction.node_account_ids());
            let Some(candidate) = select_node(&candidates, pending.node_index, now).cloned() else {
                pending.attempt += 1;
                pending.last_error = Some(
                    TransportError::Unresolvable(format!(
                        "none of the {} candidate nodes is in the address book",
                        pending.transaction.node_account_ids().len()
                    ))
                    .into(),
                );
                self.address_book.refresh_from_mirror(&transaction_id);
                let delay = self.settings.backoff.delay(pending.attempt - 1);
                if !self.pause(delay, deadline, cancel).await {
                    return DispatchOutcome::Cancelled;
                }
                continue;
            };
            let node = &candidate.entry;
            if !health.is_eligible(node.node_id, now) {
                debug!(
                    transaction_id = %transaction_id,
                    node_id = %node.node_id,
                    remaining_ms = %health.remaining_backoff(node.node_id, now).as_millis(),
                    "every candidate is cooling down, using the least recently failed node"
                );
            }

            let request = match pending
                .transaction
                .signed_copy(candidate.index)
                .and_then(|signed| signed.to_bytes())
            {
                Ok(request) => request,
                Err(err) => return DispatchOutcome::Invalid(err),
            };
            let hash = transaction_hash(&request);

            pending.attempt += 1;
            pending.node_index = candidate.index + 1;
            let call_deadline = self
                .settings
                .grpc_deadline
                .min(deadline.saturating_duration_since(now));

            debug!(
                transaction_id = %transaction_id,
                node_id = %node.node_id,
                node_account_id = %node.account_id,
                attempt = %pending.attempt,
                "submitting transaction"
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return DispatchOutcome::Cancelled,
                result = timeout(
                    call_deadline,
                    self.transport.submit_transaction(node, request, call_deadline),
                ) => result.unwrap_or(Err(TransportError::DeadlineExceeded)),
            };

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    health.record_failure(node.node_id);
                    warn!(
                        transaction_id = %transaction_id,
                        node_id = %node.node_id,
                        error = %err,
                        transient = %err.is_transient(),
                        "transport failure, rotating to next node"
                    );
                    pending.last_error = Some(err.into());
                    continue;
                }
            };

            match ExecutionState::from_precheck(&response.status) {
                ExecutionState::Success => {
                    health.record_success(node.node_id);
                    info!(
                        transaction_id = %transaction_id,
                        node_account_id = %node.account_id,
                        attempts = %pending.attempt,
                        "transaction accepted"
                    );
                    return DispatchOutcome::Accepted(AcceptedSubmission {
                        transaction_id,
                        node_id: node.node_id,
                        node_account_id: node.account_id,
                        transaction_hash: hash,
                        attempts: pending.attempt,
                    });
                }
                ExecutionState::NodeMisrouted => {
                    health.record_failure(node.node_id);
                    warn!(
                        transaction_id = %transaction_id,
                        node_id = %node.node_id,
                        node_account_id = %node.account_id,
                        status = %response.status,
                        "node rejected its account id, refreshing address book"
                    );
                    self.address_book.refresh_from_mirror(&transaction_id);
                    pending.last_error = Some(AttemptError::Status(response.status));
                }
                ExecutionState::ServerError => {
                    health.record_failure(node.node_id);
                    debug!(
                        node_id = %node.node_id,
                        status = %response.status,
                        "node not processing transactions"
                    );
                    pending.last_error = Some(AttemptError::Status(response.status));
                    let delay = self.settings.backoff.delay(pending.attempt - 1);
                    if !self.pause(delay, deadline, cancel).await {
                        return DispatchOutcome::Cancelled;
                    }
                }
                ExecutionState::Retry => {
                    pending.last_error = Some(AttemptError::Status(response.status));
                    let delay = self.settings.backoff.delay(pending.attempt - 1);
                    debug!(
                        transaction_id = %transaction_id,
                        delay_ms = %delay.as_millis(),
                        "network busy, backing off"
                    );
                    if !self.pause(delay, deadline, cancel).await {
                        return DispatchOutcome::Cancelled;
                    }
                }
                ExecutionState::Expired => {
                    if !pending
                        .transaction
                        .can_regenerate_id(self.settings.regenerate_transaction_id)
                    {
                        return DispatchOutcome::PrecheckRejected {
                            status: response.status,
                            transaction_id,
                        };
                    }
                    match pending.transaction.regenerate_id() {
                        Ok(new_id) => info!(
                            expired = %transaction_id,
                            transaction_id = %new_id,
                            "transaction id expired, regenerated"
                        ),
                        Err(err) => return DispatchOutcome::Invalid(err),
                    }
                    pending.last_error = Some(AttemptError::Status(response.status));
                    let delay = self.settings.backoff.delay(pending.attempt - 1);
                    if !self.pause(delay, deadline, cancel).await {
                        return DispatchOutcome::Cancelled;
                    }
                }
                ExecutionState::RequestError => {
                    debug!(
                        transaction_id = %transaction_id,
                        status = %response.status,
                        "transaction rejected at precheck"
                    );
                    return DispatchOutcome::PrecheckRejected {
                        status: response.status,
                        transaction_id,
                    };
                }
            }
        }
    }

    /// Resolves the transaction's node accounts against the current address
    /// book. Accounts that no longer resolve are left out.
    fn resolve_candidates(&self, node_account_ids: &[AccountId]) -> Vec<Candidate> {
        node_account_ids
            .iter()
            .enumerate()
            .filter_map(|(index, account_id)| {
                self.address_book
                    .resolve_account(account_id)
                    .map(|entry| Candidate { index, entry })
            })
            .collect()
    }

    /// Sleeps for `delay`, never past `deadline`.
    ///
    /// # Returns
    /// * `false` - The caller cancelled while sleeping
    async fn pause(&self, delay: Duration, deadline: Instant, cancel: &CancellationToken) -> bool {
        let until = (Instant::now() + delay).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep_until(until) => true,
        }
    }
}
