//! Handle returned by a successful submission.

use std::time::Duration;

use crate::models::{
    AccountId, ExecutionError, NodeId, Status, TransactionId, TransactionReceipt,
    TransactionRecord,
};
use crate::services::execution::AcceptedSubmission;

use super::Client;

/// A transaction some node accepted. Consensus is not known yet; use
/// [`TransactionResponse::get_receipt`] to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    pub node_id: NodeId,
    pub node_account_id: AccountId,
    pub transaction_id: TransactionId,
    pub transaction_hash: Vec<u8>,
    /// Turn a non-`SUCCESS` receipt into [`ExecutionError::ReceiptStatus`].
    pub validate_status: bool,
    /// Nodes asked for the receipt, the accepting node first.
    targets: Vec<AccountId>,
}

impl TransactionResponse {
    pub(crate) fn new(submission: AcceptedSubmission, node_account_ids: &[AccountId]) -> Self {
        let targets = std::iter::once(submission.node_account_id)
            .chain(
                node_account_ids
                    .iter()
                    .copied()
                    .filter(|id| *id != submission.node_account_id),
            )
            .collect();
        Self {
            node_id: submission.node_id,
            node_account_id: submission.node_account_id,
            transaction_id: submission.transaction_id,
            transaction_hash: submission.transaction_hash,
            validate_status: true,
            targets,
        }
    }

    pub fn validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }

    /// Waits for the receipt of the transaction.
    ///
    /// # Returns
    /// * `Ok(TransactionReceipt)` - The final receipt
    /// * `Err(ExecutionError::ReceiptStatus)` - The transaction failed at
    ///   consensus and `validate_status` is set
    /// * `Err(ExecutionError::ReceiptUnavailable)` - Still pending at `timeout`
    pub async fn get_receipt(
        &self,
        client: &Client,
        timeout: Duration,
    ) -> Result<TransactionReceipt, ExecutionError> {
        let receipt = client
            .receipt_poller()
            .poll_until_terminal(&self.transaction_id, &self.targets, timeout)
            .await?;
        self.check(receipt.status.clone())?;
        Ok(receipt)
    }

    /// Waits for the receipt, then fetches the record.
    pub async fn get_record(
        &self,
        client: &Client,
        timeout: Duration,
    ) -> Result<TransactionRecord, ExecutionError> {
        let record = client
            .receipt_poller()
            .poll_record(&self.transaction_id, &self.targets, timeout)
            .await?;
        self.check(record.receipt.status.clone())?;
        Ok(record)
    }

    pub fn get_receipt_blocking(
        &self,
        client: &Client,
        timeout: Duration,
    ) -> Result<TransactionReceipt, ExecutionError> {
        client.block_on(self.get_receipt(client, timeout))?
    }

    pub fn get_record_blocking(
        &self,
        client: &Client,
        timeout: Duration,
    ) -> Result<TransactionRecord, ExecutionError> {
        client.block_on(self.get_record(client, timeout))?
    }

    fn check(&self, status: Status) -> Result<(), ExecutionError> {
        if self.validate_status && status != Status::Success {
            return Err(ExecutionError::ReceiptStatus {
                status,
                transaction_id: self.transaction_id,
            });
        }
        Ok(())
    }
}
