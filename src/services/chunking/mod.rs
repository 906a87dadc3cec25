//! Chunked Submission
//!
//! Splits a payload too large for one transaction into an ordered series of
//! chunk transactions and submits them one at a time. Every chunk carries a
//! [`ChunkInfo`] linking it to the first chunk, and the next chunk is only sent
//! once the previous one reached the configured sequencing point.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS};
use crate::models::{
    AccountId, ChunkError, ChunkInfo, ExecutionError, Status, TransactionError, TransactionId,
    TransactionReceipt,
};
use crate::services::execution::{AcceptedSubmission, ExecutionDispatcher};
use crate::services::receipt::ReceiptPoller;
use crate::services::signing::{PublicKey, SignerFn, TransactionSigner};
use crate::services::transaction::{BodyContext, ChunkedBody, Transaction, TransactionBody};

/// When the next chunk may be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSequencing {
    /// After a node accepted the previous chunk.
    AwaitAccepted,
    /// After the previous chunk reached consensus successfully.
    AwaitReceipt,
}

/// A payload split into chunks, with the transaction id of each chunk.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    initial_transaction_id: TransactionId,
    chunks: Vec<Bytes>,
}

impl ChunkPlan {
    /// Splits `payload` into chunks of at most `chunk_size` bytes.
    ///
    /// An empty payload still yields one (empty) chunk.
    ///
    /// # Errors
    /// * `ChunkError::InvalidChunkSize` - `chunk_size` is zero
    /// * `ChunkError::TooManyChunks` - More than `max_chunks` chunks are needed
    pub fn new(
        payload: Bytes,
        chunk_size: usize,
        max_chunks: usize,
        initial_transaction_id: TransactionId,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidChunkSize);
        }
        let required = payload.len().div_ceil(chunk_size).max(1);
        if required > max_chunks || u32::try_from(required).is_err() {
            return Err(ChunkError::TooManyChunks {
                required,
                max: max_chunks,
            });
        }

        let chunks = if payload.is_empty() {
            vec![Bytes::new()]
        } else {
            (0..required)
                .map(|index| {
                    let start = index * chunk_size;
                    let end = (start + chunk_size).min(payload.len());
                    payload.slice(start..end)
                })
                .collect()
        };
        Ok(Self {
            initial_transaction_id,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn initial_transaction_id(&self) -> TransactionId {
        self.initial_transaction_id
    }

    /// Transaction id of the zero-based chunk `index`.
    pub fn transaction_id(&self, index: usize) -> TransactionId {
        if index == 0 {
            self.initial_transaction_id
        } else {
            self.initial_transaction_id.child(index as u32)
        }
    }

    pub fn chunk_info(&self, index: usize) -> ChunkInfo {
        ChunkInfo {
            initial_transaction_id: self.initial_transaction_id,
            number: index as u32 + 1,
            total: self.chunks.len() as u32,
        }
    }

    pub fn data(&self, index: usize) -> Option<&Bytes> {
        self.chunks.get(index)
    }
}

/// One chunk as a transaction body.
struct ChunkBody {
    inner: Arc<dyn ChunkedBody>,
    info: ChunkInfo,
    data: Bytes,
}

impl TransactionBody for ChunkBody {
    fn encode(&self, context: &BodyContext<'_>) -> Result<Vec<u8>, TransactionError> {
        self.inner.encode_chunk(context, &self.info, &self.data)
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}

/// A payload to submit in chunks.
#[derive(Clone)]
pub struct ChunkedSubmission {
    body: Arc<dyn ChunkedBody>,
    payload: Bytes,
    chunk_size: usize,
    max_chunks: usize,
    sequencing: ChunkSequencing,
    transaction_id: Option<TransactionId>,
    node_account_ids: Vec<AccountId>,
    signers: Vec<(PublicKey, SignerFn)>,
}

impl std::fmt::Debug for ChunkedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedSubmission")
            .field("kind", &self.body.kind())
            .field("payload_len", &self.payload.len())
            .field("chunk_size", &self.chunk_size)
            .field("max_chunks", &self.max_chunks)
            .field("sequencing", &self.sequencing)
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}

impl ChunkedSubmission {
    pub fn new(
        body: impl ChunkedBody + 'static,
        payload: impl Into<Bytes>,
        sequencing: ChunkSequencing,
    ) -> Self {
        Self {
            body: Arc::new(body),
            payload: payload.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            sequencing,
            transaction_id: None,
            node_account_ids: Vec::new(),
            signers: Vec::new(),
        }
    }

    /// Message-style payload: chunks only need to be accepted in order.
    pub fn message(body: impl ChunkedBody + 'static, payload: impl Into<Bytes>) -> Self {
        Self::new(body, payload, ChunkSequencing::AwaitAccepted)
    }

    /// Append-style payload: each chunk must reach consensus before the next.
    pub fn append(body: impl ChunkedBody + 'static, payload: impl Into<Bytes>) -> Self {
        Self::new(body, payload, ChunkSequencing::AwaitReceipt)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_sequencing(mut self, sequencing: ChunkSequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    /// Id of the first chunk; the others derive from it.
    pub fn with_transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn with_node_account_ids(mut self, node_account_ids: Vec<AccountId>) -> Self {
        self.node_account_ids = node_account_ids;
        self
    }

    /// Signs every chunk with `signer`.
    pub fn sign<S>(mut self, signer: S) -> Self
    where
        S: TransactionSigner + 'static,
    {
        let public_key = signer.public_key();
        let signer = Arc::new(signer);
        let signer_fn: SignerFn = Arc::new(move |body: &[u8]| signer.sign(body));
        self.signers.push((public_key, signer_fn));
        self
    }

    pub fn sign_with(mut self, public_key: PublicKey, signer: SignerFn) -> Self {
        self.signers.push((public_key, signer));
        self
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    pub fn sequencing(&self) -> ChunkSequencing {
        self.sequencing
    }

    pub fn plan(&self) -> Result<ChunkPlan, ChunkError> {
        let transaction_id = self.transaction_id.ok_or_else(|| {
            TransactionError::Validation("chunked submission needs a transaction id".into())
        })?;
        ChunkPlan::new(
            self.payload.clone(),
            self.chunk_size,
            self.max_chunks,
            transaction_id,
        )
    }

    /// Builds, freezes and signs the transaction of chunk `index`.
    ///
    /// Chunk ids derive from the first one and are never regenerated.
    pub fn chunk_transaction(
        &self,
        plan: &ChunkPlan,
        index: usize,
    ) -> Result<Transaction, ChunkError> {
        let data = plan
            .data(index)
            .cloned()
            .ok_or_else(|| TransactionError::Validation(format!("no chunk {index}")))?;
        let body = ChunkBody {
            inner: self.body.clone(),
            info: plan.chunk_info(index),
            data,
        };
        let mut transaction = Transaction::from_body(Arc::new(body))
            .with_transaction_id(plan.transaction_id(index))
            .with_node_account_ids(self.node_account_ids.clone());
        transaction.freeze()?;
        for (public_key, signer) in &self.signers {
            transaction.sign_with(public_key.clone(), signer.clone());
        }
        Ok(transaction)
    }

    pub(crate) fn set_transaction_id(&mut self, transaction_id: TransactionId) {
        self.transaction_id = Some(transaction_id);
    }

    pub(crate) fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>) {
        self.node_account_ids = node_account_ids;
    }
}

/// Result of one committed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub submission: AcceptedSubmission,
    /// Present under [`ChunkSequencing::AwaitReceipt`].
    pub receipt: Option<TransactionReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedOutcome {
    pub initial_transaction_id: TransactionId,
    pub chunks: Vec<ChunkOutcome>,
}

pub struct ChunkedSubmissionCoordinator {
    dispatcher: Arc<ExecutionDispatcher>,
    poller: Arc<ReceiptPoller>,
    receipt_timeout: Duration,
}

impl ChunkedSubmissionCoordinator {
    pub fn new(
        dispatcher: Arc<ExecutionDispatcher>,
        poller: Arc<ReceiptPoller>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            poller,
            receipt_timeout,
        }
    }

    /// Submits every chunk in order.
    ///
    /// The submission must carry a transaction id and node account ids.
    ///
    /// # Returns
    /// * `Ok(ChunkedOutcome)` - Every chunk was committed
    /// * `Err(ChunkError::ChunkFailed)` - A chunk failed; the chunks after it
    ///   were not submitted
    /// * `Err(ChunkError::Cancelled)` - Cancelled between or during chunks
    pub async fn submit(
        &self,
        submission: &ChunkedSubmission,
        cancel: &CancellationToken,
    ) -> Result<ChunkedOutcome, ChunkError> {
        let plan = submission.plan()?;
        if submission.node_account_ids().is_empty() {
            return Err(TransactionError::NoNodes.into());
        }
        debug!(
            transaction_id = %plan.initial_transaction_id(),
            chunks = %plan.len(),
            sequencing = ?submission.sequencing(),
            "submitting chunked payload"
        );

        let mut chunks = Vec::with_capacity(plan.len());
        for index in 0..plan.len() {
            let committed = chunks.len();
            if cancel.is_cancelled() {
                return Err(ChunkError::Cancelled { committed });
            }
            let fail = |err: ExecutionError| {
                if matches!(err, ExecutionError::Cancelled) {
                    return ChunkError::Cancelled { committed };
                }
                warn!(
                    transaction_id = %plan.transaction_id(index),
                    chunk = %index,
                    committed = %committed,
                    error = %err,
                    "chunk failed, aborting remaining chunks"
                );
                ChunkError::ChunkFailed {
                    index,
                    committed,
                    source: Box::new(err),
                }
            };

            let mut transaction = submission.chunk_transaction(&plan, index)?;
            let accepted = self
                .dispatcher
                .execute(&mut transaction, cancel)
                .await
                .into_result()
                .map_err(fail)?;

            let receipt = match submission.sequencing() {
                ChunkSequencing::AwaitAccepted => None,
                ChunkSequencing::AwaitReceipt => {
                    let targets: Vec<AccountId> = std::iter::once(accepted.node_account_id)
                        .chain(
                            transaction
                                .node_account_ids()
                                .iter()
                                .copied()
                                .filter(|id| *id != accepted.node_account_id),
                        )
                        .collect();
                    let receipt = self
                        .poller
                        .poll_until_terminal_with_cancel(
                            &accepted.transaction_id,
                            &targets,
                            self.receipt_timeout,
                            cancel,
                        )
                        .await
                        .map_err(fail)?;
                    if receipt.status != Status::Success {
                        return Err(fail(ExecutionError::ReceiptStatus {
                            status: receipt.status,
                            transaction_id: accepted.transaction_id,
                        }));
                    }
                    Some(receipt)
                }
            };

            debug!(
                transaction_id = %accepted.transaction_id,
                chunk = %(index + 1),
                total = %plan.len(),
                "chunk committed"
            );
            chunks.push(ChunkOutcome {
                index,
                submission: accepted,
                receipt,
            });
        }

        info!(
            transaction_id = %plan.initial_transaction_id(),
            chunks = %chunks.len(),
            "chunked payload submitted"
        );
        Ok(ChunkedOutcome {
            initial_transaction_id: plan.initial_transaction_id(),
            chunks,
        })
    }
}
