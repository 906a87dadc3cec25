use thiserror::Error;

use super::{ExecutionError, TransactionError};

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Payload requires {required} chunks but at most {max} are allowed")]
    TooManyChunks { required: usize, max: usize },
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("Chunk {index} failed after {committed} chunks were committed: {source}")]
    ChunkFailed {
        /// Zero-based index of the failed chunk.
        index: usize,
        /// Number of chunks that reached their sequencing point before the failure.
        committed: usize,
        #[source]
        source: Box<ExecutionError>,
    },
    #[error("Chunked submission cancelled after {committed} chunks were committed")]
    Cancelled { committed: usize },
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl ChunkError {
    /// Number of chunks accepted before the submission stopped.
    pub fn committed(&self) -> usize {
        match self {
            ChunkError::ChunkFailed { committed, .. } | ChunkError::Cancelled { committed } => {
                *committed
            }
            _ => 0,
        }
    }
}
