//! Execution engine of a distributed-ledger client.
//!
//! Submits signed transactions to the consensus nodes of a network, retrying
//! with backoff and rotating between nodes, keeps the address book current
//! from a mirror node, polls for consensus receipts and submits large payloads
//! in ordered chunks.

pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use client::{Client, ClientBuilder, Operator, TransactionResponse};
pub use config::{ClientConfig, NodeConfig};
pub use models::*;
pub use services::chunking::{ChunkSequencing, ChunkedOutcome, ChunkedSubmission};
pub use services::signing::{Ed25519PrivateKey, PublicKey, TransactionSigner};
pub use services::transaction::{OpaqueBody, Transaction, TransactionBody};
