//! # Services Module
//!
//! The execution engine and the external services it talks to.

pub mod chunking;
pub mod execution;
pub mod mirror;
pub mod network;
pub mod receipt;
pub mod signing;
pub mod transaction;
pub mod transport;
