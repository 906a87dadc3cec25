//! Common utilities and helpers for integration tests

pub mod logging;
pub mod network;
