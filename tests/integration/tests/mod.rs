//! Integration test modules

mod chunking;
mod execution;
mod mirror;
mod signing;
