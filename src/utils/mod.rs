mod client_info_log;
pub use client_info_log::*;

#[cfg(test)]
pub mod mocks;
