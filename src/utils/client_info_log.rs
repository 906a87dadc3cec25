//! Logs client information when a client is built.
use std::env;
use tracing::info;

use crate::config::ClientConfig;

/// Logs crate, platform and network information for a new client.
pub fn log_client_info(config: &ClientConfig) {
    let crate_name = env!("CARGO_PKG_NAME");
    let crate_version = env!("CARGO_PKG_VERSION");

    info!(crate_name = %crate_name, crate_version = %crate_version, "ledger client starting");
    info!(platform = %env::consts::OS, architecture = %env::consts::ARCH, "platform");
    info!(
        nodes = %config.network.len(),
        mirror = %config.mirror_url.as_deref().unwrap_or("none"),
        "network"
    );
    if let Ok(rust_log) = env::var("RUST_LOG") {
        info!(log_level = %rust_log, "log level");
    }
}
