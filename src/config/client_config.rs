//! Client Configuration
//!
//! Tunables for the execution engine. Every value has a default taken from
//! [`crate::constants`] and can be overridden from the environment:
//!
//! ```bash
//! export LEDGER_MAX_ATTEMPTS=5
//! export LEDGER_MIN_BACKOFF_MS=100
//! export LEDGER_MIRROR_URL=https://mirror.example.com
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::NodeConfig;
use crate::constants::{
    DEFAULT_GRPC_DEADLINE, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_NODE_BACKOFF, DEFAULT_MIN_BACKOFF,
    DEFAULT_MIN_NODE_BACKOFF, DEFAULT_NETWORK_UPDATE_PERIOD, DEFAULT_RECEIPT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::models::ConfigError;

/// Execution engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum submission attempts across all nodes for one execution.
    pub max_attempts: u32,
    /// Initial request-level retry delay.
    pub min_backoff: Duration,
    /// Cap for the request-level retry delay.
    pub max_backoff: Duration,
    /// Initial node cooldown after its first failure.
    pub min_node_backoff: Duration,
    /// Cap for the node cooldown.
    pub max_node_backoff: Duration,
    /// Deadline of a single node call.
    pub grpc_deadline: Duration,
    /// Wall-clock budget of a full execution.
    pub request_timeout: Duration,
    /// Default wait for receipts and records.
    pub receipt_timeout: Duration,
    /// Number of candidate nodes picked for an unpinned transaction.
    /// `None` derives it from the network size.
    pub max_nodes_per_transaction: Option<usize>,
    pub max_concurrent_requests: usize,
    /// Whether an expired transaction id may be replaced by a fresh one.
    pub regenerate_transaction_id: bool,
    /// Base URL of the mirror node REST API.
    pub mirror_url: Option<String>,
    /// Period of the scheduled address book refresh. `None` disables it.
    pub network_update_period: Option<Duration>,
    /// Consensus nodes to start with.
    pub network: Vec<NodeConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            min_node_backoff: DEFAULT_MIN_NODE_BACKOFF,
            max_node_backoff: DEFAULT_MAX_NODE_BACKOFF,
            grpc_deadline: DEFAULT_GRPC_DEADLINE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            max_nodes_per_transaction: None,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            regenerate_transaction_id: true,
            mirror_url: None,
            network_update_period: Some(DEFAULT_NETWORK_UPDATE_PERIOD),
            network: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// The network itself is not read from the environment; use
    /// [`ClientConfig::with_network`] or a deserialized config file.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_nodes_per_transaction = std::env::var("LEDGER_MAX_NODES_PER_TRANSACTION")
            .ok()
            .and_then(|s| s.parse().ok());
        let mirror_url = std::env::var("LEDGER_MIRROR_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        // 0 disables the scheduled refresh
        let network_update_period = match env_parse(
            "LEDGER_NETWORK_UPDATE_PERIOD_SECS",
            DEFAULT_NETWORK_UPDATE_PERIOD.as_secs(),
        ) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            max_attempts: env_parse("LEDGER_MAX_ATTEMPTS", defaults.max_attempts),
            min_backoff: env_duration_ms("LEDGER_MIN_BACKOFF_MS", defaults.min_backoff),
            max_backoff: env_duration_ms("LEDGER_MAX_BACKOFF_MS", defaults.max_backoff),
            min_node_backoff: env_duration_ms(
                "LEDGER_MIN_NODE_BACKOFF_MS",
                defaults.min_node_backoff,
            ),
            max_node_backoff: env_duration_ms(
                "LEDGER_MAX_NODE_BACKOFF_MS",
                defaults.max_node_backoff,
            ),
            grpc_deadline: env_duration_ms("LEDGER_GRPC_DEADLINE_MS", defaults.grpc_deadline),
            request_timeout: env_duration_ms(
                "LEDGER_REQUEST_TIMEOUT_MS",
                defaults.request_timeout,
            ),
            receipt_timeout: env_duration_ms(
                "LEDGER_RECEIPT_TIMEOUT_MS",
                defaults.receipt_timeout,
            ),
            max_nodes_per_transaction,
            max_concurrent_requests: env_parse(
                "LEDGER_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            regenerate_transaction_id: env_parse(
                "LEDGER_REGENERATE_TRANSACTION_ID",
                defaults.regenerate_transaction_id,
            ),
            mirror_url,
            network_update_period,
            network: Vec::new(),
        }
    }

    pub fn with_network(mut self, network: Vec<NodeConfig>) -> Self {
        self.network = network;
        self
    }

    pub fn with_mirror_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_url = Some(url.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, min_backoff: Duration, max_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_node_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_node_backoff = min;
        self.max_node_backoff = max;
        self
    }

    pub fn with_grpc_deadline(mut self, deadline: Duration) -> Self {
        self.grpc_deadline = deadline;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_network_update_period(mut self, period: Option<Duration>) -> Self {
        self.network_update_period = period;
        self
    }

    /// Checks the configuration for values the engine cannot work with.
    ///
    /// # Returns
    /// * `Ok(())` - The configuration is usable
    /// * `Err(ConfigError)` - The first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_backoff > self.max_backoff {
            return Err(ConfigError::InvalidValue {
                field: "min_backoff",
                reason: format!(
                    "{:?} exceeds max_backoff {:?}",
                    self.min_backoff, self.max_backoff
                ),
            });
        }
        if self.min_node_backoff > self.max_node_backoff {
            return Err(ConfigError::InvalidValue {
                field: "min_node_backoff",
                reason: format!(
                    "{:?} exceeds max_node_backoff {:?}",
                    self.min_node_backoff, self.max_node_backoff
                ),
            });
        }
        if self.grpc_deadline.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "grpc_deadline",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_requests",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_nodes_per_transaction == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_nodes_per_transaction",
                reason: "must be at least 1".to_string(),
            });
        }
        for node in &self.network {
            node.validate()?;
        }
        Ok(())
    }

    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Log the effective configuration for debugging
    pub fn log_config(&self) {
        tracing::info!(
            max_attempts = self.max_attempts,
            min_backoff_ms = self.min_backoff.as_millis() as u64,
            max_backoff_ms = self.max_backoff.as_millis() as u64,
            grpc_deadline_ms = self.grpc_deadline.as_millis() as u64,
            request_timeout_ms = self.request_timeout.as_millis() as u64,
            nodes = self.network.len(),
            mirror_configured = self.mirror_url.is_some(),
            "Client configuration loaded"
        );
    }
}

/// Parse an environment variable or return default
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse an environment variable holding milliseconds or return default
fn env_duration_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
