//! Consensus node descriptions as kept in the address book.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{AccountId, NodeId};
use crate::models::ConfigError;

/// Network endpoint of a consensus node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| ConfigError::InvalidEndpoint(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// Health of a node at the time it was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeHealth {
    Healthy,
    Unhealthy {
        /// Moment after which the node may be selected again.
        readmit_at: Instant,
    },
}

/// Point-in-time view of a node's health as tracked by the
/// [`NodeHealthTracker`](crate::services::network::NodeHealthTracker).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeHealthSnapshot {
    pub health: NodeHealth,
    /// Cooldown that the next failure will apply.
    pub next_backoff: Duration,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

impl NodeHealthSnapshot {
    pub fn healthy(initial_backoff: Duration) -> Self {
        Self {
            health: NodeHealth::Healthy,
            next_backoff: initial_backoff,
            consecutive_failures: 0,
            last_failure: None,
        }
    }

    pub fn is_healthy_at(&self, now: Instant) -> bool {
        match self.health {
            NodeHealth::Healthy => true,
            NodeHealth::Unhealthy { readmit_at } => now >= readmit_at,
        }
    }
}

/// A consensus node as known to the address book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEntry {
    pub node_id: NodeId,
    pub account_id: AccountId,
    pub endpoints: Vec<Endpoint>,
    pub description: String,
    /// Health joined in from the tracker when the entry was resolved.
    pub health: NodeHealthSnapshot,
}

impl NodeEntry {
    pub fn new(node_id: NodeId, account_id: AccountId, endpoints: Vec<Endpoint>) -> Self {
        Self {
            node_id,
            account_id,
            endpoints,
            description: String::new(),
            health: NodeHealthSnapshot::healthy(crate::constants::DEFAULT_MIN_NODE_BACKOFF),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
