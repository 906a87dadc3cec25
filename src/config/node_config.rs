//! Configuration for consensus nodes.
//!
//! This module provides the configuration structure used to seed the address
//! book, either programmatically or from a deserialized config file.

use serde::{Deserialize, Serialize};

use crate::models::{AccountId, ConfigError, Endpoint, NodeEntry, NodeId};

/// Configuration for a consensus node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Address book id of the node.
    pub node_id: NodeId,
    /// Account the node is paid through, in `shard.realm.num` form.
    pub account_id: String,
    /// Endpoints in `host:port` form.
    pub endpoints: Vec<String>,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl NodeConfig {
    /// Creates a new node configuration with a single endpoint.
    pub fn new(node_id: NodeId, account_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            node_id,
            account_id: account_id.into(),
            endpoints: vec![endpoint.into()],
            description: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        NodeEntry::try_from(self).map(|_| ())
    }
}

impl TryFrom<&NodeConfig> for NodeEntry {
    type Error = ConfigError;

    fn try_from(config: &NodeConfig) -> Result<Self, Self::Error> {
        let account_id: AccountId = config.account_id.parse()?;
        if config.endpoints.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoints",
                reason: format!("node {} has no endpoints", config.node_id),
            });
        }
        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| endpoint.parse::<Endpoint>())
            .collect::<Result<Vec<_>, _>>()?;

        let entry = NodeEntry::new(config.node_id, account_id, endpoints);
        Ok(match &config.description {
            Some(description) => entry.with_description(description.clone()),
            None => entry,
        })
    }
}
