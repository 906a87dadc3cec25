//! Mirror node REST client.
//!
//! Uses the `/api/v1/network/nodes` endpoint (paged through `links.next`) for the
//! address book and `/api/v1/transactions/{id}` for receipts.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{MirrorNode, MirrorReceipt};
use crate::constants::{
    DEFAULT_MIRROR_REQUEST_TIMEOUT, MIRROR_MAX_PAGES, MIRROR_NODES_PAGE_LIMIT,
    MIRROR_NODES_PATH, MIRROR_TRANSACTIONS_PATH,
};
use crate::models::{
    AccountId, Endpoint, MirrorError, NodeEntry, Status, TransactionId, TransactionReceipt,
};

#[derive(Debug, Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: Vec<MirrorNodeRecord>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MirrorNodeRecord {
    node_id: u64,
    node_account_id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    service_endpoints: Vec<ServiceEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ServiceEndpoint {
    #[serde(default)]
    domain_name: Option<String>,
    #[serde(default)]
    ip_address_v4: Option<String>,
    port: u16,
}

impl ServiceEndpoint {
    fn to_endpoint(&self) -> Option<Endpoint> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        non_empty(&self.domain_name)
            .or_else(|| non_empty(&self.ip_address_v4))
            .map(|host| Endpoint::new(host, self.port))
    }
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<MirrorTransaction>,
}

#[derive(Debug, Deserialize)]
struct MirrorTransaction {
    result: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    nonce: u32,
    #[serde(default)]
    scheduled: bool,
}

/// Mirror node client over its REST API.
#[derive(Debug, Clone)]
pub struct MirrorRestClient {
    base_url: String,
    client: Client,
}

impl MirrorRestClient {
    /// Create a new MirrorRestClient instance
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the mirror node (e.g., "https://mirror.example.com")
    pub fn new(base_url: impl Into<String>) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .timeout(DEFAULT_MIRROR_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn to_node_entry(record: MirrorNodeRecord) -> Result<Option<NodeEntry>, MirrorError> {
        let account_id: AccountId = record.node_account_id.parse().map_err(|e| {
            MirrorError::InvalidResponse(format!("node {}: {e}", record.node_id))
        })?;
        let endpoints: Vec<Endpoint> = record
            .service_endpoints
            .iter()
            .filter_map(ServiceEndpoint::to_endpoint)
            .collect();
        if endpoints.is_empty() {
            warn!(node_id = %record.node_id, "mirror node entry has no usable endpoint, skipping");
            return Ok(None);
        }

        let entry = NodeEntry::new(record.node_id, account_id, endpoints);
        Ok(Some(match record.description {
            Some(description) => entry.with_description(description),
            None => entry,
        }))
    }

    fn to_receipt(transaction_id: &TransactionId, record: &MirrorTransaction) -> TransactionReceipt {
        let status: Status = record
            .result
            .parse()
            .unwrap_or_else(|_| Status::Unrecognized(record.result.clone()));
        let mut receipt = TransactionReceipt::new(*transaction_id, status);
        let entity = record
            .entity_id
            .as_deref()
            .and_then(|id| id.parse::<AccountId>().ok());
        match record.name.as_deref() {
            Some("CRYPTOCREATEACCOUNT") => receipt.account_id = entity,
            Some("FILECREATE") => receipt.file_id = entity,
            Some("CONSENSUSCREATETOPIC") => receipt.topic_id = entity,
            _ => {}
        }
        receipt
    }
}

#[async_trait]
impl MirrorNode for MirrorRestClient {
    async fn query_current_address_book(&self) -> Result<Vec<NodeEntry>, MirrorError> {
        let mut url = format!(
            "{}{}?limit={}",
            self.base_url, MIRROR_NODES_PATH, MIRROR_NODES_PAGE_LIMIT
        );
        let mut entries = Vec::new();

        for _ in 0..MIRROR_MAX_PAGES {
            let page: NodesResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for record in page.nodes {
                if let Some(entry) = Self::to_node_entry(record)? {
                    entries.push(entry);
                }
            }

            match page.links.next {
                Some(next) if !next.is_empty() => url = format!("{}{}", self.base_url, next),
                _ => break,
            }
        }

        debug!(nodes = %entries.len(), "fetched address book from mirror node");
        Ok(entries)
    }

    async fn query_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<MirrorReceipt, MirrorError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            MIRROR_TRANSACTIONS_PATH,
            transaction_id.to_mirror_string()
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(MirrorReceipt::Pending);
        }

        let body: TransactionsResponse = response.error_for_status()?.json().await?;
        let nonce = transaction_id.nonce.unwrap_or(0);
        Ok(body
            .transactions
            .iter()
            .find(|record| record.nonce == nonce && record.scheduled == transaction_id.scheduled)
            .map(|record| MirrorReceipt::Final(Self::to_receipt(transaction_id, record)))
            .unwrap_or(MirrorReceipt::Pending))
    }
}
