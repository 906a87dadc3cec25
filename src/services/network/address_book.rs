//! # Address Book
//!
//! Maps node ids to node account ids and endpoints, shared by every execution of
//! a client.
//!
//! Updates are copy-on-write: a new map is built aside and swapped in under a
//! short write lock, so readers always see either the old or the new book and
//! never wait for a refresh in progress. Health lives in the
//! [`NodeHealthTracker`] keyed by node id and is joined in on resolve, which
//! keeps it across updates for nodes present in both books.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::NodeHealthTracker;
use crate::constants::NODES_PER_TRANSACTION_DIVISOR;
use crate::models::{AccountId, MirrorError, NodeEntry, NodeId, TransactionId};
use crate::services::mirror::MirrorNode;

/// Immutable snapshot of the address book.
#[derive(Debug, Default, Clone)]
pub struct NetworkMap {
    by_id: HashMap<NodeId, NodeEntry>,
    by_account: HashMap<AccountId, NodeId>,
}

impl NetworkMap {
    pub fn new(entries: impl IntoIterator<Item = NodeEntry>) -> Self {
        let mut map = Self::default();
        for entry in entries {
            if let Some(previous) = map.by_id.get(&entry.node_id) {
                // another node may have claimed the account since
                if map.by_account.get(&previous.account_id) == Some(&entry.node_id) {
                    map.by_account.remove(&previous.account_id);
                }
            }
            map.by_account.insert(entry.account_id, entry.node_id);
            map.by_id.insert(entry.node_id, entry);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.by_id.keys().copied().collect()
    }
}

/// Resets the single-flight flag when a refresh task ends, panics included.
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AddressBook {
    map: RwLock<Arc<NetworkMap>>,
    health: Arc<NodeHealthTracker>,
    mirror: Option<Arc<dyn MirrorNode>>,
    refresh_in_flight: Arc<AtomicBool>,
}

impl std::fmt::Debug for AddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBook")
            .field("nodes", &self.map.read().len())
            .field("mirror_configured", &self.mirror.is_some())
            .finish()
    }
}

impl AddressBook {
    /// Creates an address book.
    ///
    /// # Arguments
    /// * `entries` - Initial nodes
    /// * `health` - Tracker shared with the execution engine
    /// * `mirror` - Mirror node used to refresh the book, if any
    pub fn new(
        entries: Vec<NodeEntry>,
        health: Arc<NodeHealthTracker>,
        mirror: Option<Arc<dyn MirrorNode>>,
    ) -> Self {
        Self {
            map: RwLock::new(Arc::new(NetworkMap::new(entries))),
            health,
            mirror,
            refresh_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn health(&self) -> &Arc<NodeHealthTracker> {
        &self.health
    }

    pub fn mirror(&self) -> Option<&Arc<dyn MirrorNode>> {
        self.mirror.as_ref()
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn current(&self) -> Arc<NetworkMap> {
        self.map.read().clone()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    fn with_health(&self, mut entry: NodeEntry) -> NodeEntry {
        entry.health = self.health.snapshot(entry.node_id);
        entry
    }

    /// Looks up a node by id, with its current health.
    pub fn resolve(&self, node_id: NodeId) -> Option<NodeEntry> {
        let map = self.current();
        map.by_id
            .get(&node_id)
            .cloned()
            .map(|entry| self.with_health(entry))
    }

    /// Looks up the node currently reachable under `account_id`.
    pub fn resolve_account(&self, account_id: &AccountId) -> Option<NodeEntry> {
        let map = self.current();
        map.by_account
            .get(account_id)
            .and_then(|node_id| map.by_id.get(node_id))
            .cloned()
            .map(|entry| self.with_health(entry))
    }

    /// All nodes with their current health, ordered by node id.
    pub fn entries(&self) -> Vec<NodeEntry> {
        let map = self.current();
        let mut entries: Vec<_> = map
            .by_id
            .values()
            .cloned()
            .map(|entry| self.with_health(entry))
            .collect();
        entries.sort_by_key(|entry| entry.node_id);
        entries
    }

    /// Applies a complete address book.
    ///
    /// Entries overwrite existing nodes by node id. Health is kept for nodes
    /// present before and after, and dropped for nodes that disappeared.
    pub fn update(&self, entries: Vec<NodeEntry>) {
        let next = Arc::new(NetworkMap::new(entries));
        let keep = next.node_ids();
        let previous = {
            let mut guard = self.map.write();
            std::mem::replace(&mut *guard, next)
        };
        self.health.prune(&keep);

        let moved: Vec<_> = previous
            .by_id
            .values()
            .filter_map(|old| {
                let current = self.resolve(old.node_id)?;
                (current.account_id != old.account_id)
                    .then(|| (old.node_id, old.account_id, current.account_id))
            })
            .collect();
        for (node_id, from, to) in &moved {
            info!(node_id = %node_id, from = %from, to = %to, "node account id changed");
        }
        debug!(
            previous_nodes = %previous.len(),
            nodes = %keep.len(),
            "address book updated"
        );
    }

    /// Replaces the address book and forgets all health state.
    pub fn replace(&self, entries: Vec<NodeEntry>) {
        let next = Arc::new(NetworkMap::new(entries));
        *self.map.write() = next;
        self.health.clear();
    }

    /// Fetches the current address book from the mirror and applies it.
    ///
    /// The book is only swapped when the mirror returned at least one node.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of nodes in the new book
    /// * `Err(MirrorError)` - The book is unchanged
    pub async fn refresh_now(&self) -> Result<usize, MirrorError> {
        let mirror = self.mirror.as_ref().ok_or(MirrorError::NotConfigured)?;
        let entries = mirror.query_current_address_book().await?;
        if entries.is_empty() {
            return Err(MirrorError::EmptyAddressBook);
        }
        let count = entries.len();
        self.update(entries);
        Ok(count)
    }

    /// Starts a background refresh from the mirror without waiting for it.
    ///
    /// At most one refresh runs at a time; triggers arriving meanwhile are
    /// ignored. Failures are logged and swallowed.
    ///
    /// # Returns
    /// * `Some(JoinHandle)` - A refresh task was started
    /// * `None` - No mirror, no runtime, or a refresh is already running
    pub fn refresh_from_mirror(self: &Arc<Self>, trigger: &TransactionId) -> Option<JoinHandle<()>> {
        if self.mirror.is_none() {
            debug!(transaction_id = %trigger, "no mirror configured, skipping address book refresh");
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(transaction_id = %trigger, "no async runtime, skipping address book refresh");
            return None;
        };
        if self
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(transaction_id = %trigger, "address book refresh already in flight");
            return None;
        }

        let guard = RefreshGuard(self.refresh_in_flight.clone());
        let book = Arc::clone(self);
        let trigger = *trigger;
        Some(runtime.spawn(async move {
            let _guard = guard;
            match book.refresh_now().await {
                Ok(count) => info!(
                    transaction_id = %trigger,
                    nodes = %count,
                    "address book refreshed from mirror"
                ),
                Err(e) => warn!(
                    transaction_id = %trigger,
                    error = %e,
                    transient = %e.is_transient(),
                    "address book refresh failed, keeping current book"
                ),
            }
        }))
    }

    pub fn is_refresh_in_flight(&self) -> bool {
        self.refresh_in_flight.load(Ordering::Acquire)
    }

    /// Picks candidate nodes for a transaction that did not pin any.
    ///
    /// Healthy nodes come first, each group shuffled. The list is capped at
    /// `max` or, by default, at a third of the network (at least one node).
    pub fn node_account_ids_for_execute(&self, max: Option<usize>) -> Vec<AccountId> {
        let now = Instant::now();
        let mut rng = rand::rng();
        let (mut healthy, mut unhealthy): (Vec<_>, Vec<_>) = self
            .entries()
            .into_iter()
            .partition(|entry| entry.health.is_healthy_at(now));
        healthy.shuffle(&mut rng);
        unhealthy.shuffle(&mut rng);

        let total = healthy.len() + unhealthy.len();
        let limit = max
            .unwrap_or_else(|| total.div_ceil(NODES_PER_TRANSACTION_DIVISOR))
            .max(1);
        healthy
            .into_iter()
            .chain(unhealthy)
            .take(limit)
            .map(|entry| entry.account_id)
            .collect()
    }
}
