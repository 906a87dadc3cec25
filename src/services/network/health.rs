//! Node Health Tracker
//!
//! Tracks per-node health shared by every execution of a client. A node that
//! fails (transport error or a node-level rejection) becomes unhealthy for a
//! cooldown that starts at the configured minimum and doubles on each further
//! failure up to the maximum. A success readmits the node immediately and
//! halves its cooldown.
//!
//! Expiry is lazy: nothing runs in the background, a node simply counts as
//! healthy again once `now` passes its readmission time.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::models::{NodeHealth, NodeHealthSnapshot, NodeId};

#[derive(Clone, Copy, Debug)]
struct NodeHealthState {
    readmit_at: Option<Instant>,
    /// Cooldown the next failure applies.
    current_backoff: Duration,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct NodeHealthTracker {
    states: DashMap<NodeId, NodeHealthState>,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl NodeHealthTracker {
    /// Creates a tracker with the given cooldown bounds.
    ///
    /// # Arguments
    /// * `min_backoff` - Cooldown applied on a node's first failure
    /// * `max_backoff` - Upper bound the cooldown doubles towards
    pub fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            states: DashMap::new(),
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
        }
    }

    fn initial_state(&self) -> NodeHealthState {
        NodeHealthState {
            readmit_at: None,
            current_backoff: self.min_backoff,
            consecutive_failures: 0,
            last_failure: None,
        }
    }

    /// Marks a node unhealthy.
    ///
    /// # Returns
    /// * `Duration` - The cooldown applied by this failure
    pub fn record_failure(&self, node_id: NodeId) -> Duration {
        let now = Instant::now();
        let mut state = self
            .states
            .entry(node_id)
            .or_insert_with(|| self.initial_state());

        let cooldown = state.current_backoff;
        state.readmit_at = Some(now + cooldown);
        state.current_backoff = cooldown.saturating_mul(2).min(self.max_backoff);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(now);

        debug!(
            node_id = %node_id,
            consecutive_failures = %state.consecutive_failures,
            cooldown_ms = %cooldown.as_millis(),
            "node marked unhealthy"
        );
        cooldown
    }

    /// Readmits a node immediately and relaxes its cooldown.
    pub fn record_success(&self, node_id: NodeId) {
        // Fast path: untracked nodes are healthy already
        if let Some(mut state) = self.states.get_mut(&node_id) {
            let was_unhealthy = state.readmit_at.is_some();
            state.readmit_at = None;
            state.consecutive_failures = 0;
            state.current_backoff = (state.current_backoff / 2).max(self.min_backoff);
            if was_unhealthy {
                debug!(node_id = %node_id, "node readmitted after success");
            }
        }
    }

    /// Checks whether a node may be selected at `now`.
    pub fn is_eligible(&self, node_id: NodeId, now: Instant) -> bool {
        self.states
            .get(&node_id)
            .and_then(|state| state.readmit_at)
            .is_none_or(|readmit_at| now >= readmit_at)
    }

    /// Time left until the node is readmitted, zero when eligible.
    pub fn remaining_backoff(&self, node_id: NodeId, now: Instant) -> Duration {
        self.states
            .get(&node_id)
            .and_then(|state| state.readmit_at)
            .map(|readmit_at| readmit_at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn snapshot(&self, node_id: NodeId) -> NodeHealthSnapshot {
        let state = self
            .states
            .get(&node_id)
            .map(|state| *state)
            .unwrap_or_else(|| self.initial_state());

        NodeHealthSnapshot {
            health: match state.readmit_at {
                Some(readmit_at) => NodeHealth::Unhealthy { readmit_at },
                None => NodeHealth::Healthy,
            },
            next_backoff: state.current_backoff,
            consecutive_failures: state.consecutive_failures,
            last_failure: state.last_failure,
        }
    }

    /// Drops the state of every node not in `keep`.
    pub fn prune(&self, keep: &HashSet<NodeId>) {
        self.states.retain(|node_id, _| keep.contains(node_id));
    }

    pub fn clear(&self) {
        self.states.clear();
    }
}
