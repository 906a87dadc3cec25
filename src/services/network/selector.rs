//! # Node Selector
//!
//! Chooses the node for the next attempt among a transaction's candidates.
//!
//! - **Round-robin**: candidates are scanned in order starting at the rotation
//!   index, so consecutive attempts move on to different nodes
//! - **Health bias**: unhealthy nodes are skipped while a healthy one exists
//! - **Last resort**: when every candidate is unhealthy the one that failed
//!   least recently is returned, so selection never blocks

use tokio::time::Instant;

use crate::models::{NodeEntry, NodeHealth};

/// A resolved candidate node and its position in the transaction's node list.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub index: usize,
    pub entry: NodeEntry,
}

/// Picks a candidate starting at `start` (an index into the transaction's node
/// list, not into `candidates`).
///
/// # Returns
/// * `Some(&Candidate)` - The chosen node
/// * `None` - `candidates` is empty
pub fn select_node(candidates: &[Candidate], start: usize, now: Instant) -> Option<&Candidate> {
    if candidates.is_empty() {
        return None;
    }

    let offset = candidates
        .iter()
        .position(|candidate| candidate.index >= start)
        .unwrap_or(0);
    let rotated = candidates[offset..].iter().chain(candidates[..offset].iter());

    let mut fallback: Option<&Candidate> = None;
    for candidate in rotated {
        if candidate.entry.health.is_healthy_at(now) {
            return Some(candidate);
        }
        fallback = match fallback {
            Some(current) if !failed_less_recently(candidate, current) => Some(current),
            _ => Some(candidate),
        };
    }
    fallback
}

/// Orders unhealthy candidates by last failure, oldest first, then by the
/// earliest readmission.
fn failed_less_recently(a: &Candidate, b: &Candidate) -> bool {
    let key = |candidate: &Candidate| {
        let readmit_at = match candidate.entry.health.health {
            NodeHealth::Unhealthy { readmit_at } => Some(readmit_at),
            NodeHealth::Healthy => None,
        };
        (candidate.entry.health.last_failure, readmit_at)
    };
    key(a) < key(b)
}
