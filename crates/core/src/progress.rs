//! Course progress math.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the engine and any future worker or CLI tooling. The progress
//! denominator is the set of leaf chapters supplied by the external
//! course structure provider; hierarchy is never computed here.

use std::collections::BTreeSet;

use crate::types::ChapterId;

/// Completion percentage in `[0, 100]`.
///
/// Only finished chapters that are currently leaves count; stale ids
/// left behind by curriculum edits are ignored. An empty course reports
/// `0.0` — it can never be "complete".
pub fn percentage(finished: &BTreeSet<ChapterId>, leaves: &BTreeSet<ChapterId>) -> f64 {
    if leaves.is_empty() {
        return 0.0;
    }
    let done = finished.intersection(leaves).count();
    100.0 * done as f64 / leaves.len() as f64
}

/// Whether every leaf chapter is finished.
pub fn is_complete(finished: &BTreeSet<ChapterId>, leaves: &BTreeSet<ChapterId>) -> bool {
    !leaves.is_empty() && leaves.iter().all(|id| finished.contains(id))
}
