//! Path prioritizer port
//!
//! An ordering must be a pure function of the worklist snapshot and the
//! exploration history, so a fixed budget and heuristic version always
//! explore the same paths.

use std::collections::BTreeSet;

use crate::features::symbolic_execution::domain::NodeId;

/// Read-only view of one worklist entry
#[derive(Debug, Clone, Copy)]
pub struct WorklistView<'a> {
    pub node_id: NodeId,
    /// Arm ranks from the root (source order)
    pub order_key: &'a [u16],
    pub depth: usize,
    /// Comparison features of the node's condition
    pub features: &'a BTreeSet<String>,
}

/// What completed paths have covered so far
#[derive(Debug, Clone, Default)]
pub struct ExplorationHistory {
    pub seen_features: BTreeSet<String>,
    pub completed_paths: usize,
}

impl ExplorationHistory {
    pub fn record_completed(&mut self, features: &BTreeSet<String>) {
        self.completed_paths += 1;
        self.seen_features.extend(features.iter().cloned());
    }
}

pub trait PathPrioritizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Heuristic version; bump when scoring changes
    fn version(&self) -> u32 {
        1
    }

    /// Interest of one entry (higher is explored earlier)
    fn score(&self, entry: &WorklistView<'_>, history: &ExplorationHistory) -> f64;

    /// Indices into `worklist`, most interesting first
    fn order(
        &self,
        worklist: &[WorklistView<'_>],
        history: &ExplorationHistory,
        remaining_budget: usize,
    ) -> Vec<usize>;
}
