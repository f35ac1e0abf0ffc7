//! Loop bounding policy
//!
//! Loops are unrolled one iteration per loop-continue decision. Past the
//! bound the explorer stops unrolling and reports a TRUNCATED path for the
//! continuation instead of dropping it.

use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::domain::LoopId;

/// Iteration ceiling applied when the tier sets no bound
pub const UNBOUNDED_ITERATION_CAP: usize = 100_000;

/// Whether iteration `iteration_count + 1` of a loop may be explored
pub fn should_continue(_loop_id: LoopId, iteration_count: usize, tier_limit: Option<usize>) -> bool {
    iteration_count < tier_limit.unwrap_or(UNBOUNDED_ITERATION_CAP)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    limit: Option<usize>,
}

impl LoopPolicy {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    pub fn from_config(config: &SymbolicConfig) -> Self {
        Self::new(config.max_depth)
    }

    pub fn should_continue(&self, loop_id: LoopId, iteration_count: usize) -> bool {
        should_continue(loop_id, iteration_count, self.limit)
    }

    /// Effective bound reported on truncated paths
    pub fn bound(&self) -> usize {
        self.limit.unwrap_or(UNBOUNDED_ITERATION_CAP)
    }
}
