//! Partitioned exploration
//!
//! ```text
//! root ──breadth-first split──▶ frontier (>= 2^split_depth nodes)
//!                                   │ one partition per node
//!                                   ▼
//!              worker pool (own arena + forked solver session each)
//!                                   │ shared: query cache, deadline
//!                                   ▼
//!     merge, sort by root-to-leaf arm ranks, charge the path budget in order
//! ```
//!
//! Partitions are disjoint subtrees, so merging is a plain concatenation
//! followed by the stable sort every explorer result goes through.
//!
//! Each partition draws on a private copy of the budget left after the split,
//! so what it resolves does not depend on how fast its neighbours run. The
//! shared budget is charged afterwards in path order; resolved paths past the
//! limit are truncated.

use rayon::prelude::*;

use crate::features::symbolic_execution::domain::{DistributedStats, PathNode, TruncationReason};

use super::explorer::{ExplorationOutcome, Explorer};
use super::session::{AnalysisSession, PathBudget};

/// Splits are capped so the frontier target stays representable
const MAX_SPLIT_DEPTH: usize = 16;

pub struct PartitionedExplorer<'s> {
    session: &'s AnalysisSession,
}

impl<'s> PartitionedExplorer<'s> {
    pub fn new(session: &'s AnalysisSession) -> Self {
        Self { session }
    }

    fn workers(&self) -> usize {
        match self.session.config.workers {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Explore the whole function across the worker pool
    pub fn run(&self) -> (ExplorationOutcome, DistributedStats) {
        let session = self.session;
        let workers = self.workers();
        let target = 1usize << session.config.split_depth.min(MAX_SPLIT_DEPTH);

        let (mut merged, frontier) = Explorer::new(session, None).split(target);
        let split_phase_paths = merged.paths.len();
        let partitions = frontier.len();
        tracing::debug!(
            session = %session.id,
            partitions,
            workers,
            split_phase_paths,
            "partitioned exploration frontier"
        );

        let share = session.budget.remaining();
        let mut partitioned = ExplorationOutcome::default();
        for outcome in self.explore_partitions(frontier, workers, share) {
            partitioned.merge(outcome);
        }
        partitioned.sort_paths();
        self.charge_budget(&mut partitioned);
        merged.merge(partitioned);
        merged.sort_paths();

        let mut paths_per_worker = vec![0usize; workers];
        for path in &merged.paths {
            if let Some(slot) = path.worker.and_then(|w| paths_per_worker.get_mut(w)) {
                *slot += 1;
            }
        }
        let stats = DistributedStats {
            workers,
            partitions,
            split_frontier: partitions,
            split_phase_paths,
            paths_per_worker,
            remaining_budget: session.budget.remaining(),
            solver_calls: merged.solver_stats.calls,
            cache_hits: merged.solver_stats.cache_hits,
        };
        (merged, stats)
    }

    /// Take one shared budget unit per resolved path, in path order
    fn charge_budget(&self, outcome: &mut ExplorationOutcome) {
        let mut dropped = 0usize;
        for path in outcome.paths.iter_mut().filter(|p| !p.is_truncated()) {
            if !self.session.budget.try_acquire() {
                path.truncate(TruncationReason::PathBudget, "path budget exhausted");
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                session = %self.session.id,
                dropped,
                "path budget exhausted across partitions, truncating later paths"
            );
            outcome.budget_exhausted = true;
        }
    }

    #[cfg(feature = "parallel")]
    fn explore_partitions(
        &self,
        frontier: Vec<PathNode>,
        workers: usize,
        share: usize,
    ) -> Vec<ExplorationOutcome> {
        let session = self.session;
        let explore = |(index, seed): (usize, PathNode)| {
            let worker = rayon::current_thread_index().unwrap_or(index) % workers;
            let budget = PathBudget::new(share);
            Explorer::from_seed(session, seed, &budget, Some(worker)).run()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| frontier.into_par_iter().enumerate().map(explore).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "worker pool unavailable, using the global pool");
                frontier.into_par_iter().enumerate().map(explore).collect()
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn explore_partitions(
        &self,
        frontier: Vec<PathNode>,
        workers: usize,
        share: usize,
    ) -> Vec<ExplorationOutcome> {
        frontier
            .into_iter()
            .enumerate()
            .map(|(index, seed)| {
                let budget = PathBudget::new(share);
                Explorer::from_seed(self.session, seed, &budget, Some(index % workers)).run()
            })
            .collect()
    }
}
