//! Analysis session: state shared by every worker of one invocation
//!
//! The lowered program, entry state and configuration are read-only. Mutable
//! shared state is limited to the path budget (atomic), the query cache
//! (concurrent map) and aggregated solver stats (mutex).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::ports::{PathPrioritizer, SolverAdapter, SolverStats};

use super::loop_policy::LoopPolicy;
use super::prioritizer::create_prioritizer;
use super::program::Program;
use super::solver::{build_solver, QueryCache};
use super::value_model::EntryState;

/// Remaining number of paths that may be finalized
#[derive(Debug)]
pub struct PathBudget {
    remaining: AtomicUsize,
}

impl PathBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }

    /// Take one unit; `false` once the budget is exhausted
    pub fn try_acquire(&self) -> bool {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

pub struct AnalysisSession {
    pub id: String,
    pub program: Program,
    pub config: SymbolicConfig,
    pub entry: EntryState,
    pub budget: PathBudget,
    pub loops: LoopPolicy,
    pub prioritizer: Box<dyn PathPrioritizer>,
    pub cache: Option<Arc<QueryCache>>,
    started: Instant,
    deadline: Option<Instant>,
    solver: Mutex<Box<dyn SolverAdapter>>,
    stats: Mutex<SolverStats>,
}

impl AnalysisSession {
    /// Session with the configured solver stack
    pub fn new(program: Program, config: SymbolicConfig, entry: EntryState) -> Self {
        let cache = config.cache_queries.then(|| Arc::new(QueryCache::new()));
        let solver = build_solver(&config, cache.clone());
        Self::with_solver(program, config, entry, solver, cache)
    }

    /// Session over an explicit solver adapter (each worker forks it)
    pub fn with_solver(
        program: Program,
        config: SymbolicConfig,
        entry: EntryState,
        solver: Box<dyn SolverAdapter>,
        cache: Option<Arc<QueryCache>>,
    ) -> Self {
        let started = Instant::now();
        let deadline = (config.time_budget_ms > 0)
            .then(|| started + Duration::from_millis(config.time_budget_ms));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            budget: PathBudget::new(config.max_paths),
            loops: LoopPolicy::from_config(&config),
            prioritizer: create_prioritizer(config.prioritizer),
            program,
            entry,
            cache,
            started,
            deadline,
            solver: Mutex::new(solver),
            stats: Mutex::new(SolverStats::default()),
            config,
        }
    }

    /// Solver session for one worker
    pub fn fork_solver(&self) -> Box<dyn SolverAdapter> {
        self.solver.lock().fork()
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.lock().name()
    }

    /// Fold a finished worker's solver stats into the session totals
    pub fn record_stats(&self, stats: &SolverStats) {
        self.stats.lock().merge(stats);
    }

    pub fn solver_stats(&self) -> SolverStats {
        *self.stats.lock()
    }

    pub fn time_exhausted(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("id", &self.id)
            .field("function", &self.program.function)
            .field("budget", &self.budget.remaining())
            .field("prioritizer", &self.prioritizer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_budget_never_overdraws() {
        let budget = Arc::new(PathBudget::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                thread::spawn(move || (0..20).filter(|_| budget.try_acquire()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert!(budget.is_exhausted());
        assert!(!budget.try_acquire());
    }
}
