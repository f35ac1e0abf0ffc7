//! Solver adapters
//!
//! - `NativeSolver`: pure-Rust decision procedure (default)
//! - `CachingSolver`: shared fingerprint cache in front of any adapter
//! - `AssumeFeasible`: stand-in when solving is disabled

pub mod assume_feasible;
pub mod cache;
pub mod eval;
pub mod interval;
pub mod linear;
pub mod native;

pub use assume_feasible::AssumeFeasible;
pub use cache::{CachingSolver, QueryCache};
pub use eval::{eval, holds, Tri};
pub use native::NativeSolver;

use std::sync::Arc;

use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::ports::SolverAdapter;

/// Adapter stack for a configuration
///
/// `cache` is shared by every fork of the returned adapter.
pub fn build_solver(config: &SymbolicConfig, cache: Option<Arc<QueryCache>>) -> Box<dyn SolverAdapter> {
    if !config.solver_available {
        return Box::new(AssumeFeasible::new());
    }
    let native: Box<dyn SolverAdapter> = Box::new(NativeSolver::from_config(config));
    match cache {
        Some(cache) if config.cache_queries => Box::new(CachingSolver::new(native, cache)),
        _ => native,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_solver_respects_availability() {
        let config = SymbolicConfig::default().solver_available(false);
        assert_eq!(build_solver(&config, None).name(), "assume_feasible");

        let config = SymbolicConfig::default().cache_queries(true);
        let solver = build_solver(&config, Some(Arc::new(QueryCache::new())));
        assert_eq!(solver.name(), "native");
    }
}
