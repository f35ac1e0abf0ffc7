//! Adapter used when no solver is available
//!
//! Answers UNKNOWN for every query, so the explorer never prunes and every
//! path stays approximate.

use crate::features::symbolic_execution::ports::{
    SolverAdapter, SolverQuery, SolverResult, SolverStats, UnknownReason,
};

#[derive(Debug, Default, Clone)]
pub struct AssumeFeasible {
    stats: SolverStats,
}

impl AssumeFeasible {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SolverAdapter for AssumeFeasible {
    fn name(&self) -> &'static str {
        "assume_feasible"
    }

    fn check(&mut self, _query: &SolverQuery) -> SolverResult {
        let result = SolverResult::Unknown(UnknownReason::Unavailable);
        self.stats.record(&result);
        result
    }

    fn fork(&self) -> Box<dyn SolverAdapter> {
        Box::new(AssumeFeasible::new())
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_execution::domain::SymExpr;

    #[test]
    fn test_never_prunes() {
        let mut solver = AssumeFeasible::new();
        let q = SolverQuery::new(vec![SymExpr::bool(false)]);
        assert!(solver.check(&q).is_unknown());
        assert_eq!(solver.stats().unknown, 1);
    }
}
