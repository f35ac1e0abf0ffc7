//! Solver adapter port
//!
//! A query is a snapshot conjunction of constraints. It is never mutated after
//! issue, so results may be cached by the query's structural fingerprint.

use std::fmt;
use std::sync::Arc;

use crate::features::symbolic_execution::domain::{ExprRef, Model};

/// Immutable satisfiability request
#[derive(Debug, Clone)]
pub struct SolverQuery {
    constraints: Arc<[ExprRef]>,
    fingerprint: blake3::Hash,
}

impl SolverQuery {
    pub fn new(constraints: Vec<ExprRef>) -> Self {
        // Conjunction is order-insensitive: hash the sorted member fingerprints
        let mut parts: Vec<[u8; 32]> = constraints
            .iter()
            .map(|c| *c.fingerprint().as_bytes())
            .collect();
        parts.sort_unstable();
        parts.dedup();
        let mut hasher = blake3::Hasher::new();
        for part in &parts {
            hasher.update(part);
        }
        Self {
            constraints: constraints.into(),
            fingerprint: hasher.finalize(),
        }
    }

    pub fn constraints(&self) -> &[ExprRef] {
        &self.constraints
    }

    pub fn fingerprint(&self) -> blake3::Hash {
        self.fingerprint
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn contains_top(&self) -> bool {
        self.constraints.iter().any(|c| c.contains_top())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    Timeout,
    /// Search gave up (unsupported theory, node cap, case-split cap)
    Incomplete(String),
    /// No solver behind the adapter
    Unavailable,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::Timeout => write!(f, "solver timeout"),
            UnknownReason::Incomplete(why) => write!(f, "solver incomplete: {}", why),
            UnknownReason::Unavailable => write!(f, "solver unavailable"),
        }
    }
}

/// Solver verdict
#[derive(Debug, Clone, PartialEq)]
pub enum SolverResult {
    /// Satisfiable, with a model assigning every variable of the query
    Sat(Arc<Model>),
    Unsat,
    /// Never to be read as UNSAT
    Unknown(UnknownReason),
}

impl SolverResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverResult::Sat(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverResult::Unknown(_))
    }

    pub fn model(&self) -> Option<&Arc<Model>> {
        match self {
            SolverResult::Sat(model) => Some(model),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub calls: usize,
    pub sat: usize,
    pub unsat: usize,
    pub unknown: usize,
    pub cache_hits: usize,
}

impl SolverStats {
    pub fn record(&mut self, result: &SolverResult) {
        self.calls += 1;
        match result {
            SolverResult::Sat(_) => self.sat += 1,
            SolverResult::Unsat => self.unsat += 1,
            SolverResult::Unknown(_) => self.unknown += 1,
        }
    }

    pub fn merge(&mut self, other: &SolverStats) {
        self.calls += other.calls;
        self.sat += other.sat;
        self.unsat += other.unsat;
        self.unknown += other.unknown;
        self.cache_hits += other.cache_hits;
    }
}

/// Satisfiability backend
///
/// `check` is side-effect free from the caller's perspective. Each worker gets
/// its own session through `fork`.
pub trait SolverAdapter: Send {
    fn name(&self) -> &'static str;

    fn check(&mut self, query: &SolverQuery) -> SolverResult;

    /// Independent session for another worker (shared caches stay shared)
    fn fork(&self) -> Box<dyn SolverAdapter>;

    fn stats(&self) -> SolverStats {
        SolverStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_execution::domain::{CmpOp, Sort, SymExpr};

    #[test]
    fn test_fingerprint_ignores_order_and_duplicates() {
        let x = SymExpr::var("x", Sort::Int);
        let a = SymExpr::mk_cmp(CmpOp::Gt, x.clone(), SymExpr::int(5));
        let b = SymExpr::mk_cmp(CmpOp::Le, x, SymExpr::int(10));

        let q1 = SolverQuery::new(vec![a.clone(), b.clone()]);
        let q2 = SolverQuery::new(vec![b.clone(), a.clone(), b]);
        let q3 = SolverQuery::new(vec![a]);
        assert_eq!(q1.fingerprint(), q2.fingerprint());
        assert_ne!(q1.fingerprint(), q3.fingerprint());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = SolverStats::default();
        stats.record(&SolverResult::Unsat);
        stats.record(&SolverResult::Unknown(UnknownReason::Timeout));
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.unsat, 1);
        assert_eq!(stats.unknown, 1);
    }
}
