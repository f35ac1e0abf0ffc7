//! Query cache shared across workers
//!
//! Keyed by the query's blake3 structural fingerprint. Entries are never
//! invalidated: a query's meaning does not change within a session, so a stale
//! hit is still a correct answer.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::features::symbolic_execution::ports::{
    SolverAdapter, SolverQuery, SolverResult, SolverStats, UnknownReason,
};

/// Concurrent solver result cache
#[derive(Debug, Default)]
pub struct QueryCache {
    /// Main storage (lock-free)
    store: DashMap<blake3::Hash, SolverResult>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, query: &SolverQuery) -> Option<SolverResult> {
        match self.store.get(&query.fingerprint()) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Deadline-dependent answers are not cached
    pub fn insert(&self, query: &SolverQuery, result: &SolverResult) {
        if matches!(result, SolverResult::Unknown(UnknownReason::Timeout)) {
            return;
        }
        self.store.insert(query.fingerprint(), result.clone());
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Adapter answering repeated queries from a shared cache
pub struct CachingSolver {
    inner: Box<dyn SolverAdapter>,
    cache: Arc<QueryCache>,
    cache_hits: usize,
}

impl CachingSolver {
    pub fn new(inner: Box<dyn SolverAdapter>, cache: Arc<QueryCache>) -> Self {
        Self {
            inner,
            cache,
            cache_hits: 0,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }
}

impl SolverAdapter for CachingSolver {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn check(&mut self, query: &SolverQuery) -> SolverResult {
        if let Some(hit) = self.cache.get(query) {
            self.cache_hits += 1;
            tracing::trace!(fingerprint = %query.fingerprint().to_hex(), "solver cache hit");
            return hit;
        }
        let result = self.inner.check(query);
        self.cache.insert(query, &result);
        result
    }

    fn fork(&self) -> Box<dyn SolverAdapter> {
        Box::new(CachingSolver::new(self.inner.fork(), Arc::clone(&self.cache)))
    }

    fn stats(&self) -> SolverStats {
        let mut stats = self.inner.stats();
        stats.cache_hits += self.cache_hits;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_execution::domain::{CmpOp, Sort, SymExpr};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl SolverAdapter for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn check(&mut self, _query: &SolverQuery) -> SolverResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SolverResult::Unsat
        }

        fn fork(&self) -> Box<dyn SolverAdapter> {
            Box::new(Counting {
                calls: Arc::clone(&self.calls),
            })
        }
    }

    #[test]
    fn test_cache_shared_between_forks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(QueryCache::new());
        let mut a = CachingSolver::new(
            Box::new(Counting {
                calls: Arc::clone(&calls),
            }),
            Arc::clone(&cache),
        );
        let mut b = a.fork();

        let x = SymExpr::var("x", Sort::Int);
        let q1 = SolverQuery::new(vec![
            SymExpr::mk_cmp(CmpOp::Gt, x.clone(), SymExpr::int(10)),
            SymExpr::mk_cmp(CmpOp::Lt, x.clone(), SymExpr::int(5)),
        ]);
        let q2 = SolverQuery::new(vec![
            SymExpr::mk_cmp(CmpOp::Lt, x.clone(), SymExpr::int(5)),
            SymExpr::mk_cmp(CmpOp::Gt, x, SymExpr::int(10)),
        ]);

        assert_eq!(a.check(&q1), SolverResult::Unsat);
        assert_eq!(b.check(&q2), SolverResult::Unsat);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(b.stats().cache_hits, 1);
    }

    #[test]
    fn test_timeouts_not_cached() {
        let cache = QueryCache::new();
        let q = SolverQuery::new(vec![SymExpr::var("b", Sort::Bool)]);
        cache.insert(&q, &SolverResult::Unknown(UnknownReason::Timeout));
        assert!(cache.is_empty());
    }
}
