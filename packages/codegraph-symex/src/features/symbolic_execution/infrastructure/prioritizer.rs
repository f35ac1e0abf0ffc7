//! Path prioritizers
//!
//! - `SourceOrder`: then before else, loop-continue before loop-exit
//! - `BranchDiversity`: prefer nodes whose conditions use comparison
//!   operators/operands not yet seen on a completed path

use std::collections::BTreeSet;

use crate::config::PrioritizerKind;
use crate::features::symbolic_execution::domain::SymExpr;
use crate::features::symbolic_execution::ports::{ExplorationHistory, PathPrioritizer, WorklistView};

/// Comparison features of a constraint (`op:>`, `arg:x`, `arg:10`)
pub fn comparison_features(expr: &SymExpr, out: &mut BTreeSet<String>) {
    if let SymExpr::Cmp { op, lhs, rhs } = expr {
        out.insert(format!("op:{}", op.symbol()));
        out.insert(format!("arg:{}", lhs));
        out.insert(format!("arg:{}", rhs));
    }
    for child in expr.children() {
        comparison_features(child, out);
    }
}

pub fn create_prioritizer(kind: PrioritizerKind) -> Box<dyn PathPrioritizer> {
    match kind {
        PrioritizerKind::SourceOrder => Box::new(SourceOrder),
        PrioritizerKind::BranchDiversity => Box::new(BranchDiversity),
    }
}

fn source_rank(worklist: &[WorklistView<'_>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..worklist.len()).collect();
    order.sort_by(|&a, &b| worklist[a].order_key.cmp(worklist[b].order_key));
    order
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOrder;

impl PathPrioritizer for SourceOrder {
    fn name(&self) -> &'static str {
        "source_order"
    }

    fn score(&self, _entry: &WorklistView<'_>, _history: &ExplorationHistory) -> f64 {
        0.0
    }

    fn order(
        &self,
        worklist: &[WorklistView<'_>],
        _history: &ExplorationHistory,
        _remaining_budget: usize,
    ) -> Vec<usize> {
        source_rank(worklist)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BranchDiversity;

impl PathPrioritizer for BranchDiversity {
    fn name(&self) -> &'static str {
        "branch_diversity"
    }

    fn score(&self, entry: &WorklistView<'_>, history: &ExplorationHistory) -> f64 {
        let unseen = entry
            .features
            .iter()
            .filter(|f| !history.seen_features.contains(*f))
            .count();
        // Shallower nodes win among equally novel ones
        unseen as f64 + 1.0 / (entry.depth as f64 + 2.0)
    }

    fn order(
        &self,
        worklist: &[WorklistView<'_>],
        history: &ExplorationHistory,
        remaining_budget: usize,
    ) -> Vec<usize> {
        if remaining_budget == 0 {
            return source_rank(worklist);
        }
        let scores: Vec<f64> = worklist.iter().map(|e| self.score(e, history)).collect();
        let mut order: Vec<usize> = (0..worklist.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .total_cmp(&scores[a])
                .then_with(|| worklist[a].order_key.cmp(worklist[b].order_key))
        });
        order
    }
}
