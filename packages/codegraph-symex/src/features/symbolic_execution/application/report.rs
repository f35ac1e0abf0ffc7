//! Result assembly
//!
//! Turns an exploration outcome into the caller-facing result contract.
//! Extension sections are filled only when the configuration asks for them.

use crate::features::symbolic_execution::domain::{
    ConcolicHint, DistributedStats, EquivalenceClaim, ExecutionPath, PathPriority, PathReport,
    PathStatus, StateSpaceCoverage, SymExpr, SymbolicExecutionResult, TestInput, TruncationReason,
    UnreachableBranch,
};
use crate::features::symbolic_execution::infrastructure::synthesizer::{render_outcome, synthesize};
use crate::features::symbolic_execution::infrastructure::{AnalysisSession, ExplorationOutcome};

pub struct ReportAssembler<'s> {
    session: &'s AnalysisSession,
    outcome: &'s ExplorationOutcome,
}

impl<'s> ReportAssembler<'s> {
    pub fn new(session: &'s AnalysisSession, outcome: &'s ExplorationOutcome) -> Self {
        Self { session, outcome }
    }

    /// `path_{i}` in result order
    fn path_id(index: usize) -> String {
        format!("path_{}", index)
    }

    pub fn build(
        &self,
        distributed: Option<DistributedStats>,
        equivalence: Option<EquivalenceClaim>,
    ) -> SymbolicExecutionResult {
        let report = &self.session.config.report;
        let paths = &self.outcome.paths;

        let mut result = SymbolicExecutionResult::empty();
        result.paths = paths
            .iter()
            .enumerate()
            .map(|(i, p)| self.path_report(i, p))
            .collect();
        result.paths_explored = paths.iter().filter(|p| !p.is_truncated()).count();
        result.truncated = self.outcome.budget_exhausted
            || self.outcome.time_exhausted
            || paths.iter().any(|p| p.is_truncated());
        result.unreachable_branches = self.unreachable_branches();
        result.constraints_used = self.constraints_used();

        if report.path_priorities {
            result.path_priorities = Some(
                paths
                    .iter()
                    .enumerate()
                    .map(|(i, p)| PathPriority {
                        path_id: Self::path_id(i),
                        score: p.priority,
                        selection_order: p.pop_rank,
                    })
                    .collect(),
            );
        }
        if report.test_inputs {
            result.test_inputs = Some(self.test_inputs());
        }
        if report.type_coverage {
            result.type_coverage = Some(self.session.entry.coverage.clone());
        }
        if report.concolic_hints {
            result.concolic_hints = Some(self.concolic_hints());
        }
        if report.distributed_stats {
            result.distributed_stats = distributed;
        }
        if report.state_space_coverage {
            result.state_space_coverage = Some(self.state_space_coverage());
        }
        result.equivalence_result = equivalence;
        result
    }

    fn path_report(&self, index: usize, path: &ExecutionPath) -> PathReport {
        PathReport {
            path_id: Self::path_id(index),
            constraints: path.condition.iter().map(|c| c.to_string()).collect(),
            return_value: render_outcome(&path.outcome),
            reachable: path.reachable,
            example_input: path.example.clone(),
            status: path.status,
            depth: path.depth,
            approximate: path.approximate,
            notes: path.notes.clone(),
            truncation: path.truncation.clone(),
        }
    }

    /// Arms pruned somewhere, never feasible or unresolved, outside truncated loops
    fn unreachable_branches(&self) -> Vec<UnreachableBranch> {
        let program = &self.session.program;
        self.outcome
            .ledger
            .iter()
            .filter(|(_, rec)| rec.pruned > 0 && rec.feasible == 0 && rec.unknown == 0)
            .filter(|((site, _), _)| {
                !program
                    .site(*site)
                    .enclosing_loops
                    .iter()
                    .any(|l| self.outcome.truncated_loops.contains(l))
            })
            .filter_map(|((site, _), rec)| {
                Some(UnreachableBranch {
                    location: program.location(*site),
                    constraint_that_failed: rec.guard.clone(),
                    arm: rec.kind?,
                })
            })
            .collect()
    }

    /// `name: type` per parameter (`top` when unmodeled)
    fn constraints_used(&self) -> Vec<String> {
        self.session
            .entry
            .params
            .iter()
            .map(|(param, value)| match &**value {
                SymExpr::Top { .. } => format!("{}: top", param.name),
                _ => format!("{}: {}", param.name, param.ty),
            })
            .collect()
    }

    fn test_inputs(&self) -> Vec<TestInput> {
        self.outcome
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == PathStatus::Sat)
            .filter_map(|(i, p)| {
                Some(TestInput {
                    path_id: Self::path_id(i),
                    inputs: p.example.clone()?,
                    expected: p.expected.clone(),
                })
            })
            .collect()
    }

    fn concolic_hints(&self) -> Vec<ConcolicHint> {
        self.outcome
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.status, PathStatus::Unknown | PathStatus::Truncated))
            .map(|(i, p)| ConcolicHint {
                path_id: Self::path_id(i),
                status: p.status,
                seed_input: p
                    .seed_model
                    .as_ref()
                    .map(|m| synthesize(m, &self.session.entry.params)),
                reason: hint_reason(p),
            })
            .collect()
    }

    fn state_space_coverage(&self) -> StateSpaceCoverage {
        let total_arms: usize = self
            .session
            .program
            .sites
            .iter()
            .map(|s| s.decision.arms.len())
            .sum();
        let mut coverage = StateSpaceCoverage {
            total_arms,
            truncated_paths: self.outcome.paths.iter().filter(|p| p.is_truncated()).count(),
            truncated_loops: self.outcome.truncated_loops.len(),
            ..StateSpaceCoverage::default()
        };
        for (_, rec) in self.outcome.ledger.iter() {
            if rec.feasible > 0 {
                coverage.feasible_arms += 1;
            } else if rec.unknown > 0 {
                coverage.unknown_arms += 1;
            } else if rec.pruned > 0 {
                coverage.pruned_arms += 1;
            }
        }
        coverage.coverage_ratio = if total_arms == 0 {
            1.0
        } else {
            coverage.feasible_arms as f64 / total_arms as f64
        };
        coverage
    }
}

fn hint_reason(path: &ExecutionPath) -> String {
    match &path.truncation {
        Some(TruncationReason::LoopBound { bound, .. }) => format!("loop bound {} reached", bound),
        Some(TruncationReason::PathBudget) => "path budget exhausted".to_string(),
        Some(TruncationReason::TimeBudget) => "time budget exhausted".to_string(),
        None => path
            .notes
            .last()
            .cloned()
            .unwrap_or_else(|| "reachability unresolved".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReportExtensions, SymbolicConfig, Tier};
    use crate::features::symbolic_execution::domain::ArmKind;
    use crate::features::symbolic_execution::infrastructure::{Explorer, Program, ValueModel};
    use crate::shared::models::{CompareOp, Expr, FunctionIr, Param, Stmt, TypeTag};

    fn assemble(function: &FunctionIr, config: SymbolicConfig) -> SymbolicExecutionResult {
        let program = Program::lower(function).unwrap();
        let entry = ValueModel::new(&config).entry_state(&function.params, 0);
        let session = AnalysisSession::new(program, config, entry);
        let mut outcome = Explorer::new(&session, None).run();
        outcome.sort_paths();
        ReportAssembler::new(&session, &outcome).build(None, None)
    }

    fn dead_branch() -> FunctionIr {
        let x = || Expr::name("x");
        FunctionIr::new(
            "check",
            vec![Param::new("x", TypeTag::Int), Param::new("v", TypeTag::Any)],
            vec![
                Stmt::if_(
                    Expr::and(vec![
                        Expr::compare(CompareOp::Gt, x(), Expr::int(10)),
                        Expr::compare(CompareOp::Lt, x(), Expr::int(5)),
                    ]),
                    vec![Stmt::ret(Expr::str("impossible")).at(3)],
                    vec![],
                )
                .at(2),
                Stmt::ret(Expr::str("ok")).at(4),
            ],
        )
    }

    #[test]
    fn test_unreachable_and_constraints_used() {
        let result = assemble(&dead_branch(), SymbolicConfig::from_tier(Tier::Community));
        assert_eq!(result.paths_explored, 2);
        assert_eq!(result.unreachable_branches.len(), 1);
        let dead = &result.unreachable_branches[0];
        assert_eq!(dead.location, "check:2");
        assert_eq!(dead.constraint_that_failed, "x > 10 and x < 5");
        assert_eq!(dead.arm, ArmKind::Then);
        assert!(result.paths.iter().all(|p| p.return_value != "\"impossible\""));
        assert_eq!(result.constraints_used, vec!["x: int", "v: top"]);
        assert!(result.test_inputs.is_none());
    }

    #[test]
    fn test_extensions_follow_flags() {
        let config = SymbolicConfig::from_tier(Tier::Community).report(ReportExtensions::all());
        let result = assemble(&dead_branch(), config);
        let inputs = result.test_inputs.unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(result.path_priorities.unwrap().len(), 2);
        let coverage = result.state_space_coverage.unwrap();
        assert_eq!(coverage.pruned_arms, 1);
        assert!(coverage.coverage_ratio < 1.0);
        assert_eq!(result.type_coverage.unwrap().top.get("any"), Some(&1));
        assert!(result.concolic_hints.unwrap().is_empty());
        // no partitioned run happened
        assert!(result.distributed_stats.is_none());
    }
}
