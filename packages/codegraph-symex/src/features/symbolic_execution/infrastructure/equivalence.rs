//! Equivalence checker
//!
//! ```text
//! f ──explore──▶ paths A ─┐
//!                         ├─▶ for each SAT pair (a, b):
//! g ──explore──▶ paths B ─┘     entry ∧ cond_a ∧ cond_b ∧ out_a ≠ out_b
//!   (g's params bound to          SAT   → DIFFERENT (counterexample)
//!    f's symbols)                 UNSAT → pair cleared
//!                                 else  → pair unresolved
//! ```
//!
//! EQUIVALENT needs every pair cleared and both path sets complete.

use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::domain::{
    CmpOp, EquivalenceClaim, EquivalenceVerdict, ExecutionPath, ExprRef, PathOutcome, PathStatus,
    SymExpr,
};
use crate::features::symbolic_execution::ports::{SolverAdapter, SolverQuery, SolverResult};
use crate::shared::models::FunctionIr;

use super::explorer::{ExplorationOutcome, Explorer};
use super::interpreter::{InterpOutcome, Interpreter};
use super::program::Program;
use super::session::AnalysisSession;
use super::solver::build_solver;
use super::synthesizer::{complete_model, synthesize};
use super::value_model::{EntryState, ValueModel};

/// Top ids of the second function start here so they never alias the first's
const SECOND_TOP_BASE: u64 = 1 << 32;

pub struct EquivalenceChecker<'a> {
    config: &'a SymbolicConfig,
}

/// One explored side of the comparison
struct Side {
    session: AnalysisSession,
    outcome: ExplorationOutcome,
}

impl Side {
    fn explore(program: Program, config: &SymbolicConfig, entry: EntryState) -> Self {
        let session = AnalysisSession::new(program, config.clone(), entry);
        let mut outcome = Explorer::new(&session, None).run();
        outcome.sort_paths();
        Self { session, outcome }
    }

    /// Paths that keep the side from being fully resolved
    fn unresolved(&self) -> usize {
        self.outcome
            .paths
            .iter()
            .filter(|p| matches!(p.status, PathStatus::Truncated | PathStatus::Unknown))
            .count()
    }

    fn solved(&self) -> impl Iterator<Item = &ExecutionPath> {
        self.outcome.paths.iter().filter(|p| p.status == PathStatus::Sat)
    }
}

enum PairVerdict {
    Cleared,
    Different(Box<EquivalenceClaim>),
    Unresolved(String),
}

impl<'a> EquivalenceChecker<'a> {
    pub fn new(config: &'a SymbolicConfig) -> Self {
        Self { config }
    }

    /// Compare `f` and `g` over `f`'s input domain
    pub fn check(&self, f: &FunctionIr, g: &FunctionIr) -> EquivalenceClaim {
        let unknown = |reason: String| {
            tracing::warn!(a = %f.name, b = %g.name, "equivalence indeterminate: {}", reason);
            EquivalenceClaim::unknown(&f.name, &g.name, reason)
        };

        if f.params.len() != g.params.len() {
            return unknown(format!(
                "arity differs: {} takes {} parameters, {} takes {}",
                f.name,
                f.params.len(),
                g.name,
                g.params.len()
            ));
        }
        if let Some((a, b)) = f.params.iter().zip(&g.params).find(|(a, b)| a.ty != b.ty) {
            return unknown(format!(
                "parameter types differ: `{}: {}` vs `{}: {}`",
                a.name, a.ty, b.name, b.ty
            ));
        }
        if f.fingerprint() == g.fingerprint() {
            tracing::debug!(a = %f.name, b = %g.name, "structurally identical functions");
            return EquivalenceClaim::new(&f.name, &g.name, EquivalenceVerdict::Equivalent);
        }

        let (program_a, program_b) = match (Program::lower(f), Program::lower(g)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return unknown(format!("cannot lower functions: {}", e)),
        };
        let model = ValueModel::new(self.config);
        let side_a = Side::explore(program_a, self.config, model.entry_state(&f.params, 0));
        let side_b = Side::explore(
            program_b,
            self.config,
            model.entry_state_bound(&g.params, &f.params, SECOND_TOP_BASE),
        );

        let mut solver = build_solver(self.config, None);
        let mut pairs_checked = 0usize;
        let mut unresolved_pairs = 0usize;
        let mut first_reason = None;

        for a in side_a.solved() {
            for b in side_b.solved() {
                pairs_checked += 1;
                match self.check_pair(&side_a, &side_b, a, b, solver.as_mut()) {
                    PairVerdict::Cleared => {}
                    PairVerdict::Different(mut claim) => {
                        claim.pairs_checked = pairs_checked;
                        tracing::info!(a = %f.name, b = %g.name, pairs_checked, "functions differ");
                        return *claim;
                    }
                    PairVerdict::Unresolved(reason) => {
                        unresolved_pairs += 1;
                        first_reason.get_or_insert(reason);
                    }
                }
            }
        }

        let incomplete = side_a.unresolved() + side_b.unresolved();
        let mut claim = if unresolved_pairs > 0 {
            let reason = first_reason.unwrap_or_default();
            unknown(format!("{} path pair(s) unresolved, first: {}", unresolved_pairs, reason))
        } else if incomplete > 0 {
            unknown(format!(
                "{} path(s) truncated or unknown; equivalence cannot be established",
                incomplete
            ))
        } else {
            EquivalenceClaim::new(&f.name, &g.name, EquivalenceVerdict::Equivalent)
        };
        claim.pairs_checked = pairs_checked;
        claim
    }

    fn check_pair(
        &self,
        side_a: &Side,
        side_b: &Side,
        a: &ExecutionPath,
        b: &ExecutionPath,
        solver: &mut dyn SolverAdapter,
    ) -> PairVerdict {
        let diff = outcome_difference(&a.outcome, &b.outcome);
        if diff.is_false() {
            return PairVerdict::Cleared;
        }
        let constraints: Vec<ExprRef> = side_a
            .session
            .entry
            .constraints
            .iter()
            .chain(&side_b.session.entry.constraints)
            .chain(&a.condition)
            .chain(&b.condition)
            .chain(std::iter::once(&diff))
            .cloned()
            .collect();
        let involves_top = constraints.iter().any(|c| c.contains_top());

        match solver.check(&SolverQuery::new(constraints.clone())) {
            SolverResult::Unsat => PairVerdict::Cleared,
            SolverResult::Unknown(reason) => PairVerdict::Unresolved(format!("solver: {}", reason)),
            SolverResult::Sat(_) if involves_top => {
                PairVerdict::Unresolved("outputs depend on unmodeled values".to_string())
            }
            SolverResult::Sat(model) => {
                let completed = complete_model(&model, &constraints);
                let counterexample = synthesize(&completed, &side_a.session.entry.params);
                let run_a = Interpreter::new(&side_a.session.program).run(&counterexample);
                let bound_b = side_b
                    .session
                    .entry
                    .params
                    .iter()
                    .zip(&side_a.session.entry.params)
                    .filter_map(|((pb, _), (pa, _))| {
                        counterexample.get(&pa.name).map(|v| (pb.name.clone(), v.clone()))
                    })
                    .collect();
                let run_b = Interpreter::new(&side_b.session.program).run(&bound_b);
                let same = match (&run_a.outcome, &run_b.outcome) {
                    (InterpOutcome::Returned(x), InterpOutcome::Returned(y)) => x.same_outcome(y),
                    (x, y) => x == y,
                };
                if same {
                    return PairVerdict::Unresolved(
                        "counterexample did not reproduce concretely".to_string(),
                    );
                }
                let mut claim = EquivalenceClaim::new(
                    &side_a.session.program.function,
                    &side_b.session.program.function,
                    EquivalenceVerdict::Different,
                );
                claim.output_a = Some(run_a.outcome.to_string());
                claim.output_b = Some(run_b.outcome.to_string());
                claim.counterexample = Some(counterexample);
                PairVerdict::Different(Box::new(claim))
            }
        }
    }
}

/// Constraint that holds when the two outcomes differ
fn outcome_difference(a: &PathOutcome, b: &PathOutcome) -> ExprRef {
    match (a, b) {
        (PathOutcome::Return(x), PathOutcome::Return(y)) => {
            if x.fingerprint() == y.fingerprint() && !x.contains_top() {
                SymExpr::bool(false)
            } else {
                SymExpr::mk_cmp(CmpOp::Ne, x.clone(), y.clone())
            }
        }
        (PathOutcome::Raise(x), PathOutcome::Raise(y)) => SymExpr::bool(x != y),
        (PathOutcome::Return(_), PathOutcome::Raise(_)) | (PathOutcome::Raise(_), PathOutcome::Return(_)) => {
            SymExpr::bool(true)
        }
        // Pending outcomes never reach here (only SAT paths are paired)
        _ => SymExpr::bool(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tier;
    use crate::features::symbolic_execution::domain::ConcreteValue;
    use crate::shared::models::{BinOp, CompareOp, Expr, Param, Stmt, TypeTag};

    fn unary(name: &str, param: &str, body: Vec<Stmt>) -> FunctionIr {
        FunctionIr::new(name, vec![Param::new(param, TypeTag::Int)], body)
    }

    fn config() -> SymbolicConfig {
        SymbolicConfig::from_tier(Tier::Pro)
    }

    #[test]
    fn test_increment_vs_decrement_differ() {
        let f = unary("f", "x", vec![Stmt::ret(Expr::binary(BinOp::Add, Expr::name("x"), Expr::int(1)))]);
        let g = unary("g", "x", vec![Stmt::ret(Expr::binary(BinOp::Sub, Expr::name("x"), Expr::int(1)))]);
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &g);
        assert_eq!(claim.result, EquivalenceVerdict::Different);
        let cex = claim.counterexample.expect("counterexample");
        let x = cex["x"].as_int().unwrap();
        assert_ne!(x + 1, x - 1);
        assert_eq!(claim.output_a, Some((x + 1).to_string()));
        assert_eq!(claim.pairs_checked, 1);
    }

    #[test]
    fn test_reflexive() {
        let f = unary("f", "x", vec![Stmt::ret(Expr::binary(BinOp::Mul, Expr::name("x"), Expr::int(2)))]);
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &f);
        assert_eq!(claim.result, EquivalenceVerdict::Equivalent);
        assert!(claim.counterexample.is_none());
    }

    #[test]
    fn test_renamed_parameter_equivalent() {
        // if x > 0: return x else: return -x   vs   abs via a different split
        let f = unary(
            "f",
            "x",
            vec![Stmt::if_(
                Expr::compare(CompareOp::Gt, Expr::name("x"), Expr::int(0)),
                vec![Stmt::ret(Expr::name("x"))],
                vec![Stmt::ret(Expr::binary(BinOp::Sub, Expr::int(0), Expr::name("x")))],
            )],
        );
        let g = unary(
            "g",
            "n",
            vec![Stmt::if_(
                Expr::compare(CompareOp::Lt, Expr::name("n"), Expr::int(0)),
                vec![Stmt::ret(Expr::binary(BinOp::Sub, Expr::int(0), Expr::name("n")))],
                vec![Stmt::ret(Expr::name("n"))],
            )],
        );
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &g);
        assert_eq!(claim.result, EquivalenceVerdict::Equivalent, "{:?}", claim.reason);
        assert_eq!(claim.pairs_checked, 4);
    }

    #[test]
    fn test_arity_mismatch_unknown() {
        let f = unary("f", "x", vec![Stmt::ret(Expr::name("x"))]);
        let g = FunctionIr::new(
            "g",
            vec![Param::new("x", TypeTag::Int), Param::new("y", TypeTag::Int)],
            vec![Stmt::ret(Expr::name("x"))],
        );
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &g);
        assert_eq!(claim.result, EquivalenceVerdict::Unknown);
        assert!(claim.reason.unwrap().contains("arity"));
    }

    #[test]
    fn test_opaque_call_never_equivalent() {
        let f = unary("f", "x", vec![Stmt::ret(Expr::call("mystery", vec![Expr::name("x")]))]);
        let g = unary("g", "x", vec![Stmt::ret(Expr::call("other", vec![Expr::name("x")]))]);
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &g);
        assert_eq!(claim.result, EquivalenceVerdict::Unknown);
    }

    #[test]
    fn test_raise_vs_return_differs() {
        let f = unary("f", "x", vec![Stmt::raise("ValueError")]);
        let g = unary("g", "x", vec![Stmt::ret(Expr::int(0))]);
        let config = config();
        let claim = EquivalenceChecker::new(&config).check(&f, &g);
        assert_eq!(claim.result, EquivalenceVerdict::Different);
        assert_eq!(claim.output_a.as_deref(), Some("raise ValueError"));
        assert_eq!(claim.counterexample.unwrap()["x"], ConcreteValue::Int(0));
    }
}
