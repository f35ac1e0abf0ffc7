//! Symbolic Execution UseCase

use std::time::Instant;

use serde::Deserialize;

use crate::config::{SymbolicConfig, Validatable};
use crate::errors::Result;
use crate::features::symbolic_execution::domain::{EquivalenceClaim, SymbolicExecutionResult};
use crate::features::symbolic_execution::infrastructure::{
    AnalysisSession, EquivalenceChecker, Explorer, PartitionedExplorer, Program, ValueModel,
};
use crate::shared::models::FunctionIr;

use super::report::ReportAssembler;

/// Per-invocation inputs
#[derive(Debug, Clone, Deserialize)]
pub struct SymexRequest {
    pub function: FunctionIr,
    /// Second function to compare against `function`
    #[serde(default)]
    pub prove_equivalence: Option<FunctionIr>,
    #[serde(default)]
    pub config: SymbolicConfig,
}

impl SymexRequest {
    pub fn new(function: FunctionIr, config: SymbolicConfig) -> Self {
        Self {
            function,
            prove_equivalence: None,
            config,
        }
    }

    pub fn prove_equivalence(mut self, other: FunctionIr) -> Self {
        self.prove_equivalence = Some(other);
        self
    }
}

/// Symbolic Execution UseCase Trait
pub trait SymbolicExecutionUseCase: Send + Sync {
    /// Explore every path of `request.function`; never fails, errors land in the result
    fn execute(&self, request: &SymexRequest) -> SymbolicExecutionResult;
}

/// Symbolic Execution UseCase Implementation
#[derive(Debug, Default)]
pub struct SymbolicExecutionUseCaseImpl;

impl SymbolicExecutionUseCaseImpl {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, request: &SymexRequest, started: Instant) -> Result<SymbolicExecutionResult> {
        request.config.validate()?;
        let function = &request.function;

        // A partial front-end result is still listed, without solving
        let partial = function.is_partial().then(|| {
            let message = format!("Parse error: {}", function.parse_errors.join("; "));
            tracing::warn!(function = %function.name, "{}", message);
            message
        });
        let config = match partial {
            Some(_) => request.config.clone().solver_available(false),
            None => request.config.clone(),
        };

        let program = Program::lower(function)?;
        let entry = ValueModel::new(&config).entry_state(&function.params, 0);
        let session = AnalysisSession::new(program, config, entry);
        tracing::debug!(session = %session.id, solver = session.solver_name(), "session ready");

        let (outcome, distributed) = if session.config.distributed {
            let (outcome, stats) = PartitionedExplorer::new(&session).run();
            (outcome, Some(stats))
        } else {
            let mut outcome = Explorer::new(&session, None).run();
            outcome.sort_paths();
            (outcome, None)
        };

        let equivalence = request
            .prove_equivalence
            .as_ref()
            .map(|other| self.equivalence(function, other, &session.config));

        let mut result = ReportAssembler::new(&session, &outcome).build(distributed, equivalence);
        if let Some(message) = partial {
            result.success = false;
            result.error = Some(message);
        }
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn equivalence(&self, f: &FunctionIr, g: &FunctionIr, config: &SymbolicConfig) -> EquivalenceClaim {
        if !config.report.equivalence_result {
            return EquivalenceClaim::unknown(
                &f.name,
                &g.name,
                format!("equivalence checking is not enabled at tier {}", config.tier),
            );
        }
        EquivalenceChecker::new(config).check(f, g)
    }
}

impl SymbolicExecutionUseCase for SymbolicExecutionUseCaseImpl {
    fn execute(&self, request: &SymexRequest) -> SymbolicExecutionResult {
        let started = Instant::now();
        tracing::info!(
            function = %request.function.name,
            tier = %request.config.tier,
            params = request.function.params.len(),
            "symbolic execution started"
        );

        let result = match self.run(request, started) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(function = %request.function.name, error = %e, "symbolic execution failed");
                SymbolicExecutionResult::failure(e.to_string(), started.elapsed().as_millis() as u64)
            }
        };

        tracing::info!(
            function = %request.function.name,
            success = result.success,
            paths_explored = result.paths_explored,
            truncated = result.truncated,
            unreachable = result.unreachable_branches.len(),
            elapsed_ms = result.execution_time_ms,
            "symbolic execution finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tier;
    use crate::features::symbolic_execution::domain::{EquivalenceVerdict, PathStatus};
    use crate::shared::models::{Expr, Param, Stmt, TypeTag};

    fn identity() -> FunctionIr {
        FunctionIr::new("identity", vec![Param::new("x", TypeTag::Int)], vec![Stmt::ret(Expr::name("x"))])
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let request = SymexRequest::new(identity(), SymbolicConfig::default().max_paths(0));
        let result = SymbolicExecutionUseCaseImpl::new().execute(&request);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("max_paths"));
    }

    #[test]
    fn test_invalid_ir_is_reported() {
        let f = FunctionIr::new("bad", vec![], vec![Stmt::brk()]);
        let result = SymbolicExecutionUseCaseImpl::new().execute(&SymexRequest::new(f, SymbolicConfig::default()));
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid IR"));
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_partial_ir_lists_paths_unsolved() {
        let mut f = identity();
        f.parse_errors.push("line 7: unexpected indent".into());
        let result = SymbolicExecutionUseCaseImpl::new().execute(&SymexRequest::new(f, SymbolicConfig::default()));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Parse error: line 7: unexpected indent"));
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].status, PathStatus::Unknown);
    }

    #[test]
    fn test_equivalence_gated_by_tier() {
        let community = SymexRequest::new(identity(), SymbolicConfig::from_tier(Tier::Community))
            .prove_equivalence(identity());
        let claim = SymbolicExecutionUseCaseImpl::new()
            .execute(&community)
            .equivalence_result
            .unwrap();
        assert_eq!(claim.result, EquivalenceVerdict::Unknown);

        let pro = SymexRequest::new(identity(), SymbolicConfig::from_tier(Tier::Pro))
            .prove_equivalence(identity());
        let claim = SymbolicExecutionUseCaseImpl::new().execute(&pro).equivalence_result.unwrap();
        assert_eq!(claim.result, EquivalenceVerdict::Equivalent);
    }
}
