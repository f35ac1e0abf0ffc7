//! Result contract returned to callers (test generation, protocol layer)
//!
//! Field names and semantics are stable across tiers; extension sections are
//! omitted from the JSON when the tier does not produce them.

use serde::Serialize;
use std::collections::BTreeMap;

use super::concrete::ConcreteValue;
use super::equivalence::EquivalenceClaim;
use super::path::{ArmKind, ConcreteOutcome, PathStatus, TruncationReason};

/// One reported path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathReport {
    pub path_id: String,
    pub constraints: Vec<String>,
    pub return_value: String,
    /// `null` when reachability is unknown
    pub reachable: Option<bool>,
    pub example_input: Option<BTreeMap<String, ConcreteValue>>,
    pub status: PathStatus,
    pub depth: usize,
    pub approximate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationReason>,
}

/// Branch arm proven infeasible on every path reaching it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnreachableBranch {
    pub location: String,
    pub constraint_that_failed: String,
    pub arm: ArmKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathPriority {
    pub path_id: String,
    pub score: f64,
    pub selection_order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestInput {
    pub path_id: String,
    pub inputs: BTreeMap<String, ConcreteValue>,
    pub expected: Option<ConcreteOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCoverage {
    /// Declared type -> number of parameters modeled symbolically
    pub symbolic: BTreeMap<String, usize>,
    /// Declared type -> number of parameters degraded to Top
    pub top: BTreeMap<String, usize>,
    pub approximations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcolicHint {
    pub path_id: String,
    pub status: PathStatus,
    /// Input reaching the nearest proven-feasible ancestor
    pub seed_input: Option<BTreeMap<String, ConcreteValue>>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributedStats {
    pub workers: usize,
    pub partitions: usize,
    pub split_frontier: usize,
    pub split_phase_paths: usize,
    pub paths_per_worker: Vec<usize>,
    pub remaining_budget: usize,
    pub solver_calls: usize,
    pub cache_hits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSpaceCoverage {
    pub total_arms: usize,
    pub feasible_arms: usize,
    pub pruned_arms: usize,
    pub unknown_arms: usize,
    pub coverage_ratio: f64,
    pub truncated_paths: usize,
    pub truncated_loops: usize,
}

/// Complete answer of one invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolicExecutionResult {
    pub success: bool,
    /// Paths resolved SAT/UNSAT/UNKNOWN (truncated paths excluded)
    pub paths_explored: usize,
    pub paths: Vec<PathReport>,
    pub unreachable_branches: Vec<UnreachableBranch>,
    pub constraints_used: Vec<String>,
    pub execution_time_ms: u64,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_priorities: Option<Vec<PathPriority>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_inputs: Option<Vec<TestInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_coverage: Option<TypeCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concolic_hints: Option<Vec<ConcolicHint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed_stats: Option<DistributedStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_space_coverage: Option<StateSpaceCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equivalence_result: Option<EquivalenceClaim>,
    pub error: Option<String>,
}

impl SymbolicExecutionResult {
    /// Empty successful result
    pub fn empty() -> Self {
        Self {
            success: true,
            paths_explored: 0,
            paths: Vec::new(),
            unreachable_branches: Vec::new(),
            constraints_used: Vec::new(),
            execution_time_ms: 0,
            truncated: false,
            path_priorities: None,
            test_inputs: None,
            type_coverage: None,
            concolic_hints: None,
            distributed_stats: None,
            state_space_coverage: None,
            equivalence_result: None,
            error: None,
        }
    }

    /// Whole-invocation failure
    pub fn failure(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            execution_time_ms,
            error: Some(error.into()),
            ..Self::empty()
        }
    }

    pub fn path(&self, path_id: &str) -> Option<&PathReport> {
        self.paths.iter().find(|p| p.path_id == path_id)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_shape() {
        let result = SymbolicExecutionResult::failure("Parse error: eof", 3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Parse error: eof");
        assert_eq!(json["paths"].as_array().unwrap().len(), 0);
        assert!(json.get("test_inputs").is_none());
    }

    #[test]
    fn test_unknown_reachability_serializes_as_null() {
        let report = PathReport {
            path_id: "path_0".into(),
            constraints: vec![],
            return_value: "None".into(),
            reachable: None,
            example_input: None,
            status: PathStatus::Truncated,
            depth: 10,
            approximate: true,
            notes: vec![],
            truncation: Some(TruncationReason::LoopBound {
                loop_id: 0,
                bound: 10,
            }),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["reachable"].is_null());
        assert_eq!(json["status"], "TRUNCATED");
        assert_eq!(json["truncation"]["kind"], "loop_bound");
    }
}
