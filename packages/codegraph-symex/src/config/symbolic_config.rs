//! Symbolic execution configuration
//!
//! Settings consumed by the engine: budgets, loop bound, enabled symbolic
//! types, solver behaviour, parallelism and report extensions.

use super::error::{ConfigError, ConfigResult};
use super::tier::Tier;
use super::validation::{check_range, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Symbolic type families the value model can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolicTypeKind {
    Int,
    Bool,
    Float,
    String,
    List,
    Dict,
    Object,
}

impl SymbolicTypeKind {
    /// Scalar types every tier supports
    pub fn baseline() -> BTreeSet<Self> {
        [Self::Int, Self::Bool, Self::Float, Self::String]
            .into_iter()
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::String => "string",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Object => "object",
        }
    }
}

/// Worklist ordering strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrioritizerKind {
    /// Then before else, loop-continue before loop-exit (deterministic DFS)
    #[default]
    SourceOrder,
    /// Prefer nodes that add unseen comparison operators/operands
    BranchDiversity,
}

/// Optional result sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportExtensions {
    pub path_priorities: bool,
    pub test_inputs: bool,
    pub type_coverage: bool,
    pub concolic_hints: bool,
    pub distributed_stats: bool,
    pub state_space_coverage: bool,
    pub equivalence_result: bool,
}

impl ReportExtensions {
    /// Every extension enabled
    pub fn all() -> Self {
        Self {
            path_priorities: true,
            test_inputs: true,
            type_coverage: true,
            concolic_hints: true,
            distributed_stats: true,
            state_space_coverage: true,
            equivalence_result: true,
        }
    }
}

/// Symbolic execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicConfig {
    /// Tier the defaults were taken from
    pub tier: Tier,

    /// Maximum resolved paths (1..=100000)
    pub max_paths: usize,

    /// Loop unrolling bound (None = unbounded, else 1..=10000)
    pub max_depth: Option<usize>,

    /// Symbolic types the value model may use; others become Top
    pub enabled_types: BTreeSet<SymbolicTypeKind>,

    /// Length bound for string constraints (1..=4096)
    pub max_string_length: usize,

    /// Length bound for symbolic lists (1..=64)
    pub max_collection_length: usize,

    /// Per-query solver deadline in milliseconds (1..=600000)
    pub solver_timeout_ms: u64,

    /// Wall-clock budget for the whole exploration (0 = unlimited)
    pub time_budget_ms: u64,

    /// When false, no branch is ever pruned and every path is approximate
    pub solver_available: bool,

    /// Worklist ordering
    pub prioritizer: PrioritizerKind,

    /// Partition the root worklist across workers
    pub distributed: bool,

    /// Worker count for distributed exploration (1..=256)
    pub workers: usize,

    /// Number of branch levels expanded before partitioning (1..=16)
    pub split_depth: usize,

    /// Cache solver results by structural fingerprint
    pub cache_queries: bool,

    /// Replay every SAT example through the concrete interpreter
    pub verify_examples: bool,

    /// Optional result sections
    pub report: ReportExtensions,
}

impl SymbolicConfig {
    /// Complete defaults for a tier
    pub fn from_tier(tier: Tier) -> Self {
        match tier {
            Tier::Community => Self {
                tier,
                max_paths: 50,
                max_depth: tier.loop_bound(),
                enabled_types: SymbolicTypeKind::baseline(),
                max_string_length: 64,
                max_collection_length: 4,
                solver_timeout_ms: 2_000,
                time_budget_ms: 30_000,
                solver_available: true,
                prioritizer: PrioritizerKind::SourceOrder,
                distributed: false,
                workers: 1,
                split_depth: 2,
                cache_queries: true,
                verify_examples: true,
                report: ReportExtensions::default(),
            },
            Tier::Pro => {
                let mut enabled_types = SymbolicTypeKind::baseline();
                enabled_types.insert(SymbolicTypeKind::List);
                enabled_types.insert(SymbolicTypeKind::Dict);
                Self {
                    tier,
                    max_paths: 500,
                    max_depth: tier.loop_bound(),
                    enabled_types,
                    max_string_length: 256,
                    max_collection_length: 8,
                    solver_timeout_ms: 5_000,
                    time_budget_ms: 120_000,
                    solver_available: true,
                    prioritizer: PrioritizerKind::BranchDiversity,
                    distributed: false,
                    workers: 1,
                    split_depth: 2,
                    cache_queries: true,
                    verify_examples: true,
                    report: ReportExtensions {
                        path_priorities: true,
                        test_inputs: true,
                        type_coverage: true,
                        concolic_hints: true,
                        equivalence_result: true,
                        ..ReportExtensions::default()
                    },
                }
            }
            Tier::Enterprise => {
                let mut enabled_types = SymbolicTypeKind::baseline();
                enabled_types.insert(SymbolicTypeKind::List);
                enabled_types.insert(SymbolicTypeKind::Dict);
                enabled_types.insert(SymbolicTypeKind::Object);
                Self {
                    tier,
                    max_paths: 10_000,
                    max_depth: tier.loop_bound(),
                    enabled_types,
                    max_string_length: 1024,
                    max_collection_length: 16,
                    solver_timeout_ms: 10_000,
                    time_budget_ms: 600_000,
                    solver_available: true,
                    prioritizer: PrioritizerKind::BranchDiversity,
                    distributed: true,
                    workers: 4,
                    split_depth: 3,
                    cache_queries: true,
                    verify_examples: true,
                    report: ReportExtensions::all(),
                }
            }
        }
    }

    /// Whether the value model may use `kind`
    pub fn type_enabled(&self, kind: SymbolicTypeKind) -> bool {
        self.enabled_types.contains(&kind)
    }

    /// Builder: Set max_paths
    pub fn max_paths(mut self, v: usize) -> Self {
        self.max_paths = v;
        self
    }

    /// Builder: Set max_depth (loop bound)
    pub fn max_depth(mut self, v: Option<usize>) -> Self {
        self.max_depth = v;
        self
    }

    /// Builder: Enable a symbolic type
    pub fn enable_type(mut self, kind: SymbolicTypeKind) -> Self {
        self.enabled_types.insert(kind);
        self
    }

    /// Builder: Disable a symbolic type
    pub fn disable_type(mut self, kind: SymbolicTypeKind) -> Self {
        self.enabled_types.remove(&kind);
        self
    }

    /// Builder: Set max_string_length
    pub fn max_string_length(mut self, v: usize) -> Self {
        self.max_string_length = v;
        self
    }

    /// Builder: Set max_collection_length
    pub fn max_collection_length(mut self, v: usize) -> Self {
        self.max_collection_length = v;
        self
    }

    /// Builder: Set solver_timeout_ms
    pub fn solver_timeout_ms(mut self, v: u64) -> Self {
        self.solver_timeout_ms = v;
        self
    }

    /// Builder: Set time_budget_ms
    pub fn time_budget_ms(mut self, v: u64) -> Self {
        self.time_budget_ms = v;
        self
    }

    /// Builder: Set solver_available
    pub fn solver_available(mut self, v: bool) -> Self {
        self.solver_available = v;
        self
    }

    /// Builder: Set prioritizer
    pub fn prioritizer(mut self, v: PrioritizerKind) -> Self {
        self.prioritizer = v;
        self
    }

    /// Builder: Enable/disable distributed exploration
    pub fn distributed(mut self, v: bool) -> Self {
        self.distributed = v;
        self
    }

    /// Builder: Set workers
    pub fn workers(mut self, v: usize) -> Self {
        self.workers = v;
        self
    }

    /// Builder: Set split_depth
    pub fn split_depth(mut self, v: usize) -> Self {
        self.split_depth = v;
        self
    }

    /// Builder: Enable/disable the solver query cache
    pub fn cache_queries(mut self, v: bool) -> Self {
        self.cache_queries = v;
        self
    }

    /// Builder: Enable/disable example replay
    pub fn verify_examples(mut self, v: bool) -> Self {
        self.verify_examples = v;
        self
    }

    /// Builder: Set report extensions
    pub fn report(mut self, v: ReportExtensions) -> Self {
        self.report = v;
        self
    }
}

impl Default for SymbolicConfig {
    fn default() -> Self {
        Self::from_tier(Tier::Community)
    }
}

impl Validatable for SymbolicConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "max_paths",
            self.max_paths,
            1,
            100_000,
            "At least one path must be explored",
        )?;

        if let Some(depth) = self.max_depth {
            check_range(
                "max_depth",
                depth,
                1,
                10_000,
                "Loop bound must allow one iteration; use null for unbounded",
            )?;
        }

        check_range(
            "max_string_length",
            self.max_string_length,
            1,
            4096,
            "String bound keeps solver cost tractable",
        )?;

        check_range(
            "max_collection_length",
            self.max_collection_length,
            1,
            64,
            "Symbolic lists are unrolled element by element",
        )?;

        check_range(
            "solver_timeout_ms",
            self.solver_timeout_ms,
            1,
            600_000,
            "Per-query deadline should be at most 10 minutes",
        )?;

        check_range(
            "time_budget_ms",
            self.time_budget_ms,
            0,
            3_600_000,
            "Exploration budget should be at most 1 hour (0 = unlimited)",
        )?;

        check_range("workers", self.workers, 1, 256, "Worker count")?;
        check_range(
            "split_depth",
            self.split_depth,
            1,
            16,
            "Partitioning deeper than 16 levels creates too many subtrees",
        )?;

        if self.enabled_types.is_empty() {
            return Err(ConfigError::Validation(
                "enabled_types must contain at least one symbolic type".to_string(),
            ));
        }

        if self.distributed && self.workers < 2 && self.split_depth > 8 {
            return Err(ConfigError::Conflict {
                issue: "distributed exploration with a single worker and a deep split".to_string(),
                fix: "raise workers or lower split_depth".to_string(),
            });
        }

        if self.report.distributed_stats && !self.distributed {
            return Err(ConfigError::Conflict {
                issue: "distributed_stats requested but distributed is false".to_string(),
                fix: "enable distributed or drop report.distributed_stats".to_string(),
            });
        }

        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "SymbolicConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_presets_validate() {
        for tier in [Tier::Community, Tier::Pro, Tier::Enterprise] {
            let config = SymbolicConfig::from_tier(tier);
            assert!(config.validate().is_ok(), "{} preset must validate", tier);
        }
    }

    #[test]
    fn test_community_is_baseline() {
        let config = SymbolicConfig::default();
        assert_eq!(config.tier, Tier::Community);
        assert_eq!(config.max_paths, 50);
        assert_eq!(config.max_depth, Some(10));
        assert!(!config.type_enabled(SymbolicTypeKind::List));
        assert_eq!(config.prioritizer, PrioritizerKind::SourceOrder);
        assert_eq!(config.report, ReportExtensions::default());
    }

    #[test]
    fn test_enterprise_unbounded_and_distributed() {
        let config = SymbolicConfig::from_tier(Tier::Enterprise);
        assert_eq!(config.max_depth, None);
        assert!(config.distributed);
        assert!(config.type_enabled(SymbolicTypeKind::Object));
        assert!(config.report.distributed_stats);
    }

    #[test]
    fn test_builder_and_range_checks() {
        let config = SymbolicConfig::default().max_paths(0);
        assert!(config.validate().is_err());

        let config = SymbolicConfig::default().max_depth(Some(0));
        assert!(config.validate().is_err());

        let config = SymbolicConfig::default().max_depth(None).max_paths(7);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_paths, 7);
    }

    #[test]
    fn test_distributed_stats_requires_distributed() {
        let config = SymbolicConfig::default().report(ReportExtensions {
            distributed_stats: true,
            ..ReportExtensions::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict { .. })
        ));
    }

    #[test]
    fn test_empty_type_set_rejected() {
        let mut config = SymbolicConfig::default();
        config.enabled_types.clear();
        assert!(config.validate().is_err());
    }
}
