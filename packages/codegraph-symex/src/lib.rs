/*
 * Codegraph Symex - Symbolic Execution Engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Front-end IR contract (FunctionIr, Stmt, Expr, TypeTag)
 * - features/    : symbolic_execution (domain / ports / infrastructure / application)
 * - config/      : Tier presets, overrides, YAML I/O
 *
 * Performance:
 * - Rayon work-stealing across partitioned subtrees (enterprise tier)
 * - Lock-free path budget, concurrent query cache
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Explorer forks carry full parent state
#![allow(clippy::type_complexity)] // Ledger keys and trails
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::upper_case_acronyms)] // SAT, IR naming

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models (front-end IR)
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system (tiers, overrides, YAML)
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{ConfigError, SymbolicConfig, Tier, Validatable};
pub use errors::{Result, SymexError};
pub use features::symbolic_execution::{
    EquivalenceClaim, EquivalenceVerdict, PathReport, PathStatus, SymbolicExecutionResult,
    SymbolicExecutionUseCase, SymbolicExecutionUseCaseImpl, SymexRequest, UnreachableBranch,
};
pub use shared::models::FunctionIr;

// ═══════════════════════════════════════════════════════════════════════════
// Convenience API
// ═══════════════════════════════════════════════════════════════════════════

/// Analyze one function with a configuration
///
/// # Example
/// ```rust,ignore
/// let ir = FunctionIr::from_json(&std::fs::read_to_string("classify.json")?)?;
/// let result = codegraph_symex::analyze(ir, SymbolicConfig::from_tier(Tier::Community));
/// assert_eq!(result.paths_explored, 3);
/// ```
pub fn analyze(function: FunctionIr, config: SymbolicConfig) -> SymbolicExecutionResult {
    SymbolicExecutionUseCaseImpl::new().execute(&SymexRequest::new(function, config))
}

/// Compare two functions under a configuration (the first function is also explored)
pub fn prove_equivalence(
    f: FunctionIr,
    g: FunctionIr,
    config: SymbolicConfig,
) -> SymbolicExecutionResult {
    let request = SymexRequest::new(f, config).prove_equivalence(g);
    SymbolicExecutionUseCaseImpl::new().execute(&request)
}
