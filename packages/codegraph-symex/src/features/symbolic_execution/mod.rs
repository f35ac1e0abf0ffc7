//! Symbolic Execution
//!
//! Enumerates the feasible paths of one function from its front-end IR,
//! solves each path condition, and synthesizes a concrete input per path.
//!
//! ## Architecture
//! - Domain: symbolic expressions, environments, path tree, result contract
//! - Ports: `SolverAdapter`, `PathPrioritizer`
//! - Infrastructure: lowering, explorer, native solver, synthesizer, interpreter
//! - Application: `SymbolicExecutionUseCase`, report assembly
//!
//! ## Usage
//! ```rust,ignore
//! use codegraph_symex::config::{SymbolicConfig, Tier};
//! use codegraph_symex::features::symbolic_execution::{
//!     SymbolicExecutionUseCase, SymbolicExecutionUseCaseImpl, SymexRequest,
//! };
//!
//! let request = SymexRequest::new(function_ir, SymbolicConfig::from_tier(Tier::Pro));
//! let result = SymbolicExecutionUseCaseImpl::new().execute(&request);
//! for path in &result.paths {
//!     println!("{}: {:?} -> {}", path.path_id, path.constraints, path.return_value);
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-export application layer
pub use application::{SymbolicExecutionUseCase, SymbolicExecutionUseCaseImpl, SymexRequest};

// Re-exports
pub use domain::{
    EquivalenceClaim, EquivalenceVerdict, PathReport, PathStatus, SymbolicExecutionResult,
    UnreachableBranch,
};
pub use ports::{PathPrioritizer, SolverAdapter, SolverResult};

// Re-export infrastructure (internal use - prefer application layer)
#[doc(hidden)]
pub use infrastructure::{EquivalenceChecker, Explorer};
