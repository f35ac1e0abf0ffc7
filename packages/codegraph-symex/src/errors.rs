//! Error types for codegraph-symex
//!
//! Only whole-invocation failures travel as `Err`. Recoverable conditions
//! (unsupported constructs, solver timeouts, exhausted budgets, indeterminate
//! equivalence) are recorded on paths and results instead.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for symbolic execution operations
#[derive(Debug, Error)]
pub enum SymexError {
    /// The front-end IR could not be constructed or deserialized
    #[error("Parse error: {0}")]
    Parse(String),

    /// The IR is structurally invalid (e.g. `break` outside a loop)
    #[error("Invalid IR: {0}")]
    InvalidIr(String),

    /// A construct the engine cannot model (value degrades to Top)
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Solver gave up before its deadline
    #[error("Solver timeout")]
    SolverTimeout,

    /// Solver could not decide the query
    #[error("Solver returned unknown: {0}")]
    SolverUnknown(String),

    /// Path or time budget ran out
    #[error("Exploration budget exhausted")]
    BudgetExhausted,

    /// Equivalence could not be decided
    #[error("Equivalence indeterminate: {0}")]
    EquivalenceIndeterminate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SymexError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        SymexError::Parse(msg.into())
    }

    /// Create an invalid-IR error
    pub fn invalid_ir(msg: impl Into<String>) -> Self {
        SymexError::InvalidIr(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        SymexError::Internal(msg.into())
    }

    /// Whether this error aborts the whole invocation.
    ///
    /// Non-fatal kinds are never surfaced through the result's `error` field.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SymexError::Parse(_)
                | SymexError::InvalidIr(_)
                | SymexError::Config(_)
                | SymexError::Serialization(_)
                | SymexError::Io(_)
                | SymexError::Internal(_)
        )
    }
}

/// Result type alias for symbolic execution operations
pub type Result<T> = std::result::Result<T, SymexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SymexError::parse("bad json").is_fatal());
        assert!(SymexError::invalid_ir("break outside loop").is_fatal());
        assert!(SymexError::internal("arena").is_fatal());

        assert!(!SymexError::SolverTimeout.is_fatal());
        assert!(!SymexError::BudgetExhausted.is_fatal());
        assert!(!SymexError::UnsupportedConstruct("is".into()).is_fatal());
        assert!(!SymexError::EquivalenceIndeterminate("timeout".into()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = SymexError::invalid_ir("`break` outside of a loop");
        assert_eq!(err.to_string(), "Invalid IR: `break` outside of a loop");

        let err = SymexError::SolverUnknown("nonlinear".into());
        assert!(err.to_string().contains("nonlinear"));
    }
}
