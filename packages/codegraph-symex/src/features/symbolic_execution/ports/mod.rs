//! Ports (interfaces) for symbolic execution

pub mod prioritizer;
pub mod solver;

pub use prioritizer::{ExplorationHistory, PathPrioritizer, WorklistView};
pub use solver::{SolverAdapter, SolverQuery, SolverResult, SolverStats, UnknownReason};
