//! Symbolic execution application layer
//!
//! ```text
//! SymexRequest ──▶ validate config ──▶ lower IR ──▶ AnalysisSession
//!                                                      │
//!                          Explorer / PartitionedExplorer
//!                                                      │
//!                      EquivalenceChecker (optional) ──┤
//!                                                      ▼
//!                        ReportAssembler ──▶ SymbolicExecutionResult
//! ```

pub mod report;
pub mod usecase;

pub use report::ReportAssembler;
pub use usecase::{SymbolicExecutionUseCase, SymbolicExecutionUseCaseImpl, SymexRequest};
