//! Symbolic execution domain models

pub mod concrete;
pub mod environment;
pub mod equivalence;
pub mod path;
pub mod result;
pub mod sym_expr;

pub use concrete::{ConcreteValue, Model};
pub use environment::{Binding, SymbolicEnvironment};
pub use equivalence::{EquivalenceClaim, EquivalenceVerdict};
pub use path::{
    ArmKind, ArmLedger, ArmRecord, BranchLabel, ConcreteOutcome, ExecutionPath, LoopId, NodeId,
    PathArena, PathNode, PathOutcome, PathStatus, SiteId, TruncationReason, RAISE_RANK,
    STATEMENT_SITE,
};
pub use result::{
    ConcolicHint, DistributedStats, PathPriority, PathReport, StateSpaceCoverage,
    SymbolicExecutionResult, TestInput, TypeCoverage, UnreachableBranch,
};
pub use sym_expr::{ArithOp, CmpOp, DictKey, ExprRef, Sort, SymDict, SymExpr, SymList, SymObject, SymVar};
