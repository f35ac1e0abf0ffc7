//! Shared models

pub mod ir;

pub use ir::{
    AssignTarget, BinOp, BoolOpKind, CompareOp, DictEntry, Expr, FunctionIr, Param, Stmt,
    StmtKind, TypeTag, UnaryOp,
};
