//! Test data builders
//!
//! Builder patterns for function IR and requests.

use codegraph_symex::config::{SymbolicConfig, Tier};
use codegraph_symex::shared::models::{
    BinOp, CompareOp, Expr, FunctionIr, Param, Stmt, TypeTag,
};
use codegraph_symex::SymexRequest;

/// Builder for FunctionIr
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    params: Vec<Param>,
    body: Vec<Stmt>,
    parse_errors: Vec<String>,
}

impl FunctionBuilder {
    /// Create a new builder
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            body: Vec::new(),
            parse_errors: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: &str, ty: TypeTag) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    /// Add an int parameter
    pub fn int_param(self, name: &str) -> Self {
        self.param(name, TypeTag::Int)
    }

    /// Append a statement
    pub fn stmt(mut self, stmt: Stmt) -> Self {
        self.body.push(stmt);
        self
    }

    /// Append several statements
    pub fn stmts(mut self, stmts: impl IntoIterator<Item = Stmt>) -> Self {
        self.body.extend(stmts);
        self
    }

    /// Record a front-end parse error (partial IR)
    pub fn parse_error(mut self, error: &str) -> Self {
        self.parse_errors.push(error.to_string());
        self
    }

    /// Build the final FunctionIr
    pub fn build(self) -> FunctionIr {
        let mut function = FunctionIr::new(self.name, self.params, self.body);
        function.parse_errors = self.parse_errors;
        function
    }
}

/// Builder for SymexRequest
#[derive(Debug)]
pub struct RequestBuilder {
    function: FunctionIr,
    other: Option<FunctionIr>,
    config: SymbolicConfig,
}

impl RequestBuilder {
    pub fn new(function: FunctionIr) -> Self {
        Self {
            function,
            other: None,
            config: SymbolicConfig::default(),
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.config = SymbolicConfig::from_tier(tier);
        self
    }

    pub fn config(mut self, f: impl FnOnce(SymbolicConfig) -> SymbolicConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn compare_with(mut self, other: FunctionIr) -> Self {
        self.other = Some(other);
        self
    }

    pub fn build(self) -> SymexRequest {
        let request = SymexRequest::new(self.function, self.config);
        match self.other {
            Some(other) => request.prove_equivalence(other),
            None => request,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expression shorthands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn var(name: &str) -> Expr {
    Expr::name(name)
}

pub fn int(v: i64) -> Expr {
    Expr::int(v)
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    Expr::compare(CompareOp::Gt, lhs, rhs)
}

pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
    Expr::compare(CompareOp::Lt, lhs, rhs)
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    Expr::compare(CompareOp::Eq, lhs, rhs)
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinOp::Add, lhs, rhs)
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinOp::Sub, lhs, rhs)
}
