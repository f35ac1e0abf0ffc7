//! Function IR consumed from language front-ends
//!
//! A front-end normalizes one function into this structured form (statements,
//! expressions, branch and loop nodes, a type tag per parameter) and hands it
//! over as JSON. The engine never parses source text itself.
//!
//! ```json
//! {
//!   "name": "classify",
//!   "params": [{"name": "x", "ty": {"kind": "int"}}],
//!   "body": [
//!     {"kind": "if",
//!      "cond": {"kind": "compare", "op": "gt",
//!               "left": {"kind": "name", "id": "x"},
//!               "right": {"kind": "int", "value": 10}},
//!      "then": [{"kind": "return", "value": {"kind": "str", "value": "high"}}],
//!      "line": 2}
//!   ]
//! }
//! ```

use crate::errors::{Result, SymexError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Declared type of a parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeTag {
    Int,
    /// Fixed-width integer (`bits` in 1..=64)
    SizedInt { bits: u8, signed: bool },
    Bool,
    Float,
    Str,
    #[serde(alias = "none_type")]
    None,
    List { elem: Box<TypeTag> },
    Dict { key: Box<TypeTag>, value: Box<TypeTag> },
    Object { fields: BTreeMap<String, TypeTag> },
    /// Dynamically typed
    Any,
}

impl TypeTag {
    pub fn list(elem: TypeTag) -> Self {
        TypeTag::List {
            elem: Box::new(elem),
        }
    }

    pub fn dict(key: TypeTag, value: TypeTag) -> Self {
        TypeTag::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeTag)>,
        S: Into<String>,
    {
        TypeTag::Object {
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::SizedInt { .. })
    }

    /// Inclusive value range of a fixed-width integer
    pub fn int_range(&self) -> Option<(i64, i64)> {
        match *self {
            TypeTag::SizedInt { bits, signed } => {
                let bits = bits.clamp(1, 64) as u32;
                if signed {
                    if bits == 64 {
                        Some((i64::MIN, i64::MAX))
                    } else {
                        let half = 1i64 << (bits - 1);
                        Some((-half, half - 1))
                    }
                } else if bits >= 63 {
                    Some((0, i64::MAX))
                } else {
                    Some((0, (1i64 << bits) - 1))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Int => write!(f, "int"),
            TypeTag::SizedInt { bits, signed } => {
                write!(f, "{}{}", if *signed { "int" } else { "uint" }, bits)
            }
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Str => write!(f, "str"),
            TypeTag::None => write!(f, "None"),
            TypeTag::List { elem } => write!(f, "list[{}]", elem),
            TypeTag::Dict { key, value } => write!(f, "dict[{}, {}]", key, value),
            TypeTag::Object { fields } => {
                write!(f, "object{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            TypeTag::Any => write!(f, "any"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Truncating on integers, true division on floats
    Div,
    FloorDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOpKind {
    And,
    Or,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expressions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
}

/// Side-effect free expression (calls are opaque)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    Bool {
        value: bool,
    },
    Str {
        value: String,
    },
    None,
    Name {
        id: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOpKind,
        values: Vec<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
    IfExpr {
        cond: Box<Expr>,
        then: Box<Expr>,
        #[serde(rename = "else")]
        orelse: Box<Expr>,
    },
    Call {
        func: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Len {
        value: Box<Expr>,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    List {
        #[serde(default)]
        elems: Vec<Expr>,
    },
    Dict {
        #[serde(default)]
        entries: Vec<DictEntry>,
    },
    Unsupported {
        construct: String,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int { value }
    }

    pub fn float(value: f64) -> Self {
        Expr::Float { value }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool { value }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str {
            value: value.into(),
        }
    }

    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name { id: id.into() }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(values: Vec<Expr>) -> Self {
        Expr::BoolOp {
            op: BoolOpKind::And,
            values,
        }
    }

    pub fn or(values: Vec<Expr>) -> Self {
        Expr::BoolOp {
            op: BoolOpKind::Or,
            values,
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Not {
            operand: Box::new(operand),
        }
    }

    pub fn if_expr(cond: Expr, then: Expr, orelse: Expr) -> Self {
        Expr::IfExpr {
            cond: Box::new(cond),
            then: Box::new(then),
            orelse: Box::new(orelse),
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.into(),
            args,
        }
    }

    pub fn len(value: Expr) -> Self {
        Expr::Len {
            value: Box::new(value),
        }
    }

    pub fn index(value: Expr, index: Expr) -> Self {
        Expr::Index {
            value: Box::new(value),
            index: Box::new(index),
        }
    }

    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Statements
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignTarget {
    Name { id: String },
    Index { base: String, index: Expr },
    Attribute { base: String, attr: String },
}

impl AssignTarget {
    pub fn name(id: impl Into<String>) -> Self {
        AssignTarget::Name { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmtKind {
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    Expr {
        value: Expr,
    },
    If {
        cond: Expr,
        #[serde(default)]
        then: Vec<Stmt>,
        #[serde(default, rename = "else")]
        orelse: Vec<Stmt>,
    },
    While {
        cond: Expr,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    ForRange {
        var: String,
        #[serde(default = "zero")]
        start: Expr,
        stop: Expr,
        #[serde(default = "one")]
        step: Expr,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    ForEach {
        var: String,
        iter: Expr,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Raise {
        exception: String,
    },
    Break,
    Continue,
    Pass,
    Unsupported {
        construct: String,
    },
}

fn zero() -> Expr {
    Expr::int(0)
}

fn one() -> Expr {
    Expr::int(1)
}

/// Statement with its source line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, line: None }
    }

    /// Attach a source line
    pub fn at(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn assign(id: impl Into<String>, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: AssignTarget::name(id),
            value,
        })
    }

    pub fn expr(value: Expr) -> Self {
        Self::new(StmtKind::Expr { value })
    }

    pub fn if_(cond: Expr, then: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If { cond, then, orelse })
    }

    pub fn while_(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::While { cond, body })
    }

    pub fn for_range(var: impl Into<String>, start: Expr, stop: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::ForRange {
            var: var.into(),
            start,
            stop,
            step: Expr::int(1),
            body,
        })
    }

    pub fn for_each(var: impl Into<String>, iter: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::ForEach {
            var: var.into(),
            iter,
            body,
        })
    }

    pub fn ret(value: Expr) -> Self {
        Self::new(StmtKind::Return { value: Some(value) })
    }

    pub fn ret_none() -> Self {
        Self::new(StmtKind::Return { value: None })
    }

    pub fn raise(exception: impl Into<String>) -> Self {
        Self::new(StmtKind::Raise {
            exception: exception.into(),
        })
    }

    pub fn brk() -> Self {
        Self::new(StmtKind::Break)
    }

    pub fn cont() -> Self {
        Self::new(StmtKind::Continue)
    }

    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Function
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default = "any")]
    pub ty: TypeTag,
}

fn any() -> TypeTag {
    TypeTag::Any
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// One normalized function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionIr {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeTag>,
    /// Errors reported by the front-end for a partial result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
}

impl FunctionIr {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            return_type: None,
            parse_errors: Vec::new(),
        }
    }

    /// Deserialize from front-end JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SymexError::parse(e.to_string()))
    }

    pub fn is_partial(&self) -> bool {
        !self.parse_errors.is_empty()
    }

    /// Structural checks the lowering relies on
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SymexError::invalid_ir("function name is empty"));
        }

        let mut seen = HashSet::new();
        for param in &self.params {
            if param.name.is_empty() {
                return Err(SymexError::invalid_ir(format!(
                    "`{}` has a parameter with an empty name",
                    self.name
                )));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(SymexError::invalid_ir(format!(
                    "duplicate parameter `{}` in `{}`",
                    param.name, self.name
                )));
            }
        }

        validate_block(&self.body, 0)
    }

    /// Structural fingerprint ignoring the function name and source lines
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for param in &self.params {
            hasher.update(param.name.as_bytes());
            hasher.update(b":");
            hasher.update(param.ty.to_string().as_bytes());
            hasher.update(b";");
        }
        let body: Vec<StmtKind> = self.body.iter().map(strip_lines).collect();
        // Serializing plain data to a Vec cannot fail
        if let Ok(bytes) = serde_json::to_vec(&body) {
            hasher.update(&bytes);
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn strip_lines(stmt: &Stmt) -> StmtKind {
    let strip_block = |block: &[Stmt]| -> Vec<Stmt> {
        block.iter().map(|s| Stmt::new(strip_lines(s))).collect()
    };
    match &stmt.kind {
        StmtKind::If { cond, then, orelse } => StmtKind::If {
            cond: cond.clone(),
            then: strip_block(then),
            orelse: strip_block(orelse),
        },
        StmtKind::While { cond, body } => StmtKind::While {
            cond: cond.clone(),
            body: strip_block(body),
        },
        StmtKind::ForRange {
            var,
            start,
            stop,
            step,
            body,
        } => StmtKind::ForRange {
            var: var.clone(),
            start: start.clone(),
            stop: stop.clone(),
            step: step.clone(),
            body: strip_block(body),
        },
        StmtKind::ForEach { var, iter, body } => StmtKind::ForEach {
            var: var.clone(),
            iter: iter.clone(),
            body: strip_block(body),
        },
        other => other.clone(),
    }
}

fn validate_block(block: &[Stmt], loop_depth: usize) -> Result<()> {
    for stmt in block {
        let at = stmt
            .line
            .map(|l| format!(" at line {}", l))
            .unwrap_or_default();
        match &stmt.kind {
            StmtKind::Break if loop_depth == 0 => {
                return Err(SymexError::invalid_ir(format!(
                    "`break` outside of a loop{}",
                    at
                )));
            }
            StmtKind::Continue if loop_depth == 0 => {
                return Err(SymexError::invalid_ir(format!(
                    "`continue` outside of a loop{}",
                    at
                )));
            }
            StmtKind::If { then, orelse, .. } => {
                validate_block(then, loop_depth)?;
                validate_block(orelse, loop_depth)?;
            }
            StmtKind::While { body, .. } | StmtKind::ForEach { body, .. } => {
                validate_block(body, loop_depth + 1)?;
            }
            StmtKind::ForRange { step, body, .. } => {
                if matches!(step, Expr::Int { value: 0 }) {
                    return Err(SymexError::invalid_ir(format!(
                        "range step is zero{}",
                        at
                    )));
                }
                validate_block(body, loop_depth + 1)?;
            }
            _ => {}
        }
    }
    Ok(())
}
