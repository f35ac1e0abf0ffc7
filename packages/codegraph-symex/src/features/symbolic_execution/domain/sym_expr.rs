//! Symbolic expressions
//!
//! Immutable expression trees shared through `Arc`. Paths extend their
//! condition by appending new trees, so a parent's condition is never
//! mutated by a fork.
//!
//! All `mk_*` constructors fold constants with the shared concrete
//! semantics and keep a light canonical form (constants on the right of a
//! comparison, integer comparisons negated by flipping the operator).

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::concrete::{self, format_float, ConcreteValue};
use crate::shared::models::{BinOp, CompareOp};

/// Shared handle to an immutable expression
pub type ExprRef = Arc<SymExpr>;

/// Value sort of a symbolic expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Int,
    Bool,
    Float,
    Str,
    Null,
    List,
    Dict,
    Object,
    Unknown,
}

impl Sort {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Sort::Int | Sort::Bool | Sort::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Int => "int",
            Sort::Bool => "bool",
            Sort::Float => "float",
            Sort::Str => "str",
            Sort::Null => "None",
            Sort::List => "list",
            Sort::Dict => "dict",
            Sort::Object => "object",
            Sort::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl ArithOp {
    pub fn from_ir(op: BinOp) -> Option<Self> {
        match op {
            BinOp::Add => Some(ArithOp::Add),
            BinOp::Sub => Some(ArithOp::Sub),
            BinOp::Mul => Some(ArithOp::Mul),
            BinOp::Div => Some(ArithOp::Div),
            BinOp::FloorDiv => Some(ArithOp::FloorDiv),
            BinOp::Mod => Some(ArithOp::Mod),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::FloorDiv => "//",
            ArithOp::Mod => "%",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            ArithOp::Add | ArithOp::Sub => 5,
            _ => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn from_ir(op: CompareOp) -> Option<Self> {
        match op {
            CompareOp::Eq => Some(CmpOp::Eq),
            CompareOp::Ne => Some(CmpOp::Ne),
            CompareOp::Lt => Some(CmpOp::Lt),
            CompareOp::Le => Some(CmpOp::Le),
            CompareOp::Gt => Some(CmpOp::Gt),
            CompareOp::Ge => Some(CmpOp::Ge),
            _ => None,
        }
    }

    /// Whether `ord` (lhs compared to rhs) satisfies this operator
    pub fn holds(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }

    /// Logical complement over a total order
    pub fn negated(&self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    /// Operator with operands exchanged
    pub fn swapped(&self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => *other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Named solver variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymVar {
    pub name: String,
    pub sort: Sort,
}

impl SymVar {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }
}

/// Bounded list: `elems` holds one slot per possible position, `len` selects the prefix
#[derive(Debug, Clone)]
pub struct SymList {
    /// Parameter the list was created from, if any
    pub root: Option<String>,
    pub elems: Vec<ExprRef>,
    pub len: ExprRef,
    pub elem_sort: Sort,
}

/// Constant dictionary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DictKey {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl DictKey {
    pub fn from_value(value: &ConcreteValue) -> Option<Self> {
        match value {
            ConcreteValue::Int(v) => Some(DictKey::Int(*v)),
            ConcreteValue::Bool(b) => Some(DictKey::Bool(*b)),
            ConcreteValue::Str(s) => Some(DictKey::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> ConcreteValue {
        match self {
            DictKey::Int(v) => ConcreteValue::Int(*v),
            DictKey::Bool(b) => ConcreteValue::Bool(*b),
            DictKey::Str(s) => ConcreteValue::Str(s.clone()),
        }
    }

    /// Rendering used inside variable names (`d["a"]`, `3 in d`)
    pub fn repr(&self) -> String {
        match self {
            DictKey::Str(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s)),
            other => other.to_value().to_string(),
        }
    }

    /// Inverse of `repr`
    pub fn from_repr(repr: &str) -> Option<Self> {
        match repr {
            "True" => Some(DictKey::Bool(true)),
            "False" => Some(DictKey::Bool(false)),
            _ if repr.starts_with('"') => serde_json::from_str(repr).ok().map(DictKey::Str),
            _ => repr.parse().ok().map(DictKey::Int),
        }
    }
}

/// Dictionary: explicit entries over an optional parameter root
///
/// Keys absent from `entries` are looked up lazily through the root's
/// membership and value variables.
#[derive(Debug, Clone)]
pub struct SymDict {
    pub root: Option<String>,
    pub entries: Vec<(DictKey, ExprRef)>,
    pub value_sort: Sort,
}

/// Object field map over an optional parameter root
#[derive(Debug, Clone)]
pub struct SymObject {
    pub root: Option<String>,
    pub fields: BTreeMap<String, ExprRef>,
    /// Declared field sorts of the root (lazy field variables)
    pub declared: BTreeMap<String, Sort>,
}

/// Symbolic expression tree
#[derive(Debug, Clone)]
pub enum SymExpr {
    /// Scalar constant
    Const(ConcreteValue),
    Var(SymVar),
    /// Fully unconstrained value
    Top { id: u64, reason: Arc<str> },
    /// Result of an undefined operation; satisfies no constraint
    Undefined,
    Neg(ExprRef),
    Arith {
        op: ArithOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    Cmp {
        op: CmpOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    Not(ExprRef),
    And(Vec<ExprRef>),
    Or(Vec<ExprRef>),
    Ite {
        cond: ExprRef,
        then: ExprRef,
        orelse: ExprRef,
    },
    /// Truthiness of a value whose sort is unknown
    Truthy(ExprRef),
    StrLen(ExprRef),
    StrConcat(ExprRef, ExprRef),
    StrContains { haystack: ExprRef, needle: ExprRef },
    List(SymList),
    Dict(SymDict),
    Object(SymObject),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constructors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl SymExpr {
    pub fn constant(value: ConcreteValue) -> ExprRef {
        Arc::new(SymExpr::Const(value))
    }

    pub fn int(v: i64) -> ExprRef {
        Self::constant(ConcreteValue::Int(v))
    }

    pub fn float(v: f64) -> ExprRef {
        Self::constant(ConcreteValue::Float(v))
    }

    pub fn bool(b: bool) -> ExprRef {
        Self::constant(ConcreteValue::Bool(b))
    }

    pub fn str(s: impl Into<String>) -> ExprRef {
        Self::constant(ConcreteValue::Str(s.into()))
    }

    pub fn null() -> ExprRef {
        Self::constant(ConcreteValue::Null)
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> ExprRef {
        Arc::new(SymExpr::Var(SymVar::new(name, sort)))
    }

    pub fn top(id: u64, reason: impl Into<Arc<str>>) -> ExprRef {
        Arc::new(SymExpr::Top {
            id,
            reason: reason.into(),
        })
    }

    pub fn undefined() -> ExprRef {
        Arc::new(SymExpr::Undefined)
    }

    pub fn mk_neg(e: ExprRef) -> ExprRef {
        match &*e {
            SymExpr::Const(v) => Self::from_option(concrete::negate(v)),
            SymExpr::Undefined => e,
            SymExpr::Neg(inner) if inner.sort() == Sort::Int => inner.clone(),
            _ => Arc::new(SymExpr::Neg(e)),
        }
    }

    pub fn mk_arith(op: ArithOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        if lhs.is_undefined() || rhs.is_undefined() {
            return Self::undefined();
        }
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Self::from_option(concrete::arith(op, a, b));
        }
        if op == ArithOp::Add && (lhs.sort() == Sort::Str || rhs.sort() == Sort::Str) {
            return Self::mk_concat(lhs, rhs);
        }
        let zero_divisor = matches!(
            rhs.as_const(),
            Some(ConcreteValue::Int(0)) | Some(ConcreteValue::Bool(false))
        ) || matches!(rhs.as_const(), Some(ConcreteValue::Float(f)) if *f == 0.0);
        if zero_divisor && matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Mod) {
            return Self::undefined();
        }
        if lhs.sort() == Sort::Int && rhs.sort() == Sort::Int {
            let zero = |e: &ExprRef| e.as_const().and_then(|v| v.as_int()) == Some(0);
            let one = |e: &ExprRef| e.as_const().and_then(|v| v.as_int()) == Some(1);
            match op {
                ArithOp::Add if zero(&rhs) => return lhs,
                ArithOp::Add if zero(&lhs) => return rhs,
                ArithOp::Sub if zero(&rhs) => return lhs,
                ArithOp::Mul if one(&rhs) => return lhs,
                ArithOp::Mul if one(&lhs) => return rhs,
                ArithOp::Mul if zero(&lhs) || zero(&rhs) => return Self::int(0),
                _ => {}
            }
            if let Some(folded) = Self::fold_offset(op, &lhs, &rhs) {
                return folded;
            }
        }
        Arc::new(SymExpr::Arith { op, lhs, rhs })
    }

    /// `(e ± c1) ± c2` as `e ± c`, keeping the offset's sign in the operator
    fn fold_offset(op: ArithOp, lhs: &ExprRef, rhs: &ExprRef) -> Option<ExprRef> {
        let signed = |op: ArithOp, c: i64| match op {
            ArithOp::Add => Some(c),
            ArithOp::Sub => c.checked_neg(),
            _ => None,
        };
        let outer = signed(op, rhs.as_const()?.as_int()?)?;
        let SymExpr::Arith {
            op: inner_op,
            lhs: base,
            rhs: inner_rhs,
        } = &**lhs
        else {
            return None;
        };
        let inner = signed(*inner_op, inner_rhs.as_const()?.as_int()?)?;
        let total = inner.checked_add(outer)?;
        Some(match total {
            0 => base.clone(),
            t if t > 0 => Arc::new(SymExpr::Arith {
                op: ArithOp::Add,
                lhs: base.clone(),
                rhs: Self::int(t),
            }),
            t => Arc::new(SymExpr::Arith {
                op: ArithOp::Sub,
                lhs: base.clone(),
                rhs: Self::int(t.checked_neg()?),
            }),
        })
    }

    pub fn mk_cmp(op: CmpOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        if lhs.is_undefined() || rhs.is_undefined() {
            return Self::undefined();
        }
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return match concrete::compare(op, a, b) {
                Some(v) => Self::bool(v),
                None => Self::undefined(),
            };
        }

        let (ls, rs) = (lhs.sort(), rhs.sort());
        if ls != Sort::Unknown && rs != Sort::Unknown && ls != rs && !(ls.is_numeric() && rs.is_numeric())
        {
            return match op {
                CmpOp::Eq => Self::bool(false),
                CmpOp::Ne => Self::bool(true),
                _ => Self::undefined(),
            };
        }

        // Self-comparison of a non-float variable
        if let (SymExpr::Var(a), SymExpr::Var(b)) = (&*lhs, &*rhs) {
            if a == b && a.sort != Sort::Float && a.sort != Sort::Unknown {
                return Self::bool(matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge));
            }
        }

        if lhs.is_const() && !rhs.is_const() {
            return Arc::new(SymExpr::Cmp {
                op: op.swapped(),
                lhs: rhs,
                rhs: lhs,
            });
        }
        Arc::new(SymExpr::Cmp { op, lhs, rhs })
    }

    /// Negation; comparisons over totally ordered sorts flip their operator
    pub fn mk_not(e: ExprRef) -> ExprRef {
        match &*e {
            SymExpr::Const(v) => Self::bool(!v.truthy()),
            SymExpr::Undefined => e,
            SymExpr::Not(inner) if inner.sort() == Sort::Bool => inner.clone(),
            SymExpr::Cmp { op, lhs, rhs } => {
                let flippable = matches!(op, CmpOp::Eq | CmpOp::Ne)
                    || (matches!(lhs.sort(), Sort::Int | Sort::Str | Sort::Bool)
                        && lhs.sort() == rhs.sort());
                if flippable {
                    Arc::new(SymExpr::Cmp {
                        op: op.negated(),
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                    })
                } else {
                    Arc::new(SymExpr::Not(e))
                }
            }
            _ => Arc::new(SymExpr::Not(Self::mk_truthy(e))),
        }
    }

    pub fn mk_and(items: Vec<ExprRef>) -> ExprRef {
        Self::mk_junction(items, true)
    }

    pub fn mk_or(items: Vec<ExprRef>) -> ExprRef {
        Self::mk_junction(items, false)
    }

    fn mk_junction(items: Vec<ExprRef>, is_and: bool) -> ExprRef {
        let mut flat: Vec<ExprRef> = Vec::with_capacity(items.len());
        let mut seen = BTreeSet::new();
        for item in items {
            let nested = match (&*item, is_and) {
                (SymExpr::And(children), true) | (SymExpr::Or(children), false) => {
                    children.clone()
                }
                _ => vec![item],
            };
            for child in nested {
                if child.is_undefined() {
                    return Self::undefined();
                }
                if let Some(v) = child.as_const() {
                    if v.truthy() == is_and {
                        continue;
                    }
                    return Self::bool(!is_and);
                }
                if seen.insert(*child.fingerprint().as_bytes()) {
                    flat.push(child);
                }
            }
        }
        match flat.len() {
            0 => Self::bool(is_and),
            1 => flat.pop().unwrap_or_else(|| Self::bool(is_and)),
            _ if is_and => Arc::new(SymExpr::And(flat)),
            _ => Arc::new(SymExpr::Or(flat)),
        }
    }

    pub fn mk_ite(cond: ExprRef, then: ExprRef, orelse: ExprRef) -> ExprRef {
        if cond.is_undefined() {
            return cond;
        }
        if let Some(v) = cond.as_const() {
            return if v.truthy() { then } else { orelse };
        }
        if then.fingerprint() == orelse.fingerprint() {
            return then;
        }
        Arc::new(SymExpr::Ite {
            cond: Self::mk_truthy(cond),
            then,
            orelse,
        })
    }

    /// Boolean view of any value
    pub fn mk_truthy(e: ExprRef) -> ExprRef {
        if let Some(v) = e.as_const() {
            return Self::bool(v.truthy());
        }
        match e.sort() {
            Sort::Bool => e,
            Sort::Int => Self::mk_cmp(CmpOp::Ne, e, Self::int(0)),
            Sort::Float => Self::mk_cmp(CmpOp::Ne, e, Self::float(0.0)),
            Sort::Str => Self::mk_cmp(CmpOp::Ne, Self::mk_len(e), Self::int(0)),
            Sort::Null => Self::bool(false),
            Sort::Object => Self::bool(true),
            Sort::List => match &*e {
                SymExpr::List(list) => Self::mk_cmp(CmpOp::Ne, list.len.clone(), Self::int(0)),
                _ => Arc::new(SymExpr::Truthy(e)),
            },
            Sort::Dict => match &*e {
                SymExpr::Dict(dict) if dict.root.is_none() => Self::bool(!dict.entries.is_empty()),
                SymExpr::Dict(dict) if !dict.entries.is_empty() => Self::bool(true),
                _ => Arc::new(SymExpr::Truthy(e)),
            },
            Sort::Unknown => {
                if e.is_undefined() {
                    e
                } else {
                    Arc::new(SymExpr::Truthy(e))
                }
            }
        }
    }

    /// `len` of a string or list
    pub fn mk_len(e: ExprRef) -> ExprRef {
        match &*e {
            SymExpr::Const(v) => match concrete::length(v) {
                Some(n) => Self::int(n),
                None => Self::undefined(),
            },
            SymExpr::List(list) => list.len.clone(),
            SymExpr::StrConcat(a, b) => Self::mk_arith(
                ArithOp::Add,
                Self::mk_len(a.clone()),
                Self::mk_len(b.clone()),
            ),
            SymExpr::Undefined => e,
            _ => Arc::new(SymExpr::StrLen(e)),
        }
    }

    pub fn mk_concat(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let empty = |e: &ExprRef| matches!(e.as_const(), Some(ConcreteValue::Str(s)) if s.is_empty());
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Self::from_option(concrete::arith(ArithOp::Add, a, b));
        }
        if empty(&lhs) && rhs.sort() == Sort::Str {
            return rhs;
        }
        if empty(&rhs) && lhs.sort() == Sort::Str {
            return lhs;
        }
        if lhs.is_undefined() || rhs.is_undefined() {
            return Self::undefined();
        }
        Arc::new(SymExpr::StrConcat(lhs, rhs))
    }

    /// `needle in haystack` for strings
    pub fn mk_contains(haystack: ExprRef, needle: ExprRef) -> ExprRef {
        if let (Some(h), Some(n)) = (haystack.as_const(), needle.as_const()) {
            return match concrete::contains(h, n) {
                Some(v) => Self::bool(v),
                None => Self::undefined(),
            };
        }
        if matches!(needle.as_const(), Some(ConcreteValue::Str(s)) if s.is_empty()) {
            return Self::bool(true);
        }
        Arc::new(SymExpr::StrContains { haystack, needle })
    }

    /// Rebuild `e` with `f` applied to every direct child, refolding on the way
    pub fn map_children(e: &ExprRef, f: &mut dyn FnMut(&ExprRef) -> ExprRef) -> ExprRef {
        match &**e {
            SymExpr::Const(_) | SymExpr::Var(_) | SymExpr::Top { .. } | SymExpr::Undefined => {
                e.clone()
            }
            SymExpr::Neg(a) => Self::mk_neg(f(a)),
            SymExpr::Arith { op, lhs, rhs } => Self::mk_arith(*op, f(lhs), f(rhs)),
            SymExpr::Cmp { op, lhs, rhs } => Self::mk_cmp(*op, f(lhs), f(rhs)),
            SymExpr::Not(a) => Self::mk_not(f(a)),
            SymExpr::And(items) => Self::mk_and(items.iter().map(|i| f(i)).collect()),
            SymExpr::Or(items) => Self::mk_or(items.iter().map(|i| f(i)).collect()),
            SymExpr::Ite { cond, then, orelse } => Self::mk_ite(f(cond), f(then), f(orelse)),
            SymExpr::Truthy(a) => Self::mk_truthy(f(a)),
            SymExpr::StrLen(a) => Self::mk_len(f(a)),
            SymExpr::StrConcat(a, b) => Self::mk_concat(f(a), f(b)),
            SymExpr::StrContains { haystack, needle } => Self::mk_contains(f(haystack), f(needle)),
            SymExpr::List(list) => Arc::new(SymExpr::List(SymList {
                root: list.root.clone(),
                elems: list.elems.iter().map(|i| f(i)).collect(),
                len: f(&list.len),
                elem_sort: list.elem_sort,
            })),
            SymExpr::Dict(dict) => Arc::new(SymExpr::Dict(SymDict {
                root: dict.root.clone(),
                entries: dict.entries.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
                value_sort: dict.value_sort,
            })),
            SymExpr::Object(obj) => Arc::new(SymExpr::Object(SymObject {
                root: obj.root.clone(),
                fields: obj.fields.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
                declared: obj.declared.clone(),
            })),
        }
    }

    /// Replace variables by name
    pub fn substitute(e: &ExprRef, map: &BTreeMap<String, ExprRef>) -> ExprRef {
        if map.is_empty() {
            return e.clone();
        }
        match &**e {
            SymExpr::Var(v) => map.get(&v.name).cloned().unwrap_or_else(|| e.clone()),
            _ => Self::map_children(e, &mut |c| Self::substitute(c, map)),
        }
    }

    fn from_option(value: Option<ConcreteValue>) -> ExprRef {
        match value {
            Some(v) => Self::constant(v),
            None => Self::undefined(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl SymExpr {
    pub fn sort(&self) -> Sort {
        match self {
            SymExpr::Const(v) => v.sort(),
            SymExpr::Var(v) => v.sort,
            SymExpr::Top { .. } | SymExpr::Undefined => Sort::Unknown,
            SymExpr::Neg(e) => match e.sort() {
                Sort::Bool => Sort::Int,
                other => other,
            },
            SymExpr::Arith { lhs, rhs, .. } => match (lhs.sort(), rhs.sort()) {
                (Sort::Float, r) if r.is_numeric() => Sort::Float,
                (l, Sort::Float) if l.is_numeric() => Sort::Float,
                (l, r) if l.is_numeric() && r.is_numeric() => Sort::Int,
                (Sort::Str, _) | (_, Sort::Str) => Sort::Str,
                _ => Sort::Unknown,
            },
            SymExpr::Cmp { .. }
            | SymExpr::Not(_)
            | SymExpr::And(_)
            | SymExpr::Or(_)
            | SymExpr::Truthy(_)
            | SymExpr::StrContains { .. } => Sort::Bool,
            SymExpr::Ite { then, orelse, .. } => {
                let (a, b) = (then.sort(), orelse.sort());
                if a == b || orelse.is_undefined() {
                    a
                } else if then.is_undefined() {
                    b
                } else {
                    Sort::Unknown
                }
            }
            SymExpr::StrLen(_) => Sort::Int,
            SymExpr::StrConcat(..) => Sort::Str,
            SymExpr::List(_) => Sort::List,
            SymExpr::Dict(_) => Sort::Dict,
            SymExpr::Object(_) => Sort::Object,
        }
    }

    pub fn as_const(&self) -> Option<&ConcreteValue> {
        match self {
            SymExpr::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, SymExpr::Const(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, SymExpr::Undefined)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SymExpr::Const(ConcreteValue::Bool(true)))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, SymExpr::Const(ConcreteValue::Bool(false)))
    }

    /// Direct children, in a fixed order
    pub fn children(&self) -> Vec<&ExprRef> {
        match self {
            SymExpr::Const(_) | SymExpr::Var(_) | SymExpr::Top { .. } | SymExpr::Undefined => {
                Vec::new()
            }
            SymExpr::Neg(e) | SymExpr::Not(e) | SymExpr::Truthy(e) | SymExpr::StrLen(e) => {
                vec![e]
            }
            SymExpr::Arith { lhs, rhs, .. } | SymExpr::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            SymExpr::StrConcat(a, b) => vec![a, b],
            SymExpr::StrContains { haystack, needle } => vec![haystack, needle],
            SymExpr::And(items) | SymExpr::Or(items) => items.iter().collect(),
            SymExpr::Ite { cond, then, orelse } => vec![cond, then, orelse],
            SymExpr::List(list) => {
                let mut out: Vec<&ExprRef> = list.elems.iter().collect();
                out.push(&list.len);
                out
            }
            SymExpr::Dict(dict) => dict.entries.iter().map(|(_, v)| v).collect(),
            SymExpr::Object(obj) => obj.fields.values().collect(),
        }
    }

    pub fn contains_undefined(&self) -> bool {
        match self {
            SymExpr::Undefined => true,
            _ => self.children().into_iter().any(|c| c.contains_undefined()),
        }
    }

    pub fn contains_top(&self) -> bool {
        match self {
            SymExpr::Top { .. } => true,
            _ => self.children().into_iter().any(|c| c.contains_top()),
        }
    }

    /// Reasons of every Top below this node
    pub fn top_reasons(&self, out: &mut BTreeSet<String>) {
        match self {
            SymExpr::Top { reason, .. } => {
                out.insert(reason.to_string());
            }
            _ => {
                for child in self.children() {
                    child.top_reasons(out);
                }
            }
        }
    }

    pub fn free_vars(&self, out: &mut BTreeSet<SymVar>) {
        match self {
            SymExpr::Var(v) => {
                out.insert(v.clone());
            }
            _ => {
                for child in self.children() {
                    child.free_vars(out);
                }
            }
        }
    }

    /// Structural hash (blake3); equal trees always share a fingerprint
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize()
    }

    pub fn hash_into(&self, h: &mut blake3::Hasher) {
        match self {
            SymExpr::Const(v) => {
                h.update(&[0]);
                hash_value(v, h);
            }
            SymExpr::Var(v) => {
                h.update(&[1, v.sort as u8]);
                hash_str(&v.name, h);
            }
            SymExpr::Top { id, .. } => {
                h.update(&[2]);
                h.update(&id.to_le_bytes());
            }
            SymExpr::Undefined => {
                h.update(&[3]);
            }
            SymExpr::Neg(e) => {
                h.update(&[4]);
                e.hash_into(h);
            }
            SymExpr::Arith { op, lhs, rhs } => {
                h.update(&[5, *op as u8]);
                lhs.hash_into(h);
                rhs.hash_into(h);
            }
            SymExpr::Cmp { op, lhs, rhs } => {
                h.update(&[6, *op as u8]);
                lhs.hash_into(h);
                rhs.hash_into(h);
            }
            SymExpr::Not(e) => {
                h.update(&[7]);
                e.hash_into(h);
            }
            SymExpr::And(items) | SymExpr::Or(items) => {
                h.update(&[if matches!(self, SymExpr::And(_)) { 8 } else { 9 }]);
                h.update(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.hash_into(h);
                }
            }
            SymExpr::Ite { cond, then, orelse } => {
                h.update(&[10]);
                cond.hash_into(h);
                then.hash_into(h);
                orelse.hash_into(h);
            }
            SymExpr::Truthy(e) => {
                h.update(&[11]);
                e.hash_into(h);
            }
            SymExpr::StrLen(e) => {
                h.update(&[12]);
                e.hash_into(h);
            }
            SymExpr::StrConcat(a, b) => {
                h.update(&[13]);
                a.hash_into(h);
                b.hash_into(h);
            }
            SymExpr::StrContains { haystack, needle } => {
                h.update(&[14]);
                haystack.hash_into(h);
                needle.hash_into(h);
            }
            SymExpr::List(list) => {
                h.update(&[15, list.elem_sort as u8]);
                hash_str(list.root.as_deref().unwrap_or(""), h);
                h.update(&(list.elems.len() as u64).to_le_bytes());
                for e in &list.elems {
                    e.hash_into(h);
                }
                list.len.hash_into(h);
            }
            SymExpr::Dict(dict) => {
                h.update(&[16, dict.value_sort as u8]);
                hash_str(dict.root.as_deref().unwrap_or(""), h);
                h.update(&(dict.entries.len() as u64).to_le_bytes());
                for (k, v) in &dict.entries {
                    hash_str(&k.repr(), h);
                    v.hash_into(h);
                }
            }
            SymExpr::Object(obj) => {
                h.update(&[17]);
                hash_str(obj.root.as_deref().unwrap_or(""), h);
                h.update(&(obj.fields.len() as u64).to_le_bytes());
                for (k, v) in &obj.fields {
                    hash_str(k, h);
                    v.hash_into(h);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            SymExpr::Ite { .. } => 0,
            SymExpr::Or(_) => 1,
            SymExpr::And(_) => 2,
            SymExpr::Not(_) => 3,
            SymExpr::Cmp { .. } | SymExpr::StrContains { .. } => 4,
            SymExpr::StrConcat(..) => 5,
            SymExpr::Arith { op, .. } => op.precedence(),
            SymExpr::Neg(_) => 7,
            SymExpr::Const(ConcreteValue::Int(v)) if *v < 0 => 7,
            _ => 8,
        }
    }
}

fn hash_str(s: &str, h: &mut blake3::Hasher) {
    h.update(&(s.len() as u64).to_le_bytes());
    h.update(s.as_bytes());
}

fn hash_value(v: &ConcreteValue, h: &mut blake3::Hasher) {
    match v {
        ConcreteValue::Null => {
            h.update(&[0]);
        }
        ConcreteValue::Bool(b) => {
            h.update(&[1, *b as u8]);
        }
        ConcreteValue::Int(i) => {
            h.update(&[2]);
            h.update(&i.to_le_bytes());
        }
        ConcreteValue::Float(f) => {
            h.update(&[3]);
            h.update(&f.to_bits().to_le_bytes());
        }
        ConcreteValue::Str(s) => {
            h.update(&[4]);
            hash_str(s, h);
        }
        other => {
            h.update(&[5]);
            hash_str(&other.to_string(), h);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Wrapped<'a>(&'a SymExpr, u8);

impl fmt::Display for Wrapped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.precedence() < self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[ExprRef], sep: &str, min: u8) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", Wrapped(item, min))?;
    }
    Ok(())
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Const(ConcreteValue::Float(v)) => f.write_str(&format_float(*v)),
            SymExpr::Const(v) => write!(f, "{}", v),
            SymExpr::Var(v) => f.write_str(&v.name),
            SymExpr::Top { id, .. } => write!(f, "top#{}", id),
            SymExpr::Undefined => f.write_str("undefined"),
            SymExpr::Neg(e) => write!(f, "-{}", Wrapped(e, 7)),
            SymExpr::Arith { op, lhs, rhs } => {
                let p = op.precedence();
                write!(f, "{} {} {}", Wrapped(lhs, p), op.symbol(), Wrapped(rhs, p + 1))
            }
            SymExpr::Cmp { op, lhs, rhs } => {
                write!(f, "{} {} {}", Wrapped(lhs, 5), op.symbol(), Wrapped(rhs, 5))
            }
            SymExpr::Not(e) => write!(f, "not {}", Wrapped(e, 5)),
            SymExpr::And(items) => join(f, items, " and ", 3),
            SymExpr::Or(items) => join(f, items, " or ", 2),
            SymExpr::Ite { cond, then, orelse } => {
                write!(f, "{} if {} else {}", Wrapped(then, 1), Wrapped(cond, 1), Wrapped(orelse, 0))
            }
            SymExpr::Truthy(e) => write!(f, "bool({})", e),
            SymExpr::StrLen(e) => write!(f, "len({})", e),
            SymExpr::StrConcat(a, b) => write!(f, "{} + {}", Wrapped(a, 5), Wrapped(b, 6)),
            SymExpr::StrContains { haystack, needle } => {
                write!(f, "{} in {}", Wrapped(needle, 5), Wrapped(haystack, 5))
            }
            SymExpr::List(list) => match &list.root {
                Some(root) => f.write_str(root),
                None => {
                    write!(f, "[")?;
                    join(f, &list.elems, ", ", 1)?;
                    write!(f, "]")
                }
            },
            SymExpr::Dict(dict) => match (&dict.root, dict.entries.is_empty()) {
                (Some(root), true) => f.write_str(root),
                (root, _) => {
                    write!(f, "{{")?;
                    for (i, (k, v)) in dict.entries.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {}", k.repr(), v)?;
                    }
                    if let Some(root) = root {
                        write!(f, ", **{}", root)?;
                    }
                    write!(f, "}}")
                }
            },
            SymExpr::Object(obj) => match (&obj.root, obj.fields.is_empty()) {
                (Some(root), true) => f.write_str(root),
                _ => {
                    write!(f, "object(")?;
                    for (i, (k, v)) in obj.fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}={}", k, v)?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}
