//! Constraint builder
//!
//! Lowers IR expressions to symbolic expressions against a path's
//! environment. Folding and canonical forms come from the `SymExpr::mk_*`
//! constructors; this module decides what each source construct means.
//!
//! Anything that cannot be modeled becomes a fresh Top and leaves an
//! approximation note on the environment, so the path is reported as
//! approximate instead of the analysis failing.

use std::sync::Arc;

use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::domain::concrete::{self, ConcreteValue};
use crate::features::symbolic_execution::domain::{
    ArithOp, CmpOp, DictKey, ExprRef, Sort, SymDict, SymExpr, SymList, SymbolicEnvironment,
};
use crate::shared::models::{AssignTarget, BinOp, BoolOpKind, CompareOp, Expr, UnaryOp};

/// Builtins with a symbolic model (every other call is opaque)
pub const MODELED_BUILTINS: [&str; 4] = ["abs", "bool", "max", "min"];

#[derive(Debug, Clone, Copy)]
pub struct ConstraintBuilder<'a> {
    config: &'a SymbolicConfig,
}

impl<'a> ConstraintBuilder<'a> {
    pub fn new(config: &'a SymbolicConfig) -> Self {
        Self { config }
    }

    /// Boolean view of a branch or loop condition
    pub fn condition(&self, expr: &Expr, env: &mut SymbolicEnvironment) -> ExprRef {
        SymExpr::mk_truthy(self.build(expr, env))
    }

    pub fn build(&self, expr: &Expr, env: &mut SymbolicEnvironment) -> ExprRef {
        match expr {
            Expr::Int { value } => SymExpr::int(*value),
            Expr::Float { value } => SymExpr::float(*value),
            Expr::Bool { value } => SymExpr::bool(*value),
            Expr::Str { value } => {
                if value.chars().count() > self.config.max_string_length {
                    let note = format!(
                        "string constant longer than {} characters",
                        self.config.max_string_length
                    );
                    tracing::warn!(len = value.chars().count(), "{}", note);
                    env.note_approximation(note);
                }
                SymExpr::str(value.clone())
            }
            Expr::None => SymExpr::null(),
            Expr::Name { id } => match env.lookup(id) {
                Some(value) => value.clone(),
                None => self.top(env, format!("unbound name `{}`", id)),
            },
            Expr::Unary { op, operand } => {
                let value = self.build(operand, env);
                self.unary(*op, value, env)
            }
            Expr::Binary { op, left, right } => {
                let lhs = self.build(left, env);
                let rhs = self.build(right, env);
                self.binary(*op, lhs, rhs, env)
            }
            Expr::Compare { op, left, right } => {
                let lhs = self.build(left, env);
                let rhs = self.build(right, env);
                self.compare(*op, lhs, rhs, env)
            }
            Expr::BoolOp { op, values } => self.bool_op(*op, values, env),
            Expr::Not { operand } => SymExpr::mk_not(self.build(operand, env)),
            Expr::IfExpr { cond, then, orelse } => {
                let cond = self.condition(cond, env);
                let then = self.build(then, env);
                let orelse = self.build(orelse, env);
                SymExpr::mk_ite(cond, then, orelse)
            }
            Expr::Call { func, args } => {
                let args: Vec<ExprRef> = args.iter().map(|a| self.build(a, env)).collect();
                self.call(func, args, env)
            }
            Expr::Len { value } => {
                let value = self.build(value, env);
                self.len(value, env)
            }
            Expr::Index { value, index } => {
                let base = self.build(value, env);
                let index = self.build(index, env);
                self.index(base, index, env)
            }
            Expr::Attribute { value, attr } => {
                let base = self.build(value, env);
                self.attribute(base, attr, env)
            }
            Expr::List { elems } => {
                let elems: Vec<ExprRef> = elems.iter().map(|e| self.build(e, env)).collect();
                list_literal(elems)
            }
            Expr::Dict { entries } => {
                let mut out: Vec<(DictKey, ExprRef)> = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.build(&entry.key, env);
                    let value = self.build(&entry.value, env);
                    let Some(key) = key.as_const().and_then(DictKey::from_value) else {
                        return self.top(env, "dict literal with a non-constant key".to_string());
                    };
                    match out.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key, value)),
                    }
                }
                let value_sort = common_sort(out.iter().map(|(_, v)| v));
                Arc::new(SymExpr::Dict(SymDict {
                    root: None,
                    entries: out,
                    value_sort,
                }))
            }
            Expr::Unsupported { construct } => {
                self.top(env, format!("unsupported construct `{}`", construct))
            }
        }
    }

    /// Store `value` into an assignment target
    pub fn assign(&self, target: &AssignTarget, value: ExprRef, env: &mut SymbolicEnvironment) {
        match target {
            AssignTarget::Name { id } => env.assign(id, value),
            AssignTarget::Index { base, index } => {
                let index = self.build(index, env);
                let updated = match env.lookup(base).cloned() {
                    Some(current) => self.store_index(&current, index, value),
                    None => None,
                };
                let updated = match updated {
                    Some(updated) => updated,
                    None => self.top(env, format!("store into `{}[...]`", base)),
                };
                env.assign(base, updated);
            }
            AssignTarget::Attribute { base, attr } => {
                let updated = match env.lookup(base).map(|e| &**e) {
                    Some(SymExpr::Object(obj)) => {
                        let mut obj = obj.clone();
                        obj.fields.insert(attr.clone(), value);
                        Some(Arc::new(SymExpr::Object(obj)))
                    }
                    _ => None,
                };
                let updated = match updated {
                    Some(updated) => updated,
                    None => self.top(env, format!("store into `{}.{}`", base, attr)),
                };
                env.assign(base, updated);
            }
        }
    }

    fn top(&self, env: &mut SymbolicEnvironment, reason: String) -> ExprRef {
        tracing::warn!(reason = %reason, "value approximated as Top");
        env.fresh_top(reason)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operators
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn unary(&self, op: UnaryOp, value: ExprRef, env: &mut SymbolicEnvironment) -> ExprRef {
        let sort = value.sort();
        match op {
            UnaryOp::Neg => match value.as_const() {
                Some(v) if v.as_int().is_some() && concrete::negate(v).is_none() => {
                    self.top(env, "negation overflows 64-bit integers".into())
                }
                _ => SymExpr::mk_neg(value),
            },
            UnaryOp::Pos => match sort {
                Sort::Int | Sort::Float => value,
                Sort::Bool => SymExpr::mk_arith(ArithOp::Add, SymExpr::int(0), value),
                Sort::Unknown => value,
                _ => SymExpr::undefined(),
            },
            UnaryOp::Invert => {
                if let Some(v) = value.as_const() {
                    return constant_or_undefined(concrete::invert(v));
                }
                match sort {
                    // ~x == -x - 1
                    Sort::Int | Sort::Bool => {
                        SymExpr::mk_arith(ArithOp::Sub, SymExpr::mk_neg(value), SymExpr::int(1))
                    }
                    Sort::Unknown => self.top(env, "bitwise operator on symbolic operand".into()),
                    _ => SymExpr::undefined(),
                }
            }
        }
    }

    fn binary(
        &self,
        op: BinOp,
        lhs: ExprRef,
        rhs: ExprRef,
        env: &mut SymbolicEnvironment,
    ) -> ExprRef {
        if let Some(arith) = ArithOp::from_ir(op) {
            return match (&*lhs, &*rhs) {
                (SymExpr::List(a), SymExpr::List(b)) if arith == ArithOp::Add => {
                    match (literal_len(a), literal_len(b)) {
                        (Some(_), Some(_)) => {
                            list_literal(a.elems.iter().chain(&b.elems).cloned().collect())
                        }
                        _ => self.top(env, "concatenation of symbolic-length lists".into()),
                    }
                }
                _ if is_collection(&lhs) || is_collection(&rhs) => {
                    self.top(env, format!("`{}` on collections", op.symbol()))
                }
                (SymExpr::Const(a), SymExpr::Const(b)) if concrete::int_overflows(arith, a, b) => {
                    self.top(env, format!("`{}` overflows 64-bit integers", op.symbol()))
                }
                _ => SymExpr::mk_arith(arith, lhs, rhs),
            };
        }

        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return constant_or_undefined(concrete::bitwise(op, a, b));
        }
        // Shifts by a constant are exact arithmetic
        let shift = rhs.as_const().and_then(|v| v.as_int()).filter(|k| (0..63).contains(k));
        match (op, shift, lhs.sort()) {
            (BinOp::Shl, Some(k), Sort::Int) => {
                SymExpr::mk_arith(ArithOp::Mul, lhs, SymExpr::int(1 << k))
            }
            (BinOp::Shr, Some(k), Sort::Int) => {
                SymExpr::mk_arith(ArithOp::FloorDiv, lhs, SymExpr::int(1 << k))
            }
            _ => self.top(env, "bitwise operator on symbolic operand".into()),
        }
    }

    fn compare(
        &self,
        op: CompareOp,
        lhs: ExprRef,
        rhs: ExprRef,
        env: &mut SymbolicEnvironment,
    ) -> ExprRef {
        if let Some(cmp) = CmpOp::from_ir(op) {
            return SymExpr::mk_cmp(cmp, lhs, rhs);
        }
        match op {
            CompareOp::In => self.membership(rhs, lhs, env),
            CompareOp::NotIn => SymExpr::mk_not(self.membership(rhs, lhs, env)),
            CompareOp::Is | CompareOp::IsNot => {
                let eq = if op == CompareOp::Is { CmpOp::Eq } else { CmpOp::Ne };
                let is_none = |e: &ExprRef| matches!(e.as_const(), Some(ConcreteValue::Null));
                if is_none(&rhs) || is_none(&lhs) {
                    SymExpr::mk_cmp(eq, lhs, rhs)
                } else {
                    self.top(env, "identity comparison".into())
                }
            }
            _ => self.top(env, format!("comparison `{}`", op_name(op))),
        }
    }

    /// `needle in haystack`
    fn membership(
        &self,
        haystack: ExprRef,
        needle: ExprRef,
        env: &mut SymbolicEnvironment,
    ) -> ExprRef {
        match &*haystack {
            _ if haystack.sort() == Sort::Str => SymExpr::mk_contains(haystack, needle),
            SymExpr::List(list) => {
                let items = list
                    .elems
                    .iter()
                    .enumerate()
                    .map(|(i, elem)| {
                        SymExpr::mk_and(vec![
                            SymExpr::mk_cmp(CmpOp::Gt, list.len.clone(), SymExpr::int(i as i64)),
                            SymExpr::mk_cmp(CmpOp::Eq, elem.clone(), needle.clone()),
                        ])
                    })
                    .collect();
                SymExpr::mk_or(items)
            }
            SymExpr::Dict(dict) => match needle.as_const().and_then(DictKey::from_value) {
                Some(key) => dict_member(dict, &key),
                None => self.top(env, "dict membership with a symbolic key".into()),
            },
            _ => self.top(env, "membership test on an unknown container".into()),
        }
    }

    /// Value-position `and`/`or` return an operand, as at runtime
    fn bool_op(&self, op: BoolOpKind, values: &[Expr], env: &mut SymbolicEnvironment) -> ExprRef {
        let operands: Vec<ExprRef> = values.iter().map(|v| self.build(v, env)).collect();
        if operands.iter().all(|o| o.sort() == Sort::Bool) {
            return match op {
                BoolOpKind::And => SymExpr::mk_and(operands),
                BoolOpKind::Or => SymExpr::mk_or(operands),
            };
        }
        let mut iter = operands.into_iter().rev();
        let Some(mut acc) = iter.next() else {
            return SymExpr::bool(op == BoolOpKind::And);
        };
        for operand in iter {
            let truthy = SymExpr::mk_truthy(operand.clone());
            acc = match op {
                BoolOpKind::And => SymExpr::mk_ite(truthy, acc, operand),
                BoolOpKind::Or => SymExpr::mk_ite(truthy, operand, acc),
            };
        }
        acc
    }

    fn call(&self, func: &str, args: Vec<ExprRef>, env: &mut SymbolicEnvironment) -> ExprRef {
        match (func, args.as_slice()) {
            ("abs", [x]) if x.sort().is_numeric() => SymExpr::mk_ite(
                SymExpr::mk_cmp(CmpOp::Lt, x.clone(), SymExpr::int(0)),
                SymExpr::mk_neg(x.clone()),
                x.clone(),
            ),
            ("bool", [x]) => SymExpr::mk_truthy(x.clone()),
            ("min" | "max", [first, rest @ ..])
                if !rest.is_empty() && args.iter().all(|a| a.sort().is_numeric() || a.sort() == Sort::Str) =>
            {
                // First extreme wins ties
                let better = if func == "min" { CmpOp::Lt } else { CmpOp::Gt };
                rest.iter().fold(first.clone(), |best, next| {
                    SymExpr::mk_ite(
                        SymExpr::mk_cmp(better, next.clone(), best.clone()),
                        next.clone(),
                        best,
                    )
                })
            }
            _ => self.top(env, format!("call to `{}`", func)),
        }
    }

    fn len(&self, value: ExprRef, env: &mut SymbolicEnvironment) -> ExprRef {
        match &*value {
            SymExpr::Dict(dict) if dict.root.is_none() => SymExpr::int(dict.entries.len() as i64),
            SymExpr::Dict(_) => self.top(env, "len of a dict parameter".into()),
            SymExpr::Object(_) => SymExpr::undefined(),
            SymExpr::Top { .. } => self.top(env, "len of an unknown value".into()),
            _ => match value.sort() {
                Sort::Str | Sort::List | Sort::Dict => SymExpr::mk_len(value),
                Sort::Unknown => self.top(env, "len of an unknown value".into()),
                _ => SymExpr::undefined(),
            },
        }
    }

    fn index(&self, base: ExprRef, index: ExprRef, env: &mut SymbolicEnvironment) -> ExprRef {
        match &*base {
            SymExpr::List(list) => list_get(list, &index),
            SymExpr::Dict(dict) => match index.as_const().and_then(DictKey::from_value) {
                Some(key) => dict_get(dict, &key),
                None if dict.root.is_none() => {
                    // Literal dict: choose among its keys
                    dict.entries.iter().rev().fold(SymExpr::undefined(), |rest, (k, v)| {
                        SymExpr::mk_ite(
                            SymExpr::mk_cmp(CmpOp::Eq, index.clone(), SymExpr::constant(k.to_value())),
                            v.clone(),
                            rest,
                        )
                    })
                }
                None => self.top(env, "dict lookup with a symbolic key".into()),
            },
            SymExpr::Const(c) => match index.as_const() {
                Some(i) => constant_or_undefined(concrete::index(c, i)),
                None => self.top(env, "indexing a constant with a symbolic index".into()),
            },
            _ if base.sort() == Sort::Str => self.top(env, "indexing a symbolic string".into()),
            _ => self.top(env, "indexing an unknown value".into()),
        }
    }

    fn attribute(&self, base: ExprRef, attr: &str, env: &mut SymbolicEnvironment) -> ExprRef {
        if let SymExpr::Object(obj) = &*base {
            if let Some(value) = obj.fields.get(attr) {
                return value.clone();
            }
            if let (Some(root), Some(sort)) = (&obj.root, obj.declared.get(attr)) {
                return SymExpr::var(format!("{}.{}", root, attr), *sort);
            }
        }
        self.top(env, format!("attribute `.{}`", attr))
    }

    /// Updated container after `base[index] = value`, if representable
    fn store_index(&self, base: &ExprRef, index: ExprRef, value: ExprRef) -> Option<ExprRef> {
        match &**base {
            SymExpr::List(list) => {
                let n = normalized_index(list, &index)?;
                let in_bounds = bounds_check(list, &n);
                let elems = list
                    .elems
                    .iter()
                    .enumerate()
                    .map(|(i, elem)| {
                        let hit = SymExpr::mk_and(vec![
                            in_bounds.clone(),
                            SymExpr::mk_cmp(CmpOp::Eq, n.clone(), SymExpr::int(i as i64)),
                        ]);
                        SymExpr::mk_ite(hit, value.clone(), elem.clone())
                    })
                    .collect();
                Some(Arc::new(SymExpr::List(SymList {
                    root: list.root.clone(),
                    elems,
                    len: list.len.clone(),
                    elem_sort: list.elem_sort,
                })))
            }
            SymExpr::Dict(dict) => {
                let key = index.as_const().and_then(DictKey::from_value)?;
                let mut dict = dict.clone();
                match dict.entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => dict.entries.push((key, value)),
                }
                Some(Arc::new(SymExpr::Dict(dict)))
            }
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collections
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn list_literal(elems: Vec<ExprRef>) -> ExprRef {
    let elem_sort = common_sort(elems.iter());
    let len = SymExpr::int(elems.len() as i64);
    Arc::new(SymExpr::List(SymList {
        root: None,
        elems,
        len,
        elem_sort,
    }))
}

fn literal_len(list: &SymList) -> Option<i64> {
    list.len.as_const().and_then(|v| v.as_int())
}

fn common_sort<'e>(mut items: impl Iterator<Item = &'e ExprRef>) -> Sort {
    let Some(first) = items.next().map(|e| e.sort()) else {
        return Sort::Unknown;
    };
    if items.all(|e| e.sort() == first) {
        first
    } else {
        Sort::Unknown
    }
}

fn is_collection(e: &ExprRef) -> bool {
    matches!(e.sort(), Sort::List | Sort::Dict | Sort::Object)
}

/// Negative index normalization (`-1` is the last element)
fn normalized_index(list: &SymList, index: &ExprRef) -> Option<ExprRef> {
    if !matches!(index.sort(), Sort::Int | Sort::Bool) {
        return None;
    }
    Some(SymExpr::mk_ite(
        SymExpr::mk_cmp(CmpOp::Lt, index.clone(), SymExpr::int(0)),
        SymExpr::mk_arith(ArithOp::Add, index.clone(), list.len.clone()),
        index.clone(),
    ))
}

fn bounds_check(list: &SymList, n: &ExprRef) -> ExprRef {
    SymExpr::mk_and(vec![
        SymExpr::mk_cmp(CmpOp::Ge, n.clone(), SymExpr::int(0)),
        SymExpr::mk_cmp(CmpOp::Lt, n.clone(), list.len.clone()),
    ])
}

/// `list[index]`; out of range is undefined
fn list_get(list: &SymList, index: &ExprRef) -> ExprRef {
    let Some(n) = normalized_index(list, index) else {
        return SymExpr::undefined();
    };
    let chain = list
        .elems
        .iter()
        .enumerate()
        .rev()
        .fold(SymExpr::undefined(), |rest, (i, elem)| {
            SymExpr::mk_ite(
                SymExpr::mk_cmp(CmpOp::Eq, n.clone(), SymExpr::int(i as i64)),
                elem.clone(),
                rest,
            )
        });
    SymExpr::mk_ite(bounds_check(list, &n), chain, SymExpr::undefined())
}

fn membership_var(root: &str, key: &DictKey) -> ExprRef {
    SymExpr::var(format!("{} in {}", key.repr(), root), Sort::Bool)
}

fn dict_member(dict: &SymDict, key: &DictKey) -> ExprRef {
    if dict.entries.iter().any(|(k, _)| k == key) {
        return SymExpr::bool(true);
    }
    match &dict.root {
        Some(root) => membership_var(root, key),
        None => SymExpr::bool(false),
    }
}

/// `dict[key]`; a missing key is undefined
fn dict_get(dict: &SymDict, key: &DictKey) -> ExprRef {
    if let Some((_, value)) = dict.entries.iter().rev().find(|(k, _)| k == key) {
        return value.clone();
    }
    match &dict.root {
        Some(root) => SymExpr::mk_ite(
            membership_var(root, key),
            SymExpr::var(format!("{}[{}]", root, key.repr()), dict.value_sort),
            SymExpr::undefined(),
        ),
        None => SymExpr::undefined(),
    }
}

fn constant_or_undefined(value: Option<ConcreteValue>) -> ExprRef {
    match value {
        Some(v) => SymExpr::constant(v),
        None => SymExpr::undefined(),
    }
}

fn op_name(op: CompareOp) -> &'static str {
    match op {
        CompareOp::In => "in",
        CompareOp::NotIn => "not in",
        CompareOp::Is => "is",
        CompareOp::IsNot => "is not",
        _ => "compare",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Definedness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const ZERO_DIVISION_ERROR: &str = "ZeroDivisionError";
pub const INDEX_ERROR: &str = "IndexError";
pub const KEY_ERROR: &str = "KeyError";

/// Operation that raises unless `guard` holds
#[derive(Debug, Clone)]
pub struct Fault {
    pub guard: ExprRef,
    pub exception: &'static str,
}

/// Raising operations of `expr` in evaluation order
///
/// Only unconditional guards are collected: nonzero divisors and the guard of
/// an `x if c else undefined` shape (a list bounds check or a dict membership
/// test). Guards under `and`/`or` or inside a two-sided conditional are left
/// to the model check.
pub fn faults(expr: &ExprRef) -> Vec<Fault> {
    let mut out: Vec<Fault> = Vec::new();
    collect_faults(expr, &mut out);
    let mut seen = std::collections::BTreeSet::new();
    out.retain(|f| !f.guard.is_true() && seen.insert(*f.guard.fingerprint().as_bytes()));
    out
}

/// Conditions under which `expr` evaluates without an undefined operation
pub fn definedness_guards(expr: &ExprRef) -> Vec<ExprRef> {
    faults(expr).into_iter().map(|f| f.guard).collect()
}

fn collect_faults(expr: &ExprRef, out: &mut Vec<Fault>) {
    match &**expr {
        SymExpr::Arith { op, lhs, rhs } => {
            collect_faults(lhs, out);
            collect_faults(rhs, out);
            if matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Mod) && !rhs.is_const() {
                out.push(Fault {
                    guard: SymExpr::mk_cmp(CmpOp::Ne, rhs.clone(), SymExpr::int(0)),
                    exception: ZERO_DIVISION_ERROR,
                });
            }
        }
        SymExpr::Ite { cond, then, orelse } => {
            collect_faults(cond, out);
            let exception = lookup_error(cond);
            match (then.is_undefined(), orelse.is_undefined()) {
                (false, true) => {
                    out.push(Fault {
                        guard: cond.clone(),
                        exception,
                    });
                    collect_faults(then, out);
                }
                (true, false) => {
                    out.push(Fault {
                        guard: SymExpr::mk_not(cond.clone()),
                        exception,
                    });
                    collect_faults(orelse, out);
                }
                _ => {}
            }
        }
        SymExpr::Neg(inner) | SymExpr::Truthy(inner) | SymExpr::StrLen(inner) => {
            collect_faults(inner, out)
        }
        SymExpr::Cmp { lhs, rhs, .. } | SymExpr::StrConcat(lhs, rhs) => {
            collect_faults(lhs, out);
            collect_faults(rhs, out);
        }
        SymExpr::StrContains { haystack, needle } => {
            collect_faults(haystack, out);
            collect_faults(needle, out);
        }
        _ => {}
    }
}

/// Dict lookups are guarded by a membership variable, list reads by bounds
fn lookup_error(cond: &ExprRef) -> &'static str {
    match &**cond {
        SymExpr::Var(v) if v.sort == Sort::Bool => KEY_ERROR,
        _ => INDEX_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tier;
    use crate::shared::models::TypeTag;

    fn env_with(params: &[(&str, Sort)]) -> SymbolicEnvironment {
        let mut env = SymbolicEnvironment::new();
        for (name, sort) in params {
            let ty = match sort {
                Sort::Float => TypeTag::Float,
                Sort::Str => TypeTag::Str,
                Sort::Bool => TypeTag::Bool,
                _ => TypeTag::Int,
            };
            env.declare(*name, SymExpr::var(*name, *sort), ty);
        }
        env
    }

    fn built(expr: &Expr, env: &mut SymbolicEnvironment) -> String {
        let config = SymbolicConfig::from_tier(Tier::Community);
        ConstraintBuilder::new(&config).build(expr, env).to_string()
    }

    #[test]
    fn test_negated_int_comparison_flips() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::not(Expr::compare(CompareOp::Gt, Expr::name("x"), Expr::int(10)));
        assert_eq!(built(&e, &mut env), "x <= 10");
    }

    #[test]
    fn test_negated_float_comparison_stays_not() {
        let mut env = env_with(&[("f", Sort::Float)]);
        let e = Expr::not(Expr::compare(CompareOp::Lt, Expr::name("f"), Expr::float(1.5)));
        assert_eq!(built(&e, &mut env), "not (f < 1.5)");
    }

    #[test]
    fn test_constant_folding_and_division_by_zero() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::binary(BinOp::Add, Expr::int(2), Expr::int(3));
        assert_eq!(built(&e, &mut env), "5");
        let e = Expr::binary(BinOp::Div, Expr::name("x"), Expr::int(0));
        assert_eq!(built(&e, &mut env), "undefined");
        let e = Expr::binary(BinOp::Div, Expr::int(-7), Expr::int(2));
        assert_eq!(built(&e, &mut env), "-3");
    }

    #[test]
    fn test_calls_and_identity_are_top() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::compare(CompareOp::Gt, Expr::call("random", vec![]), Expr::int(0));
        assert!(built(&e, &mut env).contains("top#"));
        let e = Expr::compare(CompareOp::Is, Expr::name("x"), Expr::name("x"));
        assert!(built(&e, &mut env).starts_with("top#"));
        assert!(env.is_approximate());

        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::compare(CompareOp::Is, Expr::name("x"), Expr::None);
        assert_eq!(built(&e, &mut env), "False");
        assert!(!env.is_approximate());
    }

    #[test]
    fn test_shift_by_constant_is_arithmetic() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::binary(BinOp::Shl, Expr::name("x"), Expr::int(3));
        assert_eq!(built(&e, &mut env), "x * 8");
        let e = Expr::binary(BinOp::BitAnd, Expr::name("x"), Expr::int(1));
        assert!(built(&e, &mut env).starts_with("top#"));
    }

    #[test]
    fn test_value_position_or_returns_operand() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::or(vec![Expr::name("x"), Expr::int(7)]);
        assert_eq!(built(&e, &mut env), "x if x != 0 else 7");
    }

    #[test]
    fn test_long_string_marks_approximation() {
        let config = SymbolicConfig::from_tier(Tier::Community).max_string_length(4);
        let mut env = env_with(&[("s", Sort::Str)]);
        let e = Expr::compare(CompareOp::Eq, Expr::name("s"), Expr::str("too long"));
        ConstraintBuilder::new(&config).build(&e, &mut env);
        assert!(env.is_approximate());
    }

    #[test]
    fn test_list_literal_indexing_and_membership() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let list = Expr::List {
            elems: vec![Expr::int(1), Expr::int(2), Expr::int(3)],
        };
        let e = Expr::index(list.clone(), Expr::int(-1));
        assert_eq!(built(&e, &mut env), "3");
        let e = Expr::compare(CompareOp::In, Expr::name("x"), list);
        assert_eq!(built(&e, &mut env), "x == 1 or x == 2 or x == 3");
    }

    #[test]
    fn test_dict_parameter_lookup() {
        let mut env = SymbolicEnvironment::new();
        let dict = Arc::new(SymExpr::Dict(SymDict {
            root: Some("d".into()),
            entries: vec![],
            value_sort: Sort::Int,
        }));
        env.declare("d", dict, TypeTag::dict(TypeTag::Str, TypeTag::Int));
        let e = Expr::compare(CompareOp::In, Expr::str("k"), Expr::name("d"));
        assert_eq!(built(&e, &mut env), "\"k\" in d");
        let e = Expr::index(Expr::name("d"), Expr::str("k"));
        assert_eq!(built(&e, &mut env), "d[\"k\"] if \"k\" in d else undefined");
    }

    #[test]
    fn test_assign_into_literal_list() {
        let config = SymbolicConfig::from_tier(Tier::Community);
        let builder = ConstraintBuilder::new(&config);
        let mut env = env_with(&[("x", Sort::Int)]);
        let list = builder.build(
            &Expr::List {
                elems: vec![Expr::int(0), Expr::int(0)],
            },
            &mut env,
        );
        env.assign("xs", list);
        let target = AssignTarget::Index {
            base: "xs".into(),
            index: Expr::int(1),
        };
        builder.assign(&target, SymExpr::var("x", Sort::Int), &mut env);
        assert_eq!(env.lookup("xs").unwrap().to_string(), "[0, x]");
    }

    #[test]
    fn test_builtins() {
        let mut env = env_with(&[("x", Sort::Int), ("y", Sort::Int)]);
        let e = Expr::call("abs", vec![Expr::name("x")]);
        assert_eq!(built(&e, &mut env), "-x if x < 0 else x");
        let e = Expr::call("max", vec![Expr::name("x"), Expr::name("y")]);
        assert_eq!(built(&e, &mut env), "y if y > x else x");
        assert!(!env.is_approximate());
    }

    #[test]
    fn test_constant_overflow_is_approximated() {
        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::unary(UnaryOp::Neg, Expr::int(i64::MIN));
        assert!(built(&e, &mut env).starts_with("top#"));
        let e = Expr::binary(BinOp::Mul, Expr::int(i64::MAX), Expr::int(2));
        assert!(built(&e, &mut env).starts_with("top#"));
        assert!(env.is_approximate());

        let mut env = env_with(&[("x", Sort::Int)]);
        let e = Expr::unary(UnaryOp::Neg, Expr::int(i64::MAX));
        assert_eq!(built(&e, &mut env), (-i64::MAX).to_string());
        assert!(!env.is_approximate());
    }

    #[test]
    fn test_faults_name_their_exception() {
        let config = SymbolicConfig::from_tier(Tier::Pro);
        let builder = ConstraintBuilder::new(&config);
        let mut env = env_with(&[("x", Sort::Int), ("y", Sort::Int)]);
        let e = Expr::compare(
            CompareOp::Gt,
            Expr::binary(BinOp::FloorDiv, Expr::name("x"), Expr::name("y")),
            Expr::int(0),
        );
        let found = faults(&builder.build(&e, &mut env));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].exception, ZERO_DIVISION_ERROR);
        assert_eq!(found[0].guard.to_string(), "y != 0");

        let dict = Arc::new(SymExpr::Dict(SymDict {
            root: Some("d".into()),
            entries: vec![],
            value_sort: Sort::Int,
        }));
        env.declare("d", dict, TypeTag::dict(TypeTag::Str, TypeTag::Int));
        let e = Expr::index(Expr::name("d"), Expr::str("k"));
        let found = faults(&builder.build(&e, &mut env));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].exception, KEY_ERROR);
    }

    #[test]
    fn test_definedness_guards() {
        let mut env = env_with(&[("x", Sort::Int), ("y", Sort::Int)]);
        let e = Expr::binary(BinOp::FloorDiv, Expr::name("x"), Expr::name("y"));
        let value = ConstraintBuilder::new(&SymbolicConfig::default()).build(&e, &mut env);
        let guards: Vec<String> = definedness_guards(&value).iter().map(|g| g.to_string()).collect();
        assert_eq!(guards, vec!["y != 0"]);

        let e = Expr::binary(BinOp::Div, Expr::name("x"), Expr::int(2));
        let value = ConstraintBuilder::new(&SymbolicConfig::default()).build(&e, &mut env);
        assert!(definedness_guards(&value).is_empty());
    }
}
