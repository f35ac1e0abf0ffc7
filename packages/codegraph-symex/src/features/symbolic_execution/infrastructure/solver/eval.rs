//! Three-valued evaluation of symbolic expressions under a model
//!
//! Used to validate candidate models and to compute the outcome a synthesized
//! example should produce. Missing variables and Top evaluate to `Unknown`;
//! undefined operations evaluate to `Undefined`, which satisfies nothing.

use crate::features::symbolic_execution::domain::concrete::{self, ConcreteValue, Model};
use crate::features::symbolic_execution::domain::{ArithOp, DictKey, SymExpr};

#[derive(Debug, Clone, PartialEq)]
pub enum Tri {
    Value(ConcreteValue),
    Undefined,
    Unknown,
}

impl Tri {
    fn from_option(value: Option<ConcreteValue>) -> Self {
        match value {
            Some(v) => Tri::Value(v),
            None => Tri::Undefined,
        }
    }

    /// Truthiness, if decided
    pub fn truth(&self) -> Option<bool> {
        match self {
            Tri::Value(v) => Some(v.truthy()),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<ConcreteValue> {
        match self {
            Tri::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Whether `expr` is known to hold under `model`
pub fn holds(expr: &SymExpr, model: &Model) -> bool {
    eval(expr, model).truth() == Some(true)
}

/// Whether `expr` is known to fail (false or undefined) under `model`
pub fn fails(expr: &SymExpr, model: &Model) -> bool {
    match eval(expr, model) {
        Tri::Value(v) => !v.truthy(),
        Tri::Undefined => true,
        Tri::Unknown => false,
    }
}

pub fn eval(expr: &SymExpr, model: &Model) -> Tri {
    match expr {
        SymExpr::Const(v) => Tri::Value(v.clone()),
        SymExpr::Var(v) => match model.get(&v.name) {
            Some(value) => Tri::Value(value.clone()),
            None => Tri::Unknown,
        },
        SymExpr::Top { .. } => Tri::Unknown,
        SymExpr::Undefined => Tri::Undefined,
        SymExpr::Neg(e) => unary(e, model, concrete::negate),
        SymExpr::Arith { op, lhs, rhs } => binary(lhs, rhs, model, |a, b| concrete::arith(*op, a, b)),
        SymExpr::Cmp { op, lhs, rhs } => binary(lhs, rhs, model, |a, b| {
            concrete::compare(*op, a, b).map(ConcreteValue::Bool)
        }),
        SymExpr::Not(e) => match eval(e, model) {
            Tri::Value(v) => Tri::Value(ConcreteValue::Bool(!v.truthy())),
            other => other,
        },
        SymExpr::And(items) => junction(items, model, true),
        SymExpr::Or(items) => junction(items, model, false),
        SymExpr::Ite { cond, then, orelse } => match eval(cond, model) {
            Tri::Value(v) if v.truthy() => eval(then, model),
            Tri::Value(_) => eval(orelse, model),
            other => other,
        },
        SymExpr::Truthy(e) => match eval(e, model) {
            Tri::Value(v) => Tri::Value(ConcreteValue::Bool(v.truthy())),
            other => other,
        },
        SymExpr::StrLen(e) => unary(e, model, |v| concrete::length(v).map(ConcreteValue::Int)),
        SymExpr::StrConcat(a, b) => {
            binary(a, b, model, |x, y| concrete::arith(ArithOp::Add, x, y))
        }
        SymExpr::StrContains { haystack, needle } => binary(haystack, needle, model, |h, n| {
            concrete::contains(h, n).map(ConcreteValue::Bool)
        }),
        SymExpr::List(list) => {
            let len = match eval(&list.len, model) {
                Tri::Value(v) => match v.as_int() {
                    Some(n) if n >= 0 && (n as usize) <= list.elems.len() => n as usize,
                    _ => return Tri::Undefined,
                },
                other => return other,
            };
            let mut items = Vec::with_capacity(len);
            for elem in &list.elems[..len] {
                match eval(elem, model) {
                    Tri::Value(v) => items.push(v),
                    other => return other,
                }
            }
            Tri::Value(ConcreteValue::List(items))
        }
        SymExpr::Dict(dict) => {
            let mut entries: Vec<(ConcreteValue, ConcreteValue)> = Vec::new();
            if let Some(root) = &dict.root {
                for (key, value) in root_entries(root, model) {
                    entries.push((key.to_value(), value));
                }
            }
            for (key, value) in &dict.entries {
                let value = match eval(value, model) {
                    Tri::Value(v) => v,
                    other => return other,
                };
                let key = key.to_value();
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Tri::Value(ConcreteValue::Dict(entries))
        }
        SymExpr::Object(obj) => {
            let mut fields = std::collections::BTreeMap::new();
            if let Some(root) = &obj.root {
                for (name, sort) in &obj.declared {
                    let value = model
                        .get(&format!("{}.{}", root, name))
                        .cloned()
                        .unwrap_or_else(|| ConcreteValue::default_for(*sort));
                    fields.insert(name.clone(), value);
                }
            }
            for (name, value) in &obj.fields {
                match eval(value, model) {
                    Tri::Value(v) => {
                        fields.insert(name.clone(), v);
                    }
                    other => return other,
                }
            }
            Tri::Value(ConcreteValue::Object(fields))
        }
    }
}

/// Keys a model places in a dictionary parameter, via its membership variables
pub fn root_entries(root: &str, model: &Model) -> Vec<(DictKey, ConcreteValue)> {
    let suffix = format!(" in {}", root);
    let mut out = Vec::new();
    for (name, value) in model {
        let Some(repr) = name.strip_suffix(&suffix) else {
            continue;
        };
        if value.as_bool() != Some(true) {
            continue;
        }
        let Some(key) = DictKey::from_repr(repr) else {
            continue;
        };
        let entry = model
            .get(&format!("{}[{}]", root, repr))
            .cloned()
            .unwrap_or(ConcreteValue::Null);
        out.push((key, entry));
    }
    out
}

fn unary(
    e: &SymExpr,
    model: &Model,
    op: impl FnOnce(&ConcreteValue) -> Option<ConcreteValue>,
) -> Tri {
    match eval(e, model) {
        Tri::Value(v) => Tri::from_option(op(&v)),
        other => other,
    }
}

fn binary(
    lhs: &SymExpr,
    rhs: &SymExpr,
    model: &Model,
    op: impl FnOnce(&ConcreteValue, &ConcreteValue) -> Option<ConcreteValue>,
) -> Tri {
    match (eval(lhs, model), eval(rhs, model)) {
        (Tri::Value(a), Tri::Value(b)) => Tri::from_option(op(&a, &b)),
        (Tri::Undefined, _) | (_, Tri::Undefined) => Tri::Undefined,
        _ => Tri::Unknown,
    }
}

fn junction(items: &[std::sync::Arc<SymExpr>], model: &Model, is_and: bool) -> Tri {
    let mut undefined = false;
    let mut unknown = false;
    for item in items {
        match eval(item, model) {
            Tri::Value(v) if v.truthy() != is_and => return Tri::Value(ConcreteValue::Bool(!is_and)),
            Tri::Value(_) => {}
            Tri::Undefined => undefined = true,
            Tri::Unknown => unknown = true,
        }
    }
    if undefined {
        Tri::Undefined
    } else if unknown {
        Tri::Unknown
    } else {
        Tri::Value(ConcreteValue::Bool(is_and))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_execution::domain::{CmpOp, Sort};

    fn model(pairs: &[(&str, ConcreteValue)]) -> Model {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_eval_comparison() {
        let x = SymExpr::var("x", Sort::Int);
        let gt = SymExpr::mk_cmp(CmpOp::Gt, x, SymExpr::int(10));
        assert!(holds(&gt, &model(&[("x", ConcreteValue::Int(11))])));
        assert!(fails(&gt, &model(&[("x", ConcreteValue::Int(10))])));
        assert_eq!(eval(&gt, &Model::new()), Tri::Unknown);
    }

    #[test]
    fn test_undefined_never_holds() {
        let x = SymExpr::var("x", Sort::Int);
        let div = SymExpr::mk_arith(ArithOp::Div, SymExpr::int(1), x);
        let gt = SymExpr::mk_cmp(CmpOp::Gt, div, SymExpr::int(0));
        let m = model(&[("x", ConcreteValue::Int(0))]);
        assert_eq!(eval(&gt, &m), Tri::Undefined);
        assert!(fails(&gt, &m));
    }

    #[test]
    fn test_top_is_unknown() {
        let top = SymExpr::top(1, "call to f");
        let e = SymExpr::mk_cmp(CmpOp::Eq, top, SymExpr::int(1));
        assert_eq!(eval(&e, &Model::new()), Tri::Unknown);
        // a false conjunct still decides the conjunction
        let both = SymExpr::mk_and(vec![e, SymExpr::var("b", Sort::Bool)]);
        assert!(fails(&both, &model(&[("b", ConcreteValue::Bool(false))])));
    }

    #[test]
    fn test_root_entries() {
        let m = model(&[
            ("\"a\" in d", ConcreteValue::Bool(true)),
            ("d[\"a\"]", ConcreteValue::Int(3)),
            ("\"b\" in d", ConcreteValue::Bool(false)),
        ]);
        assert_eq!(
            root_entries("d", &m),
            vec![(DictKey::Str("a".into()), ConcreteValue::Int(3))]
        );
    }
}
