//! Concrete values and their operational semantics
//!
//! One set of rules is shared by constant folding, three-valued model
//! evaluation and the concrete interpreter, so a solver model and a replayed
//! execution can never disagree about what `7 // -2` means.
//!
//! Every operation returns `None` for an undefined result (division by zero,
//! overflow, out-of-range index, ordering across unrelated types).

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::sym_expr::{ArithOp, CmpOp, Sort};
use crate::shared::models::BinOp;

/// Source-level value
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConcreteValue>),
    /// Insertion-ordered entries
    Dict(Vec<(ConcreteValue, ConcreteValue)>),
    Object(BTreeMap<String, ConcreteValue>),
}

/// Solver-level assignment, keyed by symbolic variable name
pub type Model = BTreeMap<String, ConcreteValue>;

impl ConcreteValue {
    pub fn sort(&self) -> Sort {
        match self {
            ConcreteValue::Null => Sort::Null,
            ConcreteValue::Bool(_) => Sort::Bool,
            ConcreteValue::Int(_) => Sort::Int,
            ConcreteValue::Float(_) => Sort::Float,
            ConcreteValue::Str(_) => Sort::Str,
            ConcreteValue::List(_) => Sort::List,
            ConcreteValue::Dict(_) => Sort::Dict,
            ConcreteValue::Object(_) => Sort::Object,
        }
    }

    /// Documented default for a truly free variable of `sort`
    pub fn default_for(sort: Sort) -> Self {
        match sort {
            Sort::Int => ConcreteValue::Int(0),
            Sort::Bool => ConcreteValue::Bool(false),
            Sort::Float => ConcreteValue::Float(0.0),
            Sort::Str => ConcreteValue::Str(String::new()),
            Sort::List => ConcreteValue::List(Vec::new()),
            Sort::Dict => ConcreteValue::Dict(Vec::new()),
            Sort::Object => ConcreteValue::Object(BTreeMap::new()),
            Sort::Null | Sort::Unknown => ConcreteValue::Null,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ConcreteValue::List(_) | ConcreteValue::Dict(_) | ConcreteValue::Object(_)
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConcreteValue::Int(v) => Some(*v),
            ConcreteValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConcreteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            ConcreteValue::Int(v) => Some(Number::Int(*v)),
            ConcreteValue::Bool(b) => Some(Number::Int(*b as i64)),
            ConcreteValue::Float(v) => Some(Number::Float(*v)),
            _ => None,
        }
    }

    /// Source-level truthiness (zero and empty values are false)
    pub fn truthy(&self) -> bool {
        match self {
            ConcreteValue::Null => false,
            ConcreteValue::Bool(b) => *b,
            ConcreteValue::Int(v) => *v != 0,
            ConcreteValue::Float(v) => *v != 0.0,
            ConcreteValue::Str(s) => !s.is_empty(),
            ConcreteValue::List(items) => !items.is_empty(),
            ConcreteValue::Dict(entries) => !entries.is_empty(),
            ConcreteValue::Object(_) => true,
        }
    }

    /// Structural equality used for return-value and membership checks
    ///
    /// Unlike `==` on floats, two NaNs are the same outcome.
    pub fn same_outcome(&self, other: &ConcreteValue) -> bool {
        match (self, other) {
            (ConcreteValue::Float(a), ConcreteValue::Float(b)) if a.is_nan() && b.is_nan() => {
                true
            }
            (ConcreteValue::List(a), ConcreteValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_outcome(y))
            }
            _ => compare(CmpOp::Eq, self, other) == Some(true),
        }
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Binary arithmetic
pub fn arith(op: ArithOp, lhs: &ConcreteValue, rhs: &ConcreteValue) -> Option<ConcreteValue> {
    use ConcreteValue as V;

    match (lhs, rhs) {
        (V::Str(a), V::Str(b)) if op == ArithOp::Add => return Some(V::Str(format!("{}{}", a, b))),
        (V::List(a), V::List(b)) if op == ArithOp::Add => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            return Some(V::List(out));
        }
        (V::Str(s), n) | (n, V::Str(s)) if op == ArithOp::Mul => {
            let times = n.as_int()?;
            if times <= 0 {
                return Some(V::Str(String::new()));
            }
            let total = s.len().checked_mul(times as usize)?;
            if total > 1 << 16 {
                return None;
            }
            return Some(V::Str(s.repeat(times as usize)));
        }
        _ => {}
    }

    match (lhs.as_number()?, rhs.as_number()?) {
        (Number::Int(a), Number::Int(b)) => int_arith(op, a, b).map(V::Int),
        (a, b) => float_arith(op, a.to_f64(), b.to_f64()).map(V::Float),
    }
}

/// Division or modulo by a numeric zero
pub fn divides_by_zero(op: ArithOp, rhs: &ConcreteValue) -> bool {
    matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Mod)
        && rhs.as_number().is_some_and(|n| n.to_f64() == 0.0)
}

/// Integer operation whose exact result does not fit in 64 bits
pub fn int_overflows(op: ArithOp, lhs: &ConcreteValue, rhs: &ConcreteValue) -> bool {
    match (lhs.as_int(), rhs.as_int()) {
        (Some(a), Some(b)) => !divides_by_zero(op, rhs) && int_arith(op, a, b).is_none(),
        _ => false,
    }
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> Option<i64> {
    match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => a.checked_div(b),
        ArithOp::FloorDiv => {
            let q = a.checked_div(b)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q.checked_sub(1)
            } else {
                Some(q)
            }
        }
        ArithOp::Mod => a.checked_rem(b),
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Option<f64> {
    match op {
        ArithOp::Add => Some(a + b),
        ArithOp::Sub => Some(a - b),
        ArithOp::Mul => Some(a * b),
        ArithOp::Div if b == 0.0 => None,
        ArithOp::Div => Some(a / b),
        ArithOp::FloorDiv if b == 0.0 => None,
        ArithOp::FloorDiv => Some((a / b).floor()),
        ArithOp::Mod if b == 0.0 => None,
        ArithOp::Mod => Some(a % b),
    }
}

/// Bitwise operators on integers (`bool op bool` stays a bool for `& | ^`)
pub fn bitwise(op: BinOp, lhs: &ConcreteValue, rhs: &ConcreteValue) -> Option<ConcreteValue> {
    if let (ConcreteValue::Bool(a), ConcreteValue::Bool(b)) = (lhs, rhs) {
        match op {
            BinOp::BitAnd => return Some(ConcreteValue::Bool(a & b)),
            BinOp::BitOr => return Some(ConcreteValue::Bool(a | b)),
            BinOp::BitXor => return Some(ConcreteValue::Bool(a ^ b)),
            _ => {}
        }
    }
    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    let value = match op {
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl => {
            if !(0..63).contains(&b) {
                return None;
            }
            a.checked_mul(1i64 << b)?
        }
        BinOp::Shr => {
            if b < 0 {
                return None;
            }
            a >> b.min(63)
        }
        _ => return None,
    };
    Some(ConcreteValue::Int(value))
}

/// `~v`
pub fn invert(value: &ConcreteValue) -> Option<ConcreteValue> {
    value.as_int().map(|v| ConcreteValue::Int(!v))
}

/// Unary minus
pub fn negate(value: &ConcreteValue) -> Option<ConcreteValue> {
    match value.as_number()? {
        Number::Int(v) => v.checked_neg().map(ConcreteValue::Int),
        Number::Float(v) => Some(ConcreteValue::Float(-v)),
    }
}

/// Comparison with IEEE-754 ordering for floats
///
/// Values of unrelated types are never equal and have no ordering.
pub fn compare(op: CmpOp, lhs: &ConcreteValue, rhs: &ConcreteValue) -> Option<bool> {
    use ConcreteValue as V;

    let ordering: Option<Ordering> = match (lhs, rhs) {
        (V::Null, V::Null) => Some(Ordering::Equal),
        (V::Str(a), V::Str(b)) => Some(a.cmp(b)),
        (V::List(a), V::List(b)) => return compare_lists(op, a, b),
        (V::Dict(_), V::Dict(_)) | (V::Object(_), V::Object(_)) => {
            return match op {
                CmpOp::Eq => Some(lhs == rhs),
                CmpOp::Ne => Some(lhs != rhs),
                _ => None,
            };
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => {
                // NaN is unordered with everything, including itself
                match a.to_f64().partial_cmp(&b.to_f64()) {
                    Some(ord) => Some(ord),
                    None => return Some(op == CmpOp::Ne),
                }
            }
            _ => {
                return match op {
                    CmpOp::Eq => Some(false),
                    CmpOp::Ne => Some(true),
                    _ => None,
                };
            }
        },
    };

    ordering.map(|ord| op.holds(ord))
}

fn compare_lists(op: CmpOp, a: &[ConcreteValue], b: &[ConcreteValue]) -> Option<bool> {
    for (x, y) in a.iter().zip(b) {
        if compare(CmpOp::Eq, x, y)? {
            continue;
        }
        return match op {
            CmpOp::Eq => Some(false),
            CmpOp::Ne => Some(true),
            _ => {
                if compare(CmpOp::Lt, x, y)? {
                    Some(op.holds(Ordering::Less))
                } else {
                    Some(op.holds(Ordering::Greater))
                }
            }
        };
    }
    Some(op.holds(a.len().cmp(&b.len())))
}

/// `item in container`
pub fn contains(container: &ConcreteValue, item: &ConcreteValue) -> Option<bool> {
    match (container, item) {
        (ConcreteValue::Str(hay), ConcreteValue::Str(needle)) => Some(hay.contains(needle.as_str())),
        (ConcreteValue::List(items), _) => Some(items.iter().any(|x| x.same_outcome(item))),
        (ConcreteValue::Dict(entries), _) => Some(entries.iter().any(|(k, _)| k.same_outcome(item))),
        _ => None,
    }
}

/// `container[index]` with negative indexing from the end
pub fn index(container: &ConcreteValue, idx: &ConcreteValue) -> Option<ConcreteValue> {
    match container {
        ConcreteValue::List(items) => {
            let i = normalize_index(idx.as_int()?, items.len())?;
            items.get(i).cloned()
        }
        ConcreteValue::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(idx.as_int()?, chars.len())?;
            chars.get(i).map(|c| ConcreteValue::Str(c.to_string()))
        }
        ConcreteValue::Dict(entries) => entries
            .iter()
            .rev()
            .find(|(k, _)| k.same_outcome(idx))
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    (0..len).contains(&i).then_some(i as usize)
}

/// `len(value)`
pub fn length(value: &ConcreteValue) -> Option<i64> {
    match value {
        ConcreteValue::Str(s) => Some(s.chars().count() as i64),
        ConcreteValue::List(items) => Some(items.len() as i64),
        ConcreteValue::Dict(entries) => Some(entries.len() as i64),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Source-level float repr (`1.0`, `nan`, `-inf`)
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for ConcreteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteValue::Null => write!(f, "None"),
            ConcreteValue::Bool(true) => write!(f, "True"),
            ConcreteValue::Bool(false) => write!(f, "False"),
            ConcreteValue::Int(v) => write!(f, "{}", v),
            ConcreteValue::Float(v) => write!(f, "{}", format_float(*v)),
            ConcreteValue::Str(s) => write!(f, "{:?}", s),
            ConcreteValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ConcreteValue::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ConcreteValue::Object(fields) => {
                write!(f, "object(")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// JSON form: scalars as JSON scalars, dicts as objects with rendered keys
impl Serialize for ConcreteValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConcreteValue::Null => serializer.serialize_unit(),
            ConcreteValue::Bool(b) => serializer.serialize_bool(*b),
            ConcreteValue::Int(v) => serializer.serialize_i64(*v),
            ConcreteValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            ConcreteValue::Float(v) => serializer.serialize_str(&format_float(*v)),
            ConcreteValue::Str(s) => serializer.serialize_str(s),
            ConcreteValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ConcreteValue::Dict(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    let key = match k {
                        ConcreteValue::Str(s) => s.clone(),
                        other => other.to_string(),
                    };
                    map.serialize_entry(&key, v)?;
                }
                map.end()
            }
            ConcreteValue::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConcreteValue as V;

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(arith(ArithOp::Div, &V::Int(7), &V::Int(-2)), Some(V::Int(-3)));
        assert_eq!(arith(ArithOp::FloorDiv, &V::Int(7), &V::Int(-2)), Some(V::Int(-4)));
        assert_eq!(arith(ArithOp::Mod, &V::Int(-7), &V::Int(2)), Some(V::Int(-1)));
        assert_eq!(arith(ArithOp::Div, &V::Int(1), &V::Int(0)), None);
        assert_eq!(arith(ArithOp::Div, &V::Int(i64::MIN), &V::Int(-1)), None);
    }

    #[test]
    fn test_overflow_is_undefined() {
        assert_eq!(arith(ArithOp::Add, &V::Int(i64::MAX), &V::Int(1)), None);
        assert_eq!(negate(&V::Int(i64::MIN)), None);
        assert!(int_overflows(ArithOp::Add, &V::Int(i64::MAX), &V::Int(1)));
        assert!(int_overflows(ArithOp::Div, &V::Int(i64::MIN), &V::Int(-1)));
        assert!(!int_overflows(ArithOp::Div, &V::Int(1), &V::Int(0)));
        assert!(divides_by_zero(ArithOp::Mod, &V::Bool(false)));
        assert!(divides_by_zero(ArithOp::Div, &V::Float(0.0)));
        assert!(!divides_by_zero(ArithOp::Mul, &V::Int(0)));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        assert_eq!(arith(ArithOp::Add, &V::Int(1), &V::Float(0.5)), Some(V::Float(1.5)));
        assert_eq!(arith(ArithOp::Add, &V::Bool(true), &V::Int(1)), Some(V::Int(2)));
        assert_eq!(
            arith(ArithOp::Add, &V::Str("a".into()), &V::Str("b".into())),
            Some(V::Str("ab".into()))
        );
    }

    #[test]
    fn test_nan_is_unordered() {
        let nan = V::Float(f64::NAN);
        assert_eq!(compare(CmpOp::Eq, &nan, &nan), Some(false));
        assert_eq!(compare(CmpOp::Ne, &nan, &nan), Some(true));
        assert_eq!(compare(CmpOp::Lt, &nan, &V::Float(1.0)), Some(false));
        assert_eq!(compare(CmpOp::Ge, &nan, &V::Float(1.0)), Some(false));
        assert!(nan.same_outcome(&V::Float(f64::NAN)));
    }

    #[test]
    fn test_mismatched_types() {
        assert_eq!(compare(CmpOp::Eq, &V::Int(1), &V::Str("1".into())), Some(false));
        assert_eq!(compare(CmpOp::Ne, &V::Null, &V::Int(0)), Some(true));
        assert_eq!(compare(CmpOp::Lt, &V::Int(1), &V::Str("1".into())), None);
    }

    #[test]
    fn test_indexing() {
        let list = V::List(vec![V::Int(1), V::Int(2), V::Int(3)]);
        assert_eq!(index(&list, &V::Int(-1)), Some(V::Int(3)));
        assert_eq!(index(&list, &V::Int(3)), None);
        let dict = V::Dict(vec![(V::Str("a".into()), V::Int(1))]);
        assert_eq!(index(&dict, &V::Str("a".into())), Some(V::Int(1)));
        assert_eq!(contains(&dict, &V::Str("b".into())), Some(false));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(bitwise(BinOp::BitAnd, &V::Int(6), &V::Int(3)), Some(V::Int(2)));
        assert_eq!(bitwise(BinOp::BitOr, &V::Bool(true), &V::Bool(false)), Some(V::Bool(true)));
        assert_eq!(bitwise(BinOp::Shl, &V::Int(1), &V::Int(4)), Some(V::Int(16)));
        assert_eq!(bitwise(BinOp::Shr, &V::Int(-7), &V::Int(1)), Some(V::Int(-4)));
        assert_eq!(bitwise(BinOp::Shl, &V::Int(1), &V::Int(-1)), None);
        assert_eq!(invert(&V::Int(5)), Some(V::Int(-6)));
    }

    #[test]
    fn test_rendering() {
        assert_eq!(V::Float(1.0).to_string(), "1.0");
        assert_eq!(V::Float(f64::NAN).to_string(), "nan");
        assert_eq!(V::Str("high".into()).to_string(), "\"high\"");
        assert_eq!(V::Bool(true).to_string(), "True");
        let json = serde_json::to_string(&V::Dict(vec![(V::Int(1), V::Null)])).unwrap();
        assert_eq!(json, "{\"1\":null}");
    }
}
