//! Linear integer arithmetic
//!
//! `linearize` turns integer expressions built from variables, constants,
//! `+`, `-`, unary minus and multiplication by a constant into
//! `sum(coeff * var) + constant`. Coefficients are `i128` so intermediate
//! Fourier–Motzkin products cannot overflow for `i64` inputs.

use std::collections::BTreeMap;

use crate::features::symbolic_execution::domain::{ArithOp, CmpOp, ExprRef, Sort, SymExpr};

/// Cap on derived inequalities before elimination gives up
const MAX_FM_ROWS: usize = 4_000;

/// Magnitude cap keeping coefficients far from `i128` overflow
const MAX_MAGNITUDE: i128 = 1 << 100;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Linear {
    pub terms: BTreeMap<String, i128>,
    pub constant: i128,
}

impl Linear {
    pub fn constant(c: i128) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn var(name: &str) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(name.to_string(), 1);
        Self { terms, constant: 0 }
    }

    pub fn add(mut self, other: &Linear, sign: i128) -> Option<Self> {
        for (name, coeff) in &other.terms {
            let slot = self.terms.entry(name.clone()).or_insert(0);
            *slot = slot.checked_add(coeff.checked_mul(sign)?)?;
        }
        self.terms.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_add(other.constant.checked_mul(sign)?)?;
        self.bounded()
    }

    pub fn scale(mut self, k: i128) -> Option<Self> {
        if k == 0 {
            return Some(Self::default());
        }
        for coeff in self.terms.values_mut() {
            *coeff = coeff.checked_mul(k)?;
        }
        self.constant = self.constant.checked_mul(k)?;
        self.bounded()
    }

    fn bounded(self) -> Option<Self> {
        let ok = self.constant.abs() < MAX_MAGNITUDE
            && self.terms.values().all(|c| c.abs() < MAX_MAGNITUDE);
        ok.then_some(self)
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Linear form of an integer-sorted expression
pub fn linearize(expr: &SymExpr) -> Option<Linear> {
    match expr {
        SymExpr::Const(v) if v.sort() == Sort::Int => Some(Linear::constant(v.as_int()? as i128)),
        SymExpr::Var(v) if v.sort == Sort::Int => Some(Linear::var(&v.name)),
        SymExpr::Neg(e) => linearize(e)?.scale(-1),
        SymExpr::Arith { op, lhs, rhs } => {
            if lhs.sort() != Sort::Int || rhs.sort() != Sort::Int {
                return None;
            }
            match op {
                ArithOp::Add => linearize(lhs)?.add(&linearize(rhs)?, 1),
                ArithOp::Sub => linearize(lhs)?.add(&linearize(rhs)?, -1),
                ArithOp::Mul => {
                    let (a, b) = (linearize(lhs)?, linearize(rhs)?);
                    if a.is_constant() {
                        b.scale(a.constant)
                    } else if b.is_constant() {
                        a.scale(b.constant)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Rebuild an integer expression from a linear form
pub fn to_expr(lin: &Linear) -> Option<ExprRef> {
    let mut acc: Option<ExprRef> = None;
    for (name, coeff) in &lin.terms {
        let var = SymExpr::var(name.clone(), Sort::Int);
        let term = match *coeff {
            1 => var,
            -1 => SymExpr::mk_neg(var),
            c => SymExpr::mk_arith(ArithOp::Mul, SymExpr::int(i64::try_from(c).ok()?), var),
        };
        acc = Some(match acc {
            None => term,
            Some(prev) => SymExpr::mk_arith(ArithOp::Add, prev, term),
        });
    }
    let constant = SymExpr::int(i64::try_from(lin.constant).ok()?);
    Some(match acc {
        None => constant,
        Some(sum) => SymExpr::mk_arith(ArithOp::Add, sum, constant),
    })
}

/// `lhs op rhs` over integers as rows `form <= 0`; `!=` has no row form
pub fn rows_of(op: CmpOp, lhs: &ExprRef, rhs: &ExprRef) -> Option<Vec<Linear>> {
    if lhs.sort() != Sort::Int || rhs.sort() != Sort::Int {
        return None;
    }
    let diff = linearize(lhs)?.add(&linearize(rhs)?, -1)?;
    let neg = diff.clone().scale(-1)?;
    let minus_one = Linear::constant(1);
    Some(match op {
        CmpOp::Le => vec![diff],
        // a < b  <=>  a - b + 1 <= 0
        CmpOp::Lt => vec![diff.add(&minus_one, 1)?],
        CmpOp::Ge => vec![neg],
        CmpOp::Gt => vec![neg.add(&minus_one, 1)?],
        CmpOp::Eq => vec![diff, neg],
        CmpOp::Ne => return None,
    })
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Divide a row by the gcd of its coefficients, rounding the constant up
fn tighten(mut row: Linear) -> Linear {
    let g = row.terms.values().fold(0, |acc, c| gcd(acc, *c));
    if g > 1 {
        for c in row.terms.values_mut() {
            *c /= g;
        }
        // sum(a/g x) <= -c/g  ->  sum(a/g x) + ceil(c/g) <= 0
        row.constant = div_ceil(row.constant, g);
    }
    row
}

fn div_ceil(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a > 0) == (b > 0)) {
        q + 1
    } else {
        q
    }
}

/// Outcome of Fourier–Motzkin elimination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmResult {
    /// No rational (hence no integer) solution
    Infeasible,
    /// Could not refute
    Unrefuted,
    /// Row explosion
    GaveUp,
}

/// Refute a conjunction of rows `form <= 0`
pub fn refute(rows: Vec<Linear>) -> FmResult {
    let mut rows: Vec<Linear> = rows.into_iter().map(tighten).collect();

    loop {
        if rows
            .iter()
            .any(|r| r.is_constant() && r.constant > 0)
        {
            return FmResult::Infeasible;
        }
        rows.retain(|r| !r.is_constant());
        rows.sort_by(|a, b| (&a.terms, a.constant).cmp(&(&b.terms, b.constant)));
        rows.dedup();

        // Eliminate the variable producing the fewest new rows
        let mut counts: BTreeMap<&String, (usize, usize)> = BTreeMap::new();
        for row in &rows {
            for (name, c) in &row.terms {
                let entry = counts.entry(name).or_default();
                if *c > 0 {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }
        let Some(var) = counts
            .iter()
            .min_by_key(|(_, (p, n))| p * n)
            .map(|(name, _)| (*name).clone())
        else {
            return FmResult::Unrefuted;
        };

        let (mut pos, mut neg, mut rest) = (Vec::new(), Vec::new(), Vec::new());
        for row in rows {
            match row.terms.get(&var).copied() {
                Some(c) if c > 0 => pos.push((c, row)),
                Some(c) => neg.push((-c, row)),
                None => rest.push(row),
            }
        }
        if pos.len() * neg.len() + rest.len() > MAX_FM_ROWS {
            return FmResult::GaveUp;
        }
        for (cp, p) in &pos {
            for (cn, n) in &neg {
                // cn * p + cp * n cancels `var`
                let combined = p
                    .clone()
                    .scale(*cn)
                    .and_then(|a| n.clone().scale(*cp).and_then(|b| a.add(&b, 1)));
                match combined {
                    Some(row) => rest.push(tighten(row)),
                    None => return FmResult::GaveUp,
                }
            }
        }
        rows = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> ExprRef {
        SymExpr::var("x", Sort::Int)
    }

    fn y() -> ExprRef {
        SymExpr::var("y", Sort::Int)
    }

    #[test]
    fn test_linearize() {
        let e = SymExpr::mk_arith(
            ArithOp::Sub,
            SymExpr::mk_arith(ArithOp::Mul, SymExpr::int(3), x()),
            SymExpr::mk_arith(ArithOp::Add, y(), SymExpr::int(2)),
        );
        let lin = linearize(&e).unwrap();
        assert_eq!(lin.terms.get("x"), Some(&3));
        assert_eq!(lin.terms.get("y"), Some(&-1));
        assert_eq!(lin.constant, -2);

        let nonlinear = SymExpr::mk_arith(ArithOp::Mul, x(), y());
        assert!(linearize(&nonlinear).is_none());
    }

    #[test]
    fn test_refute_disjoint_bounds() {
        let mut rows = rows_of(CmpOp::Gt, &x(), &SymExpr::int(10)).unwrap();
        rows.extend(rows_of(CmpOp::Lt, &x(), &SymExpr::int(5)).unwrap());
        assert_eq!(refute(rows), FmResult::Infeasible);
    }

    #[test]
    fn test_refute_chained() {
        // x < y, y < z, z < x
        let z = SymExpr::var("z", Sort::Int);
        let mut rows = rows_of(CmpOp::Lt, &x(), &y()).unwrap();
        rows.extend(rows_of(CmpOp::Lt, &y(), &z).unwrap());
        rows.extend(rows_of(CmpOp::Lt, &z, &x()).unwrap());
        assert_eq!(refute(rows), FmResult::Infeasible);
    }

    #[test]
    fn test_integer_tightening() {
        // 2x == 1 has no integer solution
        let two_x = SymExpr::mk_arith(ArithOp::Mul, SymExpr::int(2), x());
        let rows = rows_of(CmpOp::Eq, &two_x, &SymExpr::int(1)).unwrap();
        assert_eq!(refute(rows), FmResult::Infeasible);
    }

    #[test]
    fn test_feasible_not_refuted() {
        let mut rows = rows_of(CmpOp::Gt, &x(), &SymExpr::int(5)).unwrap();
        rows.extend(rows_of(CmpOp::Le, &x(), &SymExpr::int(10)).unwrap());
        assert_eq!(refute(rows), FmResult::Unrefuted);
    }
}
