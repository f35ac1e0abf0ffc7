//! Interval domains for single-variable bounds
//!
//! Integer intervals normalize open bounds to inclusive ones; float intervals
//! keep openness. Both are used to refute cubes and to seed model search.

use std::collections::BTreeSet;

use crate::features::symbolic_execution::domain::CmpOp;

/// Finite integer domains up to this size are enumerated exhaustively
pub const SMALL_DOMAIN: i64 = 64;

/// Integer interval [lower, upper]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntInterval {
    /// Lower bound (inclusive), None = -inf
    pub lower: Option<i64>,
    /// Upper bound (inclusive), None = +inf
    pub upper: Option<i64>,
}

impl IntInterval {
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    pub fn bounded(lower: i64, upper: i64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn lower_bounded(lower: i64, open: bool) -> Self {
        Self {
            lower: if open { lower.checked_add(1) } else { Some(lower) },
            upper: None,
        }
    }

    pub fn upper_bounded(upper: i64, open: bool) -> Self {
        Self {
            lower: None,
            upper: if open { upper.checked_sub(1) } else { Some(upper) },
        }
    }

    /// Interval of `x op value`; `!=` has no interval form
    pub fn from_cmp(op: CmpOp, value: i64) -> Option<Self> {
        Some(match op {
            CmpOp::Eq => Self::bounded(value, value),
            CmpOp::Ne => return None,
            CmpOp::Lt => {
                if value == i64::MIN {
                    Self::bounded(1, 0)
                } else {
                    Self::upper_bounded(value, true)
                }
            }
            CmpOp::Le => Self::upper_bounded(value, false),
            CmpOp::Gt => {
                if value == i64::MAX {
                    Self::bounded(1, 0)
                } else {
                    Self::lower_bounded(value, true)
                }
            }
            CmpOp::Ge => Self::lower_bounded(value, false),
        })
    }

    pub fn intersect(&self, other: &IntInterval) -> IntInterval {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        IntInterval { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l > u)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.lower.map_or(true, |l| value >= l) && self.upper.map_or(true, |u| value <= u)
    }

    /// Number of members when finite
    pub fn size(&self) -> Option<i128> {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l <= u => Some(u as i128 - l as i128 + 1),
            (Some(_), Some(_)) => Some(0),
            _ => None,
        }
    }
}

/// Integer interval minus a set of excluded points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntDomain {
    pub interval: IntInterval,
    pub excluded: BTreeSet<i64>,
}

impl Default for IntDomain {
    fn default() -> Self {
        Self {
            interval: IntInterval::unbounded(),
            excluded: BTreeSet::new(),
        }
    }
}

impl IntDomain {
    /// Apply `x op value`
    pub fn restrict(&mut self, op: CmpOp, value: i64) {
        match IntInterval::from_cmp(op, value) {
            Some(interval) => self.interval = self.interval.intersect(&interval),
            None => {
                self.excluded.insert(value);
            }
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.interval.contains(value) && !self.excluded.contains(&value)
    }

    pub fn is_empty(&self) -> bool {
        if self.interval.is_empty() {
            return true;
        }
        match self.interval.size() {
            Some(n) if n <= SMALL_DOMAIN as i128 => self.members().is_empty(),
            _ => false,
        }
    }

    /// All members of a small finite domain (empty for large or infinite ones)
    pub fn members(&self) -> Vec<i64> {
        match (self.interval.lower, self.interval.size()) {
            (Some(l), Some(n)) if n <= SMALL_DOMAIN as i128 => (0..n as i64)
                .map(|k| l + k)
                .filter(|v| !self.excluded.contains(v))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_small(&self) -> bool {
        matches!(self.interval.size(), Some(n) if n <= SMALL_DOMAIN as i128)
    }
}

/// Float interval with open/closed ends
#[derive(Debug, Clone, PartialEq)]
pub struct FloatInterval {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub lower_open: bool,
    pub upper_open: bool,
}

impl FloatInterval {
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
            lower_open: true,
            upper_open: true,
        }
    }

    /// Interval of `x op value` for a satisfied comparison (excludes NaN)
    pub fn from_cmp(op: CmpOp, value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        let mut out = Self::unbounded();
        match op {
            CmpOp::Eq => {
                out.lower = Some(value);
                out.upper = Some(value);
                out.lower_open = false;
                out.upper_open = false;
            }
            CmpOp::Ne => return None,
            CmpOp::Lt | CmpOp::Le => {
                out.upper = Some(value);
                out.upper_open = op == CmpOp::Lt;
            }
            CmpOp::Gt | CmpOp::Ge => {
                out.lower = Some(value);
                out.lower_open = op == CmpOp::Gt;
            }
        }
        Some(out)
    }

    pub fn intersect(&self, other: &FloatInterval) -> FloatInterval {
        let (lower, lower_open) = match (self.lower, other.lower) {
            (None, None) => (None, true),
            (None, Some(l)) => (Some(l), other.lower_open),
            (Some(l), None) => (Some(l), self.lower_open),
            (Some(a), Some(b)) => {
                if a > b {
                    (Some(a), self.lower_open)
                } else if a < b {
                    (Some(b), other.lower_open)
                } else {
                    (Some(a), self.lower_open || other.lower_open)
                }
            }
        };
        let (upper, upper_open) = match (self.upper, other.upper) {
            (None, None) => (None, true),
            (None, Some(u)) => (Some(u), other.upper_open),
            (Some(u), None) => (Some(u), self.upper_open),
            (Some(a), Some(b)) => {
                if a < b {
                    (Some(a), self.upper_open)
                } else if a > b {
                    (Some(b), other.upper_open)
                } else {
                    (Some(a), self.upper_open || other.upper_open)
                }
            }
        };
        FloatInterval {
            lower,
            upper,
            lower_open,
            upper_open,
        }
    }

    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => l > u || (l == u && (self.lower_open || self.upper_open)),
            _ => false,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let lower_ok = match self.lower {
            None => true,
            Some(l) if self.lower_open => value > l,
            Some(l) => value >= l,
        };
        let upper_ok = match self.upper {
            None => true,
            Some(u) if self.upper_open => value < u,
            Some(u) => value <= u,
        };
        lower_ok && upper_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_interval() {
        let interval = IntInterval::bounded(5, 10);
        assert!(interval.contains(5));
        assert!(interval.contains(10));
        assert!(!interval.contains(4));
        assert!(!interval.contains(11));
    }

    #[test]
    fn test_open_bounds_normalize() {
        // x > 10 and x < 5
        let gt = IntInterval::from_cmp(CmpOp::Gt, 10).unwrap();
        let lt = IntInterval::from_cmp(CmpOp::Lt, 5).unwrap();
        assert_eq!(gt.lower, Some(11));
        assert!(gt.intersect(&lt).is_empty());
    }

    #[test]
    fn test_interval_intersection_feasible() {
        let result = IntInterval::bounded(5, 15).intersect(&IntInterval::bounded(10, 20));
        assert_eq!(result, IntInterval::bounded(10, 15));
        assert!(!result.is_empty());
    }

    #[test]
    fn test_domain_exclusions_exhaust() {
        let mut domain = IntDomain::default();
        domain.restrict(CmpOp::Ge, 1);
        domain.restrict(CmpOp::Le, 2);
        domain.restrict(CmpOp::Ne, 1);
        assert!(!domain.is_empty());
        domain.restrict(CmpOp::Ne, 2);
        assert!(domain.is_empty());
    }

    #[test]
    fn test_float_open_point_is_empty() {
        let a = FloatInterval::from_cmp(CmpOp::Ge, 1.5).unwrap();
        let b = FloatInterval::from_cmp(CmpOp::Lt, 1.5).unwrap();
        assert!(a.intersect(&b).is_empty());
        let c = FloatInterval::from_cmp(CmpOp::Le, 1.5).unwrap();
        assert!(!a.intersect(&c).is_empty());
        assert!(FloatInterval::from_cmp(CmpOp::Eq, f64::NAN).is_none());
    }
}
