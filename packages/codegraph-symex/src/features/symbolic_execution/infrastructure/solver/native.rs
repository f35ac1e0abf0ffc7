//! Native solver
//!
//! Decides conjunctions of symbolic constraints without an external backend:
//!
//! ```text
//! Stage 1: Simplify        opaque Top atoms, NNF, case split into cubes
//!    ↓ per cube
//! Stage 2: Refute          equality substitution, complementary literals,
//!                          interval domains, Fourier–Motzkin
//!    ↓ not refuted
//! Stage 3: Model search    bounded DFS over candidate values, validated by
//!                          three-valued evaluation
//! ```
//!
//! A cube is only declared UNSAT by a sound refutation or by exhausting finite
//! domains; anything else the search cannot settle is UNKNOWN.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::eval::{self, holds};
use super::interval::{FloatInterval, IntDomain};
use super::linear::{self, FmResult, Linear};
use crate::config::SymbolicConfig;
use crate::features::symbolic_execution::domain::{
    CmpOp, ConcreteValue, ExprRef, Model, Sort, SymExpr, SymVar,
};
use crate::features::symbolic_execution::ports::{
    SolverAdapter, SolverQuery, SolverResult, SolverStats, UnknownReason,
};

/// Maximum number of cubes after case splitting
const MAX_CUBES: usize = 256;

/// Maximum search nodes per cube
const MAX_SEARCH_NODES: usize = 20_000;

/// Maximum candidate values per variable
const MAX_CANDIDATES: usize = 48;

/// Substitution rounds per cube
const MAX_SUBST_ROUNDS: usize = 8;

/// Prefix of opaque boolean variables standing in for Top atoms
const OPAQUE_PREFIX: char = '?';

/// Pure-Rust satisfiability checker
#[derive(Debug, Clone)]
pub struct NativeSolver {
    timeout: Duration,
    max_string_length: usize,
    stats: SolverStats,
}

enum CubeResult {
    Sat(Model),
    Unsat,
    Unknown(UnknownReason),
}

impl NativeSolver {
    pub fn new(timeout_ms: u64, max_string_length: usize) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_string_length,
            stats: SolverStats::default(),
        }
    }

    pub fn from_config(config: &SymbolicConfig) -> Self {
        Self::new(config.solver_timeout_ms, config.max_string_length)
    }

    fn solve(&self, query: &SolverQuery) -> SolverResult {
        let deadline = Instant::now() + self.timeout;

        // Stage 1
        let constraints: Vec<ExprRef> = query.constraints().iter().map(opaque).collect();
        let formula = SymExpr::mk_and(constraints);
        if formula.is_false() || formula.is_undefined() {
            return SolverResult::Unsat;
        }
        let normal = nnf(&formula, true);
        let Some(cubes) = dnf(&normal) else {
            return SolverResult::Unknown(UnknownReason::Incomplete(
                "case split limit".to_string(),
            ));
        };

        let mut incomplete: Option<UnknownReason> = None;
        for cube in cubes {
            if Instant::now() >= deadline {
                return SolverResult::Unknown(UnknownReason::Timeout);
            }
            match self.solve_cube(cube, deadline) {
                CubeResult::Unsat => continue,
                CubeResult::Unknown(UnknownReason::Timeout) => {
                    return SolverResult::Unknown(UnknownReason::Timeout);
                }
                CubeResult::Unknown(reason) => {
                    incomplete.get_or_insert(reason);
                }
                CubeResult::Sat(mut model) => {
                    let mut vars = BTreeSet::new();
                    formula.free_vars(&mut vars);
                    for var in vars {
                        model
                            .entry(var.name)
                            .or_insert_with(|| ConcreteValue::default_for(var.sort));
                    }
                    if holds(&formula, &model) {
                        model.retain(|name, _| !name.starts_with(OPAQUE_PREFIX));
                        return SolverResult::Sat(Arc::new(model));
                    }
                    incomplete.get_or_insert(UnknownReason::Incomplete(
                        "model validation failed".to_string(),
                    ));
                }
            }
        }

        match incomplete {
            Some(reason) => SolverResult::Unknown(reason),
            None => SolverResult::Unsat,
        }
    }

    fn solve_cube(&self, cube: Vec<ExprRef>, deadline: Instant) -> CubeResult {
        // Stage 2: substitution to a fixpoint
        let mut literals: Vec<ExprRef> = cube.iter().map(normalize).collect();
        let mut subst: BTreeMap<String, ExprRef> = BTreeMap::new();
        for _ in 0..MAX_SUBST_ROUNDS {
            let mut next = Vec::with_capacity(literals.len());
            for lit in &literals {
                let lit = normalize(&SymExpr::substitute(lit, &subst));
                if lit.is_true() {
                    continue;
                }
                if lit.is_false() || lit.is_undefined() || lit.as_const().is_some_and(|v| !v.truthy()) {
                    return CubeResult::Unsat;
                }
                next.push(lit);
            }
            literals = next;

            let mut changed = false;
            for lit in &literals {
                if let Some((name, value)) = equality(lit) {
                    if subst.contains_key(&name) {
                        continue;
                    }
                    let single: BTreeMap<String, ExprRef> =
                        [(name.clone(), value.clone())].into_iter().collect();
                    for existing in subst.values_mut() {
                        *existing = SymExpr::substitute(existing, &single);
                    }
                    subst.insert(name, value);
                    changed = true;
                    break;
                }
            }
            if !changed {
                break;
            }
        }

        // Complementary literals
        let fingerprints: BTreeSet<[u8; 32]> = literals
            .iter()
            .map(|l| *l.fingerprint().as_bytes())
            .collect();
        if literals.iter().any(|l| {
            fingerprints.contains(SymExpr::mk_not(l.clone()).fingerprint().as_bytes())
        }) {
            return CubeResult::Unsat;
        }

        let mut domains = Domains::new(self.max_string_length);
        for lit in &literals {
            if !domains.restrict(lit) {
                return CubeResult::Unsat;
            }
        }
        if domains.any_empty() {
            return CubeResult::Unsat;
        }
        if let Some(name) = domains.beyond_string_bound() {
            return CubeResult::Unknown(UnknownReason::Incomplete(format!(
                "len({}) exceeds max_string_length {}",
                name, self.max_string_length
            )));
        }

        let rows: Vec<Linear> = literals
            .iter()
            .filter_map(|lit| match &**lit {
                SymExpr::Cmp { op, lhs, rhs } => linear::rows_of(*op, lhs, rhs),
                _ => None,
            })
            .flatten()
            .collect();
        if rows.len() >= 2 && linear::refute(rows) == FmResult::Infeasible {
            return CubeResult::Unsat;
        }

        // Stage 3
        let mut vars = BTreeSet::new();
        for lit in &literals {
            lit.free_vars(&mut vars);
        }
        for value in subst.values() {
            value.free_vars(&mut vars);
        }
        vars.retain(|v| !subst.contains_key(&v.name));

        let mut search = Search::new(vars.into_iter().collect(), &literals, &domains, deadline);
        match search.run() {
            SearchOutcome::Found(mut model) => {
                for (name, expr) in &subst {
                    match eval::eval(expr, &model).into_value() {
                        Some(value) => {
                            model.insert(name.clone(), value);
                        }
                        None => {
                            return CubeResult::Unknown(UnknownReason::Incomplete(
                                "substituted variable undefined".to_string(),
                            ))
                        }
                    }
                }
                CubeResult::Sat(model)
            }
            SearchOutcome::Exhausted => CubeResult::Unsat,
            SearchOutcome::GaveUp(reason) => CubeResult::Unknown(reason),
        }
    }
}

impl SolverAdapter for NativeSolver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn check(&mut self, query: &SolverQuery) -> SolverResult {
        let result = self.solve(query);
        self.stats.record(&result);
        result
    }

    fn fork(&self) -> Box<dyn SolverAdapter> {
        Box::new(NativeSolver::new(
            self.timeout.as_millis() as u64,
            self.max_string_length,
        ))
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stage 1: normal forms
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replace every atom mentioning Top by a fresh boolean variable
fn opaque(e: &ExprRef) -> ExprRef {
    if !e.contains_top() {
        return e.clone();
    }
    match &**e {
        SymExpr::And(items) => SymExpr::mk_and(items.iter().map(opaque).collect()),
        SymExpr::Or(items) => SymExpr::mk_or(items.iter().map(opaque).collect()),
        SymExpr::Not(inner) => SymExpr::mk_not(opaque(inner)),
        _ => {
            let hex = e.fingerprint().to_hex();
            SymExpr::var(format!("{}{}", OPAQUE_PREFIX, &hex[..12]), Sort::Bool)
        }
    }
}

/// Negation normal form; boolean `Ite` is expanded
fn nnf(e: &ExprRef, positive: bool) -> ExprRef {
    match &**e {
        SymExpr::And(items) | SymExpr::Or(items) => {
            let mapped: Vec<ExprRef> = items.iter().map(|i| nnf(i, positive)).collect();
            let is_and = matches!(&**e, SymExpr::And(_));
            if is_and == positive {
                SymExpr::mk_and(mapped)
            } else {
                SymExpr::mk_or(mapped)
            }
        }
        SymExpr::Not(inner) => nnf(inner, !positive),
        SymExpr::Ite { cond, then, orelse } if e.sort() == Sort::Bool => {
            let expanded = SymExpr::mk_or(vec![
                SymExpr::mk_and(vec![cond.clone(), then.clone()]),
                SymExpr::mk_and(vec![SymExpr::mk_not(cond.clone()), orelse.clone()]),
            ]);
            nnf(&expanded, positive)
        }
        _ if positive => e.clone(),
        _ => SymExpr::mk_not(e.clone()),
    }
}

/// Disjunctive normal form of an NNF formula; `None` past the cube cap
fn dnf(e: &ExprRef) -> Option<Vec<Vec<ExprRef>>> {
    match &**e {
        SymExpr::Const(v) => Some(if v.truthy() { vec![Vec::new()] } else { Vec::new() }),
        SymExpr::Undefined => Some(Vec::new()),
        SymExpr::And(items) => {
            let mut acc: Vec<Vec<ExprRef>> = vec![Vec::new()];
            for item in items {
                let parts = dnf(item)?;
                let mut next = Vec::with_capacity(acc.len() * parts.len());
                for left in &acc {
                    for right in &parts {
                        let mut cube = left.clone();
                        cube.extend(right.iter().cloned());
                        next.push(cube);
                    }
                }
                if next.len() > MAX_CUBES {
                    return None;
                }
                acc = next;
            }
            Some(acc)
        }
        SymExpr::Or(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(dnf(item)?);
                if out.len() > MAX_CUBES {
                    return None;
                }
            }
            Some(out)
        }
        _ => Some(vec![vec![e.clone()]]),
    }
}

/// Canonical form of linear integer comparisons (`x + 1 > 5` becomes `x > 4`)
fn normalize(e: &ExprRef) -> ExprRef {
    let SymExpr::Cmp { op, lhs, rhs } = &**e else {
        return e.clone();
    };
    if lhs.sort() != Sort::Int || rhs.sort() != Sort::Int {
        return e.clone();
    }
    let diff = match (linear::linearize(lhs), linear::linearize(rhs)) {
        (Some(l), Some(r)) => match l.add(&r, -1) {
            Some(d) => d,
            None => return e.clone(),
        },
        _ => return e.clone(),
    };
    if diff.is_constant() {
        return SymExpr::bool(op.holds(diff.constant.cmp(&0)));
    }
    if diff.terms.len() == 1 {
        if let Some((name, coeff)) = diff.terms.iter().next() {
            // x + c op 0  or  -x + c op 0
            let (op, bound) = match *coeff {
                1 => (*op, -diff.constant),
                -1 => (op.swapped(), diff.constant),
                _ => return e.clone(),
            };
            if let Ok(bound) = i64::try_from(bound) {
                return SymExpr::mk_cmp(op, SymExpr::var(name.clone(), Sort::Int), SymExpr::int(bound));
            }
        }
    }
    e.clone()
}

/// `var == expr` usable for substitution
fn equality(lit: &ExprRef) -> Option<(String, ExprRef)> {
    match &**lit {
        SymExpr::Var(v) if v.sort == Sort::Bool => Some((v.name.clone(), SymExpr::bool(true))),
        SymExpr::Not(inner) => match &**inner {
            SymExpr::Var(v) if v.sort == Sort::Bool => Some((v.name.clone(), SymExpr::bool(false))),
            _ => None,
        },
        SymExpr::Cmp {
            op: CmpOp::Eq,
            lhs,
            rhs,
        } => solved_for(lhs, rhs)
            .or_else(|| solved_for(rhs, lhs))
            .or_else(|| solved_linear(lhs, rhs)),
        _ => None,
    }
}

/// Solve an integer linear equality for its first unit-coefficient variable
fn solved_linear(lhs: &ExprRef, rhs: &ExprRef) -> Option<(String, ExprRef)> {
    if lhs.sort() != Sort::Int || rhs.sort() != Sort::Int {
        return None;
    }
    let diff = linear::linearize(lhs)?.add(&linear::linearize(rhs)?, -1)?;
    let (name, coeff) = diff
        .terms
        .iter()
        .find(|(_, c)| c.abs() == 1)
        .map(|(n, c)| (n.clone(), *c))?;
    // coeff * x + rest == 0  ->  x == -coeff * rest
    let mut rest = diff;
    rest.terms.remove(&name);
    let value = linear::to_expr(&rest.scale(-coeff)?)?;
    Some((name, value))
}

fn solved_for(var: &ExprRef, value: &ExprRef) -> Option<(String, ExprRef)> {
    let SymExpr::Var(v) = &**var else {
        return None;
    };
    let substitutable = match v.sort {
        Sort::Int | Sort::Bool | Sort::Str | Sort::Null => value.sort() == v.sort,
        // NaN breaks reflexivity: only constants are safe
        Sort::Float => value.is_const() && value.sort().is_numeric(),
        _ => false,
    };
    if !substitutable || value.contains_top() {
        return None;
    }
    let mut free = BTreeSet::new();
    value.free_vars(&mut free);
    if free.contains(v) {
        return None;
    }
    // Orient var-var equalities so substitution terminates
    if let SymExpr::Var(other) = &**value {
        if other.name > v.name {
            return None;
        }
    }
    let value = match (v.sort, value.as_const()) {
        (Sort::Float, Some(c)) => match c {
            ConcreteValue::Float(_) => value.clone(),
            other => SymExpr::float(other.as_int()? as f64),
        },
        _ => value.clone(),
    };
    Some((v.name.clone(), value))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stage 2: domains
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-variable bounds collected from single-variable literals
struct Domains {
    ints: BTreeMap<String, IntDomain>,
    floats: BTreeMap<String, FloatInterval>,
    /// Length domains of string variables
    lengths: BTreeMap<String, IntDomain>,
    int_consts: BTreeSet<i64>,
    float_consts: Vec<f64>,
    str_consts: BTreeSet<String>,
    max_string_length: usize,
}

impl Domains {
    fn new(max_string_length: usize) -> Self {
        Self {
            ints: BTreeMap::new(),
            floats: BTreeMap::new(),
            lengths: BTreeMap::new(),
            int_consts: BTreeSet::new(),
            float_consts: Vec::new(),
            str_consts: BTreeSet::new(),
            max_string_length,
        }
    }

    /// Record a literal; `false` when it is unsatisfiable on its own
    fn restrict(&mut self, lit: &ExprRef) -> bool {
        self.collect_constants(lit);
        let SymExpr::Cmp { op, lhs, rhs } = &**lit else {
            return true;
        };
        let Some(value) = rhs.as_const() else {
            return true;
        };
        match &**lhs {
            SymExpr::Var(v) if v.sort == Sort::Int => {
                if let Some(c) = value.as_int() {
                    self.ints.entry(v.name.clone()).or_default().restrict(*op, c);
                }
            }
            SymExpr::Var(v) if v.sort == Sort::Float => {
                let c = match value {
                    ConcreteValue::Float(f) => *f,
                    other => match other.as_int() {
                        Some(i) => i as f64,
                        None => return true,
                    },
                };
                match FloatInterval::from_cmp(*op, c) {
                    Some(interval) => {
                        let slot = self
                            .floats
                            .entry(v.name.clone())
                            .or_insert_with(FloatInterval::unbounded);
                        *slot = slot.intersect(&interval);
                    }
                    // Ordered comparison with NaN never holds
                    None if *op != CmpOp::Ne && c.is_nan() => return false,
                    None => {}
                }
            }
            SymExpr::StrLen(inner) => {
                if let (SymExpr::Var(v), Some(c)) = (&**inner, value.as_int()) {
                    self.length_domain(&v.name).restrict(*op, c);
                }
            }
            _ => {}
        }
        true
    }

    fn length_domain(&mut self, name: &str) -> &mut IntDomain {
        self.lengths.entry(name.to_string()).or_insert_with(|| {
            let mut d = IntDomain::default();
            d.restrict(CmpOp::Ge, 0);
            d
        })
    }

    /// A string whose length constraints only admit lengths past the bound
    fn beyond_string_bound(&self) -> Option<&str> {
        let max = self.max_string_length as i64;
        self.lengths.iter().find_map(|(name, d)| {
            let mut bounded = d.clone();
            bounded.restrict(CmpOp::Le, max);
            (bounded.is_empty() && !d.is_empty()).then_some(name.as_str())
        })
    }

    fn any_empty(&self) -> bool {
        self.ints.values().any(|d| d.is_empty())
            || self.lengths.values().any(|d| d.is_empty())
            || self.floats.values().any(|d| d.is_empty())
    }

    fn collect_constants(&mut self, e: &SymExpr) {
        match e {
            SymExpr::Const(ConcreteValue::Int(v)) => {
                self.int_consts.insert(*v);
            }
            SymExpr::Const(ConcreteValue::Float(v)) if v.is_finite() => {
                if !self.float_consts.iter().any(|f| f.to_bits() == v.to_bits()) {
                    self.float_consts.push(*v);
                }
            }
            SymExpr::Const(ConcreteValue::Str(s)) => {
                self.str_consts.insert(s.clone());
                self.int_consts.insert(s.chars().count() as i64);
            }
            _ => {
                for child in e.children() {
                    self.collect_constants(child);
                }
            }
        }
    }

    /// Candidate values for `var`, and whether they cover its whole domain
    fn candidates(&self, var: &SymVar) -> (Vec<ConcreteValue>, bool) {
        match var.sort {
            Sort::Bool => (
                vec![ConcreteValue::Bool(false), ConcreteValue::Bool(true)],
                true,
            ),
            Sort::Null => (vec![ConcreteValue::Null], true),
            Sort::Int => {
                let domain = self.ints.get(&var.name).cloned().unwrap_or_default();
                if domain.is_small() {
                    let members = domain.members().into_iter().map(ConcreteValue::Int).collect();
                    return (members, true);
                }
                let values = int_seeds(&domain, &self.int_consts);
                (values.into_iter().map(ConcreteValue::Int).collect(), false)
            }
            Sort::Float => {
                let interval = self
                    .floats
                    .get(&var.name)
                    .cloned()
                    .unwrap_or_else(FloatInterval::unbounded);
                (self.float_seeds(&interval), false)
            }
            Sort::Str => (self.str_seeds(&var.name), false),
            other => (vec![ConcreteValue::default_for(other)], false),
        }
    }

    fn float_seeds(&self, interval: &FloatInterval) -> Vec<ConcreteValue> {
        let mut raw: Vec<f64> = vec![0.0];
        let bounds = [interval.lower, interval.upper];
        for b in bounds.iter().flatten().chain(self.float_consts.iter()) {
            raw.extend([*b, b + 0.5, b - 0.5, b + 1.0, b - 1.0]);
        }
        for c in &self.int_consts {
            raw.push(*c as f64);
        }
        raw.extend([1.0, -1.0, 0.5, f64::INFINITY, f64::NEG_INFINITY]);

        let mut seen = BTreeSet::new();
        let mut out: Vec<ConcreteValue> = raw
            .into_iter()
            .filter(|v| interval.contains(*v))
            .filter(|v| seen.insert(v.to_bits()))
            .take(MAX_CANDIDATES)
            .map(ConcreteValue::Float)
            .collect();
        if interval.lower.is_none() && interval.upper.is_none() {
            out.push(ConcreteValue::Float(f64::NAN));
        }
        out
    }

    fn str_seeds(&self, name: &str) -> Vec<ConcreteValue> {
        let max = self.max_string_length as i64;
        let lengths = self.lengths.get(name).cloned().unwrap_or_else(|| {
            let mut d = IntDomain::default();
            d.restrict(CmpOp::Ge, 0);
            d.restrict(CmpOp::Le, max);
            d
        });

        let mut raw: Vec<String> = vec![String::new()];
        for s in &self.str_consts {
            raw.push(s.clone());
            raw.push(format!("{}a", s));
            raw.push(format!("a{}", s));
        }
        let sizes = if lengths.is_small() {
            lengths.members()
        } else {
            int_seeds(&lengths, &self.int_consts)
        };
        for n in sizes {
            if (0..=max).contains(&n) {
                raw.push("a".repeat(n as usize));
            }
        }

        let mut seen = BTreeSet::new();
        raw.into_iter()
            .filter(|s| lengths.contains(s.chars().count() as i64))
            .filter(|s| seen.insert(s.clone()))
            .take(MAX_CANDIDATES)
            .map(ConcreteValue::Str)
            .collect()
    }
}

/// Representative members of a large integer domain
fn int_seeds(domain: &IntDomain, consts: &BTreeSet<i64>) -> Vec<i64> {
    let mut raw: Vec<i64> = vec![0];
    let interval = &domain.interval;
    if let Some(l) = interval.lower {
        raw.push(l);
        raw.extend(l.checked_add(1));
    }
    if let Some(u) = interval.upper {
        raw.push(u);
        raw.extend(u.checked_sub(1));
    }
    for c in consts {
        raw.push(*c);
        raw.extend(c.checked_sub(1));
        raw.extend(c.checked_add(1));
        raw.extend(c.checked_neg());
    }
    raw.extend([1, -1, 2]);

    let mut seen = BTreeSet::new();
    let mut out: Vec<i64> = raw
        .into_iter()
        .filter(|v| domain.contains(*v))
        .filter(|v| seen.insert(*v))
        .take(MAX_CANDIDATES)
        .collect();

    if out.is_empty() {
        // Walk away from a bound past the exclusions
        let start = interval.lower.or(interval.upper).unwrap_or(0);
        let step: i64 = if interval.lower.is_some() || interval.upper.is_none() { 1 } else { -1 };
        let mut v = start;
        for _ in 0..=domain.excluded.len() {
            if domain.contains(v) {
                out.push(v);
                break;
            }
            match v.checked_add(step) {
                Some(next) => v = next,
                None => break,
            }
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stage 3: model search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum SearchOutcome {
    Found(Model),
    /// Every candidate of every variable tried and all domains were complete
    Exhausted,
    GaveUp(UnknownReason),
}

struct Search<'a> {
    vars: Vec<SymVar>,
    candidates: Vec<Vec<ConcreteValue>>,
    complete: bool,
    /// Literals whose last variable (in search order) is at this level
    ready: Vec<Vec<&'a ExprRef>>,
    /// Linear rows of ready integer literals, for boundary hints
    hints: Vec<Vec<Linear>>,
    int_domains: Vec<Option<IntDomain>>,
    nodes: usize,
    deadline: Instant,
    model: Model,
    aborted: Option<UnknownReason>,
}

impl<'a> Search<'a> {
    fn new(
        vars: Vec<SymVar>,
        literals: &'a [ExprRef],
        domains: &Domains,
        deadline: Instant,
    ) -> Self {
        let index: BTreeMap<&str, usize> = vars
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.as_str(), i))
            .collect();

        let mut ready: Vec<Vec<&'a ExprRef>> = vec![Vec::new(); vars.len().max(1)];
        let mut hints: Vec<Vec<Linear>> = vec![Vec::new(); vars.len().max(1)];
        for lit in literals {
            let mut free = BTreeSet::new();
            lit.free_vars(&mut free);
            let level = free
                .iter()
                .filter_map(|v| index.get(v.name.as_str()).copied())
                .max()
                .unwrap_or(0);
            ready[level].push(lit);
            if let SymExpr::Cmp { op, lhs, rhs } = &**lit {
                if let Some(rows) = linear::rows_of(*op, lhs, rhs) {
                    hints[level].extend(rows);
                }
            }
        }

        let mut candidates = Vec::with_capacity(vars.len());
        let mut complete = true;
        let mut int_domains = Vec::with_capacity(vars.len());
        for var in &vars {
            let (values, exhaustive) = domains.candidates(var);
            complete &= exhaustive;
            candidates.push(values);
            int_domains.push(if var.sort == Sort::Int {
                Some(domains.ints.get(&var.name).cloned().unwrap_or_default())
            } else {
                None
            });
        }

        Self {
            vars,
            candidates,
            complete,
            ready,
            hints,
            int_domains,
            nodes: 0,
            deadline,
            model: Model::new(),
            aborted: None,
        }
    }

    fn run(&mut self) -> SearchOutcome {
        if self.vars.is_empty() {
            // Only variable-free literals remain
            let ok = self.ready[0].iter().all(|l| holds(l, &self.model));
            return if ok {
                SearchOutcome::Found(Model::new())
            } else {
                SearchOutcome::Exhausted
            };
        }
        if self.dfs(0) {
            return SearchOutcome::Found(std::mem::take(&mut self.model));
        }
        match self.aborted.take() {
            Some(reason) => SearchOutcome::GaveUp(reason),
            None if self.complete => SearchOutcome::Exhausted,
            None => SearchOutcome::GaveUp(UnknownReason::Incomplete(
                "no model among candidates".to_string(),
            )),
        }
    }

    fn dfs(&mut self, level: usize) -> bool {
        if level == self.vars.len() {
            return true;
        }
        let name = self.vars[level].name.clone();
        let mut values = self.boundary_hints(level);
        for value in &self.candidates[level] {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }

        for value in values {
            self.nodes += 1;
            if self.nodes > MAX_SEARCH_NODES {
                self.aborted = Some(UnknownReason::Incomplete("search node limit".to_string()));
                return false;
            }
            if self.nodes % 256 == 0 && Instant::now() >= self.deadline {
                self.aborted = Some(UnknownReason::Timeout);
                return false;
            }
            self.model.insert(name.clone(), value);
            let consistent = self.ready[level].iter().all(|l| holds(l, &self.model));
            if consistent && self.dfs(level + 1) {
                return true;
            }
            if self.aborted.is_some() {
                return false;
            }
        }
        self.model.remove(&name);
        false
    }

    /// Values at which a ready linear row becomes tight
    fn boundary_hints(&self, level: usize) -> Vec<ConcreteValue> {
        let Some(domain) = &self.int_domains[level] else {
            return Vec::new();
        };
        let name = &self.vars[level].name;
        let mut out = Vec::new();
        for row in &self.hints[level] {
            let Some(&a) = row.terms.get(name) else {
                continue;
            };
            let mut rest = row.constant;
            for (other, coeff) in &row.terms {
                if other == name {
                    continue;
                }
                if let Some(v) = self.model.get(other).and_then(|v| v.as_int()) {
                    rest = rest.saturating_add(coeff.saturating_mul(v as i128));
                }
            }
            // a * x + rest <= 0
            let x0 = -rest / a;
            for delta in [-1i128, 0, 1] {
                if let Ok(v) = i64::try_from(x0 + delta) {
                    let value = ConcreteValue::Int(v);
                    if domain.contains(v) && !out.contains(&value) {
                        out.push(value);
                    }
                }
            }
        }
        out
    }
}
