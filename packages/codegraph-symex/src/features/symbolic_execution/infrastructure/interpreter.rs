//! Concrete interpreter over the lowered program
//!
//! Replays a synthesized example and records which arm each decision took, so
//! a symbolic path can be checked against an actual run.

use std::collections::BTreeMap;

use crate::features::symbolic_execution::domain::concrete::{self, ConcreteValue};
use crate::features::symbolic_execution::domain::{ArithOp, CmpOp, ConcreteOutcome, SiteId};
use crate::shared::models::{AssignTarget, BoolOpKind, CompareOp, Expr, UnaryOp};

use super::constraint_builder::{INDEX_ERROR, KEY_ERROR, MODELED_BUILTINS, ZERO_DIVISION_ERROR};
use super::program::{Instr, Program};

/// Default instruction budget for one run
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum InterpOutcome {
    Returned(ConcreteValue),
    Raised(String),
    /// Undefined operation (division by zero, bad index, missing key)
    Undefined(String),
    /// Construct with no concrete model (opaque call, unsupported statement)
    Unsupported(String),
    StepLimit,
}

impl InterpOutcome {
    /// Whether this run ended the way `expected` says
    pub fn matches(&self, expected: &ConcreteOutcome) -> bool {
        match (self, expected) {
            (InterpOutcome::Returned(a), ConcreteOutcome::Return(b)) => a.same_outcome(b),
            (InterpOutcome::Raised(a), ConcreteOutcome::Raise(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for InterpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpOutcome::Returned(v) => write!(f, "{}", v),
            InterpOutcome::Raised(e) => write!(f, "raise {}", e),
            InterpOutcome::Undefined(why) => write!(f, "<undefined: {}>", why),
            InterpOutcome::Unsupported(what) => write!(f, "<unsupported: {}>", what),
            InterpOutcome::StepLimit => write!(f, "<step limit>"),
        }
    }
}

/// Arms taken plus the final outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub arms: Vec<(SiteId, u16)>,
    pub outcome: InterpOutcome,
}

enum Halt {
    Raise(&'static str),
    Undefined(String),
    Unsupported(String),
}

type Eval<T> = std::result::Result<T, Halt>;

fn undefined<T>(what: impl Into<String>) -> Eval<T> {
    Err(Halt::Undefined(what.into()))
}

fn defined(value: Option<ConcreteValue>, what: &str) -> Eval<ConcreteValue> {
    value.ok_or_else(|| Halt::Undefined(what.to_string()))
}

pub struct Interpreter<'p> {
    program: &'p Program,
    step_limit: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Run with one value per parameter (missing parameters are `None`)
    pub fn run(&self, inputs: &BTreeMap<String, ConcreteValue>) -> Trace {
        let mut vars: BTreeMap<String, ConcreteValue> = self
            .program
            .params
            .iter()
            .map(|p| {
                let value = inputs.get(&p.name).cloned().unwrap_or(ConcreteValue::Null);
                (p.name.clone(), value)
            })
            .collect();
        let mut arms = Vec::new();
        let outcome = self.execute(&mut vars, &mut arms);
        Trace { arms, outcome }
    }

    fn execute(
        &self,
        vars: &mut BTreeMap<String, ConcreteValue>,
        arms: &mut Vec<(SiteId, u16)>,
    ) -> InterpOutcome {
        let mut pc = 0;
        for _ in 0..self.step_limit {
            let Some(instr) = self.program.instrs.get(pc) else {
                return InterpOutcome::Returned(ConcreteValue::Null);
            };
            let step = match instr {
                Instr::Assign { target, value, .. } => {
                    self.eval(value, vars).and_then(|v| self.store(target, v, vars)).map(|_| pc + 1)
                }
                // Discarded values: an opaque call is skipped, as the explorer does
                Instr::Eval { value, .. } => match self.eval(value, vars) {
                    Ok(_) | Err(Halt::Unsupported(_)) => Ok(pc + 1),
                    Err(halt) => Err(halt),
                },
                Instr::Jump { target } => Ok(*target),
                Instr::LoopExit { .. } => Ok(pc + 1),
                Instr::Branch { site, then_pc, else_pc } => {
                    self.decide(*site, vars, arms)
                        .map(|taken| if taken { *then_pc } else { *else_pc })
                }
                Instr::LoopHead { site, body_pc, exit_pc, .. } => {
                    self.decide(*site, vars, arms)
                        .map(|taken| if taken { *body_pc } else { *exit_pc })
                }
                Instr::Return { value, .. } => {
                    return match value {
                        Some(expr) => match self.eval(expr, vars) {
                            Ok(v) => InterpOutcome::Returned(v),
                            Err(halt) => halt.into(),
                        },
                        None => InterpOutcome::Returned(ConcreteValue::Null),
                    };
                }
                Instr::Raise { exception, .. } => return InterpOutcome::Raised(exception.clone()),
                Instr::Unsupported { .. } => Ok(pc + 1),
            };
            match step {
                Ok(next) => pc = next,
                Err(halt) => return halt.into(),
            }
        }
        InterpOutcome::StepLimit
    }

    fn decide(
        &self,
        site: SiteId,
        vars: &BTreeMap<String, ConcreteValue>,
        arms: &mut Vec<(SiteId, u16)>,
    ) -> Eval<bool> {
        let decision = &self.program.site(site).decision;
        let rank = decision.select(|atom| self.eval(&decision.atoms[atom], vars).map(|v| v.truthy()))?;
        arms.push((site, rank as u16));
        Ok(decision.arms.get(rank).map(|a| a.taken).unwrap_or(false))
    }

    fn store(
        &self,
        target: &AssignTarget,
        value: ConcreteValue,
        vars: &mut BTreeMap<String, ConcreteValue>,
    ) -> Eval<()> {
        match target {
            AssignTarget::Name { id } => {
                vars.insert(id.clone(), value);
                Ok(())
            }
            AssignTarget::Index { base, index } => {
                let index = self.eval(index, vars)?;
                let Some(container) = vars.get_mut(base) else {
                    return undefined(format!("unbound name `{}`", base));
                };
                match container {
                    ConcreteValue::List(items) => {
                        let len = items.len() as i64;
                        let Some(i) = index.as_int() else {
                            return undefined("list index is not an integer");
                        };
                        let i = if i < 0 { i + len } else { i };
                        match items.get_mut(i as usize).filter(|_| (0..len).contains(&i)) {
                            Some(slot) => {
                                *slot = value;
                                Ok(())
                            }
                            None => undefined("list assignment index out of range"),
                        }
                    }
                    ConcreteValue::Dict(entries) => {
                        match entries.iter_mut().find(|(k, _)| k.same_outcome(&index)) {
                            Some(slot) => slot.1 = value,
                            None => entries.push((index, value)),
                        }
                        Ok(())
                    }
                    _ => undefined(format!("`{}` does not support item assignment", base)),
                }
            }
            AssignTarget::Attribute { base, attr } => match vars.get_mut(base) {
                Some(ConcreteValue::Object(fields)) => {
                    fields.insert(attr.clone(), value);
                    Ok(())
                }
                _ => undefined(format!("`{}` has no attributes", base)),
            },
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Expressions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn eval(&self, expr: &Expr, vars: &BTreeMap<String, ConcreteValue>) -> Eval<ConcreteValue> {
        match expr {
            Expr::Int { value } => Ok(ConcreteValue::Int(*value)),
            Expr::Float { value } => Ok(ConcreteValue::Float(*value)),
            Expr::Bool { value } => Ok(ConcreteValue::Bool(*value)),
            Expr::Str { value } => Ok(ConcreteValue::Str(value.clone())),
            Expr::None => Ok(ConcreteValue::Null),
            Expr::Name { id } => match vars.get(id) {
                Some(v) => Ok(v.clone()),
                None => undefined(format!("unbound name `{}`", id)),
            },
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, vars)?;
                let out = match op {
                    UnaryOp::Neg => concrete::negate(&v),
                    UnaryOp::Pos => match v {
                        ConcreteValue::Int(_) | ConcreteValue::Float(_) => Some(v),
                        ConcreteValue::Bool(b) => Some(ConcreteValue::Int(b as i64)),
                        _ => None,
                    },
                    UnaryOp::Invert => concrete::invert(&v),
                };
                defined(out, "bad operand for unary operator")
            }
            Expr::Binary { op, left, right } => {
                let a = self.eval(left, vars)?;
                let b = self.eval(right, vars)?;
                if ArithOp::from_ir(*op).is_some_and(|arith| concrete::divides_by_zero(arith, &b)) {
                    return Err(Halt::Raise(ZERO_DIVISION_ERROR));
                }
                let out = match ArithOp::from_ir(*op) {
                    Some(ArithOp::Add) => match (&a, &b) {
                        (ConcreteValue::List(x), ConcreteValue::List(y)) => {
                            Some(ConcreteValue::List(x.iter().chain(y).cloned().collect()))
                        }
                        _ => concrete::arith(ArithOp::Add, &a, &b),
                    },
                    Some(arith) => concrete::arith(arith, &a, &b),
                    None => concrete::bitwise(*op, &a, &b),
                };
                defined(out, "undefined arithmetic")
            }
            Expr::Compare { op, left, right } => {
                let a = self.eval(left, vars)?;
                let b = self.eval(right, vars)?;
                self.compare(*op, &a, &b)
            }
            Expr::BoolOp { op, values } => {
                let mut last = ConcreteValue::Bool(*op == BoolOpKind::And);
                for value in values {
                    last = self.eval(value, vars)?;
                    let stop = match op {
                        BoolOpKind::And => !last.truthy(),
                        BoolOpKind::Or => last.truthy(),
                    };
                    if stop {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Not { operand } => Ok(ConcreteValue::Bool(!self.eval(operand, vars)?.truthy())),
            Expr::IfExpr { cond, then, orelse } => {
                if self.eval(cond, vars)?.truthy() {
                    self.eval(then, vars)
                } else {
                    self.eval(orelse, vars)
                }
            }
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, vars))
                    .collect::<Eval<Vec<_>>>()?;
                self.call(func, &args)
            }
            Expr::Len { value } => {
                let v = self.eval(value, vars)?;
                defined(concrete::length(&v).map(ConcreteValue::Int), "object has no len()")
            }
            Expr::Index { value, index } => {
                let base = self.eval(value, vars)?;
                let index = self.eval(index, vars)?;
                concrete::index(&base, &index).ok_or_else(|| lookup_error(&base, &index))
            }
            Expr::Attribute { value, attr } => match self.eval(value, vars)? {
                ConcreteValue::Object(fields) => match fields.get(attr) {
                    Some(v) => Ok(v.clone()),
                    None => undefined(format!("missing attribute `.{}`", attr)),
                },
                _ => undefined(format!("attribute `.{}` on a non-object", attr)),
            },
            Expr::List { elems } => Ok(ConcreteValue::List(
                elems
                    .iter()
                    .map(|e| self.eval(e, vars))
                    .collect::<Eval<Vec<_>>>()?,
            )),
            Expr::Dict { entries } => {
                let mut out: Vec<(ConcreteValue, ConcreteValue)> = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.eval(&entry.key, vars)?;
                    let value = self.eval(&entry.value, vars)?;
                    match out.iter_mut().find(|(k, _)| k.same_outcome(&key)) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key, value)),
                    }
                }
                Ok(ConcreteValue::Dict(out))
            }
            Expr::Unsupported { construct } => {
                Err(Halt::Unsupported(format!("unsupported construct `{}`", construct)))
            }
        }
    }

    fn compare(&self, op: CompareOp, a: &ConcreteValue, b: &ConcreteValue) -> Eval<ConcreteValue> {
        let out = match op {
            CompareOp::In => concrete::contains(b, a),
            CompareOp::NotIn => concrete::contains(b, a).map(|v| !v),
            CompareOp::Is | CompareOp::IsNot => {
                if *a != ConcreteValue::Null && *b != ConcreteValue::Null {
                    return Err(Halt::Unsupported("identity comparison".into()));
                }
                let same = a == b;
                Some(if op == CompareOp::Is { same } else { !same })
            }
            _ => match CmpOp::from_ir(op) {
                Some(cmp) => concrete::compare(cmp, a, b),
                None => None,
            },
        };
        defined(out.map(ConcreteValue::Bool), "incomparable operands")
    }

    fn call(&self, func: &str, args: &[ConcreteValue]) -> Eval<ConcreteValue> {
        if !MODELED_BUILTINS.contains(&func) {
            return Err(Halt::Unsupported(format!("call to `{}`", func)));
        }
        match (func, args) {
            ("abs", [x]) => {
                let negative = defined(
                    concrete::compare(CmpOp::Lt, x, &ConcreteValue::Int(0)).map(ConcreteValue::Bool),
                    "bad operand for abs()",
                )?;
                if negative.truthy() {
                    defined(concrete::negate(x), "bad operand for abs()")
                } else {
                    Ok(x.clone())
                }
            }
            ("bool", [x]) => Ok(ConcreteValue::Bool(x.truthy())),
            ("min" | "max", [first, rest @ ..]) if !rest.is_empty() => {
                let better = if func == "min" { CmpOp::Lt } else { CmpOp::Gt };
                let mut best = first.clone();
                for next in rest {
                    match concrete::compare(better, next, &best) {
                        Some(true) => best = next.clone(),
                        Some(false) => {}
                        None => return undefined(format!("incomparable arguments to {}()", func)),
                    }
                }
                Ok(best)
            }
            _ => Err(Halt::Unsupported(format!("call to `{}`", func))),
        }
    }
}

/// Failed subscript: a bad position or a missing key raises, anything else is undefined
fn lookup_error(base: &ConcreteValue, index: &ConcreteValue) -> Halt {
    match (base, index) {
        (ConcreteValue::List(_) | ConcreteValue::Str(_), ConcreteValue::Int(_) | ConcreteValue::Bool(_)) => {
            Halt::Raise(INDEX_ERROR)
        }
        (ConcreteValue::Dict(_), key) if key.is_scalar() => Halt::Raise(KEY_ERROR),
        _ => Halt::Undefined("index out of range or missing key".into()),
    }
}

impl From<Halt> for InterpOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Raise(exception) => InterpOutcome::Raised(exception.to_string()),
            Halt::Undefined(what) => InterpOutcome::Undefined(what),
            Halt::Unsupported(what) => InterpOutcome::Unsupported(what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BinOp, FunctionIr, Param, Stmt, TypeTag};

    fn classify() -> Program {
        let x = || Expr::name("x");
        let f = FunctionIr::new(
            "classify",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::if_(
                Expr::compare(CompareOp::Gt, x(), Expr::int(10)),
                vec![Stmt::ret(Expr::str("high"))],
                vec![Stmt::if_(
                    Expr::compare(CompareOp::Gt, x(), Expr::int(5)),
                    vec![Stmt::ret(Expr::str("medium"))],
                    vec![Stmt::ret(Expr::str("low"))],
                )],
            )],
        );
        Program::lower(&f).unwrap()
    }

    fn inputs(x: i64) -> BTreeMap<String, ConcreteValue> {
        BTreeMap::from([("x".to_string(), ConcreteValue::Int(x))])
    }

    #[test]
    fn test_trace_records_arms() {
        let program = classify();
        let trace = Interpreter::new(&program).run(&inputs(7));
        assert_eq!(trace.outcome, InterpOutcome::Returned(ConcreteValue::Str("medium".into())));
        assert_eq!(trace.arms, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_loop_and_step_limit() {
        let f = FunctionIr::new(
            "spin",
            vec![Param::new("n", TypeTag::Int)],
            vec![
                Stmt::assign("i", Expr::int(0)),
                Stmt::while_(
                    Expr::compare(CompareOp::Lt, Expr::name("i"), Expr::name("n")),
                    vec![Stmt::assign(
                        "i",
                        Expr::binary(BinOp::Add, Expr::name("i"), Expr::int(1)),
                    )],
                ),
                Stmt::ret(Expr::name("i")),
            ],
        );
        let program = Program::lower(&f).unwrap();
        let n = BTreeMap::from([("n".to_string(), ConcreteValue::Int(3))]);
        let trace = Interpreter::new(&program).run(&n);
        assert_eq!(trace.outcome, InterpOutcome::Returned(ConcreteValue::Int(3)));
        assert_eq!(trace.arms.len(), 4);

        let many = BTreeMap::from([("n".to_string(), ConcreteValue::Int(1_000_000))]);
        let trace = Interpreter::new(&program).with_step_limit(50).run(&many);
        assert_eq!(trace.outcome, InterpOutcome::StepLimit);
    }

    #[test]
    fn test_undefined_and_opaque() {
        let f = FunctionIr::new(
            "div",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::ret(Expr::binary(BinOp::Div, Expr::int(1), Expr::name("x")))],
        );
        let program = Program::lower(&f).unwrap();
        let trace = Interpreter::new(&program).run(&inputs(0));
        assert_eq!(trace.outcome, InterpOutcome::Raised("ZeroDivisionError".into()));

        let h = FunctionIr::new(
            "at",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::ret(Expr::index(
                Expr::List {
                    elems: vec![Expr::int(1), Expr::int(2)],
                },
                Expr::name("x"),
            ))],
        );
        let program = Program::lower(&h).unwrap();
        let trace = Interpreter::new(&program).run(&inputs(-3));
        assert_eq!(trace.outcome, InterpOutcome::Raised("IndexError".into()));

        let k = FunctionIr::new(
            "len_of_int",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::ret(Expr::len(Expr::name("x")))],
        );
        let program = Program::lower(&k).unwrap();
        let trace = Interpreter::new(&program).run(&inputs(3));
        assert!(matches!(trace.outcome, InterpOutcome::Undefined(_)));

        let g = FunctionIr::new(
            "opaque",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::ret(Expr::call("random", vec![]))],
        );
        let program = Program::lower(&g).unwrap();
        let trace = Interpreter::new(&program).run(&inputs(1));
        assert_eq!(trace.outcome, InterpOutcome::Unsupported("call to `random`".into()));
    }

    #[test]
    fn test_builtins_match_symbolic_model() {
        let f = FunctionIr::new(
            "f",
            vec![Param::new("x", TypeTag::Int)],
            vec![Stmt::ret(Expr::call(
                "max",
                vec![Expr::call("abs", vec![Expr::name("x")]), Expr::int(3)],
            ))],
        );
        let program = Program::lower(&f).unwrap();
        let trace = Interpreter::new(&program).run(&inputs(-7));
        assert!(trace.outcome.matches(&ConcreteOutcome::Return(ConcreteValue::Int(7))));
    }
}
