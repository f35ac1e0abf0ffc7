//! Program lowering
//!
//! Lowers a structured `FunctionIr` once into a flat instruction list with
//! stable branch-site ids. The symbolic explorer and the concrete interpreter
//! both execute this form, so their branch traces are directly comparable.
//!
//! Branch conditions are decomposed into short-circuit outcomes: one arm per
//! way the `and`/`or`/`not` structure can evaluate, then-arms first.

use crate::errors::Result;
use crate::features::symbolic_execution::domain::{ArmKind, LoopId, SiteId};
use crate::shared::models::{
    AssignTarget, BinOp, BoolOpKind, CompareOp, Expr, FunctionIr, Param, Stmt, StmtKind,
};

/// Outcome enumeration is capped; beyond it a condition is one atom
pub const MAX_DECISION_ARMS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Assign {
        target: AssignTarget,
        value: Expr,
        line: Option<u32>,
    },
    Eval {
        value: Expr,
        line: Option<u32>,
    },
    Branch {
        site: SiteId,
        then_pc: usize,
        else_pc: usize,
    },
    LoopHead {
        loop_id: LoopId,
        site: SiteId,
        body_pc: usize,
        exit_pc: usize,
    },
    Jump {
        target: usize,
    },
    /// Resets the loop's iteration counter
    LoopExit {
        loop_id: LoopId,
    },
    Return {
        value: Option<Expr>,
        line: Option<u32>,
    },
    Raise {
        exception: String,
        line: Option<u32>,
    },
    Unsupported {
        construct: String,
        line: Option<u32>,
    },
}

/// One way a condition can short-circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionArm {
    /// (atom index, value) in evaluation order
    pub literals: Vec<(usize, bool)>,
    /// Value of the whole condition
    pub taken: bool,
}

/// Short-circuit decomposition of a branch condition
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub cond: Expr,
    pub atoms: Vec<Expr>,
    /// True outcomes first; the index is the arm's rank
    pub arms: Vec<DecisionArm>,
}

#[derive(Debug, Clone, PartialEq)]
enum BoolTree {
    Atom(usize),
    Not(Box<BoolTree>),
    And(Vec<BoolTree>),
    Or(Vec<BoolTree>),
}

type Outcomes = Vec<(Vec<(usize, bool)>, bool)>;

impl Decision {
    pub fn new(cond: Expr) -> Self {
        let mut atoms = Vec::new();
        let tree = Self::tree(&cond, &mut atoms);
        let outcomes = match Self::outcomes(&tree) {
            Some(outcomes) => outcomes,
            None => {
                atoms = vec![cond.clone()];
                Self::outcomes(&BoolTree::Atom(0)).unwrap_or_default()
            }
        };

        let (taken, not_taken): (Outcomes, Outcomes) =
            outcomes.into_iter().partition(|(_, value)| *value);
        let arms = taken
            .into_iter()
            .chain(not_taken)
            .map(|(literals, taken)| DecisionArm { literals, taken })
            .collect();

        Self { cond, atoms, arms }
    }

    fn tree(expr: &Expr, atoms: &mut Vec<Expr>) -> BoolTree {
        match expr {
            Expr::BoolOp { op, values } if !values.is_empty() => {
                let children = values.iter().map(|v| Self::tree(v, atoms)).collect();
                match op {
                    BoolOpKind::And => BoolTree::And(children),
                    BoolOpKind::Or => BoolTree::Or(children),
                }
            }
            Expr::Not { operand } => BoolTree::Not(Box::new(Self::tree(operand, atoms))),
            other => {
                atoms.push(other.clone());
                BoolTree::Atom(atoms.len() - 1)
            }
        }
    }

    /// DFS over evaluation order, atom-true first; `None` past the cap
    fn outcomes(tree: &BoolTree) -> Option<Outcomes> {
        match tree {
            BoolTree::Atom(i) => Some(vec![(vec![(*i, true)], true), (vec![(*i, false)], false)]),
            BoolTree::Not(inner) => Some(
                Self::outcomes(inner)?
                    .into_iter()
                    .map(|(lits, v)| (lits, !v))
                    .collect(),
            ),
            BoolTree::And(children) => Self::sequence(children, true),
            BoolTree::Or(children) => Self::sequence(children, false),
        }
    }

    fn sequence(children: &[BoolTree], is_and: bool) -> Option<Outcomes> {
        let (first, rest) = children.split_first()?;
        let head = Self::outcomes(first)?;
        if rest.is_empty() {
            return Some(head);
        }
        let tail = Self::sequence(rest, is_and)?;

        let mut out = Vec::new();
        for (lits, value) in head {
            if value == is_and {
                for (more, v) in &tail {
                    let mut combined = lits.clone();
                    combined.extend(more.iter().copied());
                    out.push((combined, *v));
                }
            } else {
                out.push((lits, value));
            }
            if out.len() > MAX_DECISION_ARMS {
                return None;
            }
        }
        Some(out)
    }

    /// Rank of the arm matching an atom evaluation (`eval` is called lazily)
    pub fn select<E>(&self, mut eval: impl FnMut(usize) -> std::result::Result<bool, E>) -> std::result::Result<usize, E> {
        let mut known: Vec<Option<bool>> = vec![None; self.atoms.len()];
        'arms: for (rank, arm) in self.arms.iter().enumerate() {
            for &(atom, expected) in &arm.literals {
                let value = match known[atom] {
                    Some(v) => v,
                    None => {
                        let v = eval(atom)?;
                        known[atom] = Some(v);
                        v
                    }
                };
                if value != expected {
                    continue 'arms;
                }
            }
            return Ok(rank);
        }
        // Outcomes are exhaustive; unreachable for well-formed decisions
        Ok(self.arms.len().saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    If,
    Loop(LoopId),
}

/// A decision point in the lowered program
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSite {
    pub id: SiteId,
    pub line: Option<u32>,
    pub kind: SiteKind,
    /// Loops whose body contains this site (a loop head includes its own loop)
    pub enclosing_loops: Vec<LoopId>,
    pub decision: Decision,
}

impl BranchSite {
    pub fn arm_kind(&self, rank: usize) -> ArmKind {
        let taken = self
            .decision
            .arms
            .get(rank)
            .map(|a| a.taken)
            .unwrap_or(false);
        match (self.kind, taken) {
            (SiteKind::If, true) => ArmKind::Then,
            (SiteKind::If, false) => ArmKind::Else,
            (SiteKind::Loop(_), true) => ArmKind::LoopContinue,
            (SiteKind::Loop(_), false) => ArmKind::LoopExit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    ForRange,
    ForEach,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopInfo {
    pub id: LoopId,
    pub line: Option<u32>,
    pub kind: LoopKind,
    pub head_pc: usize,
}

/// Lowered function
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub function: String,
    pub params: Vec<Param>,
    pub instrs: Vec<Instr>,
    pub sites: Vec<BranchSite>,
    pub loops: Vec<LoopInfo>,
}

impl Program {
    /// Validate and lower
    pub fn lower(function: &FunctionIr) -> Result<Self> {
        function.validate()?;
        let mut lowerer = Lowerer::new(function);
        lowerer.block(&function.body);
        lowerer.push(Instr::Return {
            value: None,
            line: None,
        });
        tracing::debug!(
            function = %function.name,
            instrs = lowerer.instrs.len(),
            sites = lowerer.sites.len(),
            loops = lowerer.loops.len(),
            "lowered function"
        );
        Ok(Program {
            function: function.name.clone(),
            params: function.params.clone(),
            instrs: lowerer.instrs,
            sites: lowerer.sites,
            loops: lowerer.loops,
        })
    }

    pub fn site(&self, id: SiteId) -> &BranchSite {
        &self.sites[id as usize]
    }

    /// `function:line` (or `function:site<N>` without line info)
    pub fn location(&self, id: SiteId) -> String {
        match self.site(id).line {
            Some(line) => format!("{}:{}", self.function, line),
            None => format!("{}:site{}", self.function, id),
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

struct LoopCtx {
    id: LoopId,
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

struct Lowerer {
    instrs: Vec<Instr>,
    sites: Vec<BranchSite>,
    loops: Vec<LoopInfo>,
    loop_stack: Vec<LoopCtx>,
}

impl Lowerer {
    fn new(_function: &FunctionIr) -> Self {
        Self {
            instrs: Vec::new(),
            sites: Vec::new(),
            loops: Vec::new(),
            loop_stack: Vec::new(),
        }
    }

    fn push(&mut self, instr: Instr) -> usize {
        self.instrs.push(instr);
        self.instrs.len() - 1
    }

    fn pc(&self) -> usize {
        self.instrs.len()
    }

    fn new_site(&mut self, line: Option<u32>, kind: SiteKind, cond: Expr) -> SiteId {
        let id = self.sites.len() as SiteId;
        let mut enclosing: Vec<LoopId> = self.loop_stack.iter().map(|l| l.id).collect();
        if let SiteKind::Loop(own) = kind {
            enclosing.push(own);
        }
        self.sites.push(BranchSite {
            id,
            line,
            kind,
            enclosing_loops: enclosing,
            decision: Decision::new(cond),
        });
        id
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.instrs[at] {
            Instr::Jump { target: t } => *t = target,
            Instr::Branch { else_pc, .. } => *else_pc = target,
            Instr::LoopHead { exit_pc, .. } => *exit_pc = target,
            _ => {}
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                self.push(Instr::Assign {
                    target: target.clone(),
                    value: value.clone(),
                    line,
                });
            }
            StmtKind::Expr { value } => {
                self.push(Instr::Eval {
                    value: value.clone(),
                    line,
                });
            }
            StmtKind::Pass => {}
            StmtKind::If { cond, then, orelse } => {
                let site = self.new_site(line, SiteKind::If, cond.clone());
                let branch = self.push(Instr::Branch {
                    site,
                    then_pc: self.pc() + 1,
                    else_pc: 0,
                });
                self.block(then);
                if orelse.is_empty() {
                    let end = self.pc();
                    self.patch(branch, end);
                } else {
                    let jump = self.push(Instr::Jump { target: 0 });
                    let else_pc = self.pc();
                    self.patch(branch, else_pc);
                    self.block(orelse);
                    let end = self.pc();
                    self.patch(jump, end);
                }
            }
            StmtKind::While { cond, body } => {
                self.lower_loop(line, LoopKind::While, cond.clone(), Vec::new(), body, Vec::new());
            }
            StmtKind::ForRange {
                var,
                start,
                stop,
                step,
                body,
            } => {
                let id = self.loops.len();
                let counter = format!("__range_i_{}", id);
                let stop_var = format!("__range_stop_{}", id);
                let mut setup = vec![
                    assign(&stop_var, stop.clone()),
                    assign(&counter, start.clone()),
                ];
                let (step_expr, cond) = match step {
                    Expr::Int { value } => {
                        let op = if *value > 0 { CompareOp::Lt } else { CompareOp::Gt };
                        (
                            step.clone(),
                            Expr::compare(op, Expr::name(&counter), Expr::name(&stop_var)),
                        )
                    }
                    other => {
                        let step_var = format!("__range_step_{}", id);
                        setup.push(assign(&step_var, other.clone()));
                        let ascending = Expr::and(vec![
                            Expr::compare(CompareOp::Gt, Expr::name(&step_var), Expr::int(0)),
                            Expr::compare(CompareOp::Lt, Expr::name(&counter), Expr::name(&stop_var)),
                        ]);
                        let descending = Expr::and(vec![
                            Expr::compare(CompareOp::Lt, Expr::name(&step_var), Expr::int(0)),
                            Expr::compare(CompareOp::Gt, Expr::name(&counter), Expr::name(&stop_var)),
                        ]);
                        (Expr::name(&step_var), Expr::or(vec![ascending, descending]))
                    }
                };
                let prologue = vec![assign(var, Expr::name(&counter))];
                let increment = vec![assign(
                    &counter,
                    Expr::binary(BinOp::Add, Expr::name(&counter), step_expr),
                )];
                for instr in setup {
                    self.push(instr);
                }
                self.lower_loop(line, LoopKind::ForRange, cond, prologue, body, increment);
            }
            StmtKind::ForEach { var, iter, body } => {
                let id = self.loops.len();
                let seq = format!("__iter_seq_{}", id);
                let idx = format!("__iter_idx_{}", id);
                self.push(assign(&seq, iter.clone()));
                self.push(assign(&idx, Expr::int(0)));
                let cond = Expr::compare(
                    CompareOp::Lt,
                    Expr::name(&idx),
                    Expr::len(Expr::name(&seq)),
                );
                let prologue = vec![assign(
                    var,
                    Expr::index(Expr::name(&seq), Expr::name(&idx)),
                )];
                let increment = vec![assign(
                    &idx,
                    Expr::binary(BinOp::Add, Expr::name(&idx), Expr::int(1)),
                )];
                self.lower_loop(line, LoopKind::ForEach, cond, prologue, body, increment);
            }
            StmtKind::Return { value } => {
                self.push(Instr::Return {
                    value: value.clone(),
                    line,
                });
            }
            StmtKind::Raise { exception } => {
                self.push(Instr::Raise {
                    exception: exception.clone(),
                    line,
                });
            }
            StmtKind::Break => {
                let at = self.push(Instr::Jump { target: 0 });
                if let Some(ctx) = self.loop_stack.last_mut() {
                    ctx.breaks.push(at);
                }
            }
            StmtKind::Continue => {
                let at = self.push(Instr::Jump { target: 0 });
                if let Some(ctx) = self.loop_stack.last_mut() {
                    ctx.continues.push(at);
                }
            }
            StmtKind::Unsupported { construct } => {
                self.push(Instr::Unsupported {
                    construct: construct.clone(),
                    line,
                });
            }
        }
    }

    /// head: LoopHead -> prologue; body; [continue target] increment; jump head
    /// exit: LoopExit
    fn lower_loop(
        &mut self,
        line: Option<u32>,
        kind: LoopKind,
        cond: Expr,
        prologue: Vec<Instr>,
        body: &[Stmt],
        increment: Vec<Instr>,
    ) {
        let loop_id = self.loops.len() as LoopId;
        let head_pc = self.pc();
        self.loops.push(LoopInfo {
            id: loop_id,
            line,
            kind,
            head_pc,
        });
        let site = self.new_site(line, SiteKind::Loop(loop_id), cond);
        let head = self.push(Instr::LoopHead {
            loop_id,
            site,
            body_pc: head_pc + 1,
            exit_pc: 0,
        });

        self.loop_stack.push(LoopCtx {
            id: loop_id,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        for instr in prologue {
            self.push(instr);
        }
        self.block(body);
        let continue_pc = self.pc();
        for instr in increment {
            self.push(instr);
        }
        self.push(Instr::Jump { target: head });
        let exit_pc = self.push(Instr::LoopExit { loop_id });

        self.patch(head, exit_pc);
        if let Some(ctx) = self.loop_stack.pop() {
            for at in ctx.breaks {
                self.patch(at, exit_pc);
            }
            for at in ctx.continues {
                self.patch(at, continue_pc);
            }
        }
    }
}

fn assign(name: &str, value: Expr) -> Instr {
    Instr::Assign {
        target: AssignTarget::name(name),
        value,
        line: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::TypeTag;

    fn gt(name: &str, v: i64) -> Expr {
        Expr::compare(CompareOp::Gt, Expr::name(name), Expr::int(v))
    }

    fn lt(name: &str, v: i64) -> Expr {
        Expr::compare(CompareOp::Lt, Expr::name(name), Expr::int(v))
    }

    #[test]
    fn test_decision_single_atom() {
        let d = Decision::new(gt("x", 10));
        assert_eq!(d.atoms.len(), 1);
        assert_eq!(
            d.arms,
            vec![
                DecisionArm {
                    literals: vec![(0, true)],
                    taken: true
                },
                DecisionArm {
                    literals: vec![(0, false)],
                    taken: false
                },
            ]
        );
    }

    #[test]
    fn test_decision_and_short_circuits() {
        let d = Decision::new(Expr::and(vec![gt("x", 10), lt("x", 5)]));
        let arms: Vec<(Vec<(usize, bool)>, bool)> =
            d.arms.iter().map(|a| (a.literals.clone(), a.taken)).collect();
        assert_eq!(
            arms,
            vec![
                (vec![(0, true), (1, true)], true),
                (vec![(0, true), (1, false)], false),
                (vec![(0, false)], false),
            ]
        );
    }

    #[test]
    fn test_decision_or_with_not() {
        let d = Decision::new(Expr::or(vec![Expr::not(gt("a", 0)), gt("b", 0)]));
        let taken: Vec<bool> = d.arms.iter().map(|a| a.taken).collect();
        assert_eq!(taken, vec![true, true, false]);
        // not a: a=false short-circuits the `or`
        assert_eq!(d.arms[0].literals, vec![(0, false)]);
    }

    #[test]
    fn test_decision_cap_collapses_to_one_atom() {
        let clauses: Vec<Expr> = (0..8)
            .map(|i| Expr::or(vec![gt("x", i), lt("y", i)]))
            .collect();
        let d = Decision::new(Expr::and(clauses));
        assert_eq!(d.atoms.len(), 1);
        assert_eq!(d.arms.len(), 2);
    }

    #[test]
    fn test_select_matches_evaluation() {
        let d = Decision::new(Expr::and(vec![gt("x", 10), lt("x", 5)]));
        let values = [true, false];
        let rank: std::result::Result<usize, ()> = d.select(|i| Ok(values[i]));
        assert_eq!(rank, Ok(1));
        let rank: std::result::Result<usize, ()> = d.select(|_| Ok(false));
        assert_eq!(rank, Ok(2));
    }

    #[test]
    fn test_lower_if_else_and_loop() {
        let f = FunctionIr::new(
            "f",
            vec![Param::new("n", TypeTag::Int)],
            vec![
                Stmt::for_range(
                    "i",
                    Expr::int(0),
                    Expr::name("n"),
                    vec![Stmt::if_(gt("i", 3), vec![Stmt::brk()], vec![]).at(3)],
                )
                .at(2),
                Stmt::ret(Expr::int(1)).at(4),
            ],
        );
        let program = Program::lower(&f).unwrap();

        assert_eq!(program.loops.len(), 1);
        assert_eq!(program.sites.len(), 2);
        let loop_site = &program.sites[0];
        let if_site = &program.sites[1];
        assert_eq!(loop_site.enclosing_loops, vec![0]);
        assert_eq!(if_site.enclosing_loops, vec![0]);
        assert_eq!(program.location(1), "f:3");

        // break and loop exit share the LoopExit instruction
        let exit_pc = program
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::LoopExit { .. }))
            .unwrap();
        let head = program
            .instrs
            .iter()
            .find_map(|i| match i {
                Instr::LoopHead { exit_pc, .. } => Some(*exit_pc),
                _ => None,
            })
            .unwrap();
        assert_eq!(head, exit_pc);
        assert!(program
            .instrs
            .iter()
            .any(|i| matches!(i, Instr::Jump { target } if *target == exit_pc)));
        assert!(matches!(
            program.instrs.last(),
            Some(Instr::Return { value: None, .. })
        ));
    }

    #[test]
    fn test_lower_rejects_invalid_ir() {
        let f = FunctionIr::new("f", vec![], vec![Stmt::cont()]);
        assert!(Program::lower(&f).is_err());
    }
}
