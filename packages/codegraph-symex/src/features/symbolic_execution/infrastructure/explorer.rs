//! Path explorer
//!
//! ```text
//! worklist ──pop (prioritizer)──▶ run straight-line instructions
//!    ▲                                   │
//!    │                          Branch / LoopHead
//!    │                                   ▼
//!    └──── feasible arms ◀──── fork + feasibility check ────▶ pruned arms (ledger)
//!                                        │
//!                     Return / Raise / failed operation guard
//!                                        ▼
//!                 finalize: budget unit, model, example, concrete replay
//! ```
//!
//! Each arm's condition is checked as soon as the arm is created, so a node
//! on the worklist is always feasible (or unresolved). A parent's model is
//! reused when it already satisfies the new arm.
//!
//! An operation that can raise (division by a symbolic divisor, a list read
//! out of bounds, a missing dict key) splits off a raising child where its
//! guard fails; the arms that continue carry the guard in their condition.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::features::symbolic_execution::domain::{
    ArmKind, ArmLedger, BranchLabel, ExecutionPath, ExprRef, LoopId, Model, NodeId, PathArena,
    PathNode, PathOutcome, PathStatus, SiteId, SymExpr, SymbolicEnvironment, TruncationReason,
    RAISE_RANK, STATEMENT_SITE,
};
use crate::features::symbolic_execution::ports::{
    ExplorationHistory, SolverAdapter, SolverQuery, SolverResult, SolverStats, WorklistView,
};

use super::constraint_builder::{definedness_guards, faults, ConstraintBuilder, Fault};
use super::interpreter::Interpreter;
use super::prioritizer::comparison_features;
use super::program::Instr;
use super::session::{AnalysisSession, PathBudget};
use super::solver::holds;
use super::synthesizer::{complete_model, expected_outcome, synthesize};

/// Everything one explorer produced
#[derive(Debug, Default)]
pub struct ExplorationOutcome {
    pub paths: Vec<ExecutionPath>,
    pub ledger: ArmLedger,
    /// Loops that hit the unroll bound on some path
    pub truncated_loops: BTreeSet<LoopId>,
    pub solver_stats: SolverStats,
    pub nodes: usize,
    pub budget_exhausted: bool,
    pub time_exhausted: bool,
}

impl ExplorationOutcome {
    pub fn merge(&mut self, other: ExplorationOutcome) {
        self.paths.extend(other.paths);
        self.ledger.merge(&other.ledger);
        self.truncated_loops.extend(other.truncated_loops);
        self.solver_stats.merge(&other.solver_stats);
        self.nodes += other.nodes;
        self.budget_exhausted |= other.budget_exhausted;
        self.time_exhausted |= other.time_exhausted;
    }

    /// Stable result order: root-to-leaf arm ranks
    pub fn sort_paths(&mut self) {
        self.paths.sort_by_cached_key(|p| p.order_key());
    }
}

struct WorkEntry {
    id: NodeId,
    key: Vec<u16>,
}

enum Feasibility {
    Sat(Option<Arc<Model>>),
    Pruned,
    Unknown(String),
}

/// Parent state every arm of a fork starts from
struct ForkBase {
    id: NodeId,
    key: Vec<u16>,
    condition: Vec<ExprRef>,
    depth: usize,
    unknown: bool,
    model: Option<Arc<Model>>,
    features: Arc<BTreeSet<String>>,
    iterations: std::collections::BTreeMap<LoopId, usize>,
}

pub struct Explorer<'s> {
    session: &'s AnalysisSession,
    budget: &'s PathBudget,
    builder: ConstraintBuilder<'s>,
    solver: Box<dyn SolverAdapter>,
    arena: PathArena,
    worklist: Vec<WorkEntry>,
    history: ExplorationHistory,
    out: ExplorationOutcome,
    pops: usize,
    worker: Option<usize>,
    stopped: bool,
}

impl<'s> Explorer<'s> {
    /// Explorer rooted at function entry
    pub fn new(session: &'s AnalysisSession, worker: Option<usize>) -> Self {
        let root = PathNode::root(session.entry.environment.clone());
        Self::from_seed(session, root, &session.budget, worker)
    }

    /// Explorer rooted at a re-rooted frontier node, drawing on `budget`
    pub fn from_seed(
        session: &'s AnalysisSession,
        seed: PathNode,
        budget: &'s PathBudget,
        worker: Option<usize>,
    ) -> Self {
        let key = seed.inherited_trail.iter().map(|l| l.rank).collect();
        let mut arena = PathArena::new();
        let id = arena.alloc(seed);
        Self {
            session,
            budget,
            builder: ConstraintBuilder::new(&session.config),
            solver: session.fork_solver(),
            arena,
            worklist: vec![WorkEntry { id, key }],
            history: ExplorationHistory::default(),
            out: ExplorationOutcome::default(),
            pops: 0,
            worker,
            stopped: false,
        }
    }

    /// Explore until the worklist is empty or a budget runs out
    pub fn run(mut self) -> ExplorationOutcome {
        while let Some((id, priority)) = self.pop() {
            if self.check_budgets(id) {
                break;
            }
            self.step(id, priority);
            if self.stopped {
                break;
            }
        }
        self.finish()
    }

    /// Breadth-first until the frontier holds `target` nodes; returns the frontier re-rooted
    pub fn split(mut self, target: usize) -> (ExplorationOutcome, Vec<PathNode>) {
        while !self.worklist.is_empty() && self.worklist.len() < target && !self.stopped {
            let entry = self.worklist.remove(0);
            self.pops += 1;
            if self.check_budgets(entry.id) {
                break;
            }
            self.step(entry.id, 0.0);
        }
        let frontier: Vec<PathNode> = std::mem::take(&mut self.worklist)
            .into_iter()
            .map(|entry| self.reroot(entry.id))
            .collect();
        tracing::debug!(frontier = frontier.len(), target, "split phase finished");
        (self.finish(), frontier)
    }

    fn reroot(&mut self, id: NodeId) -> PathNode {
        let condition = self.arena.condition(id);
        let trail = self.arena.trail(id);
        let environment = self.arena.release(id);
        let node = self.arena.get(id);
        PathNode {
            id: 0,
            parent_id: None,
            branch_label: None,
            depth: node.depth,
            environment,
            condition_delta: condition,
            inherited_trail: trail,
            pc: node.pc,
            loop_iterations: node.loop_iterations.clone(),
            unknown: node.unknown,
            last_model: node.last_model.clone(),
            features: node.features.clone(),
            fault: node.fault.clone(),
        }
    }

    fn finish(mut self) -> ExplorationOutcome {
        self.out.solver_stats = self.solver.stats();
        self.out.nodes = self.arena.len();
        self.session.record_stats(&self.out.solver_stats);
        self.out
    }

    fn pop(&mut self) -> Option<(NodeId, f64)> {
        if self.worklist.is_empty() {
            return None;
        }
        let prioritizer = &self.session.prioritizer;
        let (index, score) = {
            let views: Vec<WorklistView<'_>> = self
                .worklist
                .iter()
                .map(|entry| {
                    let node = self.arena.get(entry.id);
                    WorklistView {
                        node_id: entry.id,
                        order_key: &entry.key,
                        depth: node.depth,
                        features: node.features.as_ref(),
                    }
                })
                .collect();
            let order = prioritizer.order(&views, &self.history, self.budget.remaining());
            let index = order.first().copied().unwrap_or(0);
            (index, prioritizer.score(&views[index], &self.history))
        };
        let entry = self.worklist.swap_remove(index);
        self.pops += 1;
        Some((entry.id, score))
    }

    /// Stop on an exhausted time or path budget; `true` when stopped
    fn check_budgets(&mut self, id: NodeId) -> bool {
        let reason = if self.session.time_exhausted() {
            self.out.time_exhausted = true;
            TruncationReason::TimeBudget
        } else if self.budget.is_exhausted() {
            self.out.budget_exhausted = true;
            TruncationReason::PathBudget
        } else {
            return false;
        };
        self.stop(id, reason);
        true
    }

    /// Truncate `id` and everything still on the worklist
    fn stop(&mut self, id: NodeId, reason: TruncationReason) {
        let pending = std::mem::take(&mut self.worklist);
        tracing::warn!(
            worker = ?self.worker,
            pending = pending.len() + 1,
            reason = ?reason,
            "exploration budget exhausted, truncating remaining paths"
        );
        let env = self.arena.release(id);
        self.push_truncated(id, env, reason.clone(), None);
        for entry in pending {
            let env = self.arena.release(entry.id);
            self.push_truncated(entry.id, env, reason.clone(), None);
        }
        self.stopped = true;
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Stepping
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn step(&mut self, id: NodeId, priority: f64) {
        let Some(mut env) = self.arena.release(id) else {
            return;
        };
        if let Some(exception) = self.arena.get(id).fault.clone() {
            self.finalize(id, env, PathOutcome::Raise(exception), priority);
            return;
        }
        let mut id = id;
        let session = self.session;
        let program = &session.program;
        let mut pc = self.arena.get(id).pc;
        let mut iterations = self.arena.get(id).loop_iterations.clone();

        loop {
            let Some(instr) = program.instrs.get(pc) else {
                self.finalize(id, env, PathOutcome::Return(SymExpr::null()), priority);
                return;
            };
            match instr {
                Instr::Assign { target, value, .. } => {
                    let value = self.builder.build(value, &mut env);
                    let Some(next) = self.guard_statement(id, &mut env, &value, pc, &iterations) else {
                        return;
                    };
                    id = next;
                    self.builder.assign(target, value, &mut env);
                    pc += 1;
                }
                Instr::Eval { value, .. } => {
                    let value = self.builder.build(value, &mut env);
                    let Some(next) = self.guard_statement(id, &mut env, &value, pc, &iterations) else {
                        return;
                    };
                    id = next;
                    pc += 1;
                }
                Instr::Jump { target } => pc = *target,
                Instr::LoopExit { loop_id } => {
                    iterations.remove(loop_id);
                    pc += 1;
                }
                Instr::Unsupported { construct, line } => {
                    let note = format!("unsupported statement `{}`", construct);
                    tracing::warn!(line = ?line, "{}", note);
                    env.note_approximation(note);
                    pc += 1;
                }
                Instr::Return { value, .. } => {
                    let value = match value {
                        Some(expr) => self.builder.build(expr, &mut env),
                        None => SymExpr::null(),
                    };
                    let Some(id) = self.guard_statement(id, &mut env, &value, pc, &iterations) else {
                        return;
                    };
                    self.finalize(id, env, PathOutcome::Return(value), priority);
                    return;
                }
                Instr::Raise { exception, .. } => {
                    self.finalize(id, env, PathOutcome::Raise(exception.clone()), priority);
                    return;
                }
                Instr::Branch {
                    site,
                    then_pc,
                    else_pc,
                } => {
                    let base = self.fork_base(id, iterations);
                    self.fork(&base, &env, *site, |taken| if taken { *then_pc } else { *else_pc }, None);
                    return;
                }
                Instr::LoopHead {
                    loop_id,
                    site,
                    body_pc,
                    exit_pc,
                } => {
                    let base = self.fork_base(id, iterations);
                    let count = base.iterations.get(loop_id).copied().unwrap_or(0);
                    let allowed = session.loops.should_continue(*loop_id, count);
                    self.fork(
                        &base,
                        &env,
                        *site,
                        |taken| if taken { *body_pc } else { *exit_pc },
                        Some((*loop_id, allowed)),
                    );
                    if !allowed {
                        self.truncate_loop(&base, &env, *site, *loop_id, priority);
                    }
                    return;
                }
            }
        }
    }

    fn fork_base(&self, id: NodeId, iterations: std::collections::BTreeMap<LoopId, usize>) -> ForkBase {
        let node = self.arena.get(id);
        ForkBase {
            id,
            key: self.arena.order_key(id),
            condition: self.arena.condition(id),
            depth: node.depth,
            unknown: node.unknown,
            model: node.last_model.clone(),
            features: node.features.clone(),
            iterations,
        }
    }

    /// One child per feasible arm of the decision at `site_id`
    fn fork(
        &mut self,
        base: &ForkBase,
        env: &SymbolicEnvironment,
        site_id: SiteId,
        target: impl Fn(bool) -> usize,
        loop_ctx: Option<(LoopId, bool)>,
    ) {
        let session = self.session;
        let site = session.program.site(site_id);
        let decision = &site.decision;

        let mut raise_rank = 0u16;
        let mut split: BTreeSet<(Vec<(usize, bool)>, usize)> = BTreeSet::new();
        for (rank, arm) in decision.arms.iter().enumerate() {
            let kind = site.arm_kind(rank);
            let skipped = arm.taken && matches!(loop_ctx, Some((_, false)));
            let mut child_env = env.clone();
            let mut literals: Vec<ExprRef> = Vec::with_capacity(arm.literals.len());
            let mut safe: Vec<ExprRef> = Vec::new();
            let mut uncovered = false;
            for (i, &(atom, value)) in arm.literals.iter().enumerate() {
                let c = self.builder.condition(&decision.atoms[atom], &mut child_env);
                let found = faults(&c);
                uncovered |= found.is_empty() && c.contains_undefined();
                if !found.is_empty() && split.insert((arm.literals[..i].to_vec(), atom)) {
                    let prefix: Vec<ExprRef> = safe.iter().chain(&literals).cloned().collect();
                    let guards =
                        self.spawn_faults(base, &child_env, site_id, &prefix, &found, &mut raise_rank);
                    safe.extend(guards);
                } else {
                    safe.extend(found.into_iter().map(|f| f.guard));
                }
                literals.push(if value { c } else { SymExpr::mk_not(c) });
            }
            if skipped {
                continue;
            }
            literals.retain(|c| !c.is_true());
            safe.retain(|g| !literals.iter().any(|l| l.fingerprint() == g.fingerprint()));
            let guard = render_guard(&literals);
            let delta: Vec<ExprRef> = safe.into_iter().chain(literals).collect();
            let rank16 = rank as u16;

            let verdict = match self.feasibility(base, &delta) {
                Feasibility::Pruned if uncovered => {
                    Feasibility::Unknown("condition involves an undefined operation".to_string())
                }
                verdict => verdict,
            };
            let (unknown, model) = match verdict {
                Feasibility::Pruned => {
                    tracing::debug!(site = site_id, arm = rank, guard = %guard, "arm pruned");
                    self.out.ledger.record_pruned(site_id, rank16, kind, &guard);
                    continue;
                }
                Feasibility::Sat(model) => {
                    self.out.ledger.record_feasible(site_id, rank16, kind, &guard);
                    (false, model)
                }
                Feasibility::Unknown(reason) => {
                    self.out.ledger.record_unknown(site_id, rank16, kind, &guard);
                    child_env.note_approximation(format!(
                        "{} at {}: {}",
                        kind.as_str(),
                        session.program.location(site_id),
                        reason
                    ));
                    (true, base.model.clone())
                }
            };
            if cfg!(feature = "trace") {
                tracing::trace!(site = site_id, arm = rank, guard = %guard, unknown, "arm feasible");
            }

            let mut iterations = base.iterations.clone();
            let mut depth = base.depth;
            if let (Some((loop_id, _)), true) = (loop_ctx, arm.taken) {
                *iterations.entry(loop_id).or_insert(0) += 1;
                depth += 1;
            }
            let mut features = (*base.features).clone();
            for c in &delta {
                comparison_features(c, &mut features);
            }
            let mut key = base.key.clone();
            key.push(rank16);

            let child = PathNode {
                id: 0,
                parent_id: Some(base.id),
                branch_label: Some(BranchLabel {
                    site: site_id,
                    rank: rank16,
                    kind,
                }),
                depth,
                environment: Some(child_env),
                condition_delta: delta,
                inherited_trail: Vec::new(),
                pc: target(arm.taken),
                loop_iterations: iterations,
                unknown,
                last_model: model,
                features: Arc::new(features),
                fault: None,
            };
            let id = self.arena.alloc(child);
            self.worklist.push(WorkEntry { id, key });
        }
    }

    /// Report the continuation past the unroll bound as one TRUNCATED path
    fn truncate_loop(
        &mut self,
        base: &ForkBase,
        env: &SymbolicEnvironment,
        site_id: SiteId,
        loop_id: LoopId,
        priority: f64,
    ) {
        let session = self.session;
        let site = session.program.site(site_id);
        let mut child_env = env.clone();
        let cond = self.builder.condition(&site.decision.cond, &mut child_env);
        let delta: Vec<ExprRef> = if cond.is_true() { Vec::new() } else { vec![cond] };
        let model = match self.feasibility(base, &delta) {
            Feasibility::Pruned => return,
            Feasibility::Sat(model) => model,
            Feasibility::Unknown(_) => base.model.clone(),
        };
        let Some(rank) = site.decision.arms.iter().position(|a| a.taken) else {
            return;
        };
        let bound = session.loops.bound();
        tracing::debug!(
            loop_id,
            bound,
            location = %session.program.location(site_id),
            "loop bound reached, truncating"
        );
        self.out.truncated_loops.insert(loop_id);

        let child = PathNode {
            id: 0,
            parent_id: Some(base.id),
            branch_label: Some(BranchLabel {
                site: site_id,
                rank: rank as u16,
                kind: site.arm_kind(rank),
            }),
            depth: base.depth,
            environment: None,
            condition_delta: delta,
            inherited_trail: Vec::new(),
            pc: 0,
            loop_iterations: base.iterations.clone(),
            unknown: true,
            last_model: model,
            features: base.features.clone(),
            fault: None,
        };
        let id = self.arena.alloc(child);
        let note = format!(
            "loop at {} continues past {} iterations",
            session.program.location(site_id),
            bound
        );
        self.push_truncated(id, Some(child_env), TruncationReason::LoopBound { loop_id, bound }, Some(note));
        if let Some(path) = self.out.paths.last_mut() {
            path.priority = priority;
        }
    }

    /// One raising child per fault whose guard can fail after `prefix`; returns the guards
    fn spawn_faults(
        &mut self,
        base: &ForkBase,
        env: &SymbolicEnvironment,
        site: SiteId,
        prefix: &[ExprRef],
        found: &[Fault],
        next_rank: &mut u16,
    ) -> Vec<ExprRef> {
        let mut safe: Vec<ExprRef> = Vec::with_capacity(found.len());
        for fault in found {
            let rank = RAISE_RANK.saturating_add(*next_rank);
            *next_rank = next_rank.saturating_add(1);
            let delta: Vec<ExprRef> = prefix
                .iter()
                .chain(&safe)
                .cloned()
                .chain(std::iter::once(SymExpr::mk_not(fault.guard.clone())))
                .collect();
            safe.push(fault.guard.clone());

            let mut child_env = env.clone();
            let (unknown, model) = match self.feasibility(base, &delta) {
                Feasibility::Pruned => continue,
                Feasibility::Sat(model) => (false, model),
                Feasibility::Unknown(reason) => {
                    child_env.note_approximation(format!("{} guard: {}", fault.exception, reason));
                    (true, base.model.clone())
                }
            };
            tracing::debug!(site, exception = fault.exception, guard = %fault.guard, "operation may raise");

            let mut features = (*base.features).clone();
            for c in &delta {
                comparison_features(c, &mut features);
            }
            let mut key = base.key.clone();
            key.push(rank);
            let child = PathNode {
                id: 0,
                parent_id: Some(base.id),
                branch_label: Some(BranchLabel {
                    site,
                    rank,
                    kind: ArmKind::Raise,
                }),
                depth: base.depth,
                environment: Some(child_env),
                condition_delta: delta,
                inherited_trail: Vec::new(),
                pc: 0,
                loop_iterations: base.iterations.clone(),
                unknown,
                last_model: model,
                features: Arc::new(features),
                fault: Some(fault.exception.to_string()),
            };
            let id = self.arena.alloc(child);
            self.worklist.push(WorkEntry { id, key });
        }
        safe
    }

    /// Split raising children off a statement's value; `None` when it always raises
    fn guard_statement(
        &mut self,
        id: NodeId,
        env: &mut SymbolicEnvironment,
        value: &ExprRef,
        pc: usize,
        iterations: &std::collections::BTreeMap<LoopId, usize>,
    ) -> Option<NodeId> {
        let found = faults(value);
        if found.is_empty() {
            return Some(id);
        }
        let base = self.fork_base(id, iterations.clone());
        let mut next_rank = 0;
        let safe = self.spawn_faults(&base, env, STATEMENT_SITE, &[], &found, &mut next_rank);
        let (unknown, model) = match self.feasibility(&base, &safe) {
            Feasibility::Pruned => {
                tracing::debug!(node = id, pc, "statement raises on every input reaching it");
                return None;
            }
            Feasibility::Sat(model) => (false, model),
            Feasibility::Unknown(reason) => {
                env.note_approximation(format!("operation guard: {}", reason));
                (true, base.model.clone())
            }
        };
        let mut features = (*base.features).clone();
        for c in &safe {
            comparison_features(c, &mut features);
        }
        let child = PathNode {
            id: 0,
            parent_id: Some(id),
            branch_label: None,
            depth: base.depth,
            environment: None,
            condition_delta: safe,
            inherited_trail: Vec::new(),
            pc,
            loop_iterations: base.iterations,
            unknown,
            last_model: model,
            features: Arc::new(features),
            fault: None,
        };
        Some(self.arena.alloc(child))
    }

    fn feasibility(&mut self, base: &ForkBase, delta: &[ExprRef]) -> Feasibility {
        if delta.iter().any(|c| c.is_false()) {
            return Feasibility::Pruned;
        }
        if delta.iter().any(|c| c.is_undefined()) {
            return Feasibility::Unknown("condition is undefined on every input".to_string());
        }
        if !base.unknown {
            if delta.is_empty() {
                return Feasibility::Sat(base.model.clone());
            }
            if let Some(model) = &base.model {
                if delta.iter().all(|c| holds(c, model)) {
                    return Feasibility::Sat(Some(model.clone()));
                }
            }
        }
        let query = self.query(&base.condition, delta);
        match self.solver.check(&query) {
            SolverResult::Sat(model) => Feasibility::Sat(Some(model)),
            SolverResult::Unsat => Feasibility::Pruned,
            SolverResult::Unknown(reason) => {
                tracing::warn!(solver = self.solver.name(), reason = %reason, "solver returned UNKNOWN");
                Feasibility::Unknown(reason.to_string())
            }
        }
    }

    fn query(&self, condition: &[ExprRef], extra: &[ExprRef]) -> SolverQuery {
        let constraints = self
            .session
            .entry
            .constraints
            .iter()
            .chain(condition)
            .chain(extra)
            .cloned()
            .collect();
        SolverQuery::new(constraints)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Finalization
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn finalize(&mut self, id: NodeId, env: SymbolicEnvironment, outcome: PathOutcome, priority: f64) {
        if !self.budget.try_acquire() {
            self.out.budget_exhausted = true;
            self.arena.get_mut(id).environment = Some(env);
            self.stop(id, TruncationReason::PathBudget);
            return;
        }

        let condition = self.arena.condition(id);
        let node = self.arena.get(id);
        let unknown = node.unknown;
        let depth = node.depth;
        let seed_model = node.last_model.clone();
        let features = node.features.clone();
        let mut notes = env.approximations().to_vec();

        let mut status = if unknown { PathStatus::Unknown } else { PathStatus::Sat };
        let mut model = if unknown { None } else { seed_model.clone() };

        // Prefer a model under which the returned value is defined
        let unmet_guards = match (&outcome, &model) {
            (PathOutcome::Return(value), Some(current)) if status == PathStatus::Sat => {
                let guards = definedness_guards(value);
                (!guards.iter().all(|g| holds(g, current))).then_some(guards)
            }
            _ => None,
        };
        if let Some(guards) = unmet_guards {
            let query = self.query(&condition, &guards);
            match self.solver.check(&query) {
                SolverResult::Sat(defined) => model = Some(defined),
                SolverResult::Unsat => {
                    notes.push("return value is undefined on every input reaching this path".into())
                }
                SolverResult::Unknown(_) => {}
            }
        }
        if !self.session.config.solver_available {
            status = PathStatus::Unknown;
            model = None;
            notes.push("solver unavailable; reachability not checked".into());
        }

        let (example, expected) = match (&model, status) {
            (Some(model), PathStatus::Sat) => {
                let returned = match &outcome {
                    PathOutcome::Return(value) => Some(value),
                    _ => None,
                };
                let completed = complete_model(model, condition.iter().chain(returned));
                let example = synthesize(&completed, &self.session.entry.params);
                let expected = expected_outcome(&outcome, &completed);
                (Some(example), expected)
            }
            _ => (None, None),
        };

        let mut path = ExecutionPath {
            node_id: id,
            trail: self.arena.trail(id),
            condition,
            outcome,
            status,
            reachable: match status {
                PathStatus::Sat => Some(true),
                PathStatus::Unsat => Some(false),
                _ => None,
            },
            model,
            example,
            expected,
            depth,
            approximate: env.is_approximate() || status == PathStatus::Unknown,
            notes,
            truncation: None,
            seed_model,
            priority,
            pop_rank: self.pops,
            worker: self.worker,
        };
        if self.session.config.verify_examples && path.status == PathStatus::Sat {
            self.verify(&mut path);
        }
        self.history.record_completed(&features);
        self.out.paths.push(path);
    }

    /// Replay the example concretely; a mismatch downgrades the path to UNKNOWN
    fn verify(&self, path: &mut ExecutionPath) {
        let Some(example) = &path.example else {
            return;
        };
        let trace = Interpreter::new(&self.session.program).run(example);
        let expected: Vec<(SiteId, u16)> = path
            .trail
            .iter()
            .filter(|l| l.kind != ArmKind::Raise)
            .map(|l| (l.site, l.rank))
            .collect();
        if trace.arms != expected {
            tracing::warn!(
                node = path.node_id,
                "replayed example took a different branch sequence, downgrading path"
            );
            path.downgrade("concrete replay took a different branch sequence");
            return;
        }
        if let Some(want) = &path.expected {
            if !trace.outcome.matches(want) {
                tracing::warn!(node = path.node_id, got = ?trace.outcome, "replayed example disagrees on the outcome");
                path.downgrade("concrete replay produced a different outcome");
            }
        }
    }

    fn push_truncated(
        &mut self,
        id: NodeId,
        env: Option<SymbolicEnvironment>,
        reason: TruncationReason,
        note: Option<String>,
    ) {
        let node = self.arena.get(id);
        let mut notes = env
            .as_ref()
            .map(|e| e.approximations().to_vec())
            .unwrap_or_default();
        notes.push(note.unwrap_or_else(|| match &reason {
            TruncationReason::PathBudget => "path budget exhausted".to_string(),
            TruncationReason::TimeBudget => "time budget exhausted".to_string(),
            TruncationReason::LoopBound { bound, .. } => format!("loop bound {} reached", bound),
        }));
        let path = ExecutionPath {
            node_id: id,
            trail: self.arena.trail(id),
            condition: self.arena.condition(id),
            outcome: PathOutcome::Pending,
            status: PathStatus::Truncated,
            reachable: None,
            model: None,
            example: None,
            expected: None,
            depth: node.depth,
            approximate: env.as_ref().is_some_and(|e| e.is_approximate()),
            notes,
            truncation: Some(reason),
            seed_model: node.last_model.clone(),
            priority: 0.0,
            pop_rank: self.pops,
            worker: self.worker,
        };
        self.out.paths.push(path);
    }
}

/// Conjunction of an arm's literals as reported (`True` when empty)
fn render_guard(delta: &[ExprRef]) -> String {
    match delta {
        [] => "True".to_string(),
        [single] => single.to_string(),
        many => SymExpr::mk_and(many.to_vec()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SymbolicConfig, Tier};
    use crate::features::symbolic_execution::domain::ConcreteValue;
    use crate::features::symbolic_execution::infrastructure::program::Program;
    use crate::features::symbolic_execution::infrastructure::value_model::ValueModel;
    use crate::shared::models::{BinOp, CompareOp, Expr, FunctionIr, Param, Stmt, TypeTag};

    fn session(function: &FunctionIr, config: SymbolicConfig) -> AnalysisSession {
        let program = Program::lower(function).unwrap();
        let entry = ValueModel::new(&config).entry_state(&function.params, 0);
        AnalysisSession::new(program, config, entry)
    }

    fn explore(function: &FunctionIr, config: SymbolicConfig) -> ExplorationOutcome {
        let session = session(function, config);
        let mut outcome = Explorer::new(&session, None).run();
        outcome.sort_paths();
        outcome
    }

    fn classify() -> FunctionIr {
        let x = || Expr::name("x");
        FunctionIr::new(
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
        )
    }

    #[test]
    fn test_three_way_classifier() {
        let outcome = explore(&classify(), SymbolicConfig::from_tier(Tier::Community));
        assert_eq!(outcome.paths.len(), 3);
        assert!(outcome.paths.iter().all(|p| p.status == PathStatus::Sat));
        let conds: Vec<Vec<String>> = outcome
            .paths
            .iter()
            .map(|p| p.condition.iter().map(|c| c.to_string()).collect())
            .collect();
        assert_eq!(conds[0], vec!["x > 10"]);
        assert_eq!(conds[1], vec!["x <= 10", "x > 5"]);
        assert_eq!(conds[2], vec!["x <= 10", "x <= 5"]);
    }

    #[test]
    fn test_contradiction_is_pruned() {
        let x = || Expr::name("x");
        let f = FunctionIr::new(
            "dead",
            vec![Param::new("x", TypeTag::Int)],
            vec![
                Stmt::if_(
                    Expr::and(vec![
                        Expr::compare(CompareOp::Gt, x(), Expr::int(10)),
                        Expr::compare(CompareOp::Lt, x(), Expr::int(5)),
                    ]),
                    vec![Stmt::ret(Expr::str("impossible"))],
                    vec![],
                ),
                Stmt::ret(Expr::str("ok")),
            ],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Community));
        assert_eq!(outcome.paths.len(), 2);
        let (_, then_arm) = outcome.ledger.iter().next().unwrap();
        assert_eq!(then_arm.pruned, 1);
        assert_eq!(then_arm.feasible, 0);
        assert_eq!(then_arm.guard, "x > 10 and x < 5");
    }

    #[test]
    fn test_loop_bound_truncates() {
        let f = FunctionIr::new(
            "search",
            vec![Param::new("x", TypeTag::Int)],
            vec![
                Stmt::for_range(
                    "i",
                    Expr::int(0),
                    Expr::int(1000),
                    vec![Stmt::if_(
                        Expr::compare(CompareOp::Eq, Expr::name("i"), Expr::int(999)),
                        vec![Stmt::ret(Expr::str("found"))],
                        vec![],
                    )],
                ),
                Stmt::ret_none(),
            ],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Community).max_depth(Some(10)));
        let truncated: Vec<_> = outcome.paths.iter().filter(|p| p.is_truncated()).collect();
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0].depth, 10);
        assert_eq!(truncated[0].reachable, None);
        assert!(matches!(
            truncated[0].truncation,
            Some(TruncationReason::LoopBound { bound: 10, .. })
        ));
        assert!(outcome.truncated_loops.contains(&0));
    }

    #[test]
    fn test_examples_replay() {
        let f = FunctionIr::new(
            "f",
            vec![Param::new("x", TypeTag::Int), Param::new("y", TypeTag::Int)],
            vec![
                Stmt::if_(
                    Expr::compare(
                        CompareOp::Gt,
                        Expr::binary(BinOp::Add, Expr::name("x"), Expr::name("y")),
                        Expr::int(100),
                    ),
                    vec![Stmt::ret(Expr::binary(BinOp::FloorDiv, Expr::name("x"), Expr::name("y")))],
                    vec![],
                ),
                Stmt::ret(Expr::int(0)),
            ],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Pro));
        assert_eq!(outcome.paths.len(), 3);
        for path in &outcome.paths {
            assert_eq!(path.status, PathStatus::Sat, "notes: {:?}", path.notes);
            assert!(path.example.is_some());
        }
        // division guard forces a nonzero divisor
        let example = outcome.paths[0].example.as_ref().unwrap();
        assert_ne!(example["y"], ConcreteValue::Int(0));
        // and the zero divisor raises, replayed concretely
        let raised = &outcome.paths[1];
        assert!(matches!(&raised.outcome, PathOutcome::Raise(e) if e == "ZeroDivisionError"));
        assert_eq!(raised.example.as_ref().unwrap()["y"], ConcreteValue::Int(0));
    }

    #[test]
    fn test_branch_on_quotient_splits_off_zero_divisor() {
        // if x // y > 0: return "pos" else: return "nonpos"
        let f = FunctionIr::new(
            "quotient",
            vec![Param::new("x", TypeTag::Int), Param::new("y", TypeTag::Int)],
            vec![Stmt::if_(
                Expr::compare(
                    CompareOp::Gt,
                    Expr::binary(BinOp::FloorDiv, Expr::name("x"), Expr::name("y")),
                    Expr::int(0),
                ),
                vec![Stmt::ret(Expr::str("pos"))],
                vec![Stmt::ret(Expr::str("nonpos"))],
            )],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Pro));
        assert_eq!(outcome.paths.len(), 3);
        assert!(outcome.paths.iter().all(|p| p.status == PathStatus::Sat));
        let conds: Vec<Vec<String>> = outcome
            .paths
            .iter()
            .map(|p| p.condition.iter().map(|c| c.to_string()).collect())
            .collect();
        assert_eq!(conds[0], vec!["y != 0", "x // y > 0"]);
        assert_eq!(conds[1], vec!["y != 0", "x // y <= 0"]);
        assert_eq!(conds[2], vec!["y == 0"]);
        assert!(matches!(&outcome.paths[2].outcome, PathOutcome::Raise(e) if e == "ZeroDivisionError"));
        // raising arms never enter the ledger
        assert!(outcome.ledger.iter().all(|(_, arm)| arm.pruned == 0));
    }

    #[test]
    fn test_guarded_divisor_does_not_raise() {
        // if y != 0 and x // y > 2: return 1; return 0
        let f = FunctionIr::new(
            "guarded",
            vec![Param::new("x", TypeTag::Int), Param::new("y", TypeTag::Int)],
            vec![
                Stmt::if_(
                    Expr::and(vec![
                        Expr::compare(CompareOp::Ne, Expr::name("y"), Expr::int(0)),
                        Expr::compare(
                            CompareOp::Gt,
                            Expr::binary(BinOp::FloorDiv, Expr::name("x"), Expr::name("y")),
                            Expr::int(2),
                        ),
                    ]),
                    vec![Stmt::ret(Expr::int(1))],
                    vec![],
                ),
                Stmt::ret(Expr::int(0)),
            ],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Pro));
        assert!(outcome.paths.iter().all(|p| matches!(p.outcome, PathOutcome::Return(_))));
        assert_eq!(outcome.paths.len(), 3);
    }

    #[test]
    fn test_undefined_condition_is_unknown_not_pruned() {
        // if 1 // 0 > x: return 1; return 0
        let f = FunctionIr::new(
            "always_raises",
            vec![Param::new("x", TypeTag::Int)],
            vec![
                Stmt::if_(
                    Expr::compare(
                        CompareOp::Gt,
                        Expr::binary(BinOp::FloorDiv, Expr::int(1), Expr::int(0)),
                        Expr::name("x"),
                    ),
                    vec![Stmt::ret(Expr::int(1))],
                    vec![],
                ),
                Stmt::ret(Expr::int(0)),
            ],
        );
        let outcome = explore(&f, SymbolicConfig::from_tier(Tier::Community));
        assert!(outcome.ledger.iter().all(|(_, arm)| arm.pruned == 0 && arm.unknown == 1));
        assert!(outcome.paths.iter().all(|p| p.status == PathStatus::Unknown && p.approximate));
    }

    #[test]
    fn test_solver_unavailable_marks_unknown() {
        let config = SymbolicConfig::from_tier(Tier::Community).solver_available(false);
        let outcome = explore(&classify(), config);
        assert_eq!(outcome.paths.len(), 3);
        assert!(outcome
            .paths
            .iter()
            .all(|p| p.status == PathStatus::Unknown && p.approximate && p.reachable.is_none()));
    }

    #[test]
    fn test_budget_truncates_remaining() {
        let config = SymbolicConfig::from_tier(Tier::Community).max_paths(2);
        let outcome = explore(&classify(), config);
        let resolved = outcome.paths.iter().filter(|p| !p.is_truncated()).count();
        assert_eq!(resolved, 2);
        assert!(outcome.budget_exhausted);
        assert!(outcome.paths.iter().any(|p| p.truncation == Some(TruncationReason::PathBudget)));
    }
}
