//! Path tree: nodes, labels, terminal execution paths
//!
//! Nodes live in an arena and refer to their parent by id; nothing outside
//! the explorer holds a live borrow into the tree.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::concrete::{ConcreteValue, Model};
use super::environment::SymbolicEnvironment;
use super::sym_expr::ExprRef;

pub type NodeId = usize;
pub type SiteId = u32;
pub type LoopId = u32;

/// Which side of a decision an arm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmKind {
    Then,
    Else,
    LoopContinue,
    LoopExit,
    /// Runtime error while evaluating the decision or statement
    Raise,
}

impl ArmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmKind::Then => "then",
            ArmKind::Else => "else",
            ArmKind::LoopContinue => "loop_continue",
            ArmKind::LoopExit => "loop_exit",
            ArmKind::Raise => "raise",
        }
    }
}

/// First rank of raising arms; they sort after every ordinary arm
pub const RAISE_RANK: u16 = 0x8000;

/// Site of a raising arm split off a straight-line statement
pub const STATEMENT_SITE: SiteId = SiteId::MAX;

/// Decision taken on the edge into a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLabel {
    pub site: SiteId,
    /// Source-order rank of the arm at its site
    pub rank: u16,
    pub kind: ArmKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    Sat,
    Unsat,
    Unknown,
    Truncated,
}

/// Why a path stopped before reaching a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruncationReason {
    LoopBound { loop_id: LoopId, bound: usize },
    PathBudget,
    TimeBudget,
}

/// How a path ends
#[derive(Debug, Clone)]
pub enum PathOutcome {
    Return(ExprRef),
    Raise(String),
    /// Truncated before reaching a terminal
    Pending,
}

/// Node of the path tree
#[derive(Debug, Clone)]
pub struct PathNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub branch_label: Option<BranchLabel>,
    /// Loop-continue decisions taken from the entry
    pub depth: usize,
    /// Released once the node forks or is finalized
    pub environment: Option<SymbolicEnvironment>,
    pub condition_delta: Vec<ExprRef>,
    /// Decisions above a re-rooted node (distributed partitions)
    pub inherited_trail: Vec<BranchLabel>,
    /// Next instruction to execute
    pub pc: usize,
    pub loop_iterations: BTreeMap<LoopId, usize>,
    /// Some arm on the way here was neither proven SAT nor UNSAT
    pub unknown: bool,
    /// Most recent model proving this node (or an ancestor) feasible
    pub last_model: Option<Arc<Model>>,
    /// Comparison features of the condition (diversity prioritizer)
    pub features: Arc<BTreeSet<String>>,
    /// Exception this node raises as soon as it is stepped
    pub fault: Option<String>,
}

impl PathNode {
    /// Root node at function entry
    pub fn root(environment: SymbolicEnvironment) -> Self {
        Self {
            id: 0,
            parent_id: None,
            branch_label: None,
            depth: 0,
            environment: Some(environment),
            condition_delta: Vec::new(),
            inherited_trail: Vec::new(),
            pc: 0,
            loop_iterations: BTreeMap::new(),
            unknown: false,
            last_model: Some(Arc::new(Model::new())),
            features: Arc::new(BTreeSet::new()),
            fault: None,
        }
    }
}

/// Arena of path nodes addressed by id
#[derive(Debug, Default)]
pub struct PathArena {
    nodes: Vec<PathNode>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, mut node: PathNode) -> NodeId {
        let id = self.nodes.len();
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &PathNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut PathNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids from the root down to `id`
    fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(parent) = self.nodes[cur].parent_id {
            chain.push(parent);
            cur = parent;
        }
        chain.reverse();
        chain
    }

    /// Full path condition: conjunction of deltas from root to `id`
    pub fn condition(&self, id: NodeId) -> Vec<ExprRef> {
        self.lineage(id)
            .into_iter()
            .flat_map(|n| self.nodes[n].condition_delta.iter().cloned())
            .collect()
    }

    /// Root-to-node decision sequence
    pub fn trail(&self, id: NodeId) -> Vec<BranchLabel> {
        let lineage = self.lineage(id);
        let mut trail = self.nodes[lineage[0]].inherited_trail.clone();
        trail.extend(
            lineage
                .iter()
                .filter_map(|n| self.nodes[*n].branch_label.clone()),
        );
        trail
    }

    /// Stable sort key: the arm ranks along the trail
    pub fn order_key(&self, id: NodeId) -> Vec<u16> {
        self.trail(id).iter().map(|l| l.rank).collect()
    }

    /// Drop the node's environment
    pub fn release(&mut self, id: NodeId) -> Option<SymbolicEnvironment> {
        self.nodes[id].environment.take()
    }

    /// Nodes still holding an environment
    pub fn live_environments(&self) -> usize {
        self.nodes.iter().filter(|n| n.environment.is_some()).count()
    }
}

/// Terminal (or truncated) path; immutable once built
#[derive(Debug, Clone)]
pub struct ExecutionPath {
    pub node_id: NodeId,
    pub trail: Vec<BranchLabel>,
    pub condition: Vec<ExprRef>,
    pub outcome: PathOutcome,
    pub status: PathStatus,
    pub reachable: Option<bool>,
    /// Solver model of the path condition (SAT only)
    pub model: Option<Arc<Model>>,
    /// Concrete input per parameter
    pub example: Option<BTreeMap<String, ConcreteValue>>,
    /// Concrete outcome the example should produce
    pub expected: Option<ConcreteOutcome>,
    pub depth: usize,
    pub approximate: bool,
    pub notes: Vec<String>,
    pub truncation: Option<TruncationReason>,
    /// Nearest ancestor model (seed for concolic follow-up)
    pub seed_model: Option<Arc<Model>>,
    /// Prioritizer score when the path's last node was selected
    pub priority: f64,
    /// Selection order within its worker
    pub pop_rank: usize,
    pub worker: Option<usize>,
}

impl ExecutionPath {
    pub fn order_key(&self) -> Vec<u16> {
        self.trail.iter().map(|l| l.rank).collect()
    }

    pub fn is_truncated(&self) -> bool {
        self.status == PathStatus::Truncated
    }

    /// Give up a resolved path for lack of budget; keeps its condition
    pub fn truncate(&mut self, reason: TruncationReason, note: impl Into<String>) {
        self.outcome = PathOutcome::Pending;
        self.status = PathStatus::Truncated;
        self.reachable = None;
        self.model = None;
        self.example = None;
        self.expected = None;
        self.truncation = Some(reason);
        self.notes.push(note.into());
    }

    /// Downgrade to UNKNOWN with a note
    pub fn downgrade(&mut self, note: impl Into<String>) {
        self.status = PathStatus::Unknown;
        self.reachable = None;
        self.approximate = true;
        self.notes.push(note.into());
    }
}

/// Concrete result of running a function
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcreteOutcome {
    Return(ConcreteValue),
    Raise(String),
}

/// Per-arm pruning/feasibility counts across all paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmRecord {
    pub kind: Option<ArmKind>,
    pub guard: String,
    pub pruned: usize,
    pub feasible: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ArmLedger {
    arms: BTreeMap<(SiteId, u16), ArmRecord>,
}

impl ArmLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, site: SiteId, rank: u16, kind: ArmKind, guard: &str) -> &mut ArmRecord {
        let record = self.arms.entry((site, rank)).or_default();
        if record.kind.is_none() {
            record.kind = Some(kind);
            record.guard = guard.to_string();
        }
        record
    }

    pub fn record_pruned(&mut self, site: SiteId, rank: u16, kind: ArmKind, guard: &str) {
        self.entry(site, rank, kind, guard).pruned += 1;
    }

    pub fn record_feasible(&mut self, site: SiteId, rank: u16, kind: ArmKind, guard: &str) {
        self.entry(site, rank, kind, guard).feasible += 1;
    }

    pub fn record_unknown(&mut self, site: SiteId, rank: u16, kind: ArmKind, guard: &str) {
        self.entry(site, rank, kind, guard).unknown += 1;
    }

    pub fn merge(&mut self, other: &ArmLedger) {
        for (key, rec) in &other.arms {
            let mine = self.arms.entry(*key).or_default();
            if mine.kind.is_none() {
                mine.kind = rec.kind;
                mine.guard = rec.guard.clone();
            }
            mine.pruned += rec.pruned;
            mine.feasible += rec.feasible;
            mine.unknown += rec.unknown;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(SiteId, u16), &ArmRecord)> {
        self.arms.iter()
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}
