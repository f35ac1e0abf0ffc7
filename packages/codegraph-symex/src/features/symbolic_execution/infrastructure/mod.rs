//! Symbolic execution infrastructure
//!
//! - `program`: lowering of structured IR to a flat instruction list
//! - `value_model`, `constraint_builder`: IR values to symbolic expressions
//! - `explorer`, `distributed`: worklist exploration (single / partitioned)
//! - `solver`: native decision procedure, query cache
//! - `synthesizer`, `interpreter`: concrete examples and their replay
//! - `equivalence`: product-query comparison of two functions

pub mod constraint_builder;
pub mod distributed;
pub mod equivalence;
pub mod explorer;
pub mod interpreter;
pub mod loop_policy;
pub mod prioritizer;
pub mod program;
pub mod session;
pub mod solver;
pub mod synthesizer;
pub mod value_model;

pub use constraint_builder::ConstraintBuilder;
pub use distributed::PartitionedExplorer;
pub use equivalence::EquivalenceChecker;
pub use explorer::{ExplorationOutcome, Explorer};
pub use interpreter::{InterpOutcome, Interpreter, Trace};
pub use loop_policy::{should_continue, LoopPolicy};
pub use prioritizer::{create_prioritizer, BranchDiversity, SourceOrder};
pub use program::{BranchSite, Instr, Program};
pub use session::{AnalysisSession, PathBudget};
pub use solver::{build_solver, AssumeFeasible, CachingSolver, NativeSolver, QueryCache};
pub use synthesizer::{default_for_type, synthesize};
pub use value_model::{EntryState, ValueModel};
