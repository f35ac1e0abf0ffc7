//! Symbolic environment: variable name -> symbolic value
//!
//! Owned by exactly one path node. Forking clones it, so sibling paths never
//! observe each other's assignments.

use std::collections::BTreeMap;

use super::sym_expr::{ExprRef, SymExpr};
use crate::shared::models::TypeTag;

/// One bound variable
#[derive(Debug, Clone)]
pub struct Binding {
    pub expr: ExprRef,
    /// Declared type tag (parameters only)
    pub ty: Option<TypeTag>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolicEnvironment {
    bindings: BTreeMap<String, Binding>,
    approximations: Vec<String>,
    /// Next Top id; ids are unique along one path
    next_top: u64,
}

impl SymbolicEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment whose Top ids start at `base` (keeps two functions' Tops apart)
    pub fn with_top_base(base: u64) -> Self {
        Self {
            next_top: base,
            ..Self::default()
        }
    }

    /// Fresh unconstrained value, recorded as an approximation
    pub fn fresh_top(&mut self, reason: impl Into<String>) -> ExprRef {
        let reason = reason.into();
        let id = self.next_top;
        self.next_top += 1;
        self.note_approximation(reason.clone());
        SymExpr::top(id, reason)
    }

    /// Bind a declared variable (function entry)
    pub fn declare(&mut self, name: impl Into<String>, expr: ExprRef, ty: TypeTag) {
        self.bindings.insert(
            name.into(),
            Binding {
                expr,
                ty: Some(ty),
            },
        );
    }

    /// Rebind a variable, keeping its declared type if any
    pub fn assign(&mut self, name: &str, expr: ExprRef) {
        match self.bindings.get_mut(name) {
            Some(binding) => binding.expr = expr,
            None => {
                self.bindings
                    .insert(name.to_string(), Binding { expr, ty: None });
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&ExprRef> {
        self.bindings.get(name).map(|b| &b.expr)
    }

    pub fn declared_type(&self, name: &str) -> Option<&TypeTag> {
        self.bindings.get(name).and_then(|b| b.ty.as_ref())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Record that a value on this path was approximated
    pub fn note_approximation(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.approximations.contains(&note) {
            self.approximations.push(note);
        }
    }

    pub fn approximations(&self) -> &[String] {
        &self.approximations
    }

    pub fn is_approximate(&self) -> bool {
        !self.approximations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_execution::domain::sym_expr::Sort;

    #[test]
    fn test_fork_isolation() {
        let mut parent = SymbolicEnvironment::new();
        parent.declare("x", SymExpr::var("x", Sort::Int), TypeTag::Int);

        let mut child = parent.clone();
        child.assign("x", SymExpr::int(3));
        child.note_approximation("call to f is opaque");

        assert_eq!(parent.lookup("x").unwrap().to_string(), "x");
        assert_eq!(child.lookup("x").unwrap().to_string(), "3");
        assert_eq!(child.declared_type("x"), Some(&TypeTag::Int));
        assert!(!parent.is_approximate());
        assert!(child.is_approximate());
    }

    #[test]
    fn test_fresh_tops_are_distinct() {
        let mut env = SymbolicEnvironment::with_top_base(100);
        let a = env.fresh_top("call to f");
        let b = env.fresh_top("call to f");
        assert_eq!(a.to_string(), "top#100");
        assert_eq!(b.to_string(), "top#101");
        assert_eq!(env.approximations(), ["call to f".to_string()]);
    }

    #[test]
    fn test_notes_deduplicated() {
        let mut env = SymbolicEnvironment::new();
        env.note_approximation("a");
        env.note_approximation("a");
        assert_eq!(env.approximations().len(), 1);
    }
}
