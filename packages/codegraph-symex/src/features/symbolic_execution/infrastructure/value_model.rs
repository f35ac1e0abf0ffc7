//! Symbolic value model
//!
//! Binds each parameter to a fresh symbolic handle according to its declared
//! type and the enabled type set:
//!
//! | Declared type      | Symbolic form                                   |
//! |--------------------|-------------------------------------------------|
//! | int/bool/float/str | solver variable named after the parameter       |
//! | sized int          | int variable plus width/signedness bounds        |
//! | list[T]            | `len(xs)` in `0..=max_collection_length`, `xs[i]` |
//! | dict[K, V]         | lazy `d[k]` values and `k in d` membership        |
//! | object{fields}     | lazy `o.f` field variables                       |
//! | anything else      | Top, with an approximation note                  |

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{SymbolicConfig, SymbolicTypeKind};
use crate::features::symbolic_execution::domain::{
    CmpOp, ExprRef, Sort, SymDict, SymExpr, SymList, SymObject, SymbolicEnvironment, TypeCoverage,
};
use crate::shared::models::{Param, TypeTag};

/// Solver sort of a scalar type tag
pub fn scalar_sort(ty: &TypeTag) -> Option<Sort> {
    match ty {
        TypeTag::Int | TypeTag::SizedInt { .. } => Some(Sort::Int),
        TypeTag::Bool => Some(Sort::Bool),
        TypeTag::Float => Some(Sort::Float),
        TypeTag::Str => Some(Sort::Str),
        TypeTag::None => Some(Sort::Null),
        _ => None,
    }
}

/// Type-set entry gating a type tag (`None` for always-available tags)
pub fn type_kind(ty: &TypeTag) -> Option<SymbolicTypeKind> {
    match ty {
        TypeTag::Int | TypeTag::SizedInt { .. } => Some(SymbolicTypeKind::Int),
        TypeTag::Bool => Some(SymbolicTypeKind::Bool),
        TypeTag::Float => Some(SymbolicTypeKind::Float),
        TypeTag::Str => Some(SymbolicTypeKind::String),
        TypeTag::List { .. } => Some(SymbolicTypeKind::List),
        TypeTag::Dict { .. } => Some(SymbolicTypeKind::Dict),
        TypeTag::Object { .. } => Some(SymbolicTypeKind::Object),
        TypeTag::None | TypeTag::Any => None,
    }
}

/// Function-entry state
#[derive(Debug, Clone)]
pub struct EntryState {
    pub environment: SymbolicEnvironment,
    /// Domain constraints of the parameters (sized ints, collection lengths)
    pub constraints: Vec<ExprRef>,
    /// Initial symbolic value per parameter, in declaration order
    pub params: Vec<(Param, ExprRef)>,
    pub coverage: TypeCoverage,
}

/// Builds parameter values for one configuration
#[derive(Debug, Clone, Copy)]
pub struct ValueModel<'a> {
    config: &'a SymbolicConfig,
}

impl<'a> ValueModel<'a> {
    pub fn new(config: &'a SymbolicConfig) -> Self {
        Self { config }
    }

    /// Bind every parameter in a fresh environment
    pub fn entry_state(&self, params: &[Param], top_base: u64) -> EntryState {
        self.bind(params, params, top_base)
    }

    /// Bind `params` positionally to the symbols of `symbols`
    ///
    /// Used to run a second function over the first one's inputs. Callers
    /// check arity and declared types beforehand.
    pub fn entry_state_bound(&self, params: &[Param], symbols: &[Param], top_base: u64) -> EntryState {
        self.bind(params, symbols, top_base)
    }

    fn bind(&self, params: &[Param], symbols: &[Param], top_base: u64) -> EntryState {
        let mut environment = SymbolicEnvironment::with_top_base(top_base);
        let mut constraints = Vec::new();
        let mut bound = Vec::with_capacity(params.len());
        let mut coverage = TypeCoverage::default();

        for (param, symbol) in params.iter().zip(symbols) {
            let value = match self.symbolic_value(&symbol.name, &param.ty, &mut constraints) {
                Some(value) => {
                    *coverage.symbolic.entry(param.ty.to_string()).or_default() += 1;
                    value
                }
                None => {
                    *coverage.top.entry(param.ty.to_string()).or_default() += 1;
                    let reason = self.top_reason(param);
                    tracing::warn!(param = %param.name, ty = %param.ty, "{}", reason);
                    environment.fresh_top(reason)
                }
            };
            environment.declare(param.name.clone(), value.clone(), param.ty.clone());
            bound.push((param.clone(), value));
        }
        coverage.approximations = environment.approximations().to_vec();

        EntryState {
            environment,
            constraints,
            params: bound,
            coverage,
        }
    }

    fn top_reason(&self, param: &Param) -> String {
        match type_kind(&param.ty) {
            Some(kind) if !self.config.type_enabled(kind) => format!(
                "parameter `{}`: type {} not enabled at this tier",
                param.name, param.ty
            ),
            _ => format!(
                "parameter `{}`: type {} modeled as unconstrained",
                param.name, param.ty
            ),
        }
    }

    fn enabled(&self, ty: &TypeTag) -> bool {
        match type_kind(ty) {
            Some(kind) => self.config.type_enabled(kind),
            None => matches!(ty, TypeTag::None),
        }
    }

    /// Symbolic handle for `name: ty`, or `None` when it must be Top
    pub fn symbolic_value(
        &self,
        name: &str,
        ty: &TypeTag,
        constraints: &mut Vec<ExprRef>,
    ) -> Option<ExprRef> {
        if !self.enabled(ty) {
            return None;
        }
        match ty {
            TypeTag::None => Some(SymExpr::null()),
            TypeTag::Int | TypeTag::Bool | TypeTag::Float | TypeTag::Str => {
                Some(SymExpr::var(name, scalar_sort(ty)?))
            }
            TypeTag::SizedInt { .. } => {
                let var = SymExpr::var(name, Sort::Int);
                constraints.extend(range_constraints(&var, ty));
                Some(var)
            }
            TypeTag::List { elem } => {
                let elem_sort = self.element_sort(elem)?;
                let len = SymExpr::var(format!("len({})", name), Sort::Int);
                let cap = self.config.max_collection_length as i64;
                constraints.push(SymExpr::mk_cmp(CmpOp::Ge, len.clone(), SymExpr::int(0)));
                constraints.push(SymExpr::mk_cmp(CmpOp::Le, len.clone(), SymExpr::int(cap)));
                let elems = (0..cap)
                    .map(|i| {
                        let slot = SymExpr::var(format!("{}[{}]", name, i), elem_sort);
                        constraints.extend(range_constraints(&slot, elem));
                        slot
                    })
                    .collect();
                Some(Arc::new(SymExpr::List(SymList {
                    root: Some(name.to_string()),
                    elems,
                    len,
                    elem_sort,
                })))
            }
            TypeTag::Dict { key, value } => {
                if !matches!(**key, TypeTag::Int | TypeTag::Bool | TypeTag::Str) {
                    return None;
                }
                let value_sort = self.element_sort(value)?;
                Some(Arc::new(SymExpr::Dict(SymDict {
                    root: Some(name.to_string()),
                    entries: Vec::new(),
                    value_sort,
                })))
            }
            TypeTag::Object { fields } => {
                let declared: BTreeMap<String, Sort> = fields
                    .iter()
                    .filter(|(_, ty)| self.enabled(ty))
                    .filter_map(|(field, ty)| Some((field.clone(), scalar_sort(ty)?)))
                    .collect();
                Some(Arc::new(SymExpr::Object(SymObject {
                    root: Some(name.to_string()),
                    fields: BTreeMap::new(),
                    declared,
                })))
            }
            TypeTag::Any => None,
        }
    }

    /// Elements must be enabled scalars
    fn element_sort(&self, elem: &TypeTag) -> Option<Sort> {
        if !self.enabled(elem) {
            return None;
        }
        scalar_sort(elem)
    }
}

/// `lo <= v <= hi` for fixed-width integers
fn range_constraints(var: &ExprRef, ty: &TypeTag) -> Vec<ExprRef> {
    match ty.int_range() {
        Some((i64::MIN, i64::MAX)) | None => Vec::new(),
        Some((lo, hi)) => {
            let mut out = Vec::with_capacity(2);
            if lo != i64::MIN {
                out.push(SymExpr::mk_cmp(CmpOp::Ge, var.clone(), SymExpr::int(lo)));
            }
            if hi != i64::MAX {
                out.push(SymExpr::mk_cmp(CmpOp::Le, var.clone(), SymExpr::int(hi)));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tier;

    fn render(constraints: &[ExprRef]) -> Vec<String> {
        constraints.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_baseline_scalars() {
        let config = SymbolicConfig::from_tier(Tier::Community);
        let params = vec![
            Param::new("x", TypeTag::Int),
            Param::new("s", TypeTag::Str),
            Param::new("flag", TypeTag::Bool),
        ];
        let state = ValueModel::new(&config).entry_state(&params, 0);
        assert_eq!(state.environment.lookup("x").unwrap().to_string(), "x");
        assert_eq!(state.environment.lookup("s").unwrap().sort(), Sort::Str);
        assert!(state.constraints.is_empty());
        assert!(!state.environment.is_approximate());
        assert_eq!(state.coverage.symbolic.get("int"), Some(&1));
    }

    #[test]
    fn test_sized_int_bounds() {
        let config = SymbolicConfig::default();
        let params = vec![Param::new("b", TypeTag::SizedInt { bits: 8, signed: false })];
        let state = ValueModel::new(&config).entry_state(&params, 0);
        assert_eq!(render(&state.constraints), vec!["b >= 0", "b <= 255"]);
    }

    #[test]
    fn test_list_gated_by_tier() {
        let params = vec![Param::new("xs", TypeTag::list(TypeTag::Int))];

        let community = SymbolicConfig::from_tier(Tier::Community);
        let state = ValueModel::new(&community).entry_state(&params, 0);
        assert!(matches!(&**state.environment.lookup("xs").unwrap(), SymExpr::Top { .. }));
        assert!(state.environment.is_approximate());
        assert_eq!(state.coverage.top.get("list[int]"), Some(&1));

        let pro = SymbolicConfig::from_tier(Tier::Pro).max_collection_length(3);
        let state = ValueModel::new(&pro).entry_state(&params, 0);
        let xs = state.environment.lookup("xs").unwrap();
        match &**xs {
            SymExpr::List(list) => {
                assert_eq!(list.elems.len(), 3);
                assert_eq!(list.len.to_string(), "len(xs)");
                assert_eq!(list.elems[2].to_string(), "xs[2]");
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert_eq!(render(&state.constraints), vec!["len(xs) >= 0", "len(xs) <= 3"]);
    }

    #[test]
    fn test_any_is_top() {
        let config = SymbolicConfig::from_tier(Tier::Enterprise);
        let params = vec![Param::new("v", TypeTag::Any)];
        let state = ValueModel::new(&config).entry_state(&params, 7);
        assert_eq!(state.environment.lookup("v").unwrap().to_string(), "top#7");
        assert_eq!(state.coverage.approximations.len(), 1);
    }

    #[test]
    fn test_bound_entry_shares_symbols() {
        let config = SymbolicConfig::default();
        let f_params = vec![Param::new("x", TypeTag::Int)];
        let g_params = vec![Param::new("n", TypeTag::Int)];
        let state = ValueModel::new(&config).entry_state_bound(&g_params, &f_params, 1 << 32);
        assert_eq!(state.environment.lookup("n").unwrap().to_string(), "x");
        assert!(state.environment.lookup("x").is_none());
        assert_eq!(state.params[0].0.name, "n");
    }

    #[test]
    fn test_object_fields_declared() {
        let config = SymbolicConfig::from_tier(Tier::Enterprise);
        let ty = TypeTag::object([("age", TypeTag::Int), ("tags", TypeTag::list(TypeTag::Str))]);
        let params = vec![Param::new("user", ty)];
        let state = ValueModel::new(&config).entry_state(&params, 0);
        match &**state.environment.lookup("user").unwrap() {
            SymExpr::Object(obj) => {
                assert_eq!(obj.declared.get("age"), Some(&Sort::Int));
                assert!(!obj.declared.contains_key("tags"));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }
}
