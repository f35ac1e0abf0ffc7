//! Test input synthesis
//!
//! Turns a solver model into one concrete value per parameter. Variables the
//! model leaves free get the documented default for their sort (0, false,
//! "", empty collection), so an example is always complete.

use std::collections::{BTreeMap, BTreeSet};

use crate::features::symbolic_execution::domain::{
    ConcreteOutcome, ConcreteValue, ExprRef, Model, PathOutcome, SymExpr, SymVar,
};
use crate::shared::models::{Param, TypeTag};

use super::solver::{eval, Tri};

/// Documented default input for a declared type
pub fn default_for_type(ty: &TypeTag) -> ConcreteValue {
    match ty {
        TypeTag::Int => ConcreteValue::Int(0),
        TypeTag::SizedInt { .. } => {
            let lo = ty.int_range().map(|(lo, _)| lo).unwrap_or(0);
            ConcreteValue::Int(lo.max(0))
        }
        TypeTag::Bool => ConcreteValue::Bool(false),
        TypeTag::Float => ConcreteValue::Float(0.0),
        TypeTag::Str => ConcreteValue::Str(String::new()),
        TypeTag::None | TypeTag::Any => ConcreteValue::Null,
        TypeTag::List { .. } => ConcreteValue::List(Vec::new()),
        TypeTag::Dict { .. } => ConcreteValue::Dict(Vec::new()),
        TypeTag::Object { fields } => ConcreteValue::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), default_for_type(ty)))
                .collect(),
        ),
    }
}

/// Model extended with defaults for every free variable of `exprs`
pub fn complete_model<'e>(model: &Model, exprs: impl IntoIterator<Item = &'e ExprRef>) -> Model {
    let mut vars = BTreeSet::new();
    for expr in exprs {
        expr.free_vars(&mut vars);
    }
    let mut completed = model.clone();
    for SymVar { name, sort } in vars {
        completed
            .entry(name)
            .or_insert_with(|| ConcreteValue::default_for(sort));
    }
    completed
}

/// One concrete value per parameter from a (completed) model
pub fn synthesize(model: &Model, params: &[(Param, ExprRef)]) -> BTreeMap<String, ConcreteValue> {
    let completed = complete_model(model, params.iter().map(|(_, e)| e));
    params
        .iter()
        .map(|(param, expr)| {
            let value = match eval(expr, &completed) {
                Tri::Value(v) => coerce(v, &param.ty),
                Tri::Undefined | Tri::Unknown => default_for_type(&param.ty),
            };
            (param.name.clone(), value)
        })
        .collect()
}

/// Outcome the example should produce when run concretely
pub fn expected_outcome(outcome: &PathOutcome, completed: &Model) -> Option<ConcreteOutcome> {
    match outcome {
        PathOutcome::Return(expr) => match eval(expr, completed) {
            Tri::Value(v) => Some(ConcreteOutcome::Return(v)),
            Tri::Undefined | Tri::Unknown => None,
        },
        PathOutcome::Raise(exception) => Some(ConcreteOutcome::Raise(exception.clone())),
        PathOutcome::Pending => None,
    }
}

/// Match the declared type where the model kept a compatible representation
fn coerce(value: ConcreteValue, ty: &TypeTag) -> ConcreteValue {
    match (ty, value) {
        (TypeTag::Float, ConcreteValue::Int(v)) => ConcreteValue::Float(v as f64),
        (TypeTag::Bool, ConcreteValue::Int(v)) => ConcreteValue::Bool(v != 0),
        (TypeTag::Int | TypeTag::SizedInt { .. }, ConcreteValue::Bool(b)) => {
            ConcreteValue::Int(b as i64)
        }
        (TypeTag::List { elem }, ConcreteValue::List(items)) => {
            ConcreteValue::List(items.into_iter().map(|v| coerce(v, elem)).collect())
        }
        (TypeTag::Object { fields }, ConcreteValue::Object(mut values)) => {
            for (name, field_ty) in fields {
                match values.remove(name) {
                    Some(v) => values.insert(name.clone(), coerce(v, field_ty)),
                    None => values.insert(name.clone(), default_for_type(field_ty)),
                };
            }
            ConcreteValue::Object(values)
        }
        (_, value) => value,
    }
}

/// Rendering of a path's return for reports (`"high"`, `x + 1`, `raise E`)
pub fn render_outcome(outcome: &PathOutcome) -> String {
    match outcome {
        PathOutcome::Return(expr) => match &**expr {
            SymExpr::Undefined => "<undefined>".to_string(),
            _ => expr.to_string(),
        },
        PathOutcome::Raise(exception) => format!("raise {}", exception),
        PathOutcome::Pending => "<pending>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolicConfig;
    use crate::features::symbolic_execution::domain::Sort;
    use crate::features::symbolic_execution::infrastructure::value_model::ValueModel;

    #[test]
    fn test_free_variables_get_defaults() {
        let params = vec![
            (Param::new("x", TypeTag::Int), SymExpr::var("x", Sort::Int)),
            (Param::new("s", TypeTag::Str), SymExpr::var("s", Sort::Str)),
        ];
        let model = Model::from([("x".to_string(), ConcreteValue::Int(11))]);
        let example = synthesize(&model, &params);
        assert_eq!(example["x"], ConcreteValue::Int(11));
        assert_eq!(example["s"], ConcreteValue::Str(String::new()));
    }

    #[test]
    fn test_list_example_respects_length() {
        let config = SymbolicConfig::default().max_collection_length(3);
        let state = ValueModel::new(&config)
            .entry_state(&[Param::new("xs", TypeTag::list(TypeTag::Int))], 0);
        let model = Model::from([
            ("len(xs)".to_string(), ConcreteValue::Int(2)),
            ("xs[0]".to_string(), ConcreteValue::Int(5)),
        ]);
        let example = synthesize(&model, &state.params);
        assert_eq!(
            example["xs"],
            ConcreteValue::List(vec![ConcreteValue::Int(5), ConcreteValue::Int(0)])
        );
    }

    #[test]
    fn test_sized_default_and_top_param() {
        assert_eq!(
            default_for_type(&TypeTag::SizedInt { bits: 8, signed: true }),
            ConcreteValue::Int(0)
        );
        let params = vec![(Param::new("v", TypeTag::Any), SymExpr::top(0, "any"))];
        let example = synthesize(&Model::new(), &params);
        assert_eq!(example["v"], ConcreteValue::Null);
    }

    #[test]
    fn test_expected_outcome() {
        let x = SymExpr::var("x", Sort::Int);
        let ret = PathOutcome::Return(SymExpr::mk_arith(
            crate::features::symbolic_execution::domain::ArithOp::Add,
            x,
            SymExpr::int(1),
        ));
        let model = Model::from([("x".to_string(), ConcreteValue::Int(4))]);
        assert_eq!(
            expected_outcome(&ret, &model),
            Some(ConcreteOutcome::Return(ConcreteValue::Int(5)))
        );
        assert_eq!(render_outcome(&ret), "x + 1");
        assert_eq!(render_outcome(&PathOutcome::Raise("ValueError".into())), "raise ValueError");
    }
}
