//! Function IR fixtures
//!
//! Small functions with known path structure.

use codegraph_symex::shared::models::{Expr, FunctionIr, Stmt, TypeTag};

use super::builders::*;

/// `if x > 10: "high" elif x > 5: "medium" else: "low"`
pub fn fixture_classify() -> FunctionIr {
    FunctionBuilder::new("classify")
        .int_param("x")
        .stmt(
            Stmt::if_(
                gt(var("x"), int(10)),
                vec![Stmt::ret(Expr::str("high")).at(3)],
                vec![Stmt::if_(
                    gt(var("x"), int(5)),
                    vec![Stmt::ret(Expr::str("medium")).at(5)],
                    vec![Stmt::ret(Expr::str("low")).at(7)],
                )
                .at(4)],
            )
            .at(2),
        )
        .build()
}

/// `if x > 10 and x < 5: return "impossible"` then `return "ok"`
pub fn fixture_impossible() -> FunctionIr {
    FunctionBuilder::new("impossible")
        .int_param("x")
        .stmt(
            Stmt::if_(
                Expr::and(vec![gt(var("x"), int(10)), lt(var("x"), int(5))]),
                vec![Stmt::ret(Expr::str("impossible")).at(3)],
                vec![],
            )
            .at(2),
        )
        .stmt(Stmt::ret(Expr::str("ok")).at(4))
        .build()
}

/// `for i in range(1000): if i == 999: return "found"` then `return None`
pub fn fixture_search() -> FunctionIr {
    FunctionBuilder::new("search")
        .int_param("x")
        .stmt(
            Stmt::for_range(
                "i",
                int(0),
                int(1000),
                vec![Stmt::if_(
                    eq(var("i"), int(999)),
                    vec![Stmt::ret(Expr::str("found")).at(4)],
                    vec![],
                )
                .at(3)],
            )
            .at(2),
        )
        .stmt(Stmt::ret_none().at(5))
        .build()
}

/// `return x + 1`
pub fn fixture_increment(name: &str) -> FunctionIr {
    FunctionBuilder::new(name)
        .int_param("x")
        .stmt(Stmt::ret(add(var("x"), int(1))))
        .build()
}

/// `return x - 1`
pub fn fixture_decrement(name: &str) -> FunctionIr {
    FunctionBuilder::new(name)
        .int_param("x")
        .stmt(Stmt::ret(sub(var("x"), int(1))))
        .build()
}

/// Independent `if xi > ti` tests over `thresholds.len()` parameters
///
/// Every arm assigns, so the function has `2^n` paths.
pub fn fixture_ladder(thresholds: &[i64]) -> FunctionIr {
    let mut builder = FunctionBuilder::new("ladder").stmt(Stmt::assign("acc", int(0)));
    for (i, t) in thresholds.iter().enumerate() {
        let name = format!("x{}", i);
        builder = builder.param(&name, TypeTag::Int).stmt(Stmt::if_(
            gt(var(&name), int(*t)),
            vec![Stmt::assign("acc", add(var("acc"), int(1 << i)))],
            vec![],
        ));
    }
    builder.stmt(Stmt::ret(var("acc"))).build()
}

/// One 6-way switch on `a` followed by an independent 10-way switch on `b`
///
/// `6 * 10 = 60` distinct branch combinations.
pub fn fixture_sixty_combinations() -> FunctionIr {
    fn switch(name: &str, arms: i64) -> Stmt {
        let mut chain = vec![Stmt::assign(&format!("{}_case", name), int(arms - 1))];
        for k in (0..arms - 1).rev() {
            chain = vec![Stmt::if_(
                eq(var(name), int(k)),
                vec![Stmt::assign(&format!("{}_case", name), int(k))],
                chain,
            )];
        }
        chain.remove(0)
    }
    FunctionBuilder::new("combinations")
        .int_param("a")
        .int_param("b")
        .stmt(switch("a", 6))
        .stmt(switch("b", 10))
        .stmt(Stmt::ret(add(
            Expr::binary(codegraph_symex::shared::models::BinOp::Mul, var("a_case"), int(10)),
            var("b_case"),
        )))
        .build()
}
