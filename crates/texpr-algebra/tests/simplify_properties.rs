use proptest::prelude::*;
use texpr_algebra::{is_zero, simplify, AlgebraEngine, EngineConfig, Expr, ReferenceEngine, Scope};

fn quadratic(a: i64, b: i64, c: i64) -> Expr {
    let x = Expr::symbol("x");
    Expr::Add(vec![
        Expr::mul(Expr::int(a.into()), Expr::pow(x.clone(), Expr::int(2))),
        Expr::mul(Expr::int(b.into()), x),
        Expr::int(c.into()),
    ])
}

/// Integer-valued expression text far beyond machine width.
fn huge_integer() -> impl Strategy<Value = String> {
    prop_oneof![
        (2u32..=12, 64u32..=400).prop_map(|(base, exp)| format!("{base}**{exp}")),
        (21u32..=150).prop_map(|n| format!("factorial({n})")),
    ]
}

proptest! {
    #[test]
    fn successor_of_a_huge_integer_is_never_equal(a in huge_integer(), symbolic in any::<bool>()) {
        let engine = ReferenceEngine::default();
        let scope = Scope::new(["x"]);
        let (lhs, rhs) = if symbolic {
            (format!("x*{a}"), format!("x*({a} + 1)"))
        } else {
            (a.clone(), format!("{a} + 1"))
        };
        let lhs = engine.simplify(&engine.parse(&lhs, &scope).unwrap()).unwrap();
        let rhs = engine.simplify(&engine.parse(&rhs, &scope).unwrap()).unwrap();
        prop_assert!(!engine.is_zero(&Expr::sub(lhs, rhs)).unwrap());
    }

    #[test]
    fn difference_with_itself_is_zero(a in -50i64..50, b in -50i64..50, c in -50i64..50) {
        let config = EngineConfig::default();
        let expr = quadratic(a, b, c);
        prop_assert!(is_zero(&Expr::sub(expr.clone(), expr), &config).unwrap());
    }

    #[test]
    fn simplification_is_idempotent(a in -50i64..50, b in -50i64..50, c in -50i64..50) {
        let config = EngineConfig::default();
        let once = simplify(&quadratic(a, b, c), &config).unwrap();
        let twice = simplify(&once, &config).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn factored_and_expanded_forms_agree(p in -20i64..20, q in -20i64..20) {
        let config = EngineConfig::default();
        let x = Expr::symbol("x");
        let factored = Expr::mul(
            Expr::add(x.clone(), Expr::int(p.into())),
            Expr::add(x, Expr::int(q.into())),
        );
        let expanded = quadratic(1, p + q, p * q);
        prop_assert!(is_zero(&Expr::sub(factored, expanded), &config).unwrap());
    }
}
