use std::collections::BTreeMap;

use texpr_algebra::{AlgebraEngine, EngineConfig, Expr, Number, ReferenceEngine, Scope};

fn scope() -> Scope {
    Scope::new(["x", "y", "z", "t", "n", "k", "i", "j"])
}

fn bindings(pairs: &[(&str, f64)]) -> BTreeMap<String, Number> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), Number::Float(*value)))
        .collect()
}

/// Whether the engine claims `lhs` and `rhs` are equal.
fn claims_equal(engine: &ReferenceEngine, lhs: &str, rhs: &str) -> bool {
    let canonical = |source: &str| -> Option<Expr> {
        let parsed = engine.parse(source, &scope()).ok()?;
        let forced = engine.force(&parsed).ok()?;
        engine.simplify(&forced).ok()
    };
    match (canonical(lhs), canonical(rhs)) {
        (Some(a), Some(b)) => matches!(engine.is_zero(&Expr::sub(a, b)), Ok(true)),
        _ => false,
    }
}

fn value_of(engine: &ReferenceEngine, source: &str, pairs: &[(&str, f64)]) -> f64 {
    let expr = engine.parse(source, &scope()).expect("parse");
    let bound = engine.substitute(&expr, &bindings(pairs));
    let forced = engine.force(&bound).expect("force");
    engine.evaluate(&forced).expect("evaluate")
}

#[test]
fn literal_arithmetic_evaluates() {
    let engine = ReferenceEngine::default();
    assert_eq!(value_of(&engine, "2 + 3", &[]), 5.0);
    assert_eq!(value_of(&engine, "1/4 + 1/4", &[]), 0.5);
    assert!((value_of(&engine, "sin(pi/6)", &[]) - 0.5).abs() < 1e-12);
}

#[test]
fn bound_symbols_are_substituted() {
    let engine = ReferenceEngine::default();
    let value = value_of(&engine, "x**2 + y", &[("x", 2.0), ("y", 0.5)]);
    assert!((value - 4.5).abs() < 1e-12);
}

#[test]
fn exact_bindings_stay_exact() {
    let engine = ReferenceEngine::default();
    let expr = engine.parse("factorial(n)", &scope()).expect("parse");
    let exact = BTreeMap::from([("n".to_string(), Number::int(20))]);
    let bound = engine.substitute(&expr, &exact);
    let simplified = engine.simplify(&bound).expect("simplify");
    assert_eq!(engine.render(&simplified), "2432902008176640000");
    assert_eq!(engine.evaluate(&simplified).expect("evaluate"), 2432902008176640000.0);

    let big = BTreeMap::from([("n".to_string(), Number::int(40))]);
    let shifted = engine.parse("factorial(n) + 1 - factorial(40)", &scope()).expect("parse");
    let difference = engine.simplify(&engine.substitute(&shifted, &big)).expect("simplify");
    assert_eq!(engine.render(&difference), "1");
}

#[test]
fn large_integers_never_compare_equal_to_their_successor() {
    let engine = ReferenceEngine::default();
    let pairs = [
        ("2**200", "2**200 + 1"),
        ("2**127", "2**127 + 1"),
        ("10**40", "10**40 + 1"),
        ("factorial(40)", "factorial(40) + 1"),
        ("x*10**40", "x*(10**40 + 1)"),
        ("Rational(1, 10**40)", "Rational(1, 10**40 + 1)"),
    ];
    for (lhs, rhs) in pairs {
        assert!(!claims_equal(&engine, lhs, rhs), "{lhs} vs {rhs}");
        assert!(claims_equal(&engine, lhs, lhs), "{lhs} vs itself");
    }
}

#[test]
fn infinity_never_cancels() {
    let engine = ReferenceEngine::default();
    for (lhs, rhs) in [("oo - oo", "0"), ("oo/oo", "1"), ("0*oo", "0"), ("oo*x - oo*x", "0")] {
        assert!(!claims_equal(&engine, lhs, rhs), "{lhs} vs {rhs}");
    }
    let err = engine
        .simplify(&engine.parse("oo - oo", &scope()).expect("parse"))
        .unwrap_err();
    assert_eq!(err.info().code, "indeterminate");
    let absorbed = engine
        .simplify(&engine.parse("oo + 1", &scope()).expect("parse"))
        .expect("simplify");
    assert_eq!(engine.render(&absorbed), "oo");
}

#[test]
fn huge_quotients_divide_exactly_before_rounding() {
    let engine = ReferenceEngine::default();
    assert_eq!(value_of(&engine, "10**400/10**399", &[]), 10.0);
}

#[test]
fn runaway_nesting_is_a_syntax_error() {
    let engine = ReferenceEngine::default();
    let deep = format!("{}x{}", "(".repeat(50_000), ")".repeat(50_000));
    let err = engine.parse(&deep, &scope()).unwrap_err();
    assert_eq!(err.info().code, "syntax");

    let strict = ReferenceEngine::new(EngineConfig {
        max_nesting: 4,
        ..EngineConfig::default()
    });
    assert!(strict.parse("((x))", &scope()).is_ok());
    assert_eq!(
        strict.parse("((((((x))))))", &scope()).unwrap_err().info().code,
        "syntax"
    );
}

#[test]
fn unbound_symbols_cannot_be_evaluated() {
    let engine = ReferenceEngine::default();
    let expr = engine.parse("x + 1", &scope()).expect("parse");
    let err = engine.evaluate(&expr).unwrap_err();
    assert!(err.message().contains("free symbol"));
}

#[test]
fn names_outside_the_catalogue_are_rejected() {
    let engine = ReferenceEngine::default();
    for source in ["__import__('os')", "eval('1')", "w + 1", "x.real", "open('f')"] {
        let err = engine.parse(source, &scope()).unwrap_err();
        assert_eq!(err.info().code, "syntax", "source {source}");
    }
}

#[test]
fn deferred_forms_are_forced_before_evaluation() {
    let engine = ReferenceEngine::default();
    let basel = value_of(&engine, "Sum(1/k**2, (k, 1, oo))", &[]);
    assert!((basel - std::f64::consts::PI.powi(2) / 6.0).abs() < 1e-9);
    let area = value_of(&engine, "Integral(x**2, (x, 0, 1))", &[]);
    assert!((area - 1.0 / 3.0).abs() < 1e-12);
    let sinc = value_of(&engine, "limit(sin(x)/x, x, 0)", &[]);
    assert!((sinc - 1.0).abs() < 1e-12);
}

#[test]
fn zero_test_sees_through_expansion() {
    let engine = ReferenceEngine::default();
    let lhs = engine.parse("(x + 1)**2", &scope()).expect("parse");
    let rhs = engine.parse("x**2 + 2*x + 1", &scope()).expect("parse");
    assert!(engine.is_zero(&Expr::sub(lhs.clone(), rhs)).expect("zero test"));
    let other = engine.parse("x**2 + 1", &scope()).expect("parse");
    assert!(!engine.is_zero(&Expr::sub(lhs, other)).expect("zero test"));
}

#[test]
fn evaluation_errors_are_reported_not_panicked() {
    let engine = ReferenceEngine::default();
    assert!(engine.parse("1/0", &scope()).is_err());
    let log_zero = engine.parse("log(0*x)", &scope()).expect("parse");
    assert!(engine.simplify(&log_zero).is_err());
    let imaginary = engine.parse("sqrt(-1)", &scope()).expect("parse");
    assert!(engine.evaluate(&imaginary).is_err());
}

#[test]
fn rendering_uses_surface_syntax() {
    let engine = ReferenceEngine::default();
    let expr = engine.parse("x + x + 3", &scope()).expect("parse");
    let simplified = engine.simplify(&expr).expect("simplify");
    assert_eq!(engine.render(&simplified), "2*x + 3");
}
