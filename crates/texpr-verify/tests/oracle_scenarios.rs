use std::collections::BTreeMap;

use serde_json::json;
use texpr_algebra::{AlgebraEngine, Expr, Number, ReferenceEngine, Scope};
use texpr_core::OracleError;
use texpr_verify::report::OutcomeDetail;
use texpr_verify::{parse_cases, run_cases, OutcomeStatus, Policy, EXIT_FAILED, EXIT_OK};

fn run(cases: serde_json::Value) -> texpr_verify::RunReport {
    let bytes = serde_json::to_vec(&json!({
        "generated_at": "2026-01-01T00:00:00Z",
        "test_cases": cases,
    }))
    .unwrap();
    let set = parse_cases(&bytes).unwrap();
    run_cases(&ReferenceEngine::default(), &Policy::default(), &set)
}

#[test]
fn product_of_bound_variables_passes() {
    let report = run(json!([{
        "description": "product", "latex": "xyz", "type": "numeric",
        "sympy_code": "x*y*z", "dart_result": 24.0, "tolerance": 1e-10,
        "variables": {"x": 2, "y": 3, "z": 4}
    }]));
    assert_eq!(report.passed, 1);
    let Some(OutcomeDetail::Numeric(detail)) = &report.results[0].detail else {
        panic!("numeric detail expected");
    };
    assert_eq!(detail.actual, 24.0);
    assert_eq!(detail.difference, 0.0);
}

#[test]
fn definite_integral_matches_rational() {
    let report = run(json!([{
        "description": "area", "latex": "\\int_0^1 x^2 dx", "type": "symbolic",
        "sympy_code": "integrate(x**2, (x, 0, 1))", "expected_sympy_result": "Rational(1,3)"
    }]));
    assert_eq!(report.results[0].status, OutcomeStatus::Pass);
    assert_eq!(report.results[0].message.as_deref(), Some("1/3"));
}

#[test]
fn symbolic_mismatch_names_both_sides() {
    let report = run(json!([{
        "description": "wrong", "latex": "x^2", "type": "symbolic",
        "sympy_code": "x**2", "expected_sympy_result": "x**3"
    }]));
    assert_eq!(report.results[0].status, OutcomeStatus::Fail);
    assert_eq!(report.results[0].error.as_deref(), Some("Got x**2, expected x**3"));
    assert_eq!(report.exit_code(), EXIT_FAILED);
}

#[test]
fn wrong_markup_root_fails_with_both_names() {
    let report = run(json!([{
        "description": "root", "latex": "x",
        "mathml": "<formula><mi>x</mi></formula>", "expected_elements": ["mi"]
    }]));
    let outcome = &report.results[0];
    assert_eq!(outcome.status, OutcomeStatus::Fail);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Root element is 'formula', expected 'math'")
    );
}

#[test]
fn mismatched_record_is_skipped_and_the_run_continues() {
    let report = run(json!([
        {"description": "a", "latex": "1", "type": "numeric", "sympy_code": "1", "dart_result": 1.0},
        {"description": "b", "latex": "2", "type": "numeric", "expected_sympy_result": "2"},
        {"description": "c", "latex": "3", "type": "numeric", "sympy_code": "3", "dart_result": 3.0},
        {"description": "d", "latex": "\\bad", "type": "error", "error": "unknown command"}
    ]));
    assert_eq!(report.results.len(), 4);
    let statuses: Vec<_> = report.results.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Pass,
            OutcomeStatus::Skipped,
            OutcomeStatus::Pass,
            OutcomeStatus::Skipped
        ]
    );
    assert!(report.results[1]
        .error
        .as_deref()
        .unwrap()
        .starts_with("CaseStructureError"));
}

#[test]
fn evaluation_errors_do_not_fail_the_run() {
    let report = run(json!([
        {"description": "pole", "latex": "1/0", "type": "numeric", "sympy_code": "1/0", "dart_result": 0.0},
        {"description": "unknown", "latex": "f", "type": "numeric", "sympy_code": "exec(1)", "dart_result": 0.0},
        {"description": "free", "latex": "w", "type": "numeric", "sympy_code": "x + 1", "dart_result": 1.0},
        {"description": "ok", "latex": "2", "type": "numeric", "sympy_code": "2", "dart_result": 2.0}
    ]));
    assert_eq!((report.passed, report.failed, report.errors), (1, 0, 3));
    assert_eq!(report.exit_code(), EXIT_OK);
}

#[test]
fn integer_bindings_evaluate_exactly() {
    let report = run(json!([{
        "description": "factorial", "latex": "n!", "type": "numeric",
        "sympy_code": "factorial(n)", "dart_result": 2432902008176640000.0,
        "tolerance": 0.0, "variables": {"n": 20}
    }]));
    assert_eq!(report.results[0].status, OutcomeStatus::Pass);
    let Some(OutcomeDetail::Numeric(detail)) = &report.results[0].detail else {
        panic!("numeric detail expected");
    };
    assert_eq!(detail.actual, 2432902008176640000.0);
}

#[test]
fn wrong_answers_never_pass() {
    let report = run(json!([
        {"description": "big", "latex": "2^{200}", "type": "symbolic",
         "sympy_code": "2**200", "expected_sympy_result": "2**200 + 1"},
        {"description": "inf", "latex": "\\infty", "type": "symbolic",
         "sympy_code": "oo", "expected_sympy_result": "oo + x"},
        {"description": "sub", "latex": "\\infty-\\infty", "type": "symbolic",
         "sympy_code": "oo - oo", "expected_sympy_result": "0"},
        {"description": "zero", "latex": "0\\cdot\\infty", "type": "numeric",
         "sympy_code": "0*oo", "dart_result": 0.0},
        {"description": "quotient", "latex": "10^{400}/10^{399}", "type": "numeric",
         "sympy_code": "10**400/10**399", "dart_result": 11.0}
    ]));
    assert_eq!(report.passed, 0);
    assert!(report
        .results
        .iter()
        .all(|o| matches!(o.status, OutcomeStatus::Fail | OutcomeStatus::Error)));
}

#[test]
fn infinity_is_equivalent_to_itself() {
    let report = run(json!([{
        "description": "inf", "latex": "\\infty", "type": "symbolic",
        "sympy_code": "oo", "expected_sympy_result": "oo"
    }]));
    assert_eq!(report.results[0].status, OutcomeStatus::Pass);
}

#[test]
fn runaway_nesting_errors_and_the_run_continues() {
    let deep = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
    let report = run(json!([
        {"description": "deep", "latex": "x", "type": "numeric", "sympy_code": deep, "dart_result": 1.0},
        {"description": "ok", "latex": "2", "type": "numeric", "sympy_code": "2", "dart_result": 2.0}
    ]));
    assert_eq!(report.results[0].status, OutcomeStatus::Error);
    assert!(report.results[0].error.as_deref().unwrap().contains("nested"));
    assert_eq!(report.results[1].status, OutcomeStatus::Pass);
}

#[test]
fn outcomes_record_the_expression_checked() {
    let report = run(json!([{
        "description": "sum", "latex": "1+1", "type": "numeric",
        "sympy_code": "1 + 1", "dart_result": 2.0
    }]));
    assert_eq!(report.results[0].expression.as_deref(), Some("1 + 1"));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["expression"], "1 + 1");
}

#[test]
fn generated_at_and_input_hash_are_carried() {
    let report = run(json!([]));
    assert_eq!(report.generated_at, Some(json!("2026-01-01T00:00:00Z")));
    assert_eq!(report.input_sha256.len(), 64);
}

struct PanickingEngine;

impl AlgebraEngine for PanickingEngine {
    fn parse(&self, _text: &str, _scope: &Scope) -> Result<Expr, OracleError> {
        panic!("engine exploded")
    }
    fn substitute(&self, expr: &Expr, _bindings: &BTreeMap<String, Number>) -> Expr {
        expr.clone()
    }
    fn force(&self, expr: &Expr) -> Result<Expr, OracleError> {
        Ok(expr.clone())
    }
    fn simplify(&self, expr: &Expr) -> Result<Expr, OracleError> {
        Ok(expr.clone())
    }
    fn evaluate(&self, _expr: &Expr) -> Result<f64, OracleError> {
        Ok(0.0)
    }
    fn is_zero(&self, _expr: &Expr) -> Result<bool, OracleError> {
        Ok(false)
    }
    fn render(&self, expr: &Expr) -> String {
        expr.to_string()
    }
}

#[test]
fn comparator_panics_become_errors() {
    let bytes = serde_json::to_vec(&json!({"test_cases": [
        {"description": "p", "latex": "x", "type": "symbolic", "sympy_code": "x", "expected_sympy_result": "x"},
        {"description": "m", "latex": "x", "mathml": "<math><mi>x</mi></math>", "expected_elements": ["mi"]}
    ]}))
    .unwrap();
    let set = parse_cases(&bytes).unwrap();
    let report = run_cases(&PanickingEngine, &Policy::default(), &set);
    assert_eq!(report.results[0].status, OutcomeStatus::Error);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("engine exploded"));
    assert_eq!(report.results[1].status, OutcomeStatus::Pass);
}
