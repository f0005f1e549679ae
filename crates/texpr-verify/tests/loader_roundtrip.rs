use std::fs;

use tempfile::tempdir;
use texpr_algebra::ReferenceEngine;
use texpr_core::{from_json_slice, sha256_hex};
use texpr_verify::{load_cases, run_cases, CaseKind, Policy, RunReport};

const CASES: &str = r#"{
  "generated_at": "2025-11-02T10:00:00.000",
  "test_cases": [
    {"description": "sum", "latex": "1+2", "type": "numeric", "sympy_code": "1 + 2", "dart_result": 3.0},
    {"description": "frac", "latex": "\\frac{1}{2}", "mathml": "<math xmlns=\"http://www.w3.org/1998/Math/MathML\"><mfrac><mn>1</mn><mn>2</mn></mfrac></math>", "expected_elements": ["mfrac", "mn"], "expected_content": "1"},
    {"description": "broken", "latex": "\\oops", "error": "Unexpected token"}
  ]
}"#;

#[test]
fn cases_load_in_order_with_hash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_cases.json");
    fs::write(&path, CASES).unwrap();

    let set = load_cases(&path).unwrap();
    assert_eq!(set.cases.len(), 3);
    assert_eq!(set.input_sha256, sha256_hex(CASES.as_bytes()));
    assert!(matches!(set.cases[0].kind, CaseKind::Numeric(_)));
    assert!(matches!(set.cases[1].kind, CaseKind::Markup(_)));
    assert!(matches!(set.cases[2].kind, CaseKind::UpstreamError { .. }));
}

#[test]
fn report_written_and_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_cases.json");
    fs::write(&path, CASES).unwrap();
    let set = load_cases(&path).unwrap();
    let report = run_cases(&ReferenceEngine::default(), &Policy::default(), &set);
    assert_eq!((report.passed, report.failed, report.errors, report.skipped), (2, 0, 0, 1));

    let out = dir.path().join("nested").join("verification_results.json");
    report.write(&out).unwrap();
    let restored: RunReport = from_json_slice(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(restored, report);
    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(raw["generated_at"], "2025-11-02T10:00:00.000");
    assert_eq!(raw["results"][2]["status"], "skipped");
}

#[test]
fn missing_input_is_fatal_with_hint() {
    let dir = tempdir().unwrap();
    let err = load_cases(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.info().code, "missing-input");
    assert!(err.info().hint.is_some());
}

#[test]
fn truncated_container_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_cases.json");
    fs::write(&path, &CASES[..40]).unwrap();
    let err = load_cases(&path).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.info().context.contains_key("path"));
}
