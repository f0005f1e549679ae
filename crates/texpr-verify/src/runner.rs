use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use texpr_algebra::AlgebraEngine;
use texpr_core::OracleError;
use texpr_markup::validate;
use tracing::{debug, info, warn};

use crate::cases::{CaseKind, CaseSet, MarkupCase, NumericCase, SymbolicCase, TestCase};
use crate::numeric::compare_numeric;
use crate::policies::Policy;
use crate::report::{CaseOutcome, OutcomeDetail, OutcomeStatus, RunReport};
use crate::symbolic::compare_symbolic;

fn outcome(case: &TestCase, status: OutcomeStatus) -> CaseOutcome {
    CaseOutcome {
        test: case.description.clone(),
        latex: case.source.clone(),
        status,
        expression: None,
        error: None,
        message: None,
        detail: None,
    }
}

fn errored(case: &TestCase, expression: &str, err: &OracleError) -> CaseOutcome {
    CaseOutcome {
        expression: Some(expression.to_string()),
        error: Some(err.message().to_string()),
        ..outcome(case, OutcomeStatus::Error)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn preview(markup: &str, chars: usize) -> String {
    let head: String = markup.chars().take(chars).collect();
    format!("{head}...")
}

fn numeric_case<E: AlgebraEngine + ?Sized>(
    engine: &E,
    policy: &Policy,
    case: &TestCase,
    payload: &NumericCase,
) -> CaseOutcome {
    let tolerance = payload.tolerance.unwrap_or(policy.default_tolerance);
    match compare_numeric(
        engine,
        &payload.code,
        &payload.engine_bindings(),
        payload.expected,
        tolerance,
        &policy.default_symbols,
    ) {
        Ok(verdict) => {
            let detail = verdict.detail;
            let mut result = CaseOutcome {
                expression: Some(payload.code.clone()),
                detail: Some(OutcomeDetail::Numeric(detail)),
                ..outcome(case, OutcomeStatus::Pass)
            };
            if !verdict.pass {
                result.status = OutcomeStatus::Fail;
                result.error = Some(format!(
                    "Diff: {:?} > tolerance {:?}",
                    detail.difference, detail.tolerance
                ));
            }
            result
        }
        Err(err) => errored(case, &payload.code, &err),
    }
}

fn symbolic_case<E: AlgebraEngine + ?Sized>(
    engine: &E,
    policy: &Policy,
    case: &TestCase,
    payload: &SymbolicCase,
) -> CaseOutcome {
    match compare_symbolic(engine, &payload.code, &payload.expected, &policy.default_symbols) {
        Ok(verdict) => {
            let message = verdict.message();
            let status = if verdict.equivalent {
                OutcomeStatus::Pass
            } else {
                OutcomeStatus::Fail
            };
            let (message, error) = if verdict.equivalent {
                (Some(message), None)
            } else {
                (None, Some(message))
            };
            CaseOutcome {
                expression: Some(payload.code.clone()),
                message,
                error,
                detail: Some(OutcomeDetail::Symbolic(verdict.detail)),
                ..outcome(case, status)
            }
        }
        Err(err) => errored(case, &payload.code, &err),
    }
}

fn markup_case(policy: &Policy, case: &TestCase, payload: &MarkupCase) -> CaseOutcome {
    let verdict = validate(
        &payload.markup,
        &payload.required,
        payload.content.as_deref(),
        &policy.markup_rules(),
    );
    let message = verdict.message();
    let valid = verdict.is_valid();
    let detail = OutcomeDetail::Markup {
        elements: verdict.elements.into_iter().collect(),
        defects: verdict.defects,
        preview: preview(&payload.markup, policy.markup_preview_chars),
    };
    if valid {
        CaseOutcome {
            message: Some(message),
            detail: Some(detail),
            ..outcome(case, OutcomeStatus::Pass)
        }
    } else {
        CaseOutcome {
            error: Some(message),
            detail: Some(detail),
            ..outcome(case, OutcomeStatus::Fail)
        }
    }
}

fn dispatch<E: AlgebraEngine + ?Sized>(engine: &E, policy: &Policy, case: &TestCase) -> CaseOutcome {
    match &case.kind {
        CaseKind::Numeric(payload) => numeric_case(engine, policy, case, payload),
        CaseKind::Symbolic(payload) => symbolic_case(engine, policy, case, payload),
        CaseKind::Markup(payload) => markup_case(policy, case, payload),
        CaseKind::UpstreamError { message } => CaseOutcome {
            error: Some(message.clone()),
            ..outcome(case, OutcomeStatus::Skipped)
        },
    }
}

/// Verifies one case. Never panics and never returns an error: comparator
/// failures and panics become [`OutcomeStatus::Error`].
pub fn verify_case<E: AlgebraEngine + ?Sized>(
    engine: &E,
    policy: &Policy,
    case: &TestCase,
) -> CaseOutcome {
    debug!(case = case.index, kind = case.kind.label(), "verifying case");
    let result = panic::catch_unwind(AssertUnwindSafe(|| dispatch(engine, policy, case)));
    let verified = match result {
        Ok(verified) => verified,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(case = case.index, %reason, "comparator panicked");
            CaseOutcome {
                error: Some(format!("comparator panicked: {reason}")),
                ..outcome(case, OutcomeStatus::Error)
            }
        }
    };
    match verified.status {
        OutcomeStatus::Error => {
            warn!(case = case.index, error = ?verified.error, "case could not be verified")
        }
        status => debug!(case = case.index, ?status, "case verified"),
    }
    verified
}

/// Verifies every case in input order and aggregates the report.
pub fn run_cases<E: AlgebraEngine + ?Sized>(engine: &E, policy: &Policy, set: &CaseSet) -> RunReport {
    info!(cases = set.cases.len(), "starting verification run");
    let results = set
        .cases
        .iter()
        .map(|case| verify_case(engine, policy, case))
        .collect();
    let report = RunReport::new(results, set.generated_at.clone(), set.input_sha256.clone());
    info!(
        passed = report.passed,
        failed = report.failed,
        errors = report.errors,
        skipped = report.skipped,
        "verification run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_counts_characters() {
        assert_eq!(preview("<math>αβγ</math>", 8), "<math>αβ...");
        assert_eq!(preview("<m/>", 100), "<m/>...");
    }

    #[test]
    fn panic_payloads_become_text() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
