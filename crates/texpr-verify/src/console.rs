use std::fmt::Write;

use serde_json::Value;

use crate::report::{CaseOutcome, OutcomeDetail, OutcomeStatus, RunReport};

const RULE_WIDTH: usize = 60;

/// Title printed above every run.
pub const TITLE: &str = "Expression Export Verification";

fn timestamp(generated_at: Option<&Value>) -> String {
    match generated_at {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

/// Header: title, timestamp and case count, followed by a rule.
pub fn header(report: &RunReport) -> String {
    format!(
        "{TITLE}\nGenerated at: {}\nTotal test cases: {}\n{}\n",
        timestamp(report.generated_at.as_ref()),
        report.results.len(),
        "=".repeat(RULE_WIDTH)
    )
}

/// One case block: status tag and description, then indented detail lines.
pub fn case_block(outcome: &CaseOutcome) -> String {
    let tag = outcome.status.tag();
    let pad = " ".repeat(tag.len() + 1);
    let mut out = format!("{tag} {}\n", outcome.test);
    let mut line = |text: String| {
        let _ = writeln!(out, "{pad}{text}");
    };

    if outcome.status == OutcomeStatus::Skipped {
        line(format!(
            "Upstream error: {}",
            outcome.error.as_deref().unwrap_or_default()
        ));
        return out;
    }
    line(format!("LaTeX: {}", outcome.latex));
    if outcome.status != OutcomeStatus::Pass {
        if let Some(expression) = &outcome.expression {
            line(format!("Expression: {expression}"));
        }
    }
    match (&outcome.status, &outcome.detail) {
        (OutcomeStatus::Pass | OutcomeStatus::Fail, Some(OutcomeDetail::Numeric(detail))) => {
            line(format!(
                "Expected: {:?}, Reference: {:?}",
                detail.expected, detail.actual
            ));
            if let Some(error) = &outcome.error {
                line(error.clone());
            }
        }
        (OutcomeStatus::Pass, Some(OutcomeDetail::Symbolic(_))) => {
            line(format!(
                "Result: {}",
                outcome.message.as_deref().unwrap_or_default()
            ));
        }
        (OutcomeStatus::Fail, Some(OutcomeDetail::Markup { preview, .. })) => {
            line(format!(
                "Error: {}",
                outcome.error.as_deref().unwrap_or_default()
            ));
            line(format!("MathML: {preview}"));
        }
        (OutcomeStatus::Error, _) => {
            line(format!(
                "Error: {}",
                outcome.error.as_deref().unwrap_or_default()
            ));
        }
        _ => {
            if let Some(text) = outcome.message.as_ref().or(outcome.error.as_ref()) {
                line(text.clone());
            }
        }
    }
    out
}

/// Closing rule and counts.
pub fn summary(report: &RunReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!(
        "{rule}\nSUMMARY: {} passed, {} failed, {} errors, {} skipped\n{rule}\n",
        report.passed, report.failed, report.errors, report.skipped
    )
}

/// The whole console transcript of a run, without the results-path line.
pub fn render(report: &RunReport) -> String {
    let mut out = header(report);
    out.push('\n');
    for outcome in &report.results {
        out.push_str(&case_block(outcome));
        out.push('\n');
    }
    out.push_str(&summary(report));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::NumericDetail;

    fn numeric_outcome(status: OutcomeStatus, error: Option<&str>) -> CaseOutcome {
        CaseOutcome {
            test: "product".into(),
            latex: "xyz".into(),
            status,
            expression: Some("x*y*z".into()),
            error: error.map(str::to_string),
            message: None,
            detail: Some(OutcomeDetail::Numeric(NumericDetail {
                expected: 24.0,
                actual: 24.5,
                tolerance: 1e-10,
                difference: 0.5,
            })),
        }
    }

    #[test]
    fn numeric_failure_block_lists_values_and_difference() {
        let block = case_block(&numeric_outcome(
            OutcomeStatus::Fail,
            Some("Diff: 0.5 > tolerance 1e-10"),
        ));
        assert_eq!(
            block,
            "[FAIL] product\n       LaTeX: xyz\n       Expression: x*y*z\n       \
             Expected: 24.0, Reference: 24.5\n       Diff: 0.5 > tolerance 1e-10\n"
        );
    }

    #[test]
    fn error_block_is_indented_under_the_wider_tag() {
        let mut outcome = numeric_outcome(OutcomeStatus::Error, Some("division by zero"));
        outcome.detail = None;
        let block = case_block(&outcome);
        assert!(block.contains("\n        Error: division by zero\n"));
    }

    #[test]
    fn summary_counts_skips() {
        let report = RunReport::new(Vec::new(), None, String::new());
        assert!(summary(&report).contains("SUMMARY: 0 passed, 0 failed, 0 errors, 0 skipped"));
        assert!(header(&report).contains("Generated at: unknown"));
    }
}
