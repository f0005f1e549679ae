use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use texpr_core::{to_pretty_json_bytes, ErrorInfo, OracleError};
use texpr_markup::MarkupDefect;

use crate::numeric::NumericDetail;
use crate::symbolic::SymbolicDetail;

/// Exit status when no case failed.
pub const EXIT_OK: u8 = 0;
/// Exit status when at least one case failed.
pub const EXIT_FAILED: u8 = 1;
/// Exit status for fatal input errors; no report is written.
pub const EXIT_FATAL: u8 = 2;

/// Terminal state of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The check held.
    Pass,
    /// The check ran and did not hold.
    Fail,
    /// The check could not be carried out.
    Error,
    /// Nothing to check.
    Skipped,
}

impl OutcomeStatus {
    /// Console tag, e.g. `[PASS]`.
    pub fn tag(&self) -> &'static str {
        match self {
            OutcomeStatus::Pass => "[PASS]",
            OutcomeStatus::Fail => "[FAIL]",
            OutcomeStatus::Error => "[ERROR]",
            OutcomeStatus::Skipped => "[SKIP]",
        }
    }
}

/// Kind-specific evidence attached to an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDetail {
    /// Numeric values and tolerance.
    Numeric(NumericDetail),
    /// Simplified forms of both sides.
    Symbolic(SymbolicDetail),
    /// Markup validation evidence.
    Markup {
        /// Distinct tags found.
        elements: Vec<String>,
        /// Defects found.
        defects: Vec<MarkupDefect>,
        /// Leading characters of the markup.
        preview: String,
    },
}

/// Result of verifying one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// Case description.
    pub test: String,
    /// Original LaTeX text.
    pub latex: String,
    /// Terminal state.
    pub status: OutcomeStatus,
    /// Expression text handed to the reference engine, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Diagnostic for anything other than a pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Message shown for a pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Evidence behind the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<OutcomeDetail>,
}

/// Aggregate of one run, persisted as the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Cases that passed.
    pub passed: usize,
    /// Cases that failed.
    pub failed: usize,
    /// Cases whose check could not be carried out.
    pub errors: usize,
    /// Cases with nothing to check.
    pub skipped: usize,
    /// Exporter timestamp, verbatim.
    pub generated_at: Option<Value>,
    /// SHA-256 of the input file.
    pub input_sha256: String,
    /// Outcomes in input order.
    pub results: Vec<CaseOutcome>,
}

impl RunReport {
    /// Counts `results` into a report.
    pub fn new(results: Vec<CaseOutcome>, generated_at: Option<Value>, input_sha256: String) -> Self {
        let count = |status: OutcomeStatus| results.iter().filter(|o| o.status == status).count();
        Self {
            passed: count(OutcomeStatus::Pass),
            failed: count(OutcomeStatus::Fail),
            errors: count(OutcomeStatus::Error),
            skipped: count(OutcomeStatus::Skipped),
            generated_at,
            input_sha256,
            results,
        }
    }

    /// Process exit status: zero iff no case failed. Errors and skips do not
    /// count against the run.
    pub fn exit_code(&self) -> u8 {
        if self.failed == 0 {
            EXIT_OK
        } else {
            EXIT_FAILED
        }
    }

    /// Indented JSON with sorted keys.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OracleError> {
        to_pretty_json_bytes(self)
    }

    /// Writes the report to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), OracleError> {
        let bytes = self.to_bytes()?;
        let io_error = |err: std::io::Error| {
            OracleError::Io(
                ErrorInfo::new("write-report", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, bytes).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus) -> CaseOutcome {
        CaseOutcome {
            test: "t".into(),
            latex: "x".into(),
            status,
            expression: None,
            error: None,
            message: None,
            detail: None,
        }
    }

    #[test]
    fn counts_follow_statuses() {
        let report = RunReport::new(
            vec![
                outcome(OutcomeStatus::Pass),
                outcome(OutcomeStatus::Error),
                outcome(OutcomeStatus::Skipped),
                outcome(OutcomeStatus::Pass),
            ],
            None,
            String::new(),
        );
        assert_eq!((report.passed, report.failed, report.errors, report.skipped), (2, 0, 1, 1));
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn any_failure_sets_exit_code() {
        let report = RunReport::new(vec![outcome(OutcomeStatus::Fail)], None, String::new());
        assert_eq!(report.exit_code(), EXIT_FAILED);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(outcome(OutcomeStatus::Skipped)).unwrap();
        assert_eq!(json["status"], "skipped");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn expression_is_serialized_under_its_own_name() {
        let with_expression = CaseOutcome {
            expression: Some("x + 1".into()),
            ..outcome(OutcomeStatus::Fail)
        };
        let json = serde_json::to_value(with_expression).unwrap();
        assert_eq!(json["expression"], "x + 1");
        assert!(json.get("code").is_none());
    }
}
