#![deny(missing_docs)]
#![doc = "Loader, comparators, runner and report for differential verification of exported expression test cases."]

/// Test-case file loading and record classification.
pub mod cases;
/// Human-readable console rendering of a run.
pub mod console;
/// Numeric comparison within a tolerance.
pub mod numeric;
/// Policy definitions controlling tolerances, symbols and markup rules.
pub mod policies;
/// Aggregated run report and exit status.
pub mod report;
/// Per-case dispatch and outcome classification.
pub mod runner;
/// Symbolic equivalence through simplification.
pub mod symbolic;

pub use cases::{load_cases, parse_cases, CaseKind, CaseSet, TestCase};
pub use numeric::{compare_numeric, NumericDetail, NumericVerdict};
pub use policies::Policy;
pub use report::{CaseOutcome, OutcomeDetail, OutcomeStatus, RunReport, EXIT_FAILED, EXIT_FATAL, EXIT_OK};
pub use runner::{run_cases, verify_case};
pub use symbolic::{compare_symbolic, SymbolicDetail, SymbolicVerdict};
