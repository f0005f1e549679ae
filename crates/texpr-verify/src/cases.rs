use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use texpr_algebra::Number;
use texpr_core::{sha256_hex, ErrorInfo, OracleError};
use tracing::{debug, warn};

fn input_error(code: &str, message: impl Into<String>, path: &Path) -> OracleError {
    OracleError::Input(
        ErrorInfo::new(code, message.into()).with_context("path", path.display().to_string()),
    )
}

fn structure_error(index: usize, message: impl Into<String>) -> OracleError {
    OracleError::Case(
        ErrorInfo::new("case-structure", message.into()).with_context("case", index.to_string()),
    )
}

/// Numeric payload: the candidate must evaluate to `expected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericCase {
    /// Candidate expression text.
    #[serde(rename = "sympy_code")]
    pub code: String,
    /// Value computed upstream.
    #[serde(rename = "dart_result")]
    pub expected: f64,
    /// Per-case tolerance; the policy default applies when absent.
    #[serde(default)]
    pub tolerance: Option<f64>,
    /// Variable bindings, kept as written so integers stay integers.
    #[serde(default, rename = "variables")]
    pub bindings: BTreeMap<String, serde_json::Number>,
}

impl NumericCase {
    /// Bindings as engine values: integer literals bind exactly, anything
    /// else as a float.
    pub fn engine_bindings(&self) -> BTreeMap<String, Number> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.clone(), binding_value(value)))
            .collect()
    }
}

/// Engine value of one JSON binding.
pub fn binding_value(value: &serde_json::Number) -> Number {
    if let Some(int) = value.as_i64() {
        return Number::int(i128::from(int));
    }
    if let Some(int) = value.as_u64() {
        return Number::int(i128::from(int));
    }
    Number::Float(value.as_f64().unwrap_or(f64::NAN))
}

/// Symbolic payload: candidate and expected must be equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicCase {
    /// Candidate expression text.
    #[serde(rename = "sympy_code")]
    pub code: String,
    /// Expected expression text.
    #[serde(rename = "expected_sympy_result")]
    pub expected: String,
}

/// Markup payload: structural and content expectations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupCase {
    /// Markup text.
    #[serde(rename = "mathml")]
    pub markup: String,
    /// Tags that must occur somewhere in the tree.
    #[serde(rename = "expected_elements")]
    pub required: Vec<String>,
    /// Substring expected in the text content or raw markup.
    #[serde(default, rename = "expected_content")]
    pub content: Option<String>,
}

/// What a case asks to be checked. Exactly one payload per case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseKind {
    /// Float comparison with a tolerance.
    Numeric(NumericCase),
    /// Equivalence up to simplification.
    Symbolic(SymbolicCase),
    /// Structural markup validation.
    Markup(MarkupCase),
    /// Nothing to check: upstream failed, or the record was malformed.
    UpstreamError {
        /// Recorded or synthesized message.
        message: String,
    },
}

impl CaseKind {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            CaseKind::Numeric(_) => "numeric",
            CaseKind::Symbolic(_) => "symbolic",
            CaseKind::Markup(_) => "mathml",
            CaseKind::UpstreamError { .. } => "error",
        }
    }
}

/// One verification unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Position in the input file.
    pub index: usize,
    /// Human-readable label; not necessarily unique.
    pub description: String,
    /// Original LaTeX text, kept for diagnostics only.
    pub source: String,
    /// Kind-specific payload.
    pub kind: CaseKind,
}

/// Every case of one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSet {
    /// Exporter timestamp, carried verbatim.
    pub generated_at: Option<Value>,
    /// Cases in input order.
    pub cases: Vec<TestCase>,
    /// SHA-256 of the raw input bytes.
    pub input_sha256: String,
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(default)]
    generated_at: Option<Value>,
    test_cases: Vec<Value>,
}

/// Reads and classifies the cases stored at `path`.
///
/// A missing or unreadable file and a malformed container are fatal
/// [`OracleError::Input`] errors. Malformed individual records are not: they
/// become [`CaseKind::UpstreamError`] cases.
pub fn load_cases(path: &Path) -> Result<CaseSet, OracleError> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => OracleError::Input(
            ErrorInfo::new("missing-input", format!("{} not found", path.display()))
                .with_context("path", path.display().to_string())
                .with_hint("run the exporter tests first to generate the test cases"),
        ),
        _ => input_error("read-input", err.to_string(), path),
    })?;
    let set = parse_cases(&bytes).map_err(|err| match err {
        OracleError::Input(info) => {
            OracleError::Input(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })?;
    debug!(path = %path.display(), cases = set.cases.len(), "loaded test cases");
    Ok(set)
}

/// Classifies the cases in raw input bytes.
pub fn parse_cases(bytes: &[u8]) -> Result<CaseSet, OracleError> {
    let file: CaseFile = serde_json::from_slice(bytes).map_err(|err| {
        OracleError::Input(ErrorInfo::new(
            "malformed-input",
            format!("input is not a test case file: {err}"),
        ))
    })?;
    let cases = file
        .test_cases
        .into_iter()
        .enumerate()
        .map(|(index, record)| classify(index, record))
        .collect();
    Ok(CaseSet {
        generated_at: file.generated_at,
        cases,
        input_sha256: sha256_hex(bytes),
    })
}

fn text_field(record: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn classify(index: usize, record: Value) -> TestCase {
    let Value::Object(fields) = &record else {
        return upstream(
            index,
            format!("case {index}"),
            String::new(),
            structure_error(index, "record is not an object"),
        );
    };
    let description = text_field(fields, "description").unwrap_or_else(|| format!("case {index}"));
    let source = text_field(fields, "latex").unwrap_or_default();
    match payload(index, fields, &record) {
        Ok(kind) => TestCase {
            index,
            description,
            source,
            kind,
        },
        Err(err) => upstream(index, description, source, err),
    }
}

fn upstream(index: usize, description: String, source: String, err: OracleError) -> TestCase {
    warn!(case = index, error = %err, "malformed test case record");
    TestCase {
        index,
        description,
        source,
        kind: CaseKind::UpstreamError {
            message: format!("CaseStructureError: {}", err.message()),
        },
    }
}

const NUMERIC_FIELDS: &[&str] = &["dart_result", "tolerance", "variables"];
const SYMBOLIC_FIELDS: &[&str] = &["expected_sympy_result"];
const EXPRESSION_FIELDS: &[&str] = &["sympy_code"];
const MARKUP_FIELDS: &[&str] = &["mathml", "expected_elements", "expected_content"];

/// Fields that belong to some other kind of case than `kind`.
fn foreign_fields(kind: &str) -> Vec<&'static str> {
    let groups: &[&[&str]] = match kind {
        "numeric" => &[SYMBOLIC_FIELDS, MARKUP_FIELDS],
        "symbolic" => &[NUMERIC_FIELDS, MARKUP_FIELDS],
        "mathml" => &[NUMERIC_FIELDS, SYMBOLIC_FIELDS, EXPRESSION_FIELDS],
        _ => &[],
    };
    groups.iter().flat_map(|group| group.iter().copied()).collect()
}

/// A record carries exactly one payload: fields of another kind make it
/// ambiguous.
fn check_exclusive(
    index: usize,
    kind: &str,
    fields: &serde_json::Map<String, Value>,
) -> Result<(), OracleError> {
    let stray: Vec<&str> = foreign_fields(kind)
        .into_iter()
        .filter(|key| fields.contains_key(*key))
        .collect();
    if stray.is_empty() {
        return Ok(());
    }
    Err(structure_error(
        index,
        format!("{kind} case also carries {}", stray.join(", ")),
    ))
}

fn decode<T: DeserializeOwned>(index: usize, kind: &str, record: &Value) -> Result<T, OracleError> {
    T::deserialize(record).map_err(|err| structure_error(index, format!("{kind} case: {err}")))
}

fn payload(
    index: usize,
    fields: &serde_json::Map<String, Value>,
    record: &Value,
) -> Result<CaseKind, OracleError> {
    if let Some(error) = fields.get("error") {
        let message = match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Ok(CaseKind::UpstreamError { message });
    }
    let kind = match fields.get("type") {
        Some(Value::String(kind)) => kind.as_str(),
        Some(other) => {
            return Err(structure_error(index, format!("'type' must be a string, found {other}")))
        }
        None if fields.contains_key("mathml") => "mathml",
        None => return Err(structure_error(index, "record has neither 'type' nor 'mathml'")),
    };
    check_exclusive(index, kind, fields)?;
    match kind {
        "numeric" => decode(index, kind, record).map(CaseKind::Numeric),
        "symbolic" => decode(index, kind, record).map(CaseKind::Symbolic),
        "mathml" => decode(index, kind, record).map(CaseKind::Markup),
        "error" => Err(structure_error(index, "error case without an 'error' field")),
        other => Err(structure_error(index, format!("unknown case type '{other}'"))),
    }
}
