//! Structured error types shared across the oracle crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`OracleError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, case indices, expression text).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the verification oracle.
///
/// Only [`OracleError::Input`] and the persistence families are allowed to
/// reach the process boundary; the runner turns the rest into per-case
/// outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum OracleError {
    /// Input file missing or structurally unreadable. Fatal to the run.
    #[error("input error: {0}")]
    Input(ErrorInfo),
    /// A single record whose kind and payload disagree.
    #[error("case error: {0}")]
    Case(ErrorInfo),
    /// The reference algebra engine could not evaluate an expression.
    #[error("algebra error: {0}")]
    Algebra(ErrorInfo),
    /// Markup could not be parsed as an element tree.
    #[error("markup error: {0}")]
    Markup(ErrorInfo),
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem errors while persisting artefacts.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl OracleError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            OracleError::Input(info)
            | OracleError::Case(info)
            | OracleError::Algebra(info)
            | OracleError::Markup(info)
            | OracleError::Config(info)
            | OracleError::Serde(info)
            | OracleError::Io(info) => info,
        }
    }

    /// Returns the bare diagnostic message without code or context decoration.
    pub fn message(&self) -> &str {
        &self.info().message
    }

    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleError::Input(_) | OracleError::Config(_))
    }
}
