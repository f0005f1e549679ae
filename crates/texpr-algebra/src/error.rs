use texpr_core::{ErrorInfo, OracleError};

/// Builds an [`OracleError::Algebra`] with the given code.
pub fn algebra_error(code: &str, message: impl Into<String>) -> OracleError {
    OracleError::Algebra(ErrorInfo::new(code, message.into()))
}

/// Error raised while parsing expression text, tagged with the offending source.
pub fn syntax_error(source: &str, message: impl Into<String>) -> OracleError {
    OracleError::Algebra(
        ErrorInfo::new("syntax", message.into()).with_context("source", source.to_string()),
    )
}
