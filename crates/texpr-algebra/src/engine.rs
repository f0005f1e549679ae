//! The algebra interface consumed by the comparators.

use std::collections::BTreeMap;

use texpr_core::OracleError;
use tracing::trace;

use crate::canonical;
use crate::config::EngineConfig;
use crate::expr::Expr;
use crate::interpret::interpret;
use crate::number::Number;
use crate::numeric;
use crate::parse::{parse_bounded, Scope};
use crate::series;

/// Operations the verification oracle needs from a computer algebra system.
///
/// Implementations must be deterministic: the same input always yields the
/// same output or the same error.
pub trait AlgebraEngine {
    /// Parses `text`, resolving names only against the catalogue and `scope`.
    fn parse(&self, text: &str, scope: &Scope) -> Result<Expr, OracleError>;

    /// Replaces every bound symbol with its value. Exact values stay exact.
    fn substitute(&self, expr: &Expr, bindings: &BTreeMap<String, Number>) -> Expr;

    /// Performs every deferred integral, limit, sum, and product.
    fn force(&self, expr: &Expr) -> Result<Expr, OracleError>;

    /// Canonical simplified form.
    fn simplify(&self, expr: &Expr) -> Result<Expr, OracleError>;

    /// Float value of a closed expression.
    fn evaluate(&self, expr: &Expr) -> Result<f64, OracleError>;

    /// Whether `expr` simplifies to exactly zero.
    ///
    /// `false` means "not shown to be zero", never "shown to be nonzero".
    fn is_zero(&self, expr: &Expr) -> Result<bool, OracleError>;

    /// Text rendering in the engine's surface syntax.
    fn render(&self, expr: &Expr) -> String;
}

/// Built-in engine over [`Expr`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceEngine {
    config: EngineConfig,
}

impl ReferenceEngine {
    /// Engine with the given work bounds.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Active work bounds.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl AlgebraEngine for ReferenceEngine {
    fn parse(&self, text: &str, scope: &Scope) -> Result<Expr, OracleError> {
        let syntax = parse_bounded(text, scope, &self.config)?;
        let expr = interpret(&syntax, &self.config)?;
        trace!(source = text, parsed = %expr, "parsed expression");
        Ok(expr)
    }

    fn substitute(&self, expr: &Expr, bindings: &BTreeMap<String, Number>) -> Expr {
        bindings.iter().fold(expr.clone(), |acc, (name, value)| {
            acc.substitute(name, &Expr::Number(value.clone()))
        })
    }

    fn force(&self, expr: &Expr) -> Result<Expr, OracleError> {
        series::force(expr, &self.config)
    }

    fn simplify(&self, expr: &Expr) -> Result<Expr, OracleError> {
        canonical::simplify(expr, &self.config)
    }

    fn evaluate(&self, expr: &Expr) -> Result<f64, OracleError> {
        numeric::evaluate(expr, &self.config)
    }

    fn is_zero(&self, expr: &Expr) -> Result<bool, OracleError> {
        canonical::is_zero(expr, &self.config)
    }

    fn render(&self, expr: &Expr) -> String {
        expr.to_string()
    }
}
