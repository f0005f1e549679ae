use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use texpr_algebra::{AlgebraEngine, Number, Scope};
use texpr_core::{ErrorInfo, OracleError};

/// Values behind a numeric verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericDetail {
    /// Value computed upstream.
    pub expected: f64,
    /// Value computed by the reference engine.
    pub actual: f64,
    /// Tolerance applied.
    pub tolerance: f64,
    /// `|actual - expected|`.
    pub difference: f64,
}

/// Outcome of a numeric comparison that evaluated successfully.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericVerdict {
    /// Whether the difference is within tolerance.
    pub pass: bool,
    /// Values behind the verdict.
    pub detail: NumericDetail,
}

/// Scope holding the default symbols and every bound name.
pub(crate) fn scope_for<'a>(
    defaults: &'a [String],
    bound: impl IntoIterator<Item = &'a String>,
) -> Scope {
    let mut scope = Scope::new(defaults.iter().cloned());
    for name in bound {
        scope.declare(name.clone());
    }
    scope
}

/// Evaluates `code` under `bindings` and compares it to `expected`.
///
/// Free symbols without a binding stay symbols, so such a candidate fails to
/// evaluate and is reported as an error rather than a mismatch. Exact
/// bindings keep the whole evaluation exact until the final rounding.
pub fn compare_numeric<E: AlgebraEngine + ?Sized>(
    engine: &E,
    code: &str,
    bindings: &BTreeMap<String, Number>,
    expected: f64,
    tolerance: f64,
    default_symbols: &[String],
) -> Result<NumericVerdict, OracleError> {
    let scope = scope_for(default_symbols, bindings.keys());
    let parsed = engine.parse(code, &scope)?;
    let bound = engine.substitute(&parsed, bindings);
    let forced = engine.force(&bound)?;
    let actual = engine.evaluate(&forced)?;
    if actual.is_nan() {
        return Err(OracleError::Algebra(
            ErrorInfo::new("not-a-number", "expression evaluated to NaN")
                .with_context("code", code),
        ));
    }
    let difference = (actual - expected).abs();
    Ok(NumericVerdict {
        pass: difference <= tolerance,
        detail: NumericDetail {
            expected,
            actual,
            tolerance,
            difference,
        },
    })
}
