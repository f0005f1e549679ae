use serde::{Deserialize, Serialize};
use texpr_algebra::{AlgebraEngine, Expr};
use texpr_core::OracleError;

use crate::numeric::scope_for;

/// Simplified forms behind a symbolic verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicDetail {
    /// Simplified candidate.
    pub candidate: String,
    /// Simplified expected expression.
    pub expected: String,
}

/// Outcome of a symbolic comparison that evaluated successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicVerdict {
    /// Whether the simplified difference is exactly zero.
    pub equivalent: bool,
    /// Simplified forms of both sides.
    pub detail: SymbolicDetail,
}

impl SymbolicVerdict {
    /// The simplified candidate on success, `Got .., expected ..` otherwise.
    pub fn message(&self) -> String {
        if self.equivalent {
            self.detail.candidate.clone()
        } else {
            format!(
                "Got {}, expected {}",
                self.detail.candidate, self.detail.expected
            )
        }
    }
}

fn canonical<E: AlgebraEngine + ?Sized>(
    engine: &E,
    text: &str,
    default_symbols: &[String],
) -> Result<Expr, OracleError> {
    let parsed = engine.parse(text, &scope_for(default_symbols, []))?;
    let forced = if parsed.contains_deferred() {
        engine.force(&parsed)?
    } else {
        parsed
    };
    engine.simplify(&forced)
}

/// Decides whether `code` and `expected` are equal up to simplification.
///
/// Equivalence is claimed only when the difference simplifies to exactly zero.
/// The zero test is incomplete, so `equivalent == false` can be a false
/// negative; it is never a false positive.
pub fn compare_symbolic<E: AlgebraEngine + ?Sized>(
    engine: &E,
    code: &str,
    expected: &str,
    default_symbols: &[String],
) -> Result<SymbolicVerdict, OracleError> {
    let candidate = canonical(engine, code, default_symbols)?;
    let reference = canonical(engine, expected, default_symbols)?;
    // Identical canonical forms are equal even where their difference is
    // undefined, as with `oo - oo`.
    let equivalent = candidate == reference
        || engine.is_zero(&Expr::sub(candidate.clone(), reference.clone()))?;
    Ok(SymbolicVerdict {
        equivalent,
        detail: SymbolicDetail {
            candidate: engine.render(&candidate),
            expected: engine.render(&reference),
        },
    })
}
