//! Floating-point evaluation of closed expressions.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use texpr_core::OracleError;

use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Constant, Direction, Expr, Func, Range};

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];
const QUADRATURE_EPS: f64 = 1.0e-12;
const QUADRATURE_BUDGET: usize = 400_000;
const ENDPOINT_NUDGE: f64 = 1.0e-9;
const SERIES_HEAD: usize = 4_000;

fn complex_result() -> OracleError {
    algebra_error("complex-result", "expression has a complex value")
}

fn undefined(what: impl Into<String>) -> OracleError {
    algebra_error("undefined", what)
}

/// Gamma function via the Lanczos approximation with reflection.
pub fn gamma(x: f64) -> f64 {
    if x < 0.5 {
        return PI / ((PI * x).sin() * gamma(1.0 - x));
    }
    let x = x - 1.0;
    let mut acc = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * acc
}

fn checked(value: f64, what: &str) -> Result<f64, OracleError> {
    if value.is_nan() {
        Err(undefined(format!("{what} is undefined")))
    } else {
        Ok(value)
    }
}

/// Applies a catalogue function to float arguments.
pub fn apply_f64(func: Func, args: &[f64]) -> Result<f64, OracleError> {
    let x = args.first().copied().unwrap_or(f64::NAN);
    let value = match func {
        Func::Sin => x.sin(),
        Func::Cos => x.cos(),
        Func::Tan => x.tan(),
        Func::Sinh => x.sinh(),
        Func::Cosh => x.cosh(),
        Func::Tanh => x.tanh(),
        Func::Asin | Func::Acos if x.abs() > 1.0 => return Err(complex_result()),
        Func::Asin => x.asin(),
        Func::Acos => x.acos(),
        Func::Atan => x.atan(),
        Func::Log if x == 0.0 => return Err(algebra_error("log-zero", "log(0) is undefined")),
        Func::Log if x < 0.0 => return Err(complex_result()),
        Func::Log => x.ln(),
        Func::Exp => x.exp(),
        Func::Abs => x.abs(),
        Func::Floor => x.floor(),
        Func::Ceiling => x.ceil(),
        Func::Factorial if x < 0.0 && x.fract() == 0.0 => {
            return Err(algebra_error(
                "factorial-domain",
                format!("factorial({x}) is undefined"),
            ));
        }
        Func::Factorial => gamma(x + 1.0),
        Func::Binomial => {
            let k = args.get(1).copied().unwrap_or(f64::NAN);
            binomial_f64(x, k)
        }
    };
    checked(value, func.name())
}

fn binomial_f64(n: f64, k: f64) -> f64 {
    if k.fract() == 0.0 && k >= 0.0 && k <= 10_000.0 {
        let mut acc = 1.0;
        let mut i = 0.0;
        while i < k {
            acc *= (n - i) / (i + 1.0);
            i += 1.0;
        }
        return acc;
    }
    if k.fract() == 0.0 && k < 0.0 {
        return 0.0;
    }
    gamma(n + 1.0) / (gamma(k + 1.0) * gamma(n - k + 1.0))
}

/// Evaluates a closed expression to `f64`.
pub fn evaluate(expr: &Expr, config: &EngineConfig) -> Result<f64, OracleError> {
    Evaluator::new(config).eval(expr)
}

/// Relative agreement between successive samples for a numeric limit.
const LIMIT_TOLERANCE: f64 = 1.0e-4;
/// Agreement a numeric limit must reach before it may stand in for an
/// exact value.
const SETTLED_TOLERANCE: f64 = 1.0e-12;

/// Numeric limit of `expr` as `var` approaches `point`.
pub fn limit(
    expr: &Expr,
    var: &str,
    point: &Expr,
    dir: Direction,
    config: &EngineConfig,
) -> Result<f64, OracleError> {
    Evaluator::new(config).limit(expr, var, point, dir, LIMIT_TOLERANCE)
}

/// Numeric limit whose last samples agree to [`SETTLED_TOLERANCE`]; an
/// estimate that is still moving is an `undefined` error.
pub fn settled_limit(
    expr: &Expr,
    var: &str,
    point: &Expr,
    dir: Direction,
    config: &EngineConfig,
) -> Result<f64, OracleError> {
    Evaluator::new(config).limit(expr, var, point, dir, SETTLED_TOLERANCE)
}

struct Evaluator<'a> {
    config: &'a EngineConfig,
    bindings: BTreeMap<String, f64>,
    budget: usize,
}

impl<'a> Evaluator<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Evaluator {
            config,
            bindings: BTreeMap::new(),
            budget: QUADRATURE_BUDGET,
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<f64, OracleError> {
        let value = match expr {
            Expr::Number(n) => n.to_f64(),
            Expr::Symbol(name) => *self.bindings.get(name).ok_or_else(|| {
                algebra_error(
                    "free-symbol",
                    format!("cannot convert expression to float: free symbol '{name}'"),
                )
            })?,
            Expr::Constant(Constant::Pi) => PI,
            Expr::Constant(Constant::E) => std::f64::consts::E,
            Expr::Constant(Constant::Infinity) => f64::INFINITY,
            Expr::Constant(Constant::I) => return Err(complex_result()),
            Expr::Add(terms) => {
                let mut total = 0.0;
                for term in terms {
                    total += self.eval(term)?;
                }
                total
            }
            Expr::Mul(factors) => {
                let mut total = 1.0;
                for factor in factors {
                    total *= self.eval(factor)?;
                }
                total
            }
            Expr::Pow(base, exp) => {
                let b = self.eval(base)?;
                let e = self.eval(exp)?;
                power(b, e)?
            }
            Expr::Apply(func, args) => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_f64(*func, &values)?
            }
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => match bounds {
                Some(b) => {
                    let lower = self.eval(&b.0)?;
                    let upper = self.eval(&b.1)?;
                    self.integral(integrand, var, lower, upper)?
                }
                None => {
                    return Err(algebra_error(
                        "indefinite",
                        "cannot evaluate an indefinite integral numerically",
                    ))
                }
            },
            Expr::Limit {
                expr,
                var,
                point,
                dir,
            } => self.limit(expr, var, point, *dir, LIMIT_TOLERANCE)?,
            Expr::Sum { body, range } => self.series(body, range)?,
            Expr::Product { body, range } => self.product(body, range)?,
        };
        checked(value, "expression")
    }

    fn with_binding(&mut self, var: &str, value: f64, body: &Expr) -> Result<f64, OracleError> {
        let previous = self.bindings.insert(var.to_string(), value);
        let outcome = self.eval(body);
        match previous {
            Some(old) => self.bindings.insert(var.to_string(), old),
            None => self.bindings.remove(var),
        };
        outcome
    }

    fn integral(&mut self, body: &Expr, var: &str, a: f64, b: f64) -> Result<f64, OracleError> {
        if a == b {
            return Ok(0.0);
        }
        if a > b {
            return Ok(-self.integral(body, var, b, a)?);
        }
        match (a.is_finite(), b.is_finite()) {
            (true, true) => self.quadrature(body, var, a, b, |t| (t, 1.0)),
            (true, false) => self.quadrature(body, var, 0.0, 1.0, |t| {
                let s = 1.0 - t;
                (a + t / s, 1.0 / (s * s))
            }),
            (false, true) => self.quadrature(body, var, 0.0, 1.0, |t| {
                let s = 1.0 - t;
                (b - t / s, 1.0 / (s * s))
            }),
            (false, false) => self.quadrature(body, var, -1.0, 1.0, |t| {
                let s = 1.0 - t * t;
                (t / s, (1.0 + t * t) / (s * s))
            }),
        }
    }

    /// Adaptive Simpson over `[a, b]` after the change of variables `map`,
    /// which returns the point and the Jacobian.
    fn quadrature<M>(&mut self, body: &Expr, var: &str, a: f64, b: f64, map: M) -> Result<f64, OracleError>
    where
        M: Fn(f64) -> (f64, f64),
    {
        let mut f = |this: &mut Self, t: f64| -> Result<f64, OracleError> {
            let (x, jacobian) = map(t);
            let value = this.with_binding(var, x, body)? * jacobian;
            checked(value, "integrand")
        };
        let fa = match f(self, a) {
            Ok(v) if v.is_finite() => v,
            _ => f(self, a + (b - a) * ENDPOINT_NUDGE)?,
        };
        let fb = match f(self, b) {
            Ok(v) if v.is_finite() => v,
            _ => f(self, b - (b - a) * ENDPOINT_NUDGE)?,
        };
        let m = 0.5 * (a + b);
        let fm = f(self, m)?;
        let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);
        let depth = self.config.quadrature_depth;
        let value = self.simpson(&mut f, [a, m, b], [fa, fm, fb], whole, QUADRATURE_EPS, depth)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(undefined("integral does not converge"))
        }
    }

    fn simpson<F>(
        &mut self,
        f: &mut F,
        [a, m, b]: [f64; 3],
        [fa, fm, fb]: [f64; 3],
        whole: f64,
        eps: f64,
        depth: u32,
    ) -> Result<f64, OracleError>
    where
        F: FnMut(&mut Self, f64) -> Result<f64, OracleError>,
    {
        let lm = 0.5 * (a + m);
        let rm = 0.5 * (m + b);
        let flm = f(self, lm)?;
        let frm = f(self, rm)?;
        let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);
        let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);
        let delta = left + right - whole;
        self.budget = self.budget.saturating_sub(2);
        if depth == 0 || self.budget == 0 || delta.abs() <= 15.0 * eps {
            return Ok(left + right + delta / 15.0);
        }
        let lhs = self.simpson(f, [a, lm, m], [fa, flm, fm], left, eps / 2.0, depth - 1)?;
        let rhs = self.simpson(f, [m, rm, b], [fm, frm, fb], right, eps / 2.0, depth - 1)?;
        Ok(lhs + rhs)
    }

    fn index_bounds(&mut self, range: &Range) -> Result<(f64, f64), OracleError> {
        let lower = self.eval(&range.lower)?;
        let upper = self.eval(&range.upper)?;
        if !lower.is_finite() || lower.fract() != 0.0 {
            return Err(algebra_error(
                "summation-bounds",
                format!("lower bound {lower} of '{}' is not an integer", range.var),
            ));
        }
        Ok((lower, upper))
    }

    fn series(&mut self, body: &Expr, range: &Range) -> Result<f64, OracleError> {
        let (lower, upper) = self.index_bounds(range)?;
        if upper.is_finite() {
            if upper < lower {
                return Ok(-self.finite_series(body, &range.var, upper + 1.0, lower - 1.0)?);
            }
            return self.finite_series(body, &range.var, lower, upper);
        }
        if upper < 0.0 {
            return Err(undefined("summation to -oo"));
        }
        let head = SERIES_HEAD.min(self.config.max_sum_terms) as f64;
        let mut total = 0.0;
        let mut terms = (0.0, 0.0);
        let mut k = lower;
        while k < lower + head {
            let term = self.with_binding(&range.var, k, body)?;
            total += term;
            terms = (terms.1, term);
            k += 1.0;
        }
        if terms.1 == 0.0 {
            return Ok(total);
        }
        if terms.0.signum() != terms.1.signum() {
            // alternating tail: average the last two partial sums
            return Ok(total - 0.5 * terms.1);
        }
        match self.integral(body, &range.var, k - 0.5, f64::INFINITY) {
            Ok(tail) if tail.is_finite() && tail.abs() <= terms.1.abs() * head * 10.0 => {
                Ok(total + tail)
            }
            _ => Err(undefined("series does not converge")),
        }
    }

    fn finite_series(&mut self, body: &Expr, var: &str, lower: f64, upper: f64) -> Result<f64, OracleError> {
        let count = upper - lower + 1.0;
        if count > self.config.max_sum_terms as f64 {
            return Err(algebra_error(
                "summation-limit",
                format!("sum over {count} terms exceeds the term limit"),
            ));
        }
        let mut total = 0.0;
        let mut k = lower;
        while k <= upper {
            total += self.with_binding(var, k, body)?;
            k += 1.0;
        }
        Ok(total)
    }

    fn product(&mut self, body: &Expr, range: &Range) -> Result<f64, OracleError> {
        let (lower, upper) = self.index_bounds(range)?;
        if !upper.is_finite() {
            return Err(algebra_error(
                "product-bounds",
                "cannot evaluate an infinite product numerically",
            ));
        }
        if upper < lower {
            let inner = self.product(
                body,
                &Range {
                    var: range.var.clone(),
                    lower: Expr::float(upper + 1.0),
                    upper: Expr::float(lower - 1.0),
                },
            )?;
            return Ok(1.0 / inner);
        }
        if upper - lower + 1.0 > self.config.max_sum_terms as f64 {
            return Err(algebra_error("summation-limit", "product exceeds the term limit"));
        }
        let mut total = 1.0;
        let mut k = lower;
        while k <= upper {
            total *= self.with_binding(&range.var, k, body)?;
            k += 1.0;
        }
        Ok(total)
    }

    fn limit(
        &mut self,
        body: &Expr,
        var: &str,
        point: &Expr,
        dir: Direction,
        rel: f64,
    ) -> Result<f64, OracleError> {
        let target = self.eval(point)?;
        let sides: &[f64] = match dir {
            Direction::Plus => &[1.0],
            Direction::Minus => &[-1.0],
            Direction::Both => &[1.0, -1.0],
        };
        let mut estimates = Vec::new();
        for side in sides {
            estimates.push(self.one_sided(body, var, target, *side, rel)?);
        }
        let first = estimates[0];
        for other in &estimates[1..] {
            if !agree(first, *other, 1.0e-6) {
                return Err(undefined(format!(
                    "limit of {body} at {var} = {point} does not exist"
                )));
            }
        }
        Ok(first)
    }

    fn one_sided(
        &mut self,
        body: &Expr,
        var: &str,
        target: f64,
        side: f64,
        rel: f64,
    ) -> Result<f64, OracleError> {
        let mut samples = Vec::new();
        for k in 3..=8 {
            let step = 10f64.powi(-k);
            let x = if target.is_infinite() {
                target.signum() * 10f64.powi(k)
            } else {
                target + side * step
            };
            samples.push(self.with_binding(var, x, body)?);
        }
        let n = samples.len();
        let (first, before, prev, last) = (samples[0], samples[n - 3], samples[n - 2], samples[n - 1]);
        let steps: Vec<f64> = samples.windows(2).map(|w| w[1] - w[0]).collect();
        let tail = &steps[steps.len() - 3..];
        let diverging = tail
            .iter()
            .all(|d| *d != 0.0 && d.signum() == tail[2].signum())
            && tail.windows(2).all(|w| w[1].abs() >= 0.5 * w[0].abs())
            && (last - first).abs() > 1.0e-3 * last.abs().max(1.0);
        if diverging {
            return Ok(tail[2].signum() * f64::INFINITY);
        }
        if !agree(before, prev, rel) || !agree(prev, last, rel) {
            return Err(undefined(format!("limit of {body} does not converge")));
        }
        Ok(last + (last - prev) / 9.0)
    }
}

fn agree(a: f64, b: f64, rel: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= rel * a.abs().max(b.abs()).max(1.0)
}

fn power(base: f64, exp: f64) -> Result<f64, OracleError> {
    if base == 0.0 && exp < 0.0 {
        return Err(algebra_error("division-by-zero", "division by zero"));
    }
    if exp.fract() == 0.0 && exp.abs() < i32::MAX as f64 {
        return Ok(base.powi(exp as i32));
    }
    if base < 0.0 {
        return Err(complex_result());
    }
    Ok(base.powf(exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Rational;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn gamma_matches_factorials() {
        assert!((gamma(5.0) - 24.0).abs() < 1e-9);
        assert!((gamma(0.5) - PI.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn free_symbols_cannot_be_evaluated() {
        let err = evaluate(&Expr::symbol("x"), &cfg()).unwrap_err();
        assert!(err.message().contains("cannot convert expression to float"));
    }

    #[test]
    fn imaginary_unit_is_rejected() {
        assert!(evaluate(&Expr::Constant(Constant::I), &cfg()).is_err());
    }

    #[test]
    fn definite_integral_by_quadrature() {
        let expr = Expr::Integral {
            integrand: Box::new(Expr::pow(Expr::symbol("x"), Expr::int(2))),
            var: "x".into(),
            bounds: Some(Box::new((Expr::int(0), Expr::int(1)))),
        };
        let value = evaluate(&expr, &cfg()).unwrap();
        assert!((value - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn improper_integral_of_gaussian() {
        let x = Expr::symbol("x");
        let integrand = Expr::apply(Func::Exp, Expr::neg(Expr::pow(x, Expr::int(2))));
        let expr = Expr::Integral {
            integrand: Box::new(integrand),
            var: "x".into(),
            bounds: Some(Box::new((
                Expr::neg(Expr::Constant(Constant::Infinity)),
                Expr::Constant(Constant::Infinity),
            ))),
        };
        let value = evaluate(&expr, &cfg()).unwrap();
        assert!((value - PI.sqrt()).abs() < 1e-8);
    }

    #[test]
    fn basel_series_converges() {
        let k = Expr::symbol("k");
        let expr = Expr::Sum {
            body: Box::new(Expr::pow(k, Expr::int(-2))),
            range: Box::new(Range {
                var: "k".into(),
                lower: Expr::int(1),
                upper: Expr::Constant(Constant::Infinity),
            }),
        };
        let value = evaluate(&expr, &cfg()).unwrap();
        assert!((value - PI * PI / 6.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_limit_of_sinc() {
        let x = Expr::symbol("x");
        let body = Expr::div(Expr::apply(Func::Sin, x.clone()), x);
        let value = limit(&body, "x", &Expr::int(0), Direction::Both, &cfg()).unwrap();
        assert!((value - 1.0).abs() < 1e-8);
    }

    #[test]
    fn oscillating_limits_do_not_settle() {
        let x = Expr::symbol("x");
        let body = Expr::mul(x.clone(), Expr::apply(Func::Sin, Expr::recip(x)));
        assert!(limit(&body, "x", &Expr::int(0), Direction::Plus, &cfg()).is_ok());
        let err = settled_limit(&body, "x", &Expr::int(0), Direction::Plus, &cfg()).unwrap_err();
        assert_eq!(err.info().code, "undefined");
    }

    #[test]
    fn log_of_zero_fails() {
        let expr = Expr::apply(Func::Log, Expr::rational(Rational::zero()));
        assert!(evaluate(&expr, &cfg()).is_err());
    }
}
