//! Differentiation and antiderivatives.

use texpr_core::OracleError;

use crate::canonical::{self, Term};
use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Constant, Direction, Expr, Func, Range};
use crate::limit;
use crate::number::{Number, Rational};

const MAX_PARTS_DEGREE: i128 = 12;
const SINGULARITY_PROBES: usize = 64;

fn not_differentiable(what: impl std::fmt::Display) -> OracleError {
    algebra_error("derivative", format!("cannot differentiate {what}"))
}

/// Derivative of `expr` with respect to `var`, not yet simplified.
pub fn diff(expr: &Expr, var: &str) -> Result<Expr, OracleError> {
    if !expr.depends_on(var) {
        return Ok(Expr::int(0));
    }
    Ok(match expr {
        Expr::Number(_) | Expr::Constant(_) => Expr::int(0),
        Expr::Symbol(name) => Expr::int(if name == var { 1 } else { 0 }),
        Expr::Add(terms) => Expr::Add(
            terms
                .iter()
                .map(|term| diff(term, var))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Mul(factors) => {
            let mut terms = Vec::new();
            for (i, factor) in factors.iter().enumerate() {
                if !factor.depends_on(var) {
                    continue;
                }
                let mut product = factors.clone();
                product[i] = diff(factor, var)?;
                terms.push(Expr::Mul(product));
            }
            Expr::Add(terms)
        }
        Expr::Pow(base, exp) => diff_pow(base, exp, var)?,
        Expr::Apply(func, args) => diff_apply(*func, args, var)?,
        Expr::Integral {
            integrand,
            var: bound,
            bounds,
        } => match bounds {
            None if bound == var => (**integrand).clone(),
            None => Expr::Integral {
                integrand: Box::new(diff(integrand, var)?),
                var: bound.clone(),
                bounds: None,
            },
            Some(b) => {
                let (lower, upper) = (&b.0, &b.1);
                let at_upper = integrand.substitute(bound, upper);
                let at_lower = integrand.substitute(bound, lower);
                let mut terms = vec![
                    Expr::mul(at_upper, diff(upper, var)?),
                    Expr::neg(Expr::mul(at_lower, diff(lower, var)?)),
                ];
                if integrand.depends_on(var) {
                    terms.push(Expr::Integral {
                        integrand: Box::new(diff(integrand, var)?),
                        var: bound.clone(),
                        bounds: bounds.clone(),
                    });
                }
                Expr::Add(terms)
            }
        },
        Expr::Sum { body, range } => {
            if range.lower.depends_on(var) || range.upper.depends_on(var) {
                return Err(not_differentiable("a sum with variable bounds"));
            }
            Expr::Sum {
                body: Box::new(diff(body, var)?),
                range: range.clone(),
            }
        }
        Expr::Product { .. } => return Err(not_differentiable("an unevaluated product")),
        Expr::Limit { .. } => return Err(not_differentiable("an unevaluated limit")),
    })
}

fn diff_pow(base: &Expr, exp: &Expr, var: &str) -> Result<Expr, OracleError> {
    let power = Expr::pow(base.clone(), exp.clone());
    if !exp.depends_on(var) {
        let lowered = Expr::pow(base.clone(), Expr::sub(exp.clone(), Expr::int(1)));
        return Ok(Expr::Mul(vec![exp.clone(), lowered, diff(base, var)?]));
    }
    let log_base = match base {
        Expr::Constant(Constant::E) => Expr::int(1),
        other => Expr::apply(Func::Log, other.clone()),
    };
    if !base.depends_on(var) {
        return Ok(Expr::Mul(vec![power, log_base, diff(exp, var)?]));
    }
    let inner = Expr::add(
        Expr::mul(diff(exp, var)?, log_base),
        Expr::Mul(vec![exp.clone(), diff(base, var)?, Expr::recip(base.clone())]),
    );
    Ok(Expr::mul(power, inner))
}

fn diff_apply(func: Func, args: &[Expr], var: &str) -> Result<Expr, OracleError> {
    let call = Expr::Apply(func, args.to_vec());
    let u = match args {
        [u] => u.clone(),
        _ => return Err(not_differentiable(&call)),
    };
    let one = || Expr::int(1);
    let square = |e: Expr| Expr::pow(e, Expr::int(2));
    let outer = match func {
        Func::Sin => Expr::apply(Func::Cos, u.clone()),
        Func::Cos => Expr::neg(Expr::apply(Func::Sin, u.clone())),
        Func::Tan => Expr::add(one(), square(call.clone())),
        Func::Sinh => Expr::apply(Func::Cosh, u.clone()),
        Func::Cosh => Expr::apply(Func::Sinh, u.clone()),
        Func::Tanh => Expr::sub(one(), square(call.clone())),
        Func::Asin => Expr::recip(Expr::pow(
            Expr::sub(one(), square(u.clone())),
            Expr::rational(half()),
        )),
        Func::Acos => Expr::neg(Expr::recip(Expr::pow(
            Expr::sub(one(), square(u.clone())),
            Expr::rational(half()),
        ))),
        Func::Atan => Expr::recip(Expr::add(one(), square(u.clone()))),
        Func::Log => Expr::recip(u.clone()),
        Func::Exp => call.clone(),
        Func::Abs => Expr::div(u.clone(), call.clone()),
        Func::Factorial | Func::Binomial | Func::Floor | Func::Ceiling => {
            return Err(not_differentiable(&call))
        }
    };
    Ok(Expr::mul(outer, diff(&u, var)?))
}

fn half() -> Rational {
    Rational::new(1, 2).unwrap_or_else(Rational::one)
}

/// `u = a*var + b` with `a` nonzero and free of `var`.
fn linear_coefficients(
    u: &Expr,
    var: &str,
    config: &EngineConfig,
) -> Result<Option<(Expr, Expr)>, OracleError> {
    let slope = canonical::simplify(&diff(u, var)?, config)?;
    if slope.depends_on(var) || slope.is_zero_literal() {
        return Ok(None);
    }
    let offset = canonical::simplify(&u.substitute(var, &Expr::int(0)), config)?;
    Ok(Some((slope, offset)))
}

/// Antiderivative of `expr` in `var`, or `None` when no rule applies.
pub fn antiderivative(
    expr: &Expr,
    var: &str,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    let (terms, den) = canonical::expand(expr, config)?;
    if den.depends_on(var) {
        let numerator = Expr::Add(terms.iter().map(Term::to_expr).collect());
        if numerator.depends_on(var) {
            return Ok(None);
        }
        if let Some((slope, _)) = linear_coefficients(&den, var, config)? {
            return Ok(Some(Expr::Mul(vec![
                numerator,
                Expr::recip(slope),
                Expr::apply(Func::Log, den),
            ])));
        }
        return Ok(arctangent(&den, var, config)?.map(|value| Expr::mul(numerator, value)));
    }
    let mut parts = Vec::with_capacity(terms.len());
    for term in &terms {
        match integrate_term(term, var, config)? {
            Some(part) => parts.push(part),
            None => return Ok(None),
        }
    }
    Ok(Some(Expr::div(Expr::Add(parts), den)))
}

fn integrate_term(term: &Term, var: &str, config: &EngineConfig) -> Result<Option<Expr>, OracleError> {
    let mut constant = vec![Expr::Number(term.coef.clone())];
    let mut dependent = Vec::new();
    for (base, exp) in &term.factors {
        if base.depends_on(var) {
            dependent.push((base, exp));
        } else {
            constant.push(Expr::pow(base.clone(), Expr::rational(exp.clone())));
        }
    }
    let coefficient = Expr::Mul(constant);
    let x = Expr::symbol(var);
    let integrated = match dependent.as_slice() {
        [] => Some(x),
        [(base, exp)] => integrate_factor(base, exp, var, config)?,
        [(a, ea), (b, eb)] => match parts_split((*a, *ea), (*b, *eb), var) {
            Some((degree, other)) => integrate_by_parts(degree, other, var, config)?,
            None => None,
        },
        _ => None,
    };
    Ok(integrated.map(|value| Expr::mul(coefficient, value)))
}

fn integrate_factor(
    base: &Expr,
    exp: &Rational,
    var: &str,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    match base {
        Expr::Symbol(name) if name == var => Ok(Some(power_rule(base.clone(), exp, Expr::int(1)))),
        Expr::Apply(func, args) if exp.is_one() && args.len() == 1 => {
            integrate_function(*func, &args[0], var, config)
        }
        Expr::Pow(b, e) if exp.is_one() && !b.depends_on(var) => {
            let log_base = Expr::apply(Func::Log, (**b).clone());
            Ok(linear_coefficients(e, var, config)?
                .map(|(slope, _)| Expr::div(base.clone(), Expr::mul(slope, log_base))))
        }
        Expr::Add(_) => Ok(linear_coefficients(base, var, config)?
            .map(|(slope, _)| power_rule(base.clone(), exp, slope))),
        _ => Ok(None),
    }
}

/// `u**(e+1) / ((e+1) * a)`, or `log(u) / a` for `e = -1`.
fn power_rule(u: Expr, exp: &Rational, slope: Expr) -> Expr {
    let raised = exp.add(&Rational::one());
    if raised.is_zero() {
        return Expr::div(Expr::apply(Func::Log, u), slope);
    }
    Expr::div(
        Expr::pow(u, Expr::rational(raised.clone())),
        Expr::mul(Expr::rational(raised), slope),
    )
}

/// `1 / (p*x**2 + c)` with positive constants integrates to an arctangent.
fn arctangent(den: &Expr, var: &str, config: &EngineConfig) -> Result<Option<Expr>, OracleError> {
    let first = canonical::simplify(&diff(den, var)?, config)?;
    let second = canonical::simplify(&diff(&first, var)?, config)?;
    let slope_at_zero = canonical::simplify(&first.substitute(var, &Expr::int(0)), config)?;
    if second.depends_on(var) || !slope_at_zero.is_zero_literal() {
        return Ok(None);
    }
    let p = canonical::simplify(&Expr::div(second, Expr::int(2)), config)?;
    let c = canonical::simplify(&den.substitute(var, &Expr::int(0)), config)?;
    let positive = |e: &Expr| {
        crate::numeric::evaluate(e, config)
            .map(|v| v > 0.0)
            .unwrap_or(false)
    };
    if !positive(&p) || !positive(&c) {
        return Ok(None);
    }
    let half_power = |e: Expr| Expr::pow(e, Expr::rational(half()));
    let scale = half_power(Expr::div(p.clone(), c.clone()));
    let norm = half_power(Expr::mul(p, c));
    Ok(Some(Expr::div(
        Expr::apply(Func::Atan, Expr::mul(scale, Expr::symbol(var))),
        norm,
    )))
}

fn integrate_function(
    func: Func,
    u: &Expr,
    var: &str,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    let Some((slope, _)) = linear_coefficients(u, var, config)? else {
        return Ok(None);
    };
    let apply = |f: Func| Expr::apply(f, u.clone());
    let primitive = match func {
        Func::Sin => Expr::neg(apply(Func::Cos)),
        Func::Cos => apply(Func::Sin),
        Func::Exp => apply(Func::Exp),
        Func::Sinh => apply(Func::Cosh),
        Func::Cosh => apply(Func::Sinh),
        Func::Tan => Expr::neg(Expr::apply(Func::Log, apply(Func::Cos))),
        Func::Tanh => Expr::apply(Func::Log, apply(Func::Cosh)),
        Func::Log => Expr::sub(Expr::mul(u.clone(), apply(Func::Log)), u.clone()),
        _ => return Ok(None),
    };
    Ok(Some(Expr::div(primitive, slope)))
}

/// Splits `x**n * g(x)` with `n` a small positive integer and `g` one of the
/// functions whose repeated antiderivatives stay closed.
fn parts_split<'a>(
    a: (&'a Expr, &Rational),
    b: (&'a Expr, &Rational),
    var: &str,
) -> Option<(i128, &'a Expr)> {
    let is_var = |e: &Expr| matches!(e, Expr::Symbol(name) if name == var);
    let cyclic = |e: &Expr, exp: &Rational| {
        exp.is_one()
            && matches!(
                e,
                Expr::Apply(Func::Sin | Func::Cos | Func::Exp | Func::Sinh | Func::Cosh, _)
            )
    };
    let (power, other) = if is_var(a.0) && cyclic(b.0, b.1) {
        (a.1, b.0)
    } else if is_var(b.0) && cyclic(a.0, a.1) {
        (b.1, a.0)
    } else {
        return None;
    };
    let degree = power.to_i128()?;
    (1..=MAX_PARTS_DEGREE).contains(&degree).then_some((degree, other))
}

/// `∫ x**n g = x**n G - n ∫ x**(n-1) G`.
fn integrate_by_parts(
    degree: i128,
    g: &Expr,
    var: &str,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    let Some(primitive) = antiderivative(g, var, config)? else {
        return Ok(None);
    };
    let x = Expr::symbol(var);
    let lowered = Expr::mul(
        Expr::pow(x.clone(), Expr::int(degree - 1)),
        primitive.clone(),
    );
    let Some(rest) = antiderivative(&lowered, var, config)? else {
        return Ok(None);
    };
    Ok(Some(Expr::sub(
        Expr::mul(Expr::pow(x, Expr::int(degree)), primitive),
        Expr::mul(Expr::int(degree), rest),
    )))
}

/// Eager `integrate(f, var)` or `integrate(f, (var, a, b))`.
///
/// Falls back to the unevaluated [`Expr::Integral`] whenever no closed form
/// is found or the fundamental theorem does not apply.
pub fn integrate(
    integrand: &Expr,
    var: &str,
    bounds: Option<(&Expr, &Expr)>,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    let deferred = || Expr::Integral {
        integrand: Box::new(integrand.clone()),
        var: var.to_string(),
        bounds: bounds.map(|(a, b)| Box::new((a.clone(), b.clone()))),
    };
    let Some(primitive) = antiderivative(integrand, var, config)? else {
        return Ok(deferred());
    };
    let Some((lower, upper)) = bounds else {
        return canonical::simplify(&primitive, config);
    };
    if has_interior_singularity(integrand, var, lower, upper, config) {
        return Ok(deferred());
    }
    let at = |bound: &Expr| -> Result<Option<Expr>, OracleError> {
        match bound.infinity_sign() {
            Some(_) => {
                let dir = if bound.infinity_sign() == Some(1) {
                    Direction::Minus
                } else {
                    Direction::Plus
                };
                match limit::limit(&primitive, var, bound, dir, config) {
                    Ok(value) if value.infinity_sign().is_none() => Ok(Some(value)),
                    _ => Ok(None),
                }
            }
            None => Ok(Some(primitive.substitute(var, bound))),
        }
    };
    match (at(upper)?, at(lower)?) {
        (Some(hi), Some(lo)) => match canonical::simplify(&Expr::sub(hi, lo), config) {
            Ok(value) => Ok(value),
            Err(_) => Ok(deferred()),
        },
        _ => Ok(deferred()),
    }
}

/// Probes the open interval for points where the integrand is not finite.
fn has_interior_singularity(
    integrand: &Expr,
    var: &str,
    lower: &Expr,
    upper: &Expr,
    config: &EngineConfig,
) -> bool {
    let (Ok(a), Ok(b)) = (
        crate::numeric::evaluate(lower, config),
        crate::numeric::evaluate(upper, config),
    ) else {
        return false;
    };
    if !a.is_finite() || !b.is_finite() || !integrand.free_symbols().iter().all(|s| s == var) {
        return false;
    }
    (1..SINGULARITY_PROBES).any(|i| {
        let t = i as f64 / SINGULARITY_PROBES as f64;
        let point = Expr::float(a + (b - a) * t);
        match crate::numeric::evaluate(&integrand.substitute(var, &point), config) {
            Ok(v) => !v.is_finite(),
            Err(_) => true,
        }
    }) || zero_denominator_inside(integrand, var, a, b, config)
}

fn zero_denominator_inside(integrand: &Expr, var: &str, a: f64, b: f64, config: &EngineConfig) -> bool {
    let Ok((_, den)) = canonical::fraction(integrand, config) else {
        return false;
    };
    if !den.depends_on(var) {
        return false;
    }
    let sample = |x: f64| crate::numeric::evaluate(&den.substitute(var, &Expr::float(x)), config);
    let steps = SINGULARITY_PROBES * 4;
    let mut previous = match sample(a) {
        Ok(v) => v,
        Err(_) => return false,
    };
    for i in 1..=steps {
        let x = a + (b - a) * i as f64 / steps as f64;
        match sample(x) {
            Ok(v) if v == 0.0 && i < steps => return true,
            Ok(v) if v.signum() != previous.signum() && previous != 0.0 && v != 0.0 => return true,
            Ok(v) => previous = v,
            Err(_) => return false,
        }
    }
    false
}

/// Simplified derivative, repeated `order` times.
pub fn derivative(expr: &Expr, var: &str, order: u32, config: &EngineConfig) -> Result<Expr, OracleError> {
    let mut current = expr.clone();
    for _ in 0..order {
        current = canonical::simplify(&diff(&current, var)?, config)?;
    }
    Ok(current)
}

/// Numeric literal helper for bounds given as integers.
pub(crate) fn index_value(expr: &Expr) -> Option<i128> {
    match expr.as_number()? {
        Number::Exact(r) => r.to_i128(),
        _ => None,
    }
}

/// `range` with simplified bounds.
pub(crate) fn simplify_range(range: &Range, config: &EngineConfig) -> Result<Range, OracleError> {
    Ok(Range {
        var: range.var.clone(),
        lower: canonical::simplify(&range.lower, config)?,
        upper: canonical::simplify(&range.upper, config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn same(a: &Expr, b: &Expr) -> bool {
        canonical::is_zero(&Expr::sub(a.clone(), b.clone()), &cfg()).unwrap()
    }

    #[test]
    fn derivative_of_polynomial() {
        let f = Expr::pow(x(), Expr::int(3));
        let d = derivative(&f, "x", 1, &cfg()).unwrap();
        assert!(same(&d, &Expr::mul(Expr::int(3), Expr::pow(x(), Expr::int(2)))));
    }

    #[test]
    fn chain_rule_through_sine() {
        let f = Expr::apply(Func::Sin, Expr::pow(x(), Expr::int(2)));
        let d = derivative(&f, "x", 1, &cfg()).unwrap();
        let expected = Expr::Mul(vec![
            Expr::int(2),
            x(),
            Expr::apply(Func::Cos, Expr::pow(x(), Expr::int(2))),
        ]);
        assert!(same(&d, &expected));
    }

    #[test]
    fn floor_is_not_differentiable() {
        let f = Expr::apply(Func::Floor, x());
        assert!(diff(&f, "x").is_err());
    }

    #[test]
    fn definite_polynomial_integral_is_exact() {
        let f = Expr::pow(x(), Expr::int(2));
        let value = integrate(&f, "x", Some((&Expr::int(0), &Expr::int(1))), &cfg()).unwrap();
        assert_eq!(value.to_string(), "1/3");
    }

    #[test]
    fn reciprocal_integrates_to_log() {
        let f = Expr::recip(x());
        let value = integrate(&f, "x", None, &cfg()).unwrap();
        assert_eq!(value.to_string(), "log(x)");
    }

    #[test]
    fn integration_by_parts_for_x_exp() {
        let f = Expr::mul(x(), Expr::apply(Func::Exp, x()));
        let value = integrate(&f, "x", None, &cfg()).unwrap();
        let expected = Expr::mul(Expr::sub(x(), Expr::int(1)), Expr::apply(Func::Exp, x()));
        assert!(same(&value, &expected));
    }

    #[test]
    fn pole_inside_interval_stays_deferred() {
        let f = Expr::pow(x(), Expr::int(-2));
        let value = integrate(&f, "x", Some((&Expr::int(-1), &Expr::int(1))), &cfg()).unwrap();
        assert!(matches!(value, Expr::Integral { .. }));
    }

    #[test]
    fn improper_integral_through_limits() {
        let f = Expr::apply(Func::Exp, Expr::neg(x()));
        let value = integrate(
            &f,
            "x",
            Some((&Expr::int(0), &Expr::Constant(Constant::Infinity))),
            &cfg(),
        )
        .unwrap();
        assert!(same(&value, &Expr::int(1)));
    }

    #[test]
    fn arctangent_of_shifted_square() {
        let f = Expr::recip(Expr::add(Expr::pow(x(), Expr::int(2)), Expr::int(1)));
        let value = integrate(&f, "x", None, &cfg()).unwrap();
        assert_eq!(value.to_string(), "atan(x)");
    }
}
