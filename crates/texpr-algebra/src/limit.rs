//! Symbolic limits with a numeric last resort.

use texpr_core::OracleError;

use crate::calculus;
use crate::canonical;
use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Constant, Direction, Expr, Func};
use crate::numeric;

#[derive(Debug, Clone)]
enum Extended {
    Finite(Expr),
    Infinite(i8),
}

fn signed_infinity(sign: i8) -> Expr {
    if sign < 0 {
        Expr::neg(Expr::Constant(Constant::Infinity))
    } else {
        Expr::Constant(Constant::Infinity)
    }
}

/// Limit of `expr` as `var` approaches `point` from `dir`.
///
/// Tries, in order: the extended-real value at an infinite point, the
/// substitution `var = ±1/t`, direct substitution, L'Hôpital on 0/0
/// quotients, `exp(g*log f)` for variable exponents, and finally a numeric
/// estimate. A numeric estimate is returned as a float, and only once its
/// samples have settled; a limit that is still moving is `limit-unresolved`.
pub fn limit(
    expr: &Expr,
    var: &str,
    point: &Expr,
    dir: Direction,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    let body = canonical::simplify(expr, config)?;
    if !body.depends_on(var) {
        return Ok(body);
    }
    let point = canonical::simplify(point, config)?;
    if let Some(sign) = point.infinity_sign() {
        if let Some(value) = at_infinity(&body, var, sign, config) {
            return Ok(value);
        }
        let t = fresh_symbol(&body);
        let replacement = Expr::div(Expr::int(i128::from(sign)), Expr::symbol(&t));
        let transformed = canonical::simplify(&body.substitute(var, &replacement), config)?;
        return finite_limit(&transformed, &t, &Expr::int(0), Direction::Plus, config);
    }
    finite_limit(&body, var, &point, dir, config)
}

fn fresh_symbol(body: &Expr) -> String {
    let taken = body.free_symbols();
    let mut name = String::from("_t");
    while taken.contains(&name) {
        name.push('_');
    }
    name
}

fn has_jumps(expr: &Expr) -> bool {
    match expr {
        Expr::Apply(Func::Floor | Func::Ceiling, _) => true,
        Expr::Apply(_, args) => args.iter().any(has_jumps),
        Expr::Add(items) | Expr::Mul(items) => items.iter().any(has_jumps),
        Expr::Pow(base, exp) => has_jumps(base) || has_jumps(exp),
        _ => false,
    }
}

/// Value after substitution when it is finite and closed.
fn direct(expr: &Expr, var: &str, point: &Expr, config: &EngineConfig) -> Option<Expr> {
    let value = canonical::simplify(&expr.substitute(var, point), config).ok()?;
    if value.depends_on(var) || value.contains_infinity() {
        return None;
    }
    Some(value)
}

fn finite_limit(
    body: &Expr,
    var: &str,
    point: &Expr,
    dir: Direction,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    if !has_jumps(body) {
        if let Some(value) = direct(body, var, point, config) {
            return Ok(value);
        }
    }
    if let Expr::Pow(base, exp) = body {
        if exp.depends_on(var) {
            let logarithm = Expr::mul((**exp).clone(), Expr::apply(Func::Log, (**base).clone()));
            if let Ok(inner) = finite_limit(&logarithm, var, point, dir, config) {
                return match inner.infinity_sign() {
                    Some(1) => Ok(Expr::Constant(Constant::Infinity)),
                    Some(_) => Ok(Expr::int(0)),
                    None => canonical::simplify(&Expr::apply(Func::Exp, inner), config),
                };
            }
        }
    }
    let (mut num, mut den) = canonical::fraction(body, config)?;
    for _ in 0..config.limit_iterations {
        let (Some(n), Some(d)) = (direct(&num, var, point, config), direct(&den, var, point, config))
        else {
            break;
        };
        if !d.is_zero_literal() {
            return canonical::simplify(&Expr::div(n, d), config);
        }
        if !n.is_zero_literal() {
            return numeric_limit(body, var, point, dir, config);
        }
        num = calculus::derivative(&num, var, 1, config)?;
        den = calculus::derivative(&den, var, 1, config)?;
    }
    numeric_limit(body, var, point, dir, config)
}

fn numeric_limit(
    body: &Expr,
    var: &str,
    point: &Expr,
    dir: Direction,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    let value = numeric::settled_limit(body, var, point, dir, config).map_err(|_| {
        algebra_error(
            "limit-unresolved",
            format!("limit of {body} as {var} -> {point} has no closed form"),
        )
    })?;
    if value.is_infinite() {
        return Ok(signed_infinity(if value > 0.0 { 1 } else { -1 }));
    }
    Ok(Expr::float(value))
}

fn at_infinity(body: &Expr, var: &str, sign: i8, config: &EngineConfig) -> Option<Expr> {
    match extend(body, var, sign, config)? {
        Extended::Finite(value) => canonical::simplify(&value, config).ok(),
        Extended::Infinite(s) => Some(signed_infinity(s)),
    }
}

fn numeric_value(expr: &Expr, config: &EngineConfig) -> Option<f64> {
    numeric::evaluate(expr, config).ok().filter(|v| v.is_finite())
}

/// Extended-real value of `expr` with `var` set to `sign * oo`.
fn extend(expr: &Expr, var: &str, sign: i8, config: &EngineConfig) -> Option<Extended> {
    if !expr.depends_on(var) {
        return match expr.infinity_sign() {
            Some(s) => Some(Extended::Infinite(s)),
            None if expr.contains_infinity() => None,
            None => Some(Extended::Finite(expr.clone())),
        };
    }
    match expr {
        Expr::Symbol(_) => Some(Extended::Infinite(sign)),
        Expr::Add(terms) => {
            let mut finite = Vec::new();
            let mut infinite: Option<i8> = None;
            for term in terms {
                match extend(term, var, sign, config)? {
                    Extended::Finite(e) => finite.push(e),
                    Extended::Infinite(s) => match infinite {
                        Some(previous) if previous != s => return None,
                        _ => infinite = Some(s),
                    },
                }
            }
            Some(match infinite {
                Some(s) => Extended::Infinite(s),
                None => Extended::Finite(Expr::Add(finite)),
            })
        }
        Expr::Mul(factors) => {
            let mut finite = Vec::new();
            let mut product_sign = 1i8;
            let mut infinite = false;
            for factor in factors {
                match extend(factor, var, sign, config)? {
                    Extended::Finite(e) => finite.push(e),
                    Extended::Infinite(s) => {
                        infinite = true;
                        product_sign *= s;
                    }
                }
            }
            if !infinite {
                return Some(Extended::Finite(Expr::Mul(finite)));
            }
            let scale = numeric_value(&Expr::Mul(finite), config)?;
            if scale == 0.0 {
                return None;
            }
            Some(Extended::Infinite(if scale > 0.0 {
                product_sign
            } else {
                -product_sign
            }))
        }
        Expr::Pow(base, exp) => {
            match (extend(base, var, sign, config)?, extend(exp, var, sign, config)?) {
                (Extended::Finite(b), Extended::Finite(e)) => Some(Extended::Finite(Expr::pow(b, e))),
                (Extended::Infinite(s), Extended::Finite(e)) => {
                    let r = numeric_value(&e, config)?;
                    if r < 0.0 {
                        Some(Extended::Finite(Expr::int(0)))
                    } else if r == 0.0 {
                        None
                    } else if s > 0 {
                        Some(Extended::Infinite(1))
                    } else if r.fract() == 0.0 {
                        Some(Extended::Infinite(if (r as i64) % 2 == 0 { 1 } else { -1 }))
                    } else {
                        None
                    }
                }
                (Extended::Finite(b), Extended::Infinite(s)) => {
                    let v = numeric_value(&b, config)?;
                    if v <= 0.0 || v == 1.0 {
                        return None;
                    }
                    Some(if (v > 1.0) == (s > 0) {
                        Extended::Infinite(1)
                    } else {
                        Extended::Finite(Expr::int(0))
                    })
                }
                (Extended::Infinite(_), Extended::Infinite(_)) => None,
            }
        }
        Expr::Apply(func, args) if args.len() == 1 => match extend(&args[0], var, sign, config)? {
            Extended::Finite(u) => Some(Extended::Finite(Expr::apply(*func, u))),
            Extended::Infinite(s) => match (func, s) {
                (Func::Exp, 1) | (Func::Log, 1) | (Func::Cosh, _) | (Func::Abs, _) => {
                    Some(Extended::Infinite(1))
                }
                (Func::Factorial, 1) => Some(Extended::Infinite(1)),
                (Func::Exp, _) => Some(Extended::Finite(Expr::int(0))),
                (Func::Sinh, s) => Some(Extended::Infinite(s)),
                (Func::Tanh, s) => Some(Extended::Finite(Expr::int(i128::from(s)))),
                (Func::Atan, s) => Some(Extended::Finite(Expr::Mul(vec![
                    Expr::int(i128::from(s)),
                    Expr::pow(Expr::int(2), Expr::int(-1)),
                    Expr::Constant(Constant::Pi),
                ]))),
                _ => None,
            },
        },
        _ => None,
    }
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

    fn lim(expr: &Expr, point: Expr) -> String {
        limit(expr, "x", &point, Direction::Plus, &cfg())
            .unwrap()
            .to_string()
    }

    #[test]
    fn sinc_at_zero_uses_lhopital() {
        let f = Expr::div(Expr::apply(Func::Sin, x()), x());
        assert_eq!(lim(&f, Expr::int(0)), "1");
    }

    #[test]
    fn second_order_quotient() {
        let f = Expr::div(
            Expr::sub(Expr::int(1), Expr::apply(Func::Cos, x())),
            Expr::pow(x(), Expr::int(2)),
        );
        assert_eq!(lim(&f, Expr::int(0)), "1/2");
    }

    #[test]
    fn reciprocal_vanishes_at_infinity() {
        let f = Expr::recip(x());
        assert_eq!(lim(&f, Expr::Constant(Constant::Infinity)), "0");
    }

    #[test]
    fn compound_interest_limit_is_e() {
        let f = Expr::pow(Expr::add(Expr::int(1), Expr::recip(x())), x());
        assert_eq!(lim(&f, Expr::Constant(Constant::Infinity)), "E");
    }

    #[test]
    fn one_sided_pole_is_infinite() {
        let f = Expr::recip(x());
        assert_eq!(lim(&f, Expr::int(0)), "oo");
        let both = limit(&f, "x", &Expr::int(0), Direction::Both, &cfg());
        assert!(both.is_err());
    }

    #[test]
    fn unsettled_numeric_estimates_are_not_values() {
        let f = Expr::mul(x(), Expr::apply(Func::Sin, Expr::recip(x())));
        let err = limit(&f, "x", &Expr::int(0), Direction::Plus, &cfg()).unwrap_err();
        assert_eq!(err.info().code, "limit-unresolved");
    }

    #[test]
    fn rational_function_at_infinity() {
        let f = Expr::div(
            Expr::add(Expr::mul(Expr::int(3), Expr::pow(x(), Expr::int(2))), x()),
            Expr::add(Expr::pow(x(), Expr::int(2)), Expr::int(5)),
        );
        assert_eq!(lim(&f, Expr::Constant(Constant::Infinity)), "3");
    }
}
