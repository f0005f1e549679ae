//! Summation, products, and forcing of deferred operations.

use texpr_core::OracleError;

use crate::calculus::{self, index_value, simplify_range};
use crate::canonical;
use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Constant, Expr, Func, Range};
use crate::limit;
use crate::numeric;

/// Closed forms of `zeta(p)` for the even `p` handled symbolically.
const ZETA_POWERS: [(i128, i128); 3] = [(2, 6), (4, 90), (6, 945)];
const MAX_POLYNOMIAL_DEGREE: usize = 32;

fn too_many_terms(count: i128, config: &EngineConfig) -> OracleError {
    algebra_error(
        "too-many-terms",
        format!(
            "explicit evaluation needs {count} terms, limit is {}",
            config.max_sum_terms
        ),
    )
}

fn check_count(lo: i128, hi: i128, config: &EngineConfig) -> Result<(), OracleError> {
    let count = hi.saturating_sub(lo).saturating_add(1);
    if count > config.max_sum_terms as i128 {
        return Err(too_many_terms(count, config));
    }
    Ok(())
}

fn at_index(body: &Expr, var: &str, k: i128) -> Expr {
    body.substitute(var, &Expr::int(k))
}

/// Evaluates `Sum(body, (var, lower, upper))` as far as a closed form allows.
///
/// Integer bounds are summed explicitly, with reversed bounds following the
/// convention `sum(a..b) = -sum(b+1..a-1)`. Polynomial summands with symbolic
/// bounds are summed by interpolation. Infinite sums try the geometric and
/// even `p`-series closed forms, then a numeric value when the sum is closed.
/// Anything else stays an unevaluated [`Expr::Sum`].
pub fn sum(body: &Expr, range: &Range, config: &EngineConfig) -> Result<Expr, OracleError> {
    let range = simplify_range(range, config)?;
    let body = canonical::simplify(body, config)?;
    let var = range.var.as_str();
    let deferred = || Expr::Sum {
        body: Box::new(body.clone()),
        range: Box::new(range.clone()),
    };

    if let (Some(lo), Some(hi)) = (index_value(&range.lower), index_value(&range.upper)) {
        return explicit_sum(&body, var, lo, hi, config);
    }
    if range.lower.contains_infinity() {
        return Ok(deferred());
    }
    if range.upper.infinity_sign() == Some(1) {
        return Ok(infinite_sum(&body, var, &range, config)?.unwrap_or_else(deferred));
    }
    if range.upper.contains_infinity() {
        return Ok(deferred());
    }
    if !body.depends_on(var) {
        let count = Expr::add(Expr::sub(range.upper.clone(), range.lower.clone()), Expr::int(1));
        return canonical::simplify(&Expr::mul(body.clone(), count), config);
    }
    if canonical::is_polynomial_in(&body, var, config)? {
        if let Some(value) = polynomial_sum(&body, var, &range, config)? {
            return Ok(value);
        }
    }
    Ok(deferred())
}

fn explicit_sum(
    body: &Expr,
    var: &str,
    lo: i128,
    hi: i128,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    if hi < lo.saturating_sub(1) {
        let flipped = explicit_sum(body, var, hi + 1, lo - 1, config)?;
        return canonical::simplify(&Expr::neg(flipped), config);
    }
    check_count(lo, hi, config)?;
    let terms: Vec<Expr> = (lo..=hi).map(|k| at_index(body, var, k)).collect();
    if terms.is_empty() {
        return Ok(Expr::int(0));
    }
    canonical::simplify(&Expr::Add(terms), config)
}

/// Degree of `var` in a polynomial summand.
fn degree_in(body: &Expr, var: &str, config: &EngineConfig) -> Result<Option<usize>, OracleError> {
    let (terms, _) = canonical::expand(body, config)?;
    let target = Expr::symbol(var);
    let mut degree = 0usize;
    for term in &terms {
        for (factor, exp) in &term.factors {
            if *factor != target {
                continue;
            }
            let Some(power) = exp.to_i128().filter(|p| *p >= 0) else {
                return Ok(None);
            };
            degree = degree.max(usize::try_from(power).unwrap_or(usize::MAX));
        }
    }
    Ok((degree <= MAX_POLYNOMIAL_DEGREE).then_some(degree))
}

/// `sum(lower..upper)` of a polynomial as `P(upper) - P(lower - 1)`, where
/// `P(n)` is the partial sum from zero, interpolated through `degree + 2`
/// nodes.
fn polynomial_sum(
    body: &Expr,
    var: &str,
    range: &Range,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    let Some(degree) = degree_in(body, var, config)? else {
        return Ok(None);
    };
    let nodes: Vec<i128> = (0..=degree as i128 + 1).collect();
    let mut values = Vec::with_capacity(nodes.len());
    let mut running = Expr::int(0);
    for &node in &nodes {
        running = canonical::simplify(&Expr::add(running, at_index(body, var, node)), config)?;
        values.push(running.clone());
    }
    let interpolate = |at: &Expr| -> Expr {
        let terms = nodes
            .iter()
            .zip(&values)
            .map(|(&xi, yi)| {
                let mut factors = vec![yi.clone()];
                for &xj in nodes.iter().filter(|&&xj| xj != xi) {
                    factors.push(Expr::sub(at.clone(), Expr::int(xj)));
                    factors.push(Expr::recip(Expr::int(xi - xj)));
                }
                Expr::Mul(factors)
            })
            .collect();
        Expr::Add(terms)
    };
    let before = Expr::sub(range.lower.clone(), Expr::int(1));
    let total = Expr::sub(interpolate(&range.upper), interpolate(&before));
    canonical::simplify(&total, config).map(Some)
}

fn signed_infinity(positive: bool) -> Expr {
    let oo = Expr::Constant(Constant::Infinity);
    if positive {
        oo
    } else {
        Expr::neg(oo)
    }
}

fn infinite_sum(
    body: &Expr,
    var: &str,
    range: &Range,
    config: &EngineConfig,
) -> Result<Option<Expr>, OracleError> {
    let Some(lower) = index_value(&range.lower) else {
        return Ok(None);
    };
    if !body.depends_on(var) {
        if body.is_zero_literal() {
            return Ok(Some(Expr::int(0)));
        }
        return Ok(numeric::evaluate(body, config)
            .ok()
            .map(|v| signed_infinity(v > 0.0)));
    }
    if let Some(value) = geometric(body, var, lower, config)? {
        return Ok(Some(value));
    }
    if let Some(value) = p_series(body, var, lower, config)? {
        return Ok(Some(value));
    }
    if !body.free_symbols().iter().all(|s| s == var) {
        return Ok(None);
    }
    let closed = Expr::Sum {
        body: Box::new(body.clone()),
        range: Box::new(range.clone()),
    };
    match numeric::evaluate(&closed, config) {
        Ok(v) if v.is_finite() => Ok(Some(Expr::float(v))),
        Ok(v) if v.is_infinite() => Ok(Some(signed_infinity(v > 0.0))),
        _ => Ok(None),
    }
}

fn geometric(body: &Expr, var: &str, lower: i128, config: &EngineConfig) -> Result<Option<Expr>, OracleError> {
    let next = body.substitute(var, &Expr::add(Expr::symbol(var), Expr::int(1)));
    let Ok(ratio) = canonical::simplify(&Expr::div(next, body.clone()), config) else {
        return Ok(None);
    };
    if ratio.depends_on(var) || !ratio.free_symbols().is_empty() {
        return Ok(None);
    }
    let Ok(r) = numeric::evaluate(&ratio, config) else {
        return Ok(None);
    };
    let first = canonical::simplify(&at_index(body, var, lower), config)?;
    if r.abs() < 1.0 {
        let value = Expr::div(first, Expr::sub(Expr::int(1), ratio));
        return canonical::simplify(&value, config).map(Some);
    }
    if r >= 1.0 {
        return Ok(numeric::evaluate(&first, config)
            .ok()
            .filter(|v| *v != 0.0)
            .map(|v| signed_infinity(v > 0.0)));
    }
    Ok(None)
}

/// `c / k^p` summed from `lower` for `p = 1` (divergent) and even `p <= 6`.
fn p_series(body: &Expr, var: &str, lower: i128, config: &EngineConfig) -> Result<Option<Expr>, OracleError> {
    if lower < 1 {
        return Ok(None);
    }
    let k = Expr::symbol(var);
    let coefficient = |p: i128| -> Option<Expr> {
        let scaled = Expr::mul(body.clone(), Expr::pow(k.clone(), Expr::int(p)));
        canonical::simplify(&scaled, config)
            .ok()
            .filter(|c| !c.depends_on(var) && !c.is_zero_literal())
    };
    if let Some(c) = coefficient(1) {
        return Ok(numeric::evaluate(&c, config)
            .ok()
            .map(|v| signed_infinity(v > 0.0)));
    }
    for (p, denominator) in ZETA_POWERS {
        let Some(c) = coefficient(p) else {
            continue;
        };
        let zeta = Expr::div(
            Expr::pow(Expr::Constant(Constant::Pi), Expr::int(p)),
            Expr::int(denominator),
        );
        let head = explicit_sum(&Expr::pow(k.clone(), Expr::int(-p)), var, 1, lower - 1, config)?;
        return canonical::simplify(&Expr::mul(c, Expr::sub(zeta, head)), config).map(Some);
    }
    Ok(None)
}

/// Evaluates `Product(body, (var, lower, upper))` where a closed form exists.
///
/// Integer bounds multiply explicitly; reversed bounds give the reciprocal of
/// the complementary product. `Product(k, (k, 1, n))` becomes `factorial(n)`.
pub fn product(body: &Expr, range: &Range, config: &EngineConfig) -> Result<Expr, OracleError> {
    let range = simplify_range(range, config)?;
    let body = canonical::simplify(body, config)?;
    let var = range.var.as_str();
    if let (Some(lo), Some(hi)) = (index_value(&range.lower), index_value(&range.upper)) {
        return explicit_product(&body, var, lo, hi, config);
    }
    let bounded = !range.lower.contains_infinity() && !range.upper.contains_infinity();
    if bounded && !body.depends_on(var) {
        let count = Expr::add(Expr::sub(range.upper.clone(), range.lower.clone()), Expr::int(1));
        return canonical::simplify(&Expr::pow(body, count), config);
    }
    if bounded && body == Expr::symbol(var) {
        if let Some(lo) = index_value(&range.lower).filter(|lo| *lo >= 1) {
            let value = Expr::div(
                Expr::apply(Func::Factorial, range.upper.clone()),
                Expr::apply(Func::Factorial, Expr::int(lo - 1)),
            );
            return canonical::simplify(&value, config);
        }
    }
    Ok(Expr::Product {
        body: Box::new(body),
        range: Box::new(range),
    })
}

fn explicit_product(
    body: &Expr,
    var: &str,
    lo: i128,
    hi: i128,
    config: &EngineConfig,
) -> Result<Expr, OracleError> {
    if hi < lo.saturating_sub(1) {
        let flipped = explicit_product(body, var, hi + 1, lo - 1, config)?;
        return canonical::simplify(&Expr::recip(flipped), config);
    }
    check_count(lo, hi, config)?;
    let factors: Vec<Expr> = (lo..=hi).map(|k| at_index(body, var, k)).collect();
    if factors.is_empty() {
        return Ok(Expr::int(1));
    }
    canonical::simplify(&Expr::Mul(factors), config)
}

fn force_all(items: &[Expr], config: &EngineConfig) -> Result<Vec<Expr>, OracleError> {
    items.iter().map(|item| force(item, config)).collect()
}

fn force_range(range: &Range, config: &EngineConfig) -> Result<Range, OracleError> {
    Ok(Range {
        var: range.var.clone(),
        lower: force(&range.lower, config)?,
        upper: force(&range.upper, config)?,
    })
}

/// Performs every deferred integral, limit, sum, and product in `expr`,
/// innermost first.
///
/// A definite integral without a closed form is replaced by its numeric
/// value when it has no free symbols.
pub fn force(expr: &Expr, config: &EngineConfig) -> Result<Expr, OracleError> {
    if !expr.contains_deferred() {
        return Ok(expr.clone());
    }
    Ok(match expr {
        Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => expr.clone(),
        Expr::Add(items) => Expr::Add(force_all(items, config)?),
        Expr::Mul(items) => Expr::Mul(force_all(items, config)?),
        Expr::Pow(base, exp) => Expr::pow(force(base, config)?, force(exp, config)?),
        Expr::Apply(func, args) => Expr::Apply(*func, force_all(args, config)?),
        Expr::Integral {
            integrand,
            var,
            bounds,
        } => {
            let integrand = force(integrand, config)?;
            let bounds = match bounds.as_deref() {
                Some((a, b)) => Some((force(a, config)?, force(b, config)?)),
                None => None,
            };
            let value = calculus::integrate(
                &integrand,
                var,
                bounds.as_ref().map(|(a, b)| (a, b)),
                config,
            )?;
            match &value {
                Expr::Integral {
                    bounds: Some(_), ..
                } if value.free_symbols().is_empty() => {
                    Expr::float(numeric::evaluate(&value, config)?)
                }
                _ => value,
            }
        }
        Expr::Limit {
            expr: body,
            var,
            point,
            dir,
        } => limit::limit(&force(body, config)?, var, &force(point, config)?, *dir, config)?,
        Expr::Sum { body, range } => sum(&force(body, config)?, &force_range(range, config)?, config)?,
        Expr::Product { body, range } => {
            product(&force(body, config)?, &force_range(range, config)?, config)?
        }
    })
}
