//! SymPy-flavoured rendering of [`Expr`].

use std::fmt;

use num_traits::One;

use crate::expr::{Constant, Expr};
use crate::number::{Number, Rational};

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(terms) if terms.len() > 1 => PREC_ADD,
        Expr::Add(_) => PREC_ATOM,
        Expr::Mul(_) => PREC_MUL,
        Expr::Number(Number::Exact(r)) if r.is_negative() || !r.is_integer() => PREC_MUL,
        Expr::Number(Number::Float(v)) if *v < 0.0 => PREC_MUL,
        Expr::Pow(base, exp) => {
            if is_half(exp) || matches!(**base, Expr::Constant(Constant::E)) {
                PREC_ATOM
            } else if exp.as_number().map(|n| n.is_negative()).unwrap_or(false) {
                PREC_MUL
            } else {
                PREC_POW
            }
        }
        _ => PREC_ATOM,
    }
}

fn is_half(expr: &Expr) -> bool {
    matches!(expr, Expr::Number(Number::Exact(r)) if Rational::new(1, 2).as_ref() == Some(r))
}

fn wrap(expr: &Expr, min_prec: u8) -> String {
    let rendered = render(expr);
    if precedence(expr) < min_prec {
        format!("({rendered})")
    } else {
        rendered
    }
}

fn is_negative_term(expr: &Expr) -> bool {
    match expr {
        Expr::Number(n) => n.is_negative(),
        Expr::Mul(factors) => factors
            .iter()
            .find_map(Expr::as_number)
            .map(|n| n.is_negative())
            .unwrap_or(false),
        _ => false,
    }
}

fn negate_term(expr: &Expr) -> Expr {
    match expr {
        Expr::Number(n) => Expr::Number(n.neg()),
        Expr::Mul(factors) => {
            let mut flipped = false;
            let factors: Vec<Expr> = factors
                .iter()
                .filter_map(|factor| match factor {
                    Expr::Number(n) if !flipped => {
                        flipped = true;
                        let negated = n.neg();
                        if negated.is_one() {
                            None
                        } else {
                            Some(Expr::Number(negated))
                        }
                    }
                    other => Some(other.clone()),
                })
                .collect();
            match factors.len() {
                0 => Expr::int(1),
                1 => factors.into_iter().next().unwrap_or_else(|| Expr::int(1)),
                _ => Expr::Mul(factors),
            }
        }
        other => Expr::neg(other.clone()),
    }
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => n.to_string(),
        Expr::Symbol(name) => name.clone(),
        Expr::Constant(c) => c.name().to_string(),
        Expr::Add(terms) => render_add(terms),
        Expr::Mul(factors) => render_mul(factors),
        Expr::Pow(base, exp) => render_pow(base, exp),
        Expr::Apply(func, args) => {
            let args: Vec<String> = args.iter().map(render).collect();
            format!("{}({})", func.name(), args.join(", "))
        }
        Expr::Integral {
            integrand,
            var,
            bounds,
        } => match bounds {
            Some(b) => format!(
                "Integral({}, ({}, {}, {}))",
                render(integrand),
                var,
                render(&b.0),
                render(&b.1)
            ),
            None => format!("Integral({}, {})", render(integrand), var),
        },
        Expr::Limit {
            expr,
            var,
            point,
            dir,
        } => format!(
            "Limit({}, {}, {}, dir='{}')",
            render(expr),
            var,
            render(point),
            dir.as_str()
        ),
        Expr::Sum { body, range } => format!(
            "Sum({}, ({}, {}, {}))",
            render(body),
            range.var,
            render(&range.lower),
            render(&range.upper)
        ),
        Expr::Product { body, range } => format!(
            "Product({}, ({}, {}, {}))",
            render(body),
            range.var,
            render(&range.lower),
            render(&range.upper)
        ),
    }
}

fn render_add(terms: &[Expr]) -> String {
    if terms.is_empty() {
        return "0".to_string();
    }
    let mut out = String::new();
    for (idx, term) in terms.iter().enumerate() {
        if idx == 0 {
            out.push_str(&wrap(term, PREC_ADD));
        } else if is_negative_term(term) {
            out.push_str(" - ");
            out.push_str(&wrap(&negate_term(term), PREC_MUL));
        } else {
            out.push_str(" + ");
            out.push_str(&wrap(term, PREC_ADD));
        }
    }
    out
}

fn render_mul(factors: &[Expr]) -> String {
    if factors.is_empty() {
        return "1".to_string();
    }
    let mut negative = false;
    let mut numer: Vec<String> = Vec::new();
    let mut denom: Vec<(String, u8)> = Vec::new();
    for factor in factors {
        match factor {
            Expr::Number(Number::Exact(r)) => {
                if r.is_negative() {
                    negative = !negative;
                }
                let magnitude = r.numer().magnitude();
                if !magnitude.is_one() {
                    numer.push(magnitude.to_string());
                }
                if !r.denom().is_one() {
                    denom.push((r.denom().to_string(), PREC_ATOM));
                }
            }
            Expr::Number(Number::Float(v)) => {
                if *v < 0.0 {
                    negative = !negative;
                }
                numer.push(Number::Float(v.abs()).to_string());
            }
            Expr::Pow(base, exp) if exp.as_number().map(|n| n.is_negative()).unwrap_or(false) => {
                let flipped = exp.as_number().map(|n| n.neg()).unwrap_or_else(Number::one);
                let inverse = if flipped.is_one() {
                    (**base).clone()
                } else {
                    Expr::pow((**base).clone(), Expr::Number(flipped))
                };
                denom.push((render(&inverse), precedence(&inverse)));
            }
            other => numer.push(wrap(other, PREC_MUL)),
        }
    }
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if numer.is_empty() {
        out.push('1');
    } else {
        out.push_str(&numer.join("*"));
    }
    match denom.len() {
        0 => {}
        1 => {
            let (text, prec) = &denom[0];
            out.push('/');
            if *prec < PREC_POW {
                out.push_str(&format!("({text})"));
            } else {
                out.push_str(text);
            }
        }
        _ => {
            let parts: Vec<String> = denom
                .iter()
                .map(|(text, prec)| {
                    if *prec < PREC_MUL {
                        format!("({text})")
                    } else {
                        text.clone()
                    }
                })
                .collect();
            out.push_str(&format!("/({})", parts.join("*")));
        }
    }
    out
}

fn render_pow(base: &Expr, exp: &Expr) -> String {
    if matches!(base, Expr::Constant(Constant::E)) {
        return format!("exp({})", render(exp));
    }
    if is_half(exp) {
        return format!("sqrt({})", render(base));
    }
    if exp.as_number().map(|n| n.is_negative()).unwrap_or(false) {
        return render_mul(&[Expr::pow(base.clone(), exp.clone())]);
    }
    let exp_text = match exp {
        Expr::Number(Number::Exact(r)) if r.is_integer() && !r.is_negative() => r.to_string(),
        Expr::Number(Number::Float(v)) if *v >= 0.0 => render(exp),
        Expr::Symbol(_) | Expr::Constant(_) => render(exp),
        other => format!("({})", render(other)),
    };
    format!("{}**{}", wrap(base, PREC_ATOM), exp_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Func;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    #[test]
    fn renders_polynomials() {
        let expr = Expr::Add(vec![
            Expr::pow(x(), Expr::int(2)),
            Expr::Mul(vec![Expr::int(-2), x()]),
            Expr::int(1),
        ]);
        assert_eq!(expr.to_string(), "x**2 - 2*x + 1");
    }

    #[test]
    fn renders_fractions_and_roots() {
        let half = Expr::rational(Rational::new(1, 2).unwrap());
        assert_eq!(Expr::Mul(vec![half.clone(), x()]).to_string(), "x/2");
        assert_eq!(Expr::pow(Expr::int(2), half).to_string(), "sqrt(2)");
        assert_eq!(Expr::recip(Expr::add(x(), Expr::int(1))).to_string(), "1/(x + 1)");
    }

    #[test]
    fn renders_functions_and_deferred_forms() {
        let expr = Expr::apply(Func::Sin, x());
        assert_eq!(expr.to_string(), "sin(x)");
        let integral = Expr::Integral {
            integrand: Box::new(Expr::pow(x(), Expr::int(2))),
            var: "x".into(),
            bounds: Some(Box::new((Expr::int(0), Expr::int(1)))),
        };
        assert_eq!(integral.to_string(), "Integral(x**2, (x, 0, 1))");
    }
}
