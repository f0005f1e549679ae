//! Expression tree shared by the parser, simplifier, calculus and evaluator.

use std::collections::BTreeSet;

use crate::number::{Number, Rational};

/// Named constants of the surface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    /// Circle constant `pi`.
    Pi,
    /// Euler's number `E`.
    E,
    /// Imaginary unit `I`.
    I,
    /// Positive infinity `oo`.
    Infinity,
}

impl Constant {
    /// Surface name.
    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
            Constant::I => "I",
            Constant::Infinity => "oo",
        }
    }

    /// Whether the constant is a positive real number.
    pub fn is_positive_real(&self) -> bool {
        matches!(self, Constant::Pi | Constant::E)
    }
}

/// Elementary and integer functions kept as applications in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
    /// Hyperbolic sine.
    Sinh,
    /// Hyperbolic cosine.
    Cosh,
    /// Hyperbolic tangent.
    Tanh,
    /// Inverse sine.
    Asin,
    /// Inverse cosine.
    Acos,
    /// Inverse tangent.
    Atan,
    /// Natural logarithm.
    Log,
    /// Exponential.
    Exp,
    /// Absolute value.
    Abs,
    /// Factorial.
    Factorial,
    /// Binomial coefficient.
    Binomial,
    /// Floor.
    Floor,
    /// Ceiling.
    Ceiling,
}

impl Func {
    /// Every catalogue function, in surface-name order.
    pub const ALL: [Func; 16] = [
        Func::Sin,
        Func::Cos,
        Func::Tan,
        Func::Sinh,
        Func::Cosh,
        Func::Tanh,
        Func::Asin,
        Func::Acos,
        Func::Atan,
        Func::Log,
        Func::Exp,
        Func::Abs,
        Func::Factorial,
        Func::Binomial,
        Func::Floor,
        Func::Ceiling,
    ];

    /// Surface name.
    pub fn name(&self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Log => "log",
            Func::Exp => "exp",
            Func::Abs => "Abs",
            Func::Factorial => "factorial",
            Func::Binomial => "binomial",
            Func::Floor => "floor",
            Func::Ceiling => "ceiling",
        }
    }

    /// Looks a function up by surface name.
    pub fn from_name(name: &str) -> Option<Func> {
        Func::ALL.iter().copied().find(|func| func.name() == name)
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        match self {
            Func::Binomial => 2,
            _ => 1,
        }
    }

    /// `f(-x) = -f(x)`.
    pub fn is_odd(&self) -> bool {
        matches!(
            self,
            Func::Sin | Func::Tan | Func::Sinh | Func::Tanh | Func::Asin | Func::Atan
        )
    }

    /// `f(-x) = f(x)`.
    pub fn is_even(&self) -> bool {
        matches!(self, Func::Cos | Func::Cosh | Func::Abs)
    }
}

/// Approach direction for limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From above.
    Plus,
    /// From below.
    Minus,
    /// From both sides; the one-sided limits must agree.
    Both,
}

impl Direction {
    /// Surface spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Plus => "+",
            Direction::Minus => "-",
            Direction::Both => "+-",
        }
    }
}

/// Index variable and inclusive bounds of a `Sum` or `Product`.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    /// Bound variable.
    pub var: String,
    /// Lower bound.
    pub lower: Expr,
    /// Upper bound.
    pub upper: Expr,
}

/// Symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(Number),
    /// Free symbol.
    Symbol(String),
    /// Named constant.
    Constant(Constant),
    /// Sum of terms.
    Add(Vec<Expr>),
    /// Product of factors.
    Mul(Vec<Expr>),
    /// Power `base ** exponent`.
    Pow(Box<Expr>, Box<Expr>),
    /// Catalogue function application.
    Apply(Func, Vec<Expr>),
    /// Unevaluated integral.
    Integral {
        /// Integrand.
        integrand: Box<Expr>,
        /// Integration variable.
        var: String,
        /// Definite bounds, if any.
        bounds: Option<Box<(Expr, Expr)>>,
    },
    /// Unevaluated limit.
    Limit {
        /// Limit body.
        expr: Box<Expr>,
        /// Approaching variable.
        var: String,
        /// Limit point.
        point: Box<Expr>,
        /// Approach direction.
        dir: Direction,
    },
    /// Unevaluated summation.
    Sum {
        /// Summand.
        body: Box<Expr>,
        /// Index and bounds.
        range: Box<Range>,
    },
    /// Unevaluated product.
    Product {
        /// Factor.
        body: Box<Expr>,
        /// Index and bounds.
        range: Box<Range>,
    },
}

impl Expr {
    /// Exact integer literal.
    pub fn int(value: i128) -> Expr {
        Expr::Number(Number::int(value))
    }

    /// Exact rational literal.
    pub fn rational(value: Rational) -> Expr {
        Expr::Number(Number::Exact(value))
    }

    /// Float literal.
    pub fn float(value: f64) -> Expr {
        Expr::Number(Number::Float(value))
    }

    /// Symbol.
    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    /// `a + b`, flattening nested sums.
    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        let mut terms = Vec::new();
        for side in [lhs, rhs] {
            match side {
                Expr::Add(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        Expr::Add(terms)
    }

    /// `a * b`, flattening nested products.
    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        let mut factors = Vec::new();
        for side in [lhs, rhs] {
            match side {
                Expr::Mul(inner) => factors.extend(inner),
                other => factors.push(other),
            }
        }
        Expr::Mul(factors)
    }

    /// `-a`.
    pub fn neg(value: Expr) -> Expr {
        match value {
            Expr::Number(n) => Expr::Number(n.neg()),
            other => Expr::mul(Expr::int(-1), other),
        }
    }

    /// `a - b`.
    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::add(lhs, Expr::neg(rhs))
    }

    /// `a ** b`.
    pub fn pow(base: Expr, exp: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exp))
    }

    /// `1 / a`.
    pub fn recip(value: Expr) -> Expr {
        Expr::pow(value, Expr::int(-1))
    }

    /// `a / b`.
    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::mul(lhs, Expr::recip(rhs))
    }

    /// Function application.
    pub fn apply(func: Func, arg: Expr) -> Expr {
        Expr::Apply(func, vec![arg])
    }

    /// Numeric payload of a literal.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Number(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// Whether this is the literal zero.
    pub fn is_zero_literal(&self) -> bool {
        matches!(self, Expr::Number(n) if n.is_zero())
    }

    /// Whether the expression is `oo` or `-oo`.
    pub fn infinity_sign(&self) -> Option<i8> {
        match self {
            Expr::Constant(Constant::Infinity) => Some(1),
            Expr::Mul(factors) if factors.len() == 2 => match (&factors[0], &factors[1]) {
                (Expr::Number(n), Expr::Constant(Constant::Infinity)) if n.is_negative() => {
                    Some(-1)
                }
                (Expr::Number(n), Expr::Constant(Constant::Infinity)) if !n.is_zero() => Some(1),
                _ => None,
            },
            _ => None,
        }
    }

    /// Symbols that occur free (bound indices and integration variables excluded).
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut out);
        out
    }

    fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) | Expr::Constant(_) => {}
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Add(items) | Expr::Mul(items) | Expr::Apply(_, items) => {
                for item in items {
                    item.collect_free(out);
                }
            }
            Expr::Pow(base, exp) => {
                base.collect_free(out);
                exp.collect_free(out);
            }
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => {
                let mut inner = integrand.free_symbols();
                if let Some(bounds) = bounds {
                    inner.remove(var);
                    bounds.0.collect_free(out);
                    bounds.1.collect_free(out);
                } else {
                    inner.insert(var.clone());
                }
                out.extend(inner);
            }
            Expr::Limit {
                expr, var, point, ..
            } => {
                let mut inner = expr.free_symbols();
                inner.remove(var);
                out.extend(inner);
                point.collect_free(out);
            }
            Expr::Sum { body, range } | Expr::Product { body, range } => {
                let mut inner = body.free_symbols();
                inner.remove(&range.var);
                out.extend(inner);
                range.lower.collect_free(out);
                range.upper.collect_free(out);
            }
        }
    }

    /// Whether `name` occurs free.
    pub fn depends_on(&self, name: &str) -> bool {
        self.free_symbols().contains(name)
    }

    /// Whether any unevaluated integral, limit, sum or product remains.
    pub fn contains_deferred(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => false,
            Expr::Add(items) | Expr::Mul(items) | Expr::Apply(_, items) => {
                items.iter().any(Expr::contains_deferred)
            }
            Expr::Pow(base, exp) => base.contains_deferred() || exp.contains_deferred(),
            Expr::Integral { .. } | Expr::Limit { .. } | Expr::Sum { .. } | Expr::Product { .. } => {
                true
            }
        }
    }

    /// Whether `oo` occurs anywhere.
    pub fn contains_infinity(&self) -> bool {
        match self {
            Expr::Constant(Constant::Infinity) => true,
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => false,
            Expr::Add(items) | Expr::Mul(items) | Expr::Apply(_, items) => {
                items.iter().any(Expr::contains_infinity)
            }
            Expr::Pow(base, exp) => base.contains_infinity() || exp.contains_infinity(),
            Expr::Integral {
                integrand, bounds, ..
            } => {
                integrand.contains_infinity()
                    || bounds
                        .as_ref()
                        .map(|b| b.0.contains_infinity() || b.1.contains_infinity())
                        .unwrap_or(false)
            }
            Expr::Limit { expr, point, .. } => expr.contains_infinity() || point.contains_infinity(),
            Expr::Sum { body, range } | Expr::Product { body, range } => {
                body.contains_infinity()
                    || range.lower.contains_infinity()
                    || range.upper.contains_infinity()
            }
        }
    }

    /// Replaces free occurrences of `name` by `value`.
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Symbol(sym) if sym == name => value.clone(),
            Expr::Number(_) | Expr::Symbol(_) | Expr::Constant(_) => self.clone(),
            Expr::Add(items) => Expr::Add(items.iter().map(|i| i.substitute(name, value)).collect()),
            Expr::Mul(items) => Expr::Mul(items.iter().map(|i| i.substitute(name, value)).collect()),
            Expr::Apply(func, items) => Expr::Apply(
                *func,
                items.iter().map(|i| i.substitute(name, value)).collect(),
            ),
            Expr::Pow(base, exp) => Expr::pow(base.substitute(name, value), exp.substitute(name, value)),
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => {
                let bound_here = var == name && bounds.is_some();
                Expr::Integral {
                    integrand: Box::new(if bound_here {
                        (**integrand).clone()
                    } else {
                        integrand.substitute(name, value)
                    }),
                    var: var.clone(),
                    bounds: bounds.as_ref().map(|b| {
                        Box::new((b.0.substitute(name, value), b.1.substitute(name, value)))
                    }),
                }
            }
            Expr::Limit {
                expr,
                var,
                point,
                dir,
            } => Expr::Limit {
                expr: Box::new(if var == name {
                    (**expr).clone()
                } else {
                    expr.substitute(name, value)
                }),
                var: var.clone(),
                point: Box::new(point.substitute(name, value)),
                dir: *dir,
            },
            Expr::Sum { body, range } => Expr::Sum {
                body: Box::new(substitute_bound(body, range, name, value)),
                range: Box::new(substitute_range(range, name, value)),
            },
            Expr::Product { body, range } => Expr::Product {
                body: Box::new(substitute_bound(body, range, name, value)),
                range: Box::new(substitute_range(range, name, value)),
            },
        }
    }
}

fn substitute_bound(body: &Expr, range: &Range, name: &str, value: &Expr) -> Expr {
    if range.var == name {
        body.clone()
    } else {
        body.substitute(name, value)
    }
}

fn substitute_range(range: &Range, name: &str, value: &Expr) -> Range {
    Range {
        var: range.var.clone(),
        lower: range.lower.substitute(name, value),
        upper: range.upper.substitute(name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_variables_are_not_free() {
        let sum = Expr::Sum {
            body: Box::new(Expr::mul(Expr::symbol("k"), Expr::symbol("x"))),
            range: Box::new(Range {
                var: "k".into(),
                lower: Expr::int(1),
                upper: Expr::symbol("n"),
            }),
        };
        let free: Vec<_> = sum.free_symbols().into_iter().collect();
        assert_eq!(free, vec!["n".to_string(), "x".to_string()]);
        assert!(sum.contains_deferred());
    }

    #[test]
    fn substitution_respects_binders() {
        let sum = Expr::Sum {
            body: Box::new(Expr::symbol("k")),
            range: Box::new(Range {
                var: "k".into(),
                lower: Expr::int(1),
                upper: Expr::symbol("k"),
            }),
        };
        let replaced = sum.substitute("k", &Expr::int(3));
        match replaced {
            Expr::Sum { body, range } => {
                assert_eq!(*body, Expr::symbol("k"));
                assert_eq!(range.upper, Expr::int(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn infinity_sign_detects_negative_infinity() {
        let neg = Expr::neg(Expr::Constant(Constant::Infinity));
        assert_eq!(neg.infinity_sign(), Some(-1));
        assert_eq!(Expr::Constant(Constant::Infinity).infinity_sign(), Some(1));
        assert_eq!(Expr::symbol("x").infinity_sign(), None);
    }
}
