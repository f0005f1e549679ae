//! Evaluation of a parsed [`Syntax`] tree into an [`Expr`].
//!
//! Literals follow the host-language arithmetic the expression text was
//! written for: two integers divide to a float (`1/2` is `0.5`) and a negative
//! integer power of an integer is a float. As soon as a symbol or constant is
//! involved the arithmetic becomes exact and symbolic. Eager catalogue calls
//! (`integrate`, `diff`, `limit`, `simplify`) run here; the capitalised forms
//! stay deferred.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use texpr_core::OracleError;

use crate::calculus;
use crate::canonical;
use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Direction, Expr, Range};
use crate::limit;
use crate::number::{Number, Rational};
use crate::parse::{BinOp, Builtin, Syntax};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(BigInt),
    Float(f64),
    Sym(Expr),
}

impl Value {
    fn into_expr(self) -> Expr {
        match self {
            Value::Int(v) => Expr::Number(Number::big(v)),
            Value::Float(v) => Expr::float(v),
            Value::Sym(e) => e,
        }
    }
}

fn zero_division(message: &str) -> OracleError {
    algebra_error("division-by-zero", message)
}

fn bad_argument(builtin: Builtin, message: impl std::fmt::Display) -> OracleError {
    algebra_error("argument", format!("{}(): {message}", builtin.name()))
}

fn int_to_float(value: &BigInt) -> Result<f64, OracleError> {
    let converted = Rational::from_integer(value.clone()).to_f64();
    if converted.is_finite() {
        Ok(converted)
    } else {
        Err(algebra_error("overflow", "int too large to convert to float"))
    }
}

fn float_result(value: f64) -> Result<Value, OracleError> {
    if value.is_nan() {
        return Err(algebra_error("complex-result", "float operation has no real value"));
    }
    if value.is_infinite() {
        return Err(algebra_error("overflow", "numerical result out of range"));
    }
    Ok(Value::Float(value))
}

/// Integration or summation target: a variable with optional bounds.
struct Target {
    var: String,
    bounds: Option<(Expr, Expr)>,
}

/// Evaluates `syntax` to an expression.
pub fn interpret(syntax: &Syntax, config: &EngineConfig) -> Result<Expr, OracleError> {
    Interpreter { config }.value(syntax).map(Value::into_expr)
}

struct Interpreter<'a> {
    config: &'a EngineConfig,
}

impl Interpreter<'_> {
    fn value(&self, syntax: &Syntax) -> Result<Value, OracleError> {
        match syntax {
            Syntax::Number(Number::Exact(r)) if r.is_integer() => Ok(Value::Int(r.numer().clone())),
            Syntax::Number(Number::Float(v)) => Ok(Value::Float(*v)),
            Syntax::Number(n) => Ok(Value::Sym(Expr::Number(n.clone()))),
            Syntax::Symbol(name) => Ok(Value::Sym(Expr::symbol(name))),
            Syntax::Constant(constant) => Ok(Value::Sym(Expr::Constant(*constant))),
            Syntax::Text(text) => Err(algebra_error(
                "type",
                format!("string '{text}' is only valid as a limit direction"),
            )),
            Syntax::Tuple(_) => Err(algebra_error(
                "type",
                "tuples are only valid as integration or summation ranges",
            )),
            Syntax::Neg(inner) => Ok(match self.value(inner)? {
                Value::Int(v) => Value::Int(-v),
                Value::Float(v) => Value::Float(-v),
                Value::Sym(e) => Value::Sym(Expr::neg(e)),
            }),
            Syntax::Binary(op, lhs, rhs) => self.binary(*op, self.value(lhs)?, self.value(rhs)?),
            Syntax::Call(builtin, args) => self.call(*builtin, args).map(Value::Sym),
        }
    }

    fn expr(&self, syntax: &Syntax) -> Result<Expr, OracleError> {
        self.value(syntax).map(Value::into_expr)
    }

    fn binary(&self, op: BinOp, lhs: Value, rhs: Value) -> Result<Value, OracleError> {
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => return int_binary(op, a, b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = as_f64(&lhs)?;
                let b = as_f64(&rhs)?;
                return float_binary(op, a, b);
            }
            _ => {}
        }
        let a = lhs.into_expr();
        let b = rhs.into_expr();
        Ok(Value::Sym(match op {
            BinOp::Add => Expr::add(a, b),
            BinOp::Sub => Expr::sub(a, b),
            BinOp::Mul => Expr::mul(a, b),
            BinOp::Div => Expr::div(a, b),
            BinOp::Pow => Expr::pow(a, b),
        }))
    }

    fn call(&self, builtin: Builtin, args: &[Syntax]) -> Result<Expr, OracleError> {
        match builtin {
            Builtin::Func(func) => {
                if args.len() != func.arity() {
                    return Err(bad_argument(
                        builtin,
                        format!("takes {} argument(s), {} given", func.arity(), args.len()),
                    ));
                }
                let args = args.iter().map(|a| self.expr(a)).collect::<Result<_, _>>()?;
                Ok(Expr::Apply(func, args))
            }
            Builtin::Sqrt => {
                let [arg] = self.exact_args::<1>(builtin, args)?;
                Ok(Expr::pow(arg, Expr::recip(Expr::int(2))))
            }
            Builtin::Root => {
                let [arg, n] = self.exact_args::<2>(builtin, args)?;
                Ok(Expr::pow(arg, Expr::recip(n)))
            }
            Builtin::Integrate | Builtin::Integral => self.integral(builtin, args),
            Builtin::Diff => self.diff(args),
            Builtin::Limit => self.limit(args),
            Builtin::Sum | Builtin::Product => self.series(builtin, args),
            Builtin::Simplify => {
                let [arg] = self.exact_args::<1>(builtin, args)?;
                canonical::simplify(&arg, self.config)
            }
            Builtin::Rational => self.rational(args),
        }
    }

    fn exact_args<const N: usize>(
        &self,
        builtin: Builtin,
        args: &[Syntax],
    ) -> Result<[Expr; N], OracleError> {
        if args.len() != N {
            return Err(bad_argument(
                builtin,
                format!("takes {N} argument(s), {} given", args.len()),
            ));
        }
        let values: Vec<Expr> = args.iter().map(|a| self.expr(a)).collect::<Result<_, _>>()?;
        values
            .try_into()
            .map_err(|_| bad_argument(builtin, "argument count mismatch"))
    }

    fn target(&self, builtin: Builtin, syntax: &Syntax) -> Result<Target, OracleError> {
        match syntax {
            Syntax::Symbol(var) => Ok(Target {
                var: var.clone(),
                bounds: None,
            }),
            Syntax::Tuple(items) => match items.as_slice() {
                [Syntax::Symbol(var)] => Ok(Target {
                    var: var.clone(),
                    bounds: None,
                }),
                [Syntax::Symbol(var), lower, upper] => Ok(Target {
                    var: var.clone(),
                    bounds: Some((self.expr(lower)?, self.expr(upper)?)),
                }),
                _ => Err(bad_argument(builtin, "range must be (var, lower, upper)")),
            },
            _ => Err(bad_argument(builtin, "expected a symbol or a range tuple")),
        }
    }

    /// The only free symbol of `body`, used when no variable is given.
    fn implied_var(&self, builtin: Builtin, body: &Expr) -> Result<Target, OracleError> {
        let symbols = body.free_symbols();
        if symbols.len() != 1 {
            return Err(bad_argument(
                builtin,
                "specify the variable: the expression does not have exactly one free symbol",
            ));
        }
        Ok(Target {
            var: symbols.into_iter().next().unwrap_or_default(),
            bounds: None,
        })
    }

    fn integral(&self, builtin: Builtin, args: &[Syntax]) -> Result<Expr, OracleError> {
        let Some((first, rest)) = args.split_first() else {
            return Err(bad_argument(builtin, "missing integrand"));
        };
        let mut current = self.expr(first)?;
        let targets = if rest.is_empty() {
            vec![self.implied_var(builtin, &current)?]
        } else {
            rest.iter()
                .map(|t| self.target(builtin, t))
                .collect::<Result<Vec<_>, _>>()?
        };
        for target in targets {
            current = if builtin == Builtin::Integrate {
                let bounds = target.bounds.as_ref().map(|(a, b)| (a, b));
                calculus::integrate(&current, &target.var, bounds, self.config)?
            } else {
                Expr::Integral {
                    integrand: Box::new(current),
                    var: target.var,
                    bounds: target.bounds.map(Box::new),
                }
            };
        }
        Ok(current)
    }

    /// `diff(f)`, `diff(f, x)`, `diff(f, x, n)`, `diff(f, x, y, ...)`.
    fn diff(&self, args: &[Syntax]) -> Result<Expr, OracleError> {
        let builtin = Builtin::Diff;
        let Some((first, rest)) = args.split_first() else {
            return Err(bad_argument(builtin, "missing expression"));
        };
        let body = self.expr(first)?;
        let mut orders: Vec<(String, u32)> = Vec::new();
        for arg in rest {
            match (arg, orders.last_mut()) {
                (Syntax::Symbol(var), _) => orders.push((var.clone(), 1)),
                (Syntax::Number(n), Some(last)) => {
                    let order = n
                        .as_integer()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| bad_argument(builtin, "order must be a non-negative integer"))?;
                    last.1 = order;
                }
                _ => return Err(bad_argument(builtin, "expected a symbol or an order")),
            }
        }
        if orders.is_empty() {
            orders.push((self.implied_var(builtin, &body)?.var, 1));
        }
        let mut current = body;
        for (var, order) in orders {
            current = calculus::derivative(&current, &var, order, self.config)?;
        }
        Ok(current)
    }

    /// `limit(f, x, a[, dir])`, one-sided from the right unless told otherwise.
    fn limit(&self, args: &[Syntax]) -> Result<Expr, OracleError> {
        let builtin = Builtin::Limit;
        let (body, var, point, dir) = match args {
            [body, Syntax::Symbol(var), point] => (body, var, point, Direction::Plus),
            [body, Syntax::Symbol(var), point, Syntax::Text(dir)] => {
                let dir = match dir.as_str() {
                    "+" => Direction::Plus,
                    "-" => Direction::Minus,
                    "+-" => Direction::Both,
                    other => {
                        return Err(bad_argument(builtin, format!("unknown direction '{other}'")))
                    }
                };
                (body, var, point, dir)
            }
            _ => return Err(bad_argument(builtin, "expected (expr, symbol, point[, dir])")),
        };
        let body = self.expr(body)?;
        let point = self.expr(point)?;
        limit::limit(&body, var, &point, dir, self.config)
    }

    fn series(&self, builtin: Builtin, args: &[Syntax]) -> Result<Expr, OracleError> {
        let Some((first, rest)) = args.split_first() else {
            return Err(bad_argument(builtin, "missing body"));
        };
        if rest.is_empty() {
            return Err(bad_argument(builtin, "missing (index, lower, upper) range"));
        }
        let mut current = self.expr(first)?;
        for target in rest {
            let Target {
                var,
                bounds: Some((lower, upper)),
            } = self.target(builtin, target)?
            else {
                return Err(bad_argument(builtin, "range must be (index, lower, upper)"));
            };
            let range = Box::new(Range { var, lower, upper });
            let body = Box::new(current);
            current = if builtin == Builtin::Sum {
                Expr::Sum { body, range }
            } else {
                Expr::Product { body, range }
            };
        }
        Ok(current)
    }

    fn rational(&self, args: &[Syntax]) -> Result<Expr, OracleError> {
        let builtin = Builtin::Rational;
        let values = args
            .iter()
            .map(|a| self.value(a))
            .collect::<Result<Vec<_>, _>>()?;
        let exact = |value: &Value| -> Result<Rational, OracleError> {
            match value {
                Value::Int(v) => Ok(Rational::from_integer(v.clone())),
                Value::Float(v) => Rational::from_f64_exact(*v)
                    .ok_or_else(|| bad_argument(builtin, "float has no exact rational value")),
                Value::Sym(Expr::Number(Number::Exact(r))) => Ok(r.clone()),
                Value::Sym(_) => Err(bad_argument(builtin, "arguments must be numbers")),
            }
        };
        let value = match values.as_slice() {
            [p] => exact(p)?,
            [p, q] => exact(p)?
                .div(&exact(q)?)
                .ok_or_else(|| zero_division("Rational() with zero denominator"))?,
            _ => return Err(bad_argument(builtin, "takes 1 or 2 arguments")),
        };
        Ok(Expr::rational(value))
    }
}

fn as_f64(value: &Value) -> Result<f64, OracleError> {
    match value {
        Value::Int(v) => int_to_float(v),
        Value::Float(v) => Ok(*v),
        Value::Sym(_) => Ok(f64::NAN),
    }
}

/// Exact integer arithmetic. True division and negative powers produce
/// floats, rounded once from the exact quotient.
fn int_binary(op: BinOp, a: &BigInt, b: &BigInt) -> Result<Value, OracleError> {
    match op {
        BinOp::Add => Ok(Value::Int(a + b)),
        BinOp::Sub => Ok(Value::Int(a - b)),
        BinOp::Mul => Ok(Value::Int(a * b)),
        BinOp::Div => {
            let quotient = Rational::from_parts(a.clone(), b.clone())
                .ok_or_else(|| zero_division("division by zero"))?;
            let value = quotient.to_f64();
            if value.is_infinite() {
                return Err(algebra_error("overflow", "integer division result too large for a float"));
            }
            Ok(Value::Float(value))
        }
        BinOp::Pow => {
            if b.is_negative() {
                if a.is_zero() {
                    return Err(zero_division("0 cannot be raised to a negative power"));
                }
                let exp = b.to_f64().unwrap_or(f64::NEG_INFINITY);
                return float_result(int_to_float(a)?.powf(exp));
            }
            let base = Rational::from_integer(a.clone());
            let raised = match b.to_i64() {
                Some(exp) => base.pow(exp)?,
                // Only 0 and ±1 survive exponents this large.
                None => {
                    let exp = if b.is_even() { 2 } else { 1 };
                    if a.magnitude() > &num_bigint::BigUint::from(1u8) {
                        return Err(algebra_error(
                            "integer-range",
                            "exact power is too large to represent",
                        ));
                    }
                    base.pow(exp)?
                }
            };
            Ok(Value::Int(raised.numer().clone()))
        }
    }
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Result<Value, OracleError> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            float_result(a.powf(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, Scope};

    fn eval(source: &str) -> Result<Expr, OracleError> {
        let syntax = parse(source, &Scope::new(["x", "y", "k", "n"]))?;
        interpret(&syntax, &EngineConfig::default())
    }

    #[test]
    fn integer_division_is_true_division() {
        assert_eq!(eval("1/2").unwrap(), Expr::float(0.5));
        assert_eq!(eval("7/7").unwrap(), Expr::float(1.0));
        assert_eq!(eval("2**-1").unwrap(), Expr::float(0.5));
        assert_eq!(eval("2**10").unwrap(), Expr::int(1024));
        assert_eq!(eval("10**400/10**399").unwrap(), Expr::float(10.0));
    }

    #[test]
    fn integer_arithmetic_never_rounds() {
        let big = eval("2**200 + 1").unwrap();
        let Expr::Number(Number::Exact(r)) = &big else {
            panic!("expected an exact integer, got {big:?}");
        };
        assert_eq!(
            r.to_string(),
            "1606938044258990275541962092341162602522202993782792835301377"
        );
        assert_ne!(eval("10**40 + 1").unwrap(), eval("10**40").unwrap());
        assert_eq!(eval("(-1)**(10**30 + 1)").unwrap(), Expr::int(-1));
        assert_eq!(eval("10**(10**30)").unwrap_err().info().code, "integer-range");
        assert_eq!(eval("10**400 + 0.5").unwrap_err().info().code, "overflow");
    }

    #[test]
    fn symbols_make_arithmetic_exact() {
        let value = canonical::simplify(&eval("x/2 + x/2").unwrap(), &EngineConfig::default()).unwrap();
        assert_eq!(value.to_string(), "x");
        assert_eq!(eval("Rational(1, 2)").unwrap().to_string(), "1/2");
        assert_eq!(eval("Rational(0.25)").unwrap().to_string(), "1/4");
    }

    #[test]
    fn zero_division_is_reported() {
        let err = eval("1/0").unwrap_err();
        assert_eq!(err.info().code, "division-by-zero");
        assert!(eval("Rational(1, 0)").is_err());
    }

    #[test]
    fn integrate_with_bounds_is_eager() {
        assert_eq!(eval("integrate(x**2, (x, 0, 3))").unwrap().to_string(), "9");
        assert_eq!(eval("integrate(2*x)").unwrap().to_string(), "x**2");
    }

    #[test]
    fn capitalised_forms_stay_deferred() {
        assert!(matches!(eval("Integral(x, (x, 0, 1))").unwrap(), Expr::Integral { .. }));
        assert!(matches!(eval("Sum(k, (k, 1, n))").unwrap(), Expr::Sum { .. }));
        assert!(matches!(eval("Product(k, (k, 1, n))").unwrap(), Expr::Product { .. }));
    }

    #[test]
    fn diff_accepts_orders_and_several_variables() {
        assert_eq!(eval("diff(x**3, x, 2)").unwrap().to_string(), "6*x");
        assert_eq!(eval("diff(x**2*y, x, y)").unwrap().to_string(), "2*x");
        assert_eq!(eval("diff(x**2)").unwrap().to_string(), "2*x");
        assert!(eval("diff(x*y)").is_err());
    }

    #[test]
    fn limit_direction_defaults_to_right() {
        assert_eq!(eval("limit(1/x, x, 0)").unwrap().to_string(), "oo");
        assert_eq!(eval("limit(1/x, x, 0, '-')").unwrap().to_string(), "-oo");
        assert!(eval("limit(x, x, 0, 'up')").is_err());
    }

    #[test]
    fn misplaced_strings_and_tuples_are_rejected() {
        assert_eq!(eval("'abc'").unwrap_err().info().code, "type");
        assert_eq!(eval("(1, 2) + 1").unwrap_err().info().code, "type");
        assert_eq!(eval("sin(x, y)").unwrap_err().info().code, "argument");
    }
}
