//! Exact rationals over arbitrary-precision integers, plus floats.
//!
//! Integers never overflow: [`Rational`] wraps a [`BigRational`], so exact
//! values stay exact however large they grow. The only size bound is
//! [`MAX_INTEGER_BITS`], enforced where a single operation could allocate
//! without limit (integer powers); exceeding it is an evaluation error,
//! never a silent approximation.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use texpr_core::OracleError;

use crate::error::algebra_error;

/// Largest bit length an exact power may reach.
pub const MAX_INTEGER_BITS: u64 = 1 << 20;

fn integer_range() -> OracleError {
    algebra_error(
        "integer-range",
        format!("exact result would exceed {MAX_INTEGER_BITS} bits"),
    )
}

/// Reduced fraction with a strictly positive denominator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rational(BigRational);

impl Rational {
    /// Zero.
    pub fn zero() -> Self {
        Rational(BigRational::zero())
    }

    /// One.
    pub fn one() -> Self {
        Rational(BigRational::one())
    }

    /// Builds a reduced fraction, returning `None` for a zero denominator.
    pub fn new(num: i128, den: i128) -> Option<Self> {
        Self::from_parts(BigInt::from(num), BigInt::from(den))
    }

    /// Reduced `num / den`, `None` for a zero denominator.
    pub fn from_parts(num: BigInt, den: BigInt) -> Option<Self> {
        if den.is_zero() {
            return None;
        }
        Some(Rational(BigRational::new(num, den)))
    }

    /// Integer value.
    pub fn integer(value: i128) -> Self {
        Self::from_integer(BigInt::from(value))
    }

    /// Integer value of any size.
    pub fn from_integer(value: BigInt) -> Self {
        Rational(BigRational::from_integer(value))
    }

    /// Numerator.
    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    /// Denominator (always positive).
    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    /// Integer value when it fits an `i128`.
    pub fn to_i128(&self) -> Option<i128> {
        if self.is_integer() {
            self.numer().to_i128()
        } else {
            None
        }
    }

    /// Integer value when it fits an `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            self.numer().to_i64()
        } else {
            None
        }
    }

    /// Whether the denominator is one.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Whether the value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is one.
    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Bit length of the larger of numerator and denominator.
    pub fn bits(&self) -> u64 {
        self.numer().bits().max(self.denom().bits())
    }

    /// Nearest `f64`; magnitudes beyond the float range become infinities.
    pub fn to_f64(&self) -> f64 {
        match self.0.to_f64() {
            Some(value) => value,
            None => {
                let overflow = if self.is_negative() {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                };
                let num = self.numer().to_f64().unwrap_or(overflow);
                let den = self.denom().to_f64().unwrap_or(f64::INFINITY);
                num / den
            }
        }
    }

    /// Exact value of a finite float.
    pub fn from_f64_exact(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        BigRational::from_float(value).map(Rational)
    }

    /// Negation.
    pub fn neg(&self) -> Self {
        Rational(-&self.0)
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Rational(self.0.abs())
    }

    /// Sum.
    pub fn add(&self, other: &Self) -> Self {
        Rational(&self.0 + &other.0)
    }

    /// Difference.
    pub fn sub(&self, other: &Self) -> Self {
        Rational(&self.0 - &other.0)
    }

    /// Product.
    pub fn mul(&self, other: &Self) -> Self {
        Rational(&self.0 * &other.0)
    }

    /// Reciprocal, `None` for zero.
    pub fn recip(&self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(Rational(self.0.recip()))
        }
    }

    /// Quotient, `None` for a zero divisor.
    pub fn div(&self, other: &Self) -> Option<Self> {
        if other.is_zero() {
            None
        } else {
            Some(Rational(&self.0 / &other.0))
        }
    }

    /// Integer power. Zero to a negative power and results beyond
    /// [`MAX_INTEGER_BITS`] are errors.
    pub fn pow(&self, exp: i64) -> Result<Self, OracleError> {
        if exp == 0 {
            return Ok(Rational::one());
        }
        if self.is_zero() {
            return if exp < 0 {
                Err(algebra_error("division-by-zero", "division by zero"))
            } else {
                Ok(Rational::zero())
            };
        }
        let magnitude = exp.unsigned_abs();
        if self.numer().magnitude().is_one() && self.denom().is_one() {
            let flips = self.is_negative() && magnitude % 2 == 1;
            return Ok(if flips { self.clone() } else { Rational::one() });
        }
        if self.bits().saturating_mul(magnitude) > MAX_INTEGER_BITS {
            return Err(integer_range());
        }
        let magnitude = u32::try_from(magnitude).map_err(|_| integer_range())?;
        let num = self.numer().pow(magnitude);
        let den = self.denom().pow(magnitude);
        let raised = Rational(BigRational::new(num, den));
        if exp < 0 {
            raised
                .recip()
                .ok_or_else(|| algebra_error("division-by-zero", "division by zero"))
        } else {
            Ok(raised)
        }
    }

    /// Largest integer not above the value.
    pub fn floor(&self) -> Self {
        Rational(self.0.floor())
    }

    /// Smallest integer not below the value.
    pub fn ceil(&self) -> Self {
        Rational(self.0.ceil())
    }

    /// Integer part, rounded toward zero.
    pub fn trunc(&self) -> Self {
        Rational(self.0.trunc())
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

/// Scalar value: exact when possible, float otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    /// Exact rational.
    Exact(Rational),
    /// Approximate value.
    Float(f64),
}

impl Number {
    /// Exact integer.
    pub fn int(value: i128) -> Self {
        Number::Exact(Rational::integer(value))
    }

    /// Exact integer of any size.
    pub fn big(value: BigInt) -> Self {
        Number::Exact(Rational::from_integer(value))
    }

    /// Exact zero.
    pub fn zero() -> Self {
        Number::int(0)
    }

    /// Exact one.
    pub fn one() -> Self {
        Number::int(1)
    }

    /// Exact fraction, `None` for a zero denominator.
    pub fn fraction(num: i128, den: i128) -> Option<Self> {
        Rational::new(num, den).map(Number::Exact)
    }

    /// Nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Exact(r) => r.to_f64(),
            Number::Float(v) => *v,
        }
    }

    /// Exact rational payload, if any.
    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Number::Exact(r) => Some(r.clone()),
            Number::Float(_) => None,
        }
    }

    /// Exact integer payload, if it fits an `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Number::Exact(r) => r.to_i128(),
            Number::Float(_) => None,
        }
    }

    /// Whether the value equals zero (floats compare exactly).
    pub fn is_zero(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_zero(),
            Number::Float(v) => *v == 0.0,
        }
    }

    /// Whether the value equals one.
    pub fn is_one(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_one(),
            Number::Float(v) => *v == 1.0,
        }
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_negative(),
            Number::Float(v) => *v < 0.0,
        }
    }

    /// Whether the value is a float.
    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Negation.
    pub fn neg(&self) -> Number {
        match self {
            Number::Exact(r) => Number::Exact(r.neg()),
            Number::Float(v) => Number::Float(-v),
        }
    }

    /// Absolute value.
    pub fn abs(&self) -> Number {
        match self {
            Number::Exact(r) => Number::Exact(r.abs()),
            Number::Float(v) => Number::Float(v.abs()),
        }
    }

    /// Sum.
    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a.add(b)),
            _ => Number::Float(self.to_f64() + other.to_f64()),
        }
    }

    /// Difference.
    pub fn sub(&self, other: &Number) -> Number {
        self.add(&other.neg())
    }

    /// Product.
    pub fn mul(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a.mul(b)),
            _ => Number::Float(self.to_f64() * other.to_f64()),
        }
    }

    /// Quotient; dividing by zero is an evaluation error.
    pub fn div(&self, other: &Number) -> Result<Number, OracleError> {
        if other.is_zero() {
            return Err(algebra_error("division-by-zero", "division by zero"));
        }
        Ok(match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => match a.div(b) {
                Some(q) => Number::Exact(q),
                None => return Err(algebra_error("division-by-zero", "division by zero")),
            },
            _ => Number::Float(self.to_f64() / other.to_f64()),
        })
    }

    /// Integer power; zero to a negative power is an evaluation error.
    pub fn powi(&self, exp: i64) -> Result<Number, OracleError> {
        if exp < 0 && self.is_zero() {
            return Err(algebra_error("division-by-zero", "division by zero"));
        }
        match self {
            Number::Exact(r) => r.pow(exp).map(Number::Exact),
            Number::Float(v) => Ok(Number::Float(v.powf(exp as f64))),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Exact(r) => write!(f, "{r}"),
            Number::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1.0e16 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
        }
    }
}

/// Prime factorisation of a positive integer by trial division.
///
/// Cofactors that survive trial division up to `limit` are reported as a
/// single (possibly composite) factor.
pub(crate) fn factorize(n: &BigInt, limit: u64) -> Vec<(BigInt, u32)> {
    let mut factors = Vec::new();
    let mut rest = n.clone();
    let mut root = rest.sqrt();
    let mut p: u64 = 2;
    while p <= limit && BigInt::from(p) <= root {
        let mut count = 0;
        while (&rest % p).is_zero() {
            rest /= p;
            count += 1;
        }
        if count > 0 {
            factors.push((BigInt::from(p), count));
            root = rest.sqrt();
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if rest > BigInt::one() {
        factors.push((rest, 1));
    }
    factors
}

/// `n!` for a non-negative machine-size `n`.
pub(crate) fn factorial(n: u64) -> BigInt {
    (2..=n).fold(BigInt::one(), |acc, k| acc * k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_reduce() {
        let r = Rational::new(6, -8).unwrap();
        assert_eq!(*r.numer(), BigInt::from(-3));
        assert_eq!(*r.denom(), BigInt::from(4));
        assert_eq!(r.to_string(), "-3/4");
    }

    #[test]
    fn large_integers_stay_exact() {
        let big = Number::int(i128::MAX);
        let sum = big.add(&big).add(&big);
        assert!(!sum.is_float());
        assert_eq!(sum.sub(&big).sub(&big), big);

        let two = Rational::integer(2);
        let huge = two.pow(200).unwrap();
        let next = huge.add(&Rational::one());
        assert_ne!(huge, next);
        assert!(!next.sub(&huge).is_zero());
        assert_eq!(huge.to_string().len(), 61);
    }

    #[test]
    fn oversized_powers_are_errors() {
        let err = Rational::integer(10).pow(i64::MAX).unwrap_err();
        assert_eq!(err.info().code, "integer-range");
        assert_eq!(Rational::one().pow(i64::MAX).unwrap(), Rational::one());
        assert!(Rational::zero().pow(-1).is_err());
    }

    #[test]
    fn floor_and_ceil_follow_sign() {
        let r = Rational::new(-7, 2).unwrap();
        assert_eq!(r.floor(), Rational::integer(-4));
        assert_eq!(r.ceil(), Rational::integer(-3));
        assert_eq!(r.trunc(), Rational::integer(-3));
    }

    #[test]
    fn exact_float_conversion() {
        assert_eq!(Rational::from_f64_exact(0.375), Rational::new(3, 8));
        assert_eq!(Rational::from_f64_exact(f64::NAN), None);
        assert_eq!(Rational::from_f64_exact(1.0e300).map(|r| r.is_integer()), Some(true));
    }

    #[test]
    fn factorize_small_values() {
        let small = |pairs: &[(i64, u32)]| -> Vec<(BigInt, u32)> {
            pairs.iter().map(|&(p, k)| (BigInt::from(p), k)).collect()
        };
        assert_eq!(factorize(&BigInt::from(72), 1_000), small(&[(2, 3), (3, 2)]));
        assert_eq!(factorize(&BigInt::from(97), 1_000), small(&[(97, 1)]));
    }

    #[test]
    fn factorial_is_exact_beyond_machine_width() {
        let value = factorial(40);
        assert_eq!(
            value.to_string(),
            "815915283247897734345611269596115894272000000000"
        );
    }
}
