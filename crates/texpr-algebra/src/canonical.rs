//! Canonical rational-function form.
//!
//! An expression is flattened into a quotient of expanded polynomials whose
//! indeterminates are [`Atom`]s: symbols, constants, prime radicands,
//! non-monomial radicals and opaque applications. Numerator and denominator
//! are kept free of common single-term factors, the denominator is monic, and
//! the difference of two equal expressions has an empty numerator.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::ToPrimitive;
use texpr_core::OracleError;

use crate::config::EngineConfig;
use crate::error::algebra_error;
use crate::expr::{Constant, Expr, Func, Range};
use crate::number::{self, factorize, Number, Rational};
use crate::numeric;

const TRIAL_DIVISION_LIMIT: u64 = 1_000_000;
const MAX_RESOLVE_DEPTH: u32 = 8;
const MAX_FACTORIAL: u64 = 5_000;
const MAX_BINOMIAL_STEPS: i128 = 10_000;

fn division_by_zero() -> OracleError {
    algebra_error("division-by-zero", "division by zero")
}

fn exponent_overflow() -> OracleError {
    algebra_error("exponent-range", "exponent is out of range")
}

fn indeterminate(form: impl std::fmt::Display) -> OracleError {
    algebra_error("indeterminate", format!("{form} is indeterminate"))
}

/// Where a canonical value sits on the extended real line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    Finite,
    Infinite(i8),
}

/// `oo` or `-oo` in canonical form.
fn infinity(sign: i8) -> RatFunc {
    let mono = Monomial::from([(Atom::constant(Constant::Infinity), Rational::one())]);
    RatFunc::from_monomial(mono, Number::int(i128::from(sign.signum())))
}

#[derive(Debug, Clone)]
enum AtomKind {
    Symbol(String),
    Constant(Constant),
    /// Positive integer under a fractional power, usually prime.
    Radicand(BigInt),
    /// Non-monomial base under a fractional power.
    Radical(Box<RatFunc>),
    /// Anything the rewrite rules do not look inside.
    Opaque(Expr),
}

/// Indeterminate of the canonical polynomial ring, ordered by its key.
#[derive(Debug, Clone)]
struct Atom {
    key: String,
    kind: AtomKind,
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Atom {}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Atom {
    fn symbol(name: &str) -> Self {
        Atom {
            key: format!("1:{name}"),
            kind: AtomKind::Symbol(name.to_string()),
        }
    }

    fn constant(constant: Constant) -> Self {
        Atom {
            key: format!("0:{}", constant.name()),
            kind: AtomKind::Constant(constant),
        }
    }

    fn radicand(base: BigInt) -> Self {
        Atom {
            key: format!("0:#{base:040}"),
            kind: AtomKind::Radicand(base),
        }
    }

    fn radical(base: RatFunc) -> Self {
        Atom {
            key: format!("3:{}", base.to_expr()),
            kind: AtomKind::Radical(Box::new(base)),
        }
    }

    fn opaque(expr: Expr) -> Self {
        Atom {
            key: format!("2:{expr}"),
            kind: AtomKind::Opaque(expr),
        }
    }

    fn to_expr(&self) -> Expr {
        match &self.kind {
            AtomKind::Symbol(name) => Expr::Symbol(name.clone()),
            AtomKind::Constant(constant) => Expr::Constant(*constant),
            AtomKind::Radicand(base) => Expr::Number(Number::big(base.clone())),
            AtomKind::Radical(base) => base.to_expr(),
            AtomKind::Opaque(expr) => expr.clone(),
        }
    }

    fn is_positive(&self) -> bool {
        match &self.kind {
            AtomKind::Constant(constant) => constant.is_positive_real(),
            AtomKind::Radicand(_) => true,
            _ => false,
        }
    }

    fn is_constant(&self, constant: Constant) -> bool {
        matches!(self.kind, AtomKind::Constant(c) if c == constant)
    }

    fn is_symbol(&self) -> bool {
        matches!(self.kind, AtomKind::Symbol(_))
    }

    fn applied(&self, func: Func) -> Option<&Expr> {
        match &self.kind {
            AtomKind::Opaque(Expr::Apply(f, args)) if *f == func && args.len() == 1 => {
                Some(&args[0])
            }
            _ => None,
        }
    }
}

type Monomial = BTreeMap<Atom, Rational>;

/// Folds integer parts of radicand exponents and powers of `I` into a
/// numeric factor and drops zero exponents.
///
/// `oo` never reaches a product here: [`Canon`] settles every operation on an
/// infinite operand before polynomial arithmetic runs.
fn normalize_monomial(mono: Monomial) -> (Number, Monomial) {
    let mut factor = Number::one();
    let mut out = Monomial::new();
    for (atom, exp) in mono {
        if exp.is_zero() {
            continue;
        }
        if atom.is_constant(Constant::I) && exp.is_integer() {
            let quarter = exp.numer().mod_floor(&BigInt::from(4)).to_u8().unwrap_or(0);
            if quarter >= 2 {
                factor = factor.neg();
            }
            if quarter % 2 == 1 {
                out.insert(atom, Rational::one());
            }
            continue;
        }
        if let AtomKind::Radicand(base) = &atom.kind {
            let whole = exp.floor();
            let extracted = whole
                .to_i64()
                .and_then(|w| Number::big(base.clone()).powi(w).ok());
            if let Some(value) = extracted {
                factor = factor.mul(&value);
                let rest = exp.sub(&whole);
                if !rest.is_zero() {
                    out.insert(atom, rest);
                }
                continue;
            }
        }
        out.insert(atom, exp);
    }
    (factor, out)
}

fn mul_monomials(a: &Monomial, b: &Monomial) -> (Number, Monomial) {
    let mut merged = a.clone();
    for (atom, exp) in b {
        match merged.entry(atom.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(exp.clone());
            }
            Entry::Occupied(mut slot) => {
                let sum = slot.get().add(exp);
                *slot.get_mut() = sum;
            }
        }
    }
    normalize_monomial(merged)
}

fn pow_monomial(mono: &Monomial, exp: &Rational) -> (Number, Monomial) {
    let scaled = mono
        .iter()
        .map(|(atom, e)| (atom.clone(), e.mul(exp)))
        .collect();
    normalize_monomial(scaled)
}

/// Sum of monomials with numeric coefficients; zero coefficients are never
/// stored.
#[derive(Debug, Clone, PartialEq)]
struct Poly {
    terms: BTreeMap<Monomial, Number>,
}

impl Poly {
    fn zero() -> Self {
        Poly {
            terms: BTreeMap::new(),
        }
    }

    fn constant(value: Number) -> Self {
        Poly::term(Monomial::new(), value)
    }

    fn term(mono: Monomial, coef: Number) -> Self {
        let mut poly = Poly::zero();
        poly.insert(mono, coef);
        poly
    }

    fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    fn is_one(&self) -> bool {
        self.as_constant().map(|c| c.is_one()).unwrap_or(false)
    }

    fn as_constant(&self) -> Option<Number> {
        match self.terms.len() {
            0 => Some(Number::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(mono, _)| mono.is_empty())
                .map(|(_, coef)| coef.clone()),
            _ => None,
        }
    }

    fn single_term(&self) -> Option<(&Monomial, Number)> {
        if self.terms.len() != 1 {
            return None;
        }
        self.terms.iter().next().map(|(mono, coef)| (mono, coef.clone()))
    }

    fn leading_coefficient(&self) -> Option<Number> {
        self.terms.values().next_back().cloned()
    }

    fn insert(&mut self, mono: Monomial, coef: Number) {
        if coef.is_zero() {
            return;
        }
        match self.terms.entry(mono) {
            Entry::Vacant(slot) => {
                slot.insert(coef);
            }
            Entry::Occupied(mut slot) => {
                let sum = slot.get().add(&coef);
                if sum.is_zero() {
                    slot.remove();
                } else {
                    *slot.get_mut() = sum;
                }
            }
        }
    }

    fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (mono, coef) in &other.terms {
            out.insert(mono.clone(), coef.clone());
        }
        out
    }

    fn neg(&self) -> Poly {
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(mono, coef)| (mono.clone(), coef.neg()))
                .collect(),
        }
    }

    fn scale(&self, factor: &Number) -> Poly {
        let mut out = Poly::zero();
        for (mono, coef) in &self.terms {
            out.insert(mono.clone(), coef.mul(factor));
        }
        out
    }

    fn mul(&self, other: &Poly, max_terms: usize) -> Result<Poly, OracleError> {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                let (factor, mono) = mul_monomials(ma, mb);
                out.insert(mono, ca.mul(cb).mul(&factor));
                if out.terms.len() > max_terms {
                    return Err(algebra_error(
                        "expansion-limit",
                        format!("expansion exceeds {max_terms} terms"),
                    ));
                }
            }
        }
        Ok(out)
    }

    fn atoms(&self) -> impl Iterator<Item = (&Atom, &Rational)> {
        self.terms.keys().flat_map(|mono| mono.iter())
    }
}

fn power_expr(atom: &Atom, exp: &Rational) -> Expr {
    if exp.is_one() {
        atom.to_expr()
    } else {
        Expr::pow(atom.to_expr(), Expr::rational(exp.clone()))
    }
}

fn term_expr(mono: &Monomial, coef: &Number) -> Expr {
    let mut factors = Vec::new();
    if !coef.is_one() || mono.is_empty() {
        factors.push(Expr::Number(coef.clone()));
    }
    let (positive, negative): (Vec<_>, Vec<_>) =
        mono.iter().partition(|(_, exp)| !exp.is_negative());
    for (atom, exp) in positive.into_iter().chain(negative) {
        factors.push(power_expr(atom, exp));
    }
    if factors.len() == 1 {
        factors.remove(0)
    } else {
        Expr::Mul(factors)
    }
}

fn poly_expr(poly: &Poly) -> Expr {
    let mut terms: Vec<Expr> = poly
        .terms
        .iter()
        .rev()
        .map(|(mono, coef)| term_expr(mono, coef))
        .collect();
    match terms.len() {
        0 => Expr::int(0),
        1 => terms.remove(0),
        _ => Expr::Add(terms),
    }
}

/// Quotient of two canonical polynomials.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RatFunc {
    num: Poly,
    den: Poly,
}

impl RatFunc {
    fn from_parts(num: Poly) -> Self {
        RatFunc {
            num,
            den: Poly::constant(Number::one()),
        }
    }

    fn constant(value: Number) -> Self {
        RatFunc::from_parts(Poly::constant(value))
    }

    fn zero() -> Self {
        RatFunc::from_parts(Poly::zero())
    }

    fn one() -> Self {
        RatFunc::constant(Number::one())
    }

    fn from_monomial(mono: Monomial, coef: Number) -> Self {
        RatFunc::from_parts(Poly::term(mono, coef))
    }

    fn atom(atom: Atom, exp: Rational) -> Self {
        let (factor, mono) = normalize_monomial(Monomial::from([(atom, exp)]));
        RatFunc::from_monomial(mono, factor)
    }

    /// Whether the numerator vanished.
    pub(crate) fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn has_infinity(&self) -> bool {
        self.num
            .atoms()
            .chain(self.den.atoms())
            .any(|(atom, _)| atom.is_constant(Constant::Infinity))
    }

    /// Finite, or a signed infinity; anything else mixing `oo` into an
    /// expression has no canonical value.
    fn reach(&self) -> Result<Reach, OracleError> {
        if !self.has_infinity() {
            return Ok(Reach::Finite);
        }
        if let Some((mono, coef)) = self.as_monomial() {
            let mut atoms = mono.iter();
            if let (Some((atom, exp)), None) = (atoms.next(), atoms.next()) {
                if atom.is_constant(Constant::Infinity) && exp.is_one() && !coef.is_zero() {
                    return Ok(Reach::Infinite(if coef.is_negative() { -1 } else { 1 }));
                }
            }
        }
        Err(indeterminate(self.to_expr()))
    }

    fn is_closed(&self) -> bool {
        self.to_expr().free_symbols().is_empty()
    }

    fn as_constant(&self) -> Option<Number> {
        let num = self.num.as_constant()?;
        let den = self.den.as_constant()?;
        num.div(&den).ok()
    }

    fn as_monomial(&self) -> Option<(&Monomial, Number)> {
        if !self.den.is_one() {
            return None;
        }
        self.num.single_term()
    }

    fn as_single_atom(&self) -> Option<&Atom> {
        let (mono, coef) = self.as_monomial()?;
        if !coef.is_one() || mono.len() != 1 {
            return None;
        }
        mono.iter()
            .next()
            .filter(|(_, exp)| exp.is_one())
            .map(|(atom, _)| atom)
    }

    fn is_e(&self) -> bool {
        self.as_single_atom()
            .map(|atom| atom.is_constant(Constant::E))
            .unwrap_or(false)
    }

    /// `c + rest` for a polynomial with an exact nonzero constant term.
    fn split_constant(&self) -> Option<(Number, RatFunc)> {
        if !self.den.is_one() || self.num.terms.len() < 2 {
            return None;
        }
        let constant = self.num.terms.get(&Monomial::new()).cloned()?;
        if constant.is_float() {
            return None;
        }
        let mut rest = self.num.clone();
        rest.terms.remove(&Monomial::new());
        Some((constant, RatFunc::from_parts(rest)))
    }

    fn leading_is_negative(&self) -> bool {
        self.num
            .leading_coefficient()
            .map(|c| c.is_negative())
            .unwrap_or(false)
    }

    fn is_positive_constant(&self) -> bool {
        match self.as_monomial() {
            Some((mono, coef)) => {
                !coef.is_negative() && !coef.is_zero() && mono.keys().all(Atom::is_positive)
            }
            None => false,
        }
    }

    /// Expression tree of the canonical form.
    pub(crate) fn to_expr(&self) -> Expr {
        let num = poly_expr(&self.num);
        if self.den.is_one() {
            return num;
        }
        Expr::mul(num, Expr::recip(poly_expr(&self.den)))
    }
}

fn exponentials_combine(mono: &Monomial) -> bool {
    let mut count = 0;
    let mut non_unit = false;
    let mut has_e = false;
    for (atom, exp) in mono {
        if atom.is_constant(Constant::E) {
            has_e = true;
        } else if exp.is_integer() && atom.applied(Func::Exp).is_some() {
            count += 1;
            non_unit |= !exp.is_one();
        }
    }
    count >= 2 || (count == 1 && (non_unit || has_e))
}

fn term_needs_resolve(mono: &Monomial) -> bool {
    let big_radical = mono.iter().any(|(atom, exp)| {
        matches!(atom.kind, AtomKind::Radical(_)) && exp.numer().magnitude() >= exp.denom().magnitude()
    });
    big_radical || exponentials_combine(mono)
}

fn float_power(base: Number, exp: f64) -> Result<Number, OracleError> {
    let b = base.to_f64();
    if b == 0.0 && exp < 0.0 {
        return Err(division_by_zero());
    }
    if b < 0.0 && exp.fract() != 0.0 {
        return Err(algebra_error("complex-result", "expression has a complex value"));
    }
    Ok(Number::Float(b.powf(exp)))
}

fn radicand_power(n: &BigInt, exp: &Rational) -> RatFunc {
    let mono = factorize(n, TRIAL_DIVISION_LIMIT)
        .into_iter()
        .map(|(prime, multiplicity)| {
            let e = exp.mul(&Rational::integer(i128::from(multiplicity)));
            (Atom::radicand(prime), e)
        })
        .collect();
    let (factor, mono) = normalize_monomial(mono);
    RatFunc::from_monomial(mono, factor)
}

fn distributes(mono: &Monomial) -> bool {
    let mut others = mono.iter().filter(|(atom, _)| !atom.is_positive());
    match (others.next(), others.next()) {
        (None, _) => true,
        (Some((_, exp)), None) => *exp > Rational::integer(-1) && *exp <= Rational::one(),
        _ => false,
    }
}

fn half() -> Rational {
    Rational::new(1, 2).unwrap_or_else(Rational::one)
}

fn half_root(n: i128) -> Expr {
    Expr::mul(
        Expr::rational(half()),
        Expr::pow(Expr::int(n), Expr::rational(half())),
    )
}

/// `sin(k*pi/12)` for `k` in `0..24`, where a closed form is tabulated.
fn sine_twelfths(k: i128) -> Option<Expr> {
    if k >= 12 {
        return sine_twelfths(k - 12).map(Expr::neg);
    }
    match k {
        0 => Some(Expr::int(0)),
        2 | 10 => Some(Expr::rational(half())),
        3 | 9 => Some(half_root(2)),
        4 | 8 => Some(half_root(3)),
        6 => Some(Expr::int(1)),
        _ => None,
    }
}

fn sine_of_pi_multiple(r: &Rational) -> Option<Expr> {
    let twelfths = r.mul(&Rational::integer(12));
    if !twelfths.is_integer() {
        return None;
    }
    sine_twelfths(twelfths.numer().mod_floor(&BigInt::from(24)).to_i128()?)
}

fn cosine_of_pi_multiple(r: &Rational) -> Option<Expr> {
    sine_of_pi_multiple(&r.add(&half()))
}

fn pi_multiple(arg: &RatFunc) -> Option<Rational> {
    if arg.is_zero() {
        return Some(Rational::zero());
    }
    let (mono, coef) = arg.as_monomial()?;
    let r = coef.as_rational()?;
    let mut atoms = mono.iter();
    match (atoms.next(), atoms.next()) {
        (Some((atom, exp)), None) if exp.is_one() && atom.is_constant(Constant::Pi) => Some(r),
        _ => None,
    }
}

fn inverse_trig_value(func: Func, q: &Rational) -> Option<Expr> {
    let (n, d) = (q.numer().to_i128()?, q.denom().to_i128()?);
    let ratio = match (func, n, d) {
        (Func::Asin, 0, _) | (Func::Atan, 0, _) | (Func::Acos, 1, 1) => Rational::zero(),
        (Func::Asin, 1, 2) => Rational::new(1, 6)?,
        (Func::Asin, 1, 1) => half(),
        (Func::Atan, 1, 1) => Rational::new(1, 4)?,
        (Func::Acos, 1, 2) => Rational::new(1, 3)?,
        (Func::Acos, 0, _) => half(),
        (Func::Acos, -1, 2) => Rational::new(2, 3)?,
        (Func::Acos, -1, 1) => Rational::one(),
        _ => return None,
    };
    Some(Expr::mul(Expr::rational(ratio), Expr::Constant(Constant::Pi)))
}

fn factorial(q: &Rational) -> Result<Option<Number>, OracleError> {
    if !q.is_integer() {
        return Ok(None);
    }
    if q.is_negative() {
        return Err(algebra_error(
            "factorial-domain",
            format!("factorial({q}) is undefined"),
        ));
    }
    match q.to_i64().and_then(|n| u64::try_from(n).ok()) {
        Some(n) if n <= MAX_FACTORIAL => Ok(Some(Number::big(number::factorial(n)))),
        _ => Err(algebra_error(
            "factorial-range",
            format!("factorial({q}) is too large"),
        )),
    }
}

fn binomial_exact(n: i128, k: i128) -> Result<Number, OracleError> {
    if k < 0 || (n >= 0 && k > n) {
        return Ok(Number::zero());
    }
    let k = if n >= 0 { k.min(n - k) } else { k };
    if k > MAX_BINOMIAL_STEPS {
        return Err(algebra_error(
            "binomial-range",
            format!("binomial({n}, {k}) is too large"),
        ));
    }
    let mut acc = Number::one();
    for i in 0..k {
        acc = acc
            .mul(&Number::big(BigInt::from(n) - i))
            .div(&Number::int(i + 1))?;
    }
    Ok(acc)
}

/// Rewriter into [`RatFunc`] form.
pub(crate) struct Canon<'a> {
    config: &'a EngineConfig,
    depth: Cell<u32>,
}

impl<'a> Canon<'a> {
    pub(crate) fn new(config: &'a EngineConfig) -> Self {
        Canon {
            config,
            depth: Cell::new(0),
        }
    }

    /// Canonical form of `expr`.
    pub(crate) fn convert(&self, expr: &Expr) -> Result<RatFunc, OracleError> {
        match expr {
            Expr::Number(n) => Ok(RatFunc::constant(n.clone())),
            Expr::Symbol(name) => Ok(RatFunc::atom(Atom::symbol(name), Rational::one())),
            Expr::Constant(Constant::Infinity) => Ok(infinity(1)),
            Expr::Constant(c) => Ok(RatFunc::atom(Atom::constant(*c), Rational::one())),
            Expr::Add(terms) => terms.iter().try_fold(RatFunc::zero(), |acc, term| {
                self.add(&acc, &self.convert(term)?)
            }),
            Expr::Mul(factors) => factors.iter().try_fold(RatFunc::one(), |acc, factor| {
                self.mul(&acc, &self.convert(factor)?)
            }),
            Expr::Pow(base, exp) => {
                let base = self.convert(base)?;
                let exp = self.convert(exp)?;
                self.pow(&base, &exp)
            }
            Expr::Apply(func, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.convert(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(*func, &args)
            }
            Expr::Integral {
                integrand,
                var,
                bounds,
            } => {
                let bounds = match bounds {
                    Some(b) => Some(Box::new((self.simplify(&b.0)?, self.simplify(&b.1)?))),
                    None => None,
                };
                Ok(self.opaque(Expr::Integral {
                    integrand: Box::new(self.simplify(integrand)?),
                    var: var.clone(),
                    bounds,
                }))
            }
            Expr::Limit {
                expr,
                var,
                point,
                dir,
            } => Ok(self.opaque(Expr::Limit {
                expr: Box::new(self.simplify(expr)?),
                var: var.clone(),
                point: Box::new(self.simplify(point)?),
                dir: *dir,
            })),
            Expr::Sum { body, range } => Ok(self.opaque(Expr::Sum {
                body: Box::new(self.simplify(body)?),
                range: Box::new(self.simplify_range(range)?),
            })),
            Expr::Product { body, range } => Ok(self.opaque(Expr::Product {
                body: Box::new(self.simplify(body)?),
                range: Box::new(self.simplify_range(range)?),
            })),
        }
    }

    fn simplify(&self, expr: &Expr) -> Result<Expr, OracleError> {
        Ok(self.convert(expr)?.to_expr())
    }

    fn simplify_range(&self, range: &Range) -> Result<Range, OracleError> {
        Ok(Range {
            var: range.var.clone(),
            lower: self.simplify(&range.lower)?,
            upper: self.simplify(&range.upper)?,
        })
    }

    fn opaque(&self, expr: Expr) -> RatFunc {
        RatFunc::atom(Atom::opaque(expr), Rational::one())
    }

    /// Sign of a finite closed value, when it can be told apart from zero.
    fn sign_of(&self, rf: &RatFunc) -> Option<i8> {
        if let Some(c) = rf.as_constant() {
            return Some(if c.is_zero() {
                0
            } else if c.is_negative() {
                -1
            } else {
                1
            });
        }
        if rf.is_positive_constant() {
            return Some(1);
        }
        if !rf.is_closed() {
            return None;
        }
        match numeric::evaluate(&rf.to_expr(), self.config) {
            Ok(v) if v.is_finite() && v.abs() > 1e-9 => Some(if v < 0.0 { -1 } else { 1 }),
            _ => None,
        }
    }

    /// `a + b` when either side is infinite.
    fn add_extended(&self, a: &RatFunc, b: &RatFunc) -> Result<Option<RatFunc>, OracleError> {
        match (a.reach()?, b.reach()?) {
            (Reach::Finite, Reach::Finite) => Ok(None),
            (Reach::Infinite(s), Reach::Infinite(t)) if s == t => Ok(Some(infinity(s))),
            (Reach::Infinite(_), Reach::Infinite(_)) => Err(indeterminate("oo - oo")),
            (Reach::Infinite(s), Reach::Finite) | (Reach::Finite, Reach::Infinite(s)) => {
                let finite = if a.has_infinity() { b } else { a };
                if finite.is_closed() {
                    Ok(Some(infinity(s)))
                } else {
                    Err(indeterminate(format!("{} + {}", a.to_expr(), b.to_expr())))
                }
            }
        }
    }

    /// `a * b` when either side is infinite.
    fn mul_extended(&self, a: &RatFunc, b: &RatFunc) -> Result<Option<RatFunc>, OracleError> {
        match (a.reach()?, b.reach()?) {
            (Reach::Finite, Reach::Finite) => Ok(None),
            (Reach::Infinite(s), Reach::Infinite(t)) => Ok(Some(infinity(s * t))),
            (Reach::Infinite(s), Reach::Finite) | (Reach::Finite, Reach::Infinite(s)) => {
                let finite = if a.has_infinity() { b } else { a };
                match self.sign_of(finite) {
                    Some(0) => Err(indeterminate("0*oo")),
                    Some(t) => Ok(Some(infinity(s * t))),
                    None => Err(indeterminate(format!("({})*({})", a.to_expr(), b.to_expr()))),
                }
            }
        }
    }

    /// `base ** exp` when either side is infinite.
    fn pow_extended(&self, base: &RatFunc, exp: &RatFunc) -> Result<Option<RatFunc>, OracleError> {
        let form = || indeterminate(format!("({})**({})", base.to_expr(), exp.to_expr()));
        match (base.reach()?, exp.reach()?) {
            (Reach::Finite, Reach::Finite) => Ok(None),
            (Reach::Infinite(s), Reach::Finite) => {
                let Some(n) = exp.as_constant() else {
                    return Err(form());
                };
                if let Some(k) = n.as_rational().filter(Rational::is_integer).and_then(|r| r.to_i64()) {
                    return self.powi(base, k).map(Some);
                }
                if n.is_negative() {
                    Ok(Some(RatFunc::zero()))
                } else if s > 0 {
                    Ok(Some(infinity(1)))
                } else {
                    Err(form())
                }
            }
            (Reach::Infinite(s), Reach::Infinite(t)) => match (s, t) {
                (1, 1) => Ok(Some(infinity(1))),
                (1, _) => Ok(Some(RatFunc::zero())),
                _ => Err(form()),
            },
            (Reach::Finite, Reach::Infinite(t)) => {
                if !base.is_closed() {
                    return Err(form());
                }
                let b = numeric::evaluate(&base.to_expr(), self.config).map_err(|_| form())?;
                let grows = if b > 1.0 + 1e-9 {
                    t > 0
                } else if b.abs() < 1.0 - 1e-9 {
                    t < 0
                } else {
                    return Err(form());
                };
                if b == 0.0 && t < 0 {
                    return Err(division_by_zero());
                }
                if grows && b < 0.0 {
                    return Err(form());
                }
                Ok(Some(if grows { infinity(1) } else { RatFunc::zero() }))
            }
        }
    }

    /// `func(±oo)` for the functions with a limit there.
    fn apply_extended(&self, func: Func, args: &[RatFunc]) -> Result<Option<RatFunc>, OracleError> {
        let mut sign = None;
        for arg in args {
            if let Reach::Infinite(s) = arg.reach()? {
                sign = Some(s);
            }
        }
        let Some(s) = sign else {
            return Ok(None);
        };
        let form = || indeterminate(format!("{}({})", func.name(), args[0].to_expr()));
        if args.len() != 1 {
            return Err(form());
        }
        let value = match (func, s) {
            (Func::Exp | Func::Log | Func::Sinh | Func::Factorial, 1) => infinity(1),
            (Func::Exp, _) => RatFunc::zero(),
            (Func::Sinh | Func::Floor | Func::Ceiling, _) => infinity(s),
            (Func::Cosh | Func::Abs, _) => infinity(1),
            (Func::Tanh, _) => RatFunc::constant(Number::int(i128::from(s))),
            (Func::Atan, _) => self.convert(&Expr::mul(
                Expr::rational(half().mul(&Rational::integer(i128::from(s)))),
                Expr::Constant(Constant::Pi),
            ))?,
            _ => return Err(form()),
        };
        Ok(Some(value))
    }

    fn pmul(&self, a: &Poly, b: &Poly) -> Result<Poly, OracleError> {
        a.mul(b, self.config.max_terms)
    }

    fn add(&self, a: &RatFunc, b: &RatFunc) -> Result<RatFunc, OracleError> {
        if a.is_zero() {
            return Ok(b.clone());
        }
        if b.is_zero() {
            return Ok(a.clone());
        }
        if let Some(value) = self.add_extended(a, b)? {
            return Ok(value);
        }
        let combined = if a.den == b.den {
            RatFunc {
                num: a.num.add(&b.num),
                den: a.den.clone(),
            }
        } else {
            RatFunc {
                num: self
                    .pmul(&a.num, &b.den)?
                    .add(&self.pmul(&b.num, &a.den)?),
                den: self.pmul(&a.den, &b.den)?,
            }
        };
        self.finish(combined)
    }

    fn neg(&self, a: &RatFunc) -> RatFunc {
        RatFunc {
            num: a.num.neg(),
            den: a.den.clone(),
        }
    }

    fn mul(&self, a: &RatFunc, b: &RatFunc) -> Result<RatFunc, OracleError> {
        if let Some(value) = self.mul_extended(a, b)? {
            return Ok(value);
        }
        let combined = RatFunc {
            num: self.pmul(&a.num, &b.num)?,
            den: self.pmul(&a.den, &b.den)?,
        };
        self.finish(combined)
    }

    fn recip(&self, a: &RatFunc) -> Result<RatFunc, OracleError> {
        if a.is_zero() {
            return Err(division_by_zero());
        }
        if let Reach::Infinite(_) = a.reach()? {
            return Ok(RatFunc::zero());
        }
        self.finish(RatFunc {
            num: a.den.clone(),
            den: a.num.clone(),
        })
    }

    fn powi(&self, a: &RatFunc, n: i64) -> Result<RatFunc, OracleError> {
        if let Reach::Infinite(s) = a.reach()? {
            return Ok(match n.cmp(&0) {
                Ordering::Greater => infinity(if n % 2 == 0 { 1 } else { s }),
                Ordering::Equal => RatFunc::one(),
                Ordering::Less => RatFunc::zero(),
            });
        }
        if n == 0 {
            return Ok(RatFunc::one());
        }
        if n < 0 {
            let positive = n.checked_neg().ok_or_else(exponent_overflow)?;
            return self.powi(&self.recip(a)?, positive);
        }
        if let Some((mono, coef)) = a.as_monomial() {
            let (factor, mono) = pow_monomial(mono, &Rational::integer(i128::from(n)));
            let coef = coef.powi(n)?.mul(&factor);
            return self.finish(RatFunc::from_monomial(mono, coef));
        }
        if n > i64::from(self.config.max_power) {
            return Err(algebra_error(
                "expansion-limit",
                format!("refusing to expand a multi-term power of degree {n}"),
            ));
        }
        let mut result = RatFunc::one();
        let mut base = a.clone();
        let mut k = n;
        while k > 0 {
            if k & 1 == 1 {
                result = self.mul(&result, &base)?;
            }
            k >>= 1;
            if k > 0 {
                base = self.mul(&base, &base)?;
            }
        }
        Ok(result)
    }

    fn finish(&self, rf: RatFunc) -> Result<RatFunc, OracleError> {
        let rf = self.normalize(rf)?;
        let pending = rf
            .num
            .terms
            .keys()
            .chain(rf.den.terms.keys())
            .any(term_needs_resolve);
        if !pending || self.depth.get() >= MAX_RESOLVE_DEPTH {
            return Ok(rf);
        }
        self.depth.set(self.depth.get() + 1);
        let outcome = self.resolve(&rf);
        self.depth.set(self.depth.get() - 1);
        outcome
    }

    fn normalize(&self, rf: RatFunc) -> Result<RatFunc, OracleError> {
        if rf.num.is_zero() {
            return Ok(RatFunc::zero());
        }
        if rf.den.is_zero() {
            return Err(division_by_zero());
        }
        if let Some((mono, coef)) = rf.den.single_term() {
            let (factor, inverse) = pow_monomial(mono, &Rational::integer(-1));
            let scale = factor.div(&coef)?;
            let num = self.pmul(&rf.num, &Poly::term(inverse, scale))?;
            return Ok(RatFunc::from_parts(num));
        }
        let lead = rf.den.leading_coefficient().unwrap_or_else(Number::one);
        if lead.is_one() {
            return Ok(rf);
        }
        let inv = Number::one().div(&lead)?;
        Ok(RatFunc {
            num: rf.num.scale(&inv),
            den: rf.den.scale(&inv),
        })
    }

    fn resolve(&self, rf: &RatFunc) -> Result<RatFunc, OracleError> {
        let num = self.resolve_poly(&rf.num)?;
        let den = self.resolve_poly(&rf.den)?;
        self.mul(&num, &self.recip(&den)?)
    }

    fn resolve_poly(&self, poly: &Poly) -> Result<RatFunc, OracleError> {
        let mut plain = Poly::zero();
        let mut rewritten = Vec::new();
        for (mono, coef) in &poly.terms {
            if term_needs_resolve(mono) {
                rewritten.push(self.resolve_term(mono, coef.clone())?);
            } else {
                plain.insert(mono.clone(), coef.clone());
            }
        }
        rewritten
            .iter()
            .try_fold(RatFunc::from_parts(plain), |acc, term| self.add(&acc, term))
    }

    /// Expands whole powers of radicals and merges exponentials of one term.
    fn resolve_term(&self, mono: &Monomial, coef: Number) -> Result<RatFunc, OracleError> {
        let combine = exponentials_combine(mono);
        let mut rest = Monomial::new();
        let mut pending = Vec::new();
        let mut exponent = Vec::new();
        for (atom, exp) in mono {
            if let AtomKind::Radical(base) = &atom.kind {
                let whole = exp.trunc();
                if !whole.is_zero() {
                    let frac = exp.sub(&whole);
                    if !frac.is_zero() {
                        rest.insert(atom.clone(), frac);
                    }
                    let whole = whole.to_i64().ok_or_else(exponent_overflow)?;
                    pending.push(self.powi(base, whole)?);
                    continue;
                }
            }
            if combine {
                if atom.is_constant(Constant::E) {
                    exponent.push(Expr::rational(exp.clone()));
                    continue;
                }
                if let Some(arg) = atom.applied(Func::Exp).filter(|_| exp.is_integer()) {
                    exponent.push(Expr::mul(Expr::rational(exp.clone()), arg.clone()));
                    continue;
                }
            }
            rest.insert(atom.clone(), exp.clone());
        }
        if !exponent.is_empty() {
            let arg = self.convert(&Expr::Add(exponent))?;
            pending.push(self.exp(&arg)?);
        }
        let (factor, rest) = normalize_monomial(rest);
        pending.iter().try_fold(
            RatFunc::from_monomial(rest, coef.mul(&factor)),
            |acc, part| self.mul(&acc, part),
        )
    }

    fn pow(&self, base: &RatFunc, exp: &RatFunc) -> Result<RatFunc, OracleError> {
        if let Some(value) = self.pow_extended(base, exp)? {
            return Ok(value);
        }
        if let Some(n) = exp.as_constant() {
            return match n {
                Number::Exact(r) if r.is_integer() => {
                    let k = r.to_i64().ok_or_else(exponent_overflow)?;
                    if base.is_zero() {
                        return match k.cmp(&0) {
                            Ordering::Greater => Ok(RatFunc::zero()),
                            Ordering::Equal => Ok(RatFunc::one()),
                            Ordering::Less => Err(division_by_zero()),
                        };
                    }
                    self.powi(base, k)
                }
                Number::Exact(r) => self.pow_fraction(base, &r),
                Number::Float(v) => match base.as_constant() {
                    Some(b) => float_power(b, v).map(RatFunc::constant),
                    None => Ok(self.opaque(Expr::pow(base.to_expr(), exp.to_expr()))),
                },
            };
        }
        if base.is_e() {
            return self.exp(exp);
        }
        if base.as_constant().map(|c| c.is_one()).unwrap_or(false) {
            return Ok(RatFunc::one());
        }
        if let Some((constant, rest)) = exp.split_constant() {
            let head = self.pow(base, &RatFunc::constant(constant))?;
            return self.mul(&head, &self.pow(base, &rest)?);
        }
        Ok(self.opaque(Expr::pow(base.to_expr(), exp.to_expr())))
    }

    fn pow_fraction(&self, base: &RatFunc, r: &Rational) -> Result<RatFunc, OracleError> {
        if let Some(value) = base.as_constant() {
            return self.number_root(value, r);
        }
        if let Some((mono, coef)) = base.as_monomial() {
            if !coef.is_negative() && distributes(mono) {
                let (factor, scaled) = pow_monomial(mono, r);
                let coef_part = self.number_root(coef, r)?;
                let atoms = self.finish(RatFunc::from_monomial(scaled, factor))?;
                return self.mul(&coef_part, &atoms);
            }
        }
        let whole = r.trunc();
        let radical = RatFunc::atom(Atom::radical(base.clone()), r.sub(&whole));
        if whole.is_zero() {
            return Ok(radical);
        }
        let whole = whole.to_i64().ok_or_else(exponent_overflow)?;
        self.mul(&self.powi(base, whole)?, &radical)
    }

    fn number_root(&self, value: Number, r: &Rational) -> Result<RatFunc, OracleError> {
        let q = match value {
            Number::Float(_) => return float_power(value, r.to_f64()).map(RatFunc::constant),
            Number::Exact(q) => q,
        };
        if q.is_zero() {
            return if r.is_negative() {
                Err(division_by_zero())
            } else {
                Ok(RatFunc::zero())
            };
        }
        if q.is_negative() {
            if *r.denom() == BigInt::from(2) {
                let unit = RatFunc::atom(
                    Atom::constant(Constant::I),
                    Rational::from_integer(r.numer().clone()),
                );
                return self.mul(&unit, &self.number_root(Number::Exact(q.neg()), r)?);
            }
            return Ok(self.opaque(Expr::pow(Expr::rational(q), Expr::rational(r.clone()))));
        }
        let top = radicand_power(q.numer(), r);
        let bottom = radicand_power(q.denom(), &r.neg());
        self.mul(&top, &bottom)
    }

    fn exp(&self, arg: &RatFunc) -> Result<RatFunc, OracleError> {
        match arg.as_constant() {
            Some(Number::Exact(q)) => return Ok(RatFunc::atom(Atom::constant(Constant::E), q)),
            Some(Number::Float(v)) => return Ok(RatFunc::constant(Number::Float(v.exp()))),
            None => {}
        }
        if let Some(inner) = arg.as_single_atom().and_then(|atom| atom.applied(Func::Log)) {
            return self.convert(inner);
        }
        Ok(self.opaque(Expr::apply(Func::Exp, arg.to_expr())))
    }

    fn log(&self, arg: &RatFunc) -> Result<RatFunc, OracleError> {
        match arg.as_constant() {
            Some(c) if c.is_zero() => {
                return Err(algebra_error("log-zero", "log(0) is undefined"));
            }
            Some(c) if c.is_one() => return Ok(RatFunc::zero()),
            _ => {}
        }
        if let Some((mono, coef)) = arg.as_monomial() {
            let mut atoms = mono.iter();
            if let (true, Some((atom, exp)), None) = (coef.is_one(), atoms.next(), atoms.next()) {
                if atom.is_constant(Constant::E) {
                    return Ok(RatFunc::constant(Number::Exact(exp.clone())));
                }
            }
        }
        Ok(self.opaque(Expr::apply(Func::Log, arg.to_expr())))
    }

    fn binomial(&self, n: &RatFunc, k: &RatFunc) -> Result<RatFunc, OracleError> {
        if let (Some(Number::Exact(n)), Some(Number::Exact(k))) = (n.as_constant(), k.as_constant())
        {
            if n.is_integer() && k.is_integer() {
                return match (n.to_i128(), k.to_i128()) {
                    (Some(n), Some(k)) => binomial_exact(n, k).map(RatFunc::constant),
                    _ => Err(algebra_error(
                        "binomial-range",
                        format!("binomial({n}, {k}) is too large"),
                    )),
                };
            }
        }
        Ok(self.opaque(Expr::Apply(
            Func::Binomial,
            vec![n.to_expr(), k.to_expr()],
        )))
    }

    fn apply(&self, func: Func, args: &[RatFunc]) -> Result<RatFunc, OracleError> {
        if args.len() != func.arity() {
            return Err(algebra_error(
                "arity",
                format!("{}() takes {} argument(s)", func.name(), func.arity()),
            ));
        }
        if let Some(value) = self.apply_extended(func, args)? {
            return Ok(value);
        }
        let constants: Option<Vec<Number>> = args.iter().map(RatFunc::as_constant).collect();
        if let Some(values) = constants {
            if values.iter().any(Number::is_float) {
                let floats: Vec<f64> = values.iter().map(Number::to_f64).collect();
                let value = numeric::apply_f64(func, &floats)?;
                return Ok(RatFunc::constant(Number::Float(value)));
            }
        }
        match func {
            Func::Exp => return self.exp(&args[0]),
            Func::Log => return self.log(&args[0]),
            Func::Binomial => return self.binomial(&args[0], &args[1]),
            _ => {}
        }
        let arg = &args[0];
        if (func.is_odd() || func.is_even()) && arg.leading_is_negative() {
            let flipped = self.apply(func, &[self.neg(arg)])?;
            return Ok(if func.is_odd() {
                self.neg(&flipped)
            } else {
                flipped
            });
        }
        if let Some(value) = self.special_value(func, arg)? {
            return Ok(value);
        }
        Ok(self.opaque(Expr::apply(func, arg.to_expr())))
    }

    fn special_value(&self, func: Func, arg: &RatFunc) -> Result<Option<RatFunc>, OracleError> {
        if let Some(r) = pi_multiple(arg) {
            let value = match func {
                Func::Sin => sine_of_pi_multiple(&r),
                Func::Cos => cosine_of_pi_multiple(&r),
                Func::Tan => match (sine_of_pi_multiple(&r), cosine_of_pi_multiple(&r)) {
                    (Some(_), Some(cos)) if cos.is_zero_literal() => {
                        return Err(algebra_error(
                            "pole",
                            format!("tan({}) is undefined", arg.to_expr()),
                        ));
                    }
                    (Some(sin), Some(cos)) => Some(Expr::div(sin, cos)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(expr) = value {
                return self.convert(&expr).map(Some);
            }
        }
        if let Some(Number::Exact(q)) = arg.as_constant() {
            let value = match func {
                Func::Sin | Func::Tan | Func::Sinh | Func::Tanh if q.is_zero() => Some(Expr::int(0)),
                Func::Cos | Func::Cosh if q.is_zero() => Some(Expr::int(1)),
                Func::Asin | Func::Acos | Func::Atan => inverse_trig_value(func, &q),
                Func::Abs => Some(Expr::rational(q.abs())),
                Func::Floor => Some(Expr::rational(q.floor())),
                Func::Ceiling => Some(Expr::rational(q.ceil())),
                Func::Factorial => return Ok(factorial(&q)?.map(RatFunc::constant)),
                _ => None,
            };
            return match value {
                Some(expr) => self.convert(&expr).map(Some),
                None => Ok(None),
            };
        }
        match func {
            Func::Abs if arg.is_positive_constant() => Ok(Some(arg.clone())),
            Func::Floor | Func::Ceiling if arg.to_expr().free_symbols().is_empty() => {
                let value = numeric::evaluate(&arg.to_expr(), self.config);
                match value {
                    Ok(v) if v.is_finite() && (v - v.round()).abs() > 1e-9 => {
                        let rounded = if func == Func::Floor { v.floor() } else { v.ceil() };
                        Ok(Rational::from_f64_exact(rounded)
                            .map(|r| RatFunc::constant(Number::Exact(r))))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

/// One product term of an expanded numerator.
#[derive(Debug, Clone)]
pub(crate) struct Term {
    pub(crate) coef: Number,
    pub(crate) factors: Vec<(Expr, Rational)>,
}

impl Term {
    pub(crate) fn to_expr(&self) -> Expr {
        let mut factors = Vec::new();
        if !self.coef.is_one() || self.factors.is_empty() {
            factors.push(Expr::Number(self.coef.clone()));
        }
        for (base, exp) in &self.factors {
            factors.push(if exp.is_one() {
                base.clone()
            } else {
                Expr::pow(base.clone(), Expr::rational(exp.clone()))
            });
        }
        if factors.len() == 1 {
            factors.remove(0)
        } else {
            Expr::Mul(factors)
        }
    }
}

/// Canonical simplified form of `expr`.
pub fn simplify(expr: &Expr, config: &EngineConfig) -> Result<Expr, OracleError> {
    Ok(Canon::new(config).convert(expr)?.to_expr())
}

/// Whether `expr` rewrites to zero.
pub fn is_zero(expr: &Expr, config: &EngineConfig) -> Result<bool, OracleError> {
    Ok(Canon::new(config).convert(expr)?.is_zero())
}

/// Expanded numerator terms of `expr` together with its denominator.
pub(crate) fn expand(expr: &Expr, config: &EngineConfig) -> Result<(Vec<Term>, Expr), OracleError> {
    let rf = Canon::new(config).convert(expr)?;
    let terms = rf
        .num
        .terms
        .iter()
        .rev()
        .map(|(mono, coef)| Term {
            coef: coef.clone(),
            factors: mono
                .iter()
                .map(|(atom, exp)| (atom.to_expr(), exp.clone()))
                .collect(),
        })
        .collect();
    Ok((terms, poly_expr(&rf.den)))
}

/// `expr` as `numerator / denominator` with no negative exponents left in
/// either part.
pub(crate) fn fraction(expr: &Expr, config: &EngineConfig) -> Result<(Expr, Expr), OracleError> {
    let rf = Canon::new(config).convert(expr)?;
    let mut lift = Monomial::new();
    for (atom, exp) in rf.num.atoms().chain(rf.den.atoms()) {
        if !exp.is_negative() {
            continue;
        }
        let magnitude = exp.neg();
        match lift.entry(atom.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(magnitude);
            }
            Entry::Occupied(mut slot) => {
                if magnitude > *slot.get() {
                    *slot.get_mut() = magnitude;
                }
            }
        }
    }
    if lift.is_empty() {
        return Ok((poly_expr(&rf.num), poly_expr(&rf.den)));
    }
    let multiplier = Poly::term(lift, Number::one());
    let num = rf.num.mul(&multiplier, config.max_terms)?;
    let den = rf.den.mul(&multiplier, config.max_terms)?;
    Ok((poly_expr(&num), poly_expr(&den)))
}

/// Whether `expr` is a polynomial in `var` with coefficients free of it.
pub(crate) fn is_polynomial_in(expr: &Expr, var: &str, config: &EngineConfig) -> Result<bool, OracleError> {
    let rf = Canon::new(config).convert(expr)?;
    if rf.den.atoms().any(|(atom, _)| atom.to_expr().depends_on(var)) {
        return Ok(false);
    }
    let polynomial = rf.num.atoms().all(|(atom, exp)| {
        !atom.to_expr().depends_on(var)
            || (atom.is_symbol() && exp.is_integer() && !exp.is_negative())
    });
    Ok(polynomial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn simp(expr: &Expr) -> String {
        simplify(expr, &EngineConfig::default()).unwrap().to_string()
    }

    #[test]
    fn collects_like_terms() {
        let expr = Expr::Add(vec![x(), x(), Expr::int(3)]);
        assert_eq!(simp(&expr), "2*x + 3");
    }

    #[test]
    fn expands_squares() {
        let square = Expr::pow(Expr::add(x(), Expr::int(1)), Expr::int(2));
        let expanded = Expr::Add(vec![
            Expr::pow(x(), Expr::int(2)),
            Expr::mul(Expr::int(2), x()),
            Expr::int(1),
        ]);
        let diff = Expr::sub(square, expanded);
        assert!(is_zero(&diff, &EngineConfig::default()).unwrap());
    }

    #[test]
    fn square_roots_extract_perfect_factors() {
        let root8 = Expr::pow(Expr::int(8), Expr::rational(half()));
        assert_eq!(simp(&root8), "2*sqrt(2)");
        let product = Expr::mul(
            Expr::pow(Expr::int(2), Expr::rational(half())),
            Expr::pow(Expr::int(2), Expr::rational(half())),
        );
        assert_eq!(simp(&product), "2");
    }

    #[test]
    fn imaginary_unit_squares_to_minus_one() {
        let expr = Expr::pow(Expr::Constant(Constant::I), Expr::int(2));
        assert_eq!(simp(&expr), "-1");
        let root = Expr::pow(Expr::int(-4), Expr::rational(half()));
        assert_eq!(simp(&root), "2*I");
    }

    #[test]
    fn trig_special_values() {
        let sixth = Expr::mul(
            Expr::rational(Rational::new(1, 6).unwrap()),
            Expr::Constant(Constant::Pi),
        );
        assert_eq!(simp(&Expr::apply(Func::Sin, sixth.clone())), "1/2");
        assert_eq!(simp(&Expr::apply(Func::Cos, Expr::Constant(Constant::Pi))), "-1");
        let tan = Expr::apply(Func::Tan, Expr::mul(Expr::rational(half()), Expr::Constant(Constant::Pi)));
        assert!(simplify(&tan, &EngineConfig::default()).is_err());
    }

    #[test]
    fn odd_functions_pull_out_signs() {
        let expr = Expr::add(
            Expr::apply(Func::Sin, Expr::neg(x())),
            Expr::apply(Func::Sin, x()),
        );
        assert!(is_zero(&expr, &EngineConfig::default()).unwrap());
    }

    #[test]
    fn exponentials_merge() {
        let expr = Expr::sub(
            Expr::mul(Expr::apply(Func::Exp, x()), Expr::apply(Func::Exp, x())),
            Expr::apply(Func::Exp, Expr::mul(Expr::int(2), x())),
        );
        assert!(is_zero(&expr, &EngineConfig::default()).unwrap());
        let log_exp = Expr::apply(Func::Exp, Expr::apply(Func::Log, x()));
        assert_eq!(simp(&log_exp), "x");
    }

    #[test]
    fn rational_functions_cancel() {
        let a = Expr::div(Expr::int(1), Expr::add(x(), Expr::int(1)));
        let expr = Expr::sub(Expr::add(a.clone(), a.clone()), Expr::mul(Expr::int(2), a));
        assert!(is_zero(&expr, &EngineConfig::default()).unwrap());
    }

    #[test]
    fn constant_exponent_parts_split_off() {
        let k = Expr::symbol("k");
        let shifted = Expr::pow(Expr::int(2), Expr::add(k.clone(), Expr::int(1)));
        let expr = Expr::sub(shifted, Expr::mul(Expr::int(2), Expr::pow(Expr::int(2), k)));
        assert!(is_zero(&expr, &EngineConfig::default()).unwrap());
    }

    #[test]
    fn log_of_zero_is_an_error() {
        let expr = Expr::apply(Func::Log, Expr::int(0));
        assert!(simplify(&expr, &EngineConfig::default()).is_err());
    }

    #[test]
    fn factorial_and_binomial_are_exact() {
        assert_eq!(simp(&Expr::apply(Func::Factorial, Expr::int(5))), "120");
        let binom = Expr::Apply(Func::Binomial, vec![Expr::int(5), Expr::int(2)]);
        assert_eq!(simp(&binom), "10");
    }

    #[test]
    fn infinity_absorbs_finite_values() {
        let oo = || Expr::Constant(Constant::Infinity);
        assert_eq!(simp(&Expr::add(oo(), Expr::int(5))), "oo");
        assert_eq!(simp(&Expr::add(oo(), oo())), "oo");
        assert_eq!(simp(&Expr::mul(Expr::int(-3), oo())), "-oo");
        assert_eq!(simp(&Expr::recip(oo())), "0");
        assert_eq!(simp(&Expr::pow(oo(), Expr::int(2))), "oo");
        assert_eq!(simp(&Expr::apply(Func::Exp, Expr::neg(oo()))), "0");
        assert_eq!(simp(&Expr::pow(Expr::int(2), oo())), "oo");
    }

    #[test]
    fn indeterminate_forms_never_cancel() {
        let oo = || Expr::Constant(Constant::Infinity);
        let config = EngineConfig::default();
        let forms = [
            Expr::sub(oo(), oo()),
            Expr::div(oo(), oo()),
            Expr::mul(Expr::int(0), oo()),
            Expr::sub(Expr::mul(oo(), x()), Expr::mul(oo(), x())),
            Expr::pow(Expr::int(1), oo()),
            Expr::apply(Func::Sin, oo()),
        ];
        for form in &forms {
            let err = is_zero(form, &config).unwrap_err();
            assert_eq!(err.info().code, "indeterminate", "{form}");
        }
    }

    #[test]
    fn huge_integers_keep_their_last_digit() {
        let big = Expr::pow(Expr::int(2), Expr::int(200));
        let diff = Expr::sub(Expr::add(big.clone(), Expr::int(1)), big);
        assert_eq!(simp(&diff), "1");
        let fact = Expr::apply(Func::Factorial, Expr::int(40));
        assert_eq!(simp(&fact), "815915283247897734345611269596115894272000000000");
    }

    #[test]
    fn polynomial_detection() {
        let config = EngineConfig::default();
        let poly = Expr::add(Expr::pow(x(), Expr::int(3)), Expr::mul(Expr::symbol("a"), x()));
        assert!(is_polynomial_in(&poly, "x", &config).unwrap());
        assert!(!is_polynomial_in(&Expr::recip(x()), "x", &config).unwrap());
        assert!(!is_polynomial_in(&Expr::apply(Func::Sin, x()), "x", &config).unwrap());
    }

    #[test]
    fn fraction_lifts_negative_powers() {
        let expr = Expr::div(Expr::apply(Func::Sin, x()), x());
        let (num, den) = fraction(&expr, &EngineConfig::default()).unwrap();
        assert_eq!(num.to_string(), "sin(x)");
        assert_eq!(den.to_string(), "x");
    }
}
