//! Allow-listed parser for the SymPy-style surface language.
//!
//! Every identifier is resolved while parsing: it must name a catalogue
//! builtin, a symbol declared in the [`Scope`], or a constant. Nothing else is
//! resolvable, so expression text can never reach anything outside the
//! catalogue.

use std::collections::BTreeSet;

use num_bigint::BigInt;
use texpr_core::OracleError;

use crate::config::EngineConfig;
use crate::error::syntax_error;
use crate::expr::{Constant, Func};
use crate::number::Number;

/// Symbols that may appear free in expression text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    symbols: BTreeSet<String>,
}

impl Scope {
    /// Scope declaring the given symbol names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Declares an additional symbol.
    pub fn declare(&mut self, name: impl Into<String>) {
        self.symbols.insert(name.into());
    }

    /// Whether `name` is a declared symbol.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }

    /// Declared symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }
}

/// Callable entries of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Elementary or integer function kept in the tree.
    Func(Func),
    /// `sqrt(x)`.
    Sqrt,
    /// `root(x, n)`.
    Root,
    /// `integrate(f, x)` / `integrate(f, (x, a, b))`.
    Integrate,
    /// `Integral(...)`, deferred.
    Integral,
    /// `diff(f, x, ...)`.
    Diff,
    /// `limit(f, x, a[, dir])`.
    Limit,
    /// `Sum(f, (k, a, b))`, deferred.
    Sum,
    /// `Product(f, (k, a, b))`, deferred.
    Product,
    /// `simplify(f)`.
    Simplify,
    /// `Rational(p, q)`.
    Rational,
}

impl Builtin {
    /// Resolves a catalogue name.
    pub fn lookup(name: &str) -> Option<Builtin> {
        if let Some(func) = Func::from_name(name) {
            return Some(Builtin::Func(func));
        }
        Some(match name {
            "sqrt" => Builtin::Sqrt,
            "root" => Builtin::Root,
            "integrate" => Builtin::Integrate,
            "Integral" => Builtin::Integral,
            "diff" => Builtin::Diff,
            "limit" => Builtin::Limit,
            "Sum" => Builtin::Sum,
            "Product" => Builtin::Product,
            "simplify" => Builtin::Simplify,
            "Rational" => Builtin::Rational,
            _ => return None,
        })
    }

    /// Surface name.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Func(func) => func.name(),
            Builtin::Sqrt => "sqrt",
            Builtin::Root => "root",
            Builtin::Integrate => "integrate",
            Builtin::Integral => "Integral",
            Builtin::Diff => "diff",
            Builtin::Limit => "limit",
            Builtin::Sum => "Sum",
            Builtin::Product => "Product",
            Builtin::Simplify => "simplify",
            Builtin::Rational => "Rational",
        }
    }
}

fn constant(name: &str) -> Option<Constant> {
    match name {
        "pi" => Some(Constant::Pi),
        "E" => Some(Constant::E),
        "I" => Some(Constant::I),
        "oo" => Some(Constant::Infinity),
        _ => None,
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `**`
    Pow,
}

/// Validated syntax tree: every name is already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    /// Numeric literal.
    Number(Number),
    /// String literal (limit directions).
    Text(String),
    /// Declared symbol.
    Symbol(String),
    /// Constant.
    Constant(Constant),
    /// Parenthesised tuple.
    Tuple(Vec<Syntax>),
    /// Unary minus.
    Neg(Box<Syntax>),
    /// Binary operation.
    Binary(BinOp, Box<Syntax>, Box<Syntax>),
    /// Catalogue call.
    Call(Builtin, Vec<Syntax>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Ident(String),
    Text(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
}

fn tokenize(source: &str) -> Result<Vec<Token>, OracleError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        match ch {
            c if c.is_whitespace() => idx += 1,
            '(' => {
                tokens.push(Token::LParen);
                idx += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                idx += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                idx += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                idx += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                idx += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                idx += 1;
            }
            '*' => {
                if chars.get(idx + 1) == Some(&'*') {
                    tokens.push(Token::DoubleStar);
                    idx += 2;
                } else {
                    tokens.push(Token::Star);
                    idx += 1;
                }
            }
            '\'' | '"' => {
                let quote = ch;
                let start = idx + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(syntax_error(source, "unterminated string literal"));
                }
                tokens.push(Token::Text(chars[start..end].iter().collect()));
                idx = end + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
                    idx += 1;
                }
                if idx < chars.len() && (chars[idx] == 'e' || chars[idx] == 'E') {
                    let mut look = idx + 1;
                    if look < chars.len() && (chars[look] == '+' || chars[look] == '-') {
                        look += 1;
                    }
                    if look < chars.len() && chars[look].is_ascii_digit() {
                        idx = look;
                        while idx < chars.len() && chars[idx].is_ascii_digit() {
                            idx += 1;
                        }
                    }
                }
                tokens.push(Token::Number(chars[start..idx].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_alphanumeric() || chars[idx] == '_') {
                    idx += 1;
                }
                tokens.push(Token::Ident(chars[start..idx].iter().collect()));
            }
            other => {
                return Err(syntax_error(
                    source,
                    format!("unsupported character '{other}' in expression"),
                ))
            }
        }
    }
    Ok(tokens)
}

fn parse_number(source: &str, text: &str) -> Result<Number, OracleError> {
    let is_float = text.contains('.') || text.contains('e') || text.contains('E');
    if !is_float {
        if let Ok(value) = text.parse::<BigInt>() {
            return Ok(Number::big(value));
        }
    }
    text.parse::<f64>()
        .map(Number::Float)
        .map_err(|_| syntax_error(source, format!("invalid numeric literal '{text}'")))
}

/// Parsed subtree and the depth of its tree.
type Node = (Syntax, usize);

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    scope: &'a Scope,
    nesting: usize,
    max_nesting: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), OracleError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax_error(
                self.source,
                format!("expected {expected:?}, found {token:?}"),
            )),
            None => Err(syntax_error(
                self.source,
                format!("expected {expected:?}, found end of input"),
            )),
        }
    }

    fn too_deep(&self, what: &str, limit: usize) -> OracleError {
        syntax_error(
            self.source,
            format!("expression is too deeply nested ({what} exceeds {limit})"),
        )
    }

    fn node(&self, syntax: Syntax, children: &[usize]) -> Result<Node, OracleError> {
        let depth = 1 + children.iter().copied().max().unwrap_or(0);
        if depth > self.max_depth {
            return Err(self.too_deep("operator depth", self.max_depth));
        }
        Ok((syntax, depth))
    }

    fn binary(&self, op: BinOp, lhs: Node, rhs: Node) -> Result<Node, OracleError> {
        let depths = [lhs.1, rhs.1];
        self.node(Syntax::Binary(op, Box::new(lhs.0), Box::new(rhs.0)), &depths)
    }

    fn expression(&mut self) -> Result<Node, OracleError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, OracleError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    /// Every recursive path of the grammar passes through here, so the
    /// nesting counter bounds the parser's stack.
    fn unary(&mut self) -> Result<Node, OracleError> {
        if self.nesting >= self.max_nesting {
            return Err(self.too_deep("nesting", self.max_nesting));
        }
        self.nesting += 1;
        let parsed = self.signed();
        self.nesting -= 1;
        parsed
    }

    fn signed(&mut self) -> Result<Node, OracleError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let (inner, depth) = self.unary()?;
                self.node(Syntax::Neg(Box::new(inner)), &[depth])
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, OracleError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.pos += 1;
            let exp = self.unary()?;
            return self.binary(BinOp::Pow, base, exp);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, OracleError> {
        match self.next() {
            Some(Token::Number(text)) => {
                self.node(Syntax::Number(parse_number(self.source, &text)?), &[])
            }
            Some(Token::Text(text)) => self.node(Syntax::Text(text), &[]),
            Some(Token::Ident(name)) => self.identifier(name),
            Some(Token::LParen) => {
                let first = self.expression()?;
                if self.peek() == Some(&Token::Comma) {
                    let mut items = vec![first];
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        if self.peek() == Some(&Token::RParen) {
                            break;
                        }
                        items.push(self.expression()?);
                    }
                    self.expect(Token::RParen)?;
                    self.collection(items, Syntax::Tuple)
                } else {
                    self.expect(Token::RParen)?;
                    Ok(first)
                }
            }
            Some(token) => Err(syntax_error(
                self.source,
                format!("unexpected token {token:?}"),
            )),
            None => Err(syntax_error(self.source, "unexpected end of input")),
        }
    }

    fn collection(
        &self,
        items: Vec<Node>,
        build: impl FnOnce(Vec<Syntax>) -> Syntax,
    ) -> Result<Node, OracleError> {
        let (items, depths): (Vec<Syntax>, Vec<usize>) = items.into_iter().unzip();
        self.node(build(items), &depths)
    }

    fn identifier(&mut self, name: String) -> Result<Node, OracleError> {
        if let Some(builtin) = Builtin::lookup(&name) {
            if self.peek() != Some(&Token::LParen) {
                return Err(syntax_error(
                    self.source,
                    format!("function '{name}' must be called"),
                ));
            }
            self.pos += 1;
            let mut args = Vec::new();
            if self.peek() != Some(&Token::RParen) {
                loop {
                    args.push(self.expression()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
            }
            self.expect(Token::RParen)?;
            return self.collection(args, |args| Syntax::Call(builtin, args));
        }
        if self.peek() == Some(&Token::LParen) {
            return Err(syntax_error(
                self.source,
                format!("name '{name}' is not defined"),
            ));
        }
        if self.scope.contains(&name) {
            return self.node(Syntax::Symbol(name), &[]);
        }
        if let Some(constant) = constant(&name) {
            return self.node(Syntax::Constant(constant), &[]);
        }
        Err(syntax_error(
            self.source,
            format!("name '{name}' is not defined"),
        ))
    }
}

/// Parses `source`, rejecting any name outside the catalogue and `scope`,
/// with the default nesting bounds.
pub fn parse(source: &str, scope: &Scope) -> Result<Syntax, OracleError> {
    parse_bounded(source, scope, &EngineConfig::default())
}

/// Parses `source` under the nesting bounds of `config`. Input nested beyond
/// them is a `syntax` error rather than unbounded recursion.
pub fn parse_bounded(source: &str, scope: &Scope, config: &EngineConfig) -> Result<Syntax, OracleError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(syntax_error(source, "empty expression"));
    }
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        scope,
        nesting: 0,
        max_nesting: config.max_nesting,
        max_depth: config.max_syntax_depth,
    };
    let (syntax, _) = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(syntax_error(
            source,
            format!("unexpected trailing token {token:?}"),
        ));
    }
    Ok(syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(["x", "y"])
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let syntax = parse("-x**2", &scope()).unwrap();
        match syntax {
            Syntax::Neg(inner) => assert!(matches!(*inner, Syntax::Binary(BinOp::Pow, _, _))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn power_is_right_associative() {
        let syntax = parse("x**y**2", &scope()).unwrap();
        match syntax {
            Syntax::Binary(BinOp::Pow, base, exp) => {
                assert_eq!(*base, Syntax::Symbol("x".into()));
                assert!(matches!(*exp, Syntax::Binary(BinOp::Pow, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = parse("__import__('os')", &scope()).unwrap_err();
        assert!(err.message().contains("not defined"));
        let err = parse("w + 1", &scope()).unwrap_err();
        assert_eq!(err.message(), "name 'w' is not defined");
    }

    #[test]
    fn bare_function_names_are_rejected() {
        let err = parse("sin + 1", &scope()).unwrap_err();
        assert!(err.message().contains("must be called"));
    }

    #[test]
    fn tuples_and_strings_parse() {
        let syntax = parse("limit(1/x, x, 0, '-')", &scope()).unwrap();
        match syntax {
            Syntax::Call(Builtin::Limit, args) => {
                assert_eq!(args.len(), 4);
                assert_eq!(args[3], Syntax::Text("-".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
        let syntax = parse("integrate(x, (x, 0, 1))", &scope()).unwrap();
        assert!(matches!(syntax, Syntax::Call(Builtin::Integrate, ref args) if matches!(args[1], Syntax::Tuple(_))));
    }

    #[test]
    fn literals_distinguish_exact_and_float() {
        assert_eq!(parse("3", &scope()).unwrap(), Syntax::Number(Number::int(3)));
        assert_eq!(parse("2.5e-1", &scope()).unwrap(), Syntax::Number(Number::Float(0.25)));
    }

    #[test]
    fn integer_literals_are_unbounded() {
        let text = "1".repeat(60);
        let expected: BigInt = text.parse().unwrap();
        assert_eq!(parse(&text, &scope()).unwrap(), Syntax::Number(Number::big(expected)));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let nested = format!("{}x{}", "(".repeat(50_000), ")".repeat(50_000));
        let err = parse(&nested, &scope()).unwrap_err();
        assert_eq!(err.info().code, "syntax");
        assert!(err.message().contains("too deeply nested"));

        let negations = format!("{}x", "-".repeat(50_000));
        assert_eq!(parse(&negations, &scope()).unwrap_err().info().code, "syntax");

        let chain = vec!["x"; 50_000].join(" + ");
        assert_eq!(parse(&chain, &scope()).unwrap_err().info().code, "syntax");

        let modest = format!("{}x{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&modest, &scope()).is_ok());
    }

    #[test]
    fn declared_symbols_shadow_constants() {
        let scope = Scope::new(["E"]);
        assert_eq!(parse("E", &scope).unwrap(), Syntax::Symbol("E".into()));
        assert_eq!(parse("pi", &scope).unwrap(), Syntax::Constant(Constant::Pi));
    }
}
