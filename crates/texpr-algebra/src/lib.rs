#![deny(missing_docs)]
#![doc = "Reference algebra engine: allow-listed parsing, exact simplification, calculus, and numeric evaluation for the texpr verification oracle."]

mod calculus;
mod canonical;
mod limit;
mod number;
mod print;
mod series;

/// Work bounds for the reference engine.
pub mod config;
/// The engine interface and its reference implementation.
pub mod engine;
/// Error constructors for algebra failures.
pub mod error;
/// Symbolic expression tree.
pub mod expr;
/// Evaluation of parsed text into expressions.
pub mod interpret;
/// Floating-point evaluation.
pub mod numeric;
/// Allow-listed expression parser.
pub mod parse;

pub use self::calculus::{antiderivative, derivative, integrate};
pub use self::canonical::{is_zero, simplify};
pub use self::config::EngineConfig;
pub use self::engine::{AlgebraEngine, ReferenceEngine};
pub use self::expr::{Constant, Direction, Expr, Func, Range};
pub use self::limit::limit;
pub use self::number::{Number, Rational};
pub use self::parse::{parse, parse_bounded, Scope, Syntax};
pub use self::series::{force, product, sum};
