#![deny(missing_docs)]
#![doc = "Structural validation of exported MathML: well-formedness, root tag, required elements, expected content and empty leaves."]

/// Accumulated defects and the verdict they produce.
pub mod defects;
/// Validation rules.
pub mod rules;
/// Generic element tree built from markup text.
pub mod tree;
/// The validator.
pub mod validate;

pub use self::defects::{MarkupDefect, MarkupVerdict};
pub use self::rules::MarkupRules;
pub use self::tree::{parse_tree, MarkupTree};
pub use self::validate::validate;
