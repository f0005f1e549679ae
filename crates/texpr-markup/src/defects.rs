use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One reason a document failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkupDefect {
    /// The text is not a well-formed element tree. Nothing else is checked.
    InvalidXml {
        /// Parser diagnostic.
        reason: String,
    },
    /// The document element has the wrong tag.
    WrongRoot {
        /// Tag found.
        actual: String,
        /// Tag required.
        expected: String,
    },
    /// Required tags that never occur, in the order they were requested.
    MissingElements {
        /// Absent tags.
        tags: Vec<String>,
    },
    /// Expected substring absent from both the text content and the raw markup.
    MissingContent {
        /// The substring.
        content: String,
    },
    /// A content leaf with neither text nor children.
    EmptyLeaf {
        /// Tag of the empty element.
        tag: String,
    },
}

/// `['a', 'b']`, the list notation used in diagnostics.
pub(crate) fn quoted_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let inner: Vec<String> = items.into_iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", inner.join(", "))
}

impl fmt::Display for MarkupDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupDefect::InvalidXml { reason } => write!(f, "Invalid XML: {reason}"),
            MarkupDefect::WrongRoot { actual, expected } => {
                write!(f, "Root element is '{actual}', expected '{expected}'")
            }
            MarkupDefect::MissingElements { tags } => {
                write!(f, "Missing elements: {}", quoted_list(tags))
            }
            MarkupDefect::MissingContent { content } => write!(f, "Missing content: '{content}'"),
            MarkupDefect::EmptyLeaf { tag } => write!(f, "Empty <{tag}> element found"),
        }
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkupVerdict {
    /// Distinct tags found; empty when the document did not parse.
    pub elements: BTreeSet<String>,
    /// Defects in detection order.
    pub defects: Vec<MarkupDefect>,
}

impl MarkupVerdict {
    /// Valid iff no defect was recorded.
    pub fn is_valid(&self) -> bool {
        self.defects.is_empty()
    }

    /// `Valid. Elements: [...]` or the defects joined by `"; "`.
    pub fn message(&self) -> String {
        if self.is_valid() {
            return format!("Valid. Elements: {}", quoted_list(&self.elements));
        }
        self.defects
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
