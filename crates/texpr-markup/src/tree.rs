use std::collections::BTreeSet;

use roxmltree::{Document, Node, ParsingOptions};
use texpr_core::{ErrorInfo, OracleError};

use crate::rules::MarkupRules;

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    /// Tag name; namespaced tags use `{uri}local` notation.
    pub tag: String,
    /// Whether the element has a non-empty direct text node.
    pub has_text: bool,
    /// Child elements in document order.
    pub children: Vec<MarkupNode>,
}

/// Owned element tree of a markup document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTree {
    /// Document element.
    pub root: MarkupNode,
    /// Concatenated text content of the document element.
    pub text: String,
}

impl MarkupTree {
    /// Every element in document order, root first.
    pub fn elements(&self) -> Vec<&MarkupNode> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Distinct tags in the tree.
    pub fn tags(&self) -> BTreeSet<String> {
        self.elements().into_iter().map(|n| n.tag.clone()).collect()
    }
}

fn tag_of(node: Node<'_, '_>) -> String {
    let name = node.tag_name();
    match name.namespace() {
        Some(ns) => format!("{{{ns}}}{}", name.name()),
        None => name.name().to_string(),
    }
}

fn convert(node: Node<'_, '_>) -> MarkupNode {
    MarkupNode {
        tag: tag_of(node),
        has_text: node
            .children()
            .any(|c| c.is_text() && c.text().map(|t| !t.is_empty()).unwrap_or(false)),
        children: node.children().filter(Node::is_element).map(convert).collect(),
    }
}

/// Parses `markup` after removing the rules' namespace declaration.
pub fn parse_tree(markup: &str, rules: &MarkupRules) -> Result<MarkupTree, OracleError> {
    let cleaned = if rules.stripped_namespace.is_empty() {
        markup.to_string()
    } else {
        markup.replace(&rules.stripped_namespace, "")
    };
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(&cleaned, options)
        .map_err(|err| OracleError::Markup(ErrorInfo::new("xml-parse", err.to_string())))?;
    let root = document.root_element();
    let text = root
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    Ok(MarkupTree {
        root: convert(root),
        text,
    })
}
