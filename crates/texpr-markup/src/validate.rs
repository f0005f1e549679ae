use texpr_core::OracleError;

use crate::defects::{MarkupDefect, MarkupVerdict};
use crate::rules::MarkupRules;
use crate::tree::parse_tree;

/// Checks `markup` against `rules`, the `required` tags and the optional
/// `expected_content`.
///
/// Only a parse failure stops early. Every other check runs and records its
/// defect, so one verdict lists everything wrong with the document.
pub fn validate(
    markup: &str,
    required: &[String],
    expected_content: Option<&str>,
    rules: &MarkupRules,
) -> MarkupVerdict {
    let tree = match parse_tree(markup, rules) {
        Ok(tree) => tree,
        Err(err) => {
            let reason = match &err {
                OracleError::Markup(info) => info.message.clone(),
                other => other.to_string(),
            };
            return MarkupVerdict {
                elements: Default::default(),
                defects: vec![MarkupDefect::InvalidXml { reason }],
            };
        }
    };

    let mut defects = Vec::new();
    if tree.root.tag != rules.expected_root {
        defects.push(MarkupDefect::WrongRoot {
            actual: tree.root.tag.clone(),
            expected: rules.expected_root.clone(),
        });
    }

    let elements = tree.tags();
    let missing: Vec<String> = required
        .iter()
        .filter(|tag| !elements.contains(*tag))
        .cloned()
        .collect();
    if !missing.is_empty() {
        defects.push(MarkupDefect::MissingElements { tags: missing });
    }

    if let Some(content) = expected_content.filter(|c| !c.is_empty()) {
        if !tree.text.contains(content) && !markup.contains(content) {
            defects.push(MarkupDefect::MissingContent {
                content: content.to_string(),
            });
        }
    }

    for node in tree.elements() {
        if rules.is_content_leaf(&node.tag) && !node.has_text && node.children.is_empty() {
            defects.push(MarkupDefect::EmptyLeaf {
                tag: node.tag.clone(),
            });
        }
    }

    MarkupVerdict { elements, defects }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_document_lists_sorted_elements() {
        let markup = r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mfrac><mn>1</mn><mi>x</mi></mfrac></math>"#;
        let verdict = validate(markup, &tags(&["mfrac"]), Some("1"), &MarkupRules::default());
        assert!(verdict.is_valid());
        assert_eq!(verdict.message(), "Valid. Elements: ['math', 'mfrac', 'mi', 'mn']");
    }

    #[test]
    fn all_defects_are_accumulated() {
        let markup = "<formula><mn></mn></formula>";
        let verdict = validate(markup, &tags(&["msqrt", "mn"]), Some("pi"), &MarkupRules::default());
        assert_eq!(
            verdict.message(),
            "Root element is 'formula', expected 'math'; Missing elements: ['msqrt']; \
             Missing content: 'pi'; Empty <mn> element found"
        );
    }

    #[test]
    fn content_may_match_the_raw_markup() {
        let markup = "<math><mo>&#x2212;</mo></math>";
        let verdict = validate(markup, &[], Some("&#x2212;"), &MarkupRules::default());
        assert!(verdict.is_valid(), "{}", verdict.message());
    }

    #[test]
    fn leaf_with_child_element_is_not_empty() {
        let markup = "<math><mi><mglyph/></mi></math>";
        assert!(validate(markup, &[], None, &MarkupRules::default()).is_valid());
    }
}
