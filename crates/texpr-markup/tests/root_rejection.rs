use proptest::prelude::*;
use texpr_markup::{validate, MarkupDefect, MarkupRules};

proptest! {
    #[test]
    fn any_root_other_than_math_fails(root in "[a-l][a-z]{0,7}") {
        let markup = format!("<{root}><mi>x</mi></{root}>");
        let verdict = validate(&markup, &[], None, &MarkupRules::default());
        prop_assert!(!verdict.is_valid());
        let expected = format!("Root element is '{root}', expected 'math'");
        prop_assert_eq!(verdict.message(), expected);
    }
}

#[test]
fn formula_root_names_both_tags() {
    let verdict = validate(
        "<formula><mn>1</mn></formula>",
        &["mn".to_string()],
        None,
        &MarkupRules::default(),
    );
    assert_eq!(
        verdict.defects,
        vec![MarkupDefect::WrongRoot {
            actual: "formula".into(),
            expected: "math".into(),
        }]
    );
}

#[test]
fn parse_failure_short_circuits() {
    let verdict = validate("<math><mi>x</mi>", &["mfrac".to_string()], Some("y"), &MarkupRules::default());
    assert_eq!(verdict.defects.len(), 1);
    assert!(verdict.message().starts_with("Invalid XML: "));
    assert!(verdict.elements.is_empty());
}

#[test]
fn rules_load_with_defaults() {
    let rules: MarkupRules = serde_json::from_str(r#"{"expected_root": "m"}"#).unwrap();
    assert_eq!(rules.expected_root, "m");
    assert_eq!(rules.content_leaf_tags, vec!["mn", "mi"]);
    assert!(serde_json::from_str::<MarkupRules>(r#"{"root": "m"}"#).is_err());
}
