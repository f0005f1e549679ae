use serde::{Deserialize, Serialize};

/// What a valid document must look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkupRules {
    /// Required root tag.
    #[serde(default = "MarkupRules::default_expected_root")]
    pub expected_root: String,
    /// Namespace declaration removed verbatim before parsing, so tags compare
    /// by local name.
    #[serde(default = "MarkupRules::default_stripped_namespace")]
    pub stripped_namespace: String,
    /// Tags that must carry text or child elements.
    #[serde(default = "MarkupRules::default_content_leaf_tags")]
    pub content_leaf_tags: Vec<String>,
}

impl MarkupRules {
    fn default_expected_root() -> String {
        "math".to_string()
    }

    fn default_stripped_namespace() -> String {
        r#"xmlns="http://www.w3.org/1998/Math/MathML""#.to_string()
    }

    fn default_content_leaf_tags() -> Vec<String> {
        vec!["mn".to_string(), "mi".to_string()]
    }

    /// Whether `tag` must not be empty.
    pub fn is_content_leaf(&self, tag: &str) -> bool {
        self.content_leaf_tags.iter().any(|leaf| leaf == tag)
    }
}

impl Default for MarkupRules {
    fn default() -> Self {
        Self {
            expected_root: Self::default_expected_root(),
            stripped_namespace: Self::default_stripped_namespace(),
            content_leaf_tags: Self::default_content_leaf_tags(),
        }
    }
}
