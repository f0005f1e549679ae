use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use texpr_algebra::EngineConfig;
use texpr_core::{ErrorInfo, OracleError};
use texpr_markup::MarkupRules;

fn config_error(code: &str, message: impl Into<String>) -> OracleError {
    OracleError::Config(ErrorInfo::new(code, message.into()))
}

/// Knobs controlling a verification run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Tolerance for numeric cases that do not carry their own.
    #[serde(default = "Policy::default_tolerance")]
    pub default_tolerance: f64,
    /// Required markup root tag.
    #[serde(default = "Policy::default_expected_root")]
    pub expected_root: String,
    /// Namespace declaration removed from markup before parsing.
    #[serde(default = "Policy::default_stripped_namespace")]
    pub stripped_namespace: String,
    /// Markup tags that must not be empty.
    #[serde(default = "Policy::default_content_leaf_tags")]
    pub content_leaf_tags: Vec<String>,
    /// Symbols declared for every expression in addition to bound variables.
    #[serde(default = "Policy::default_symbols")]
    pub default_symbols: Vec<String>,
    /// Maximum explicit terms when forcing sums and products.
    #[serde(default = "Policy::default_max_sum_terms")]
    pub max_sum_terms: usize,
    /// Recursion depth of numeric quadrature.
    #[serde(default = "Policy::default_quadrature_depth")]
    pub quadrature_depth: u32,
    /// Maximum L'Hôpital rounds per limit.
    #[serde(default = "Policy::default_limit_iterations")]
    pub limit_iterations: u32,
    /// Characters of markup echoed in failure diagnostics.
    #[serde(default = "Policy::default_markup_preview_chars")]
    pub markup_preview_chars: usize,
}

impl Policy {
    const fn default_tolerance() -> f64 {
        1e-10
    }

    fn default_expected_root() -> String {
        MarkupRules::default().expected_root
    }

    fn default_stripped_namespace() -> String {
        MarkupRules::default().stripped_namespace
    }

    fn default_content_leaf_tags() -> Vec<String> {
        MarkupRules::default().content_leaf_tags
    }

    fn default_symbols() -> Vec<String> {
        ["x", "y", "z", "t", "n", "k", "i", "j"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    const fn default_max_sum_terms() -> usize {
        100_000
    }

    const fn default_quadrature_depth() -> u32 {
        40
    }

    const fn default_limit_iterations() -> u32 {
        8
    }

    const fn default_markup_preview_chars() -> usize {
        100
    }

    /// Parses a YAML policy document.
    pub fn from_yaml_str(text: &str) -> Result<Self, OracleError> {
        let policy: Policy = serde_yaml::from_str(text)
            .map_err(|err| config_error("policy-parse", err.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Loads a YAML policy file.
    pub fn from_yaml_path(path: &Path) -> Result<Self, OracleError> {
        let text = fs::read_to_string(path).map_err(|err| {
            OracleError::Config(
                ErrorInfo::new("policy-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text).map_err(|err| match err {
            OracleError::Config(info) => {
                OracleError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    fn validate(&self) -> Result<(), OracleError> {
        if self.default_tolerance.is_nan() || self.default_tolerance < 0.0 {
            return Err(config_error(
                "policy-tolerance",
                format!("default_tolerance must be non-negative, got {}", self.default_tolerance),
            ));
        }
        if self.expected_root.is_empty() {
            return Err(config_error("policy-root", "expected_root must not be empty"));
        }
        Ok(())
    }

    /// Work bounds handed to the reference engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_sum_terms: self.max_sum_terms,
            quadrature_depth: self.quadrature_depth,
            limit_iterations: self.limit_iterations,
            ..EngineConfig::default()
        }
    }

    /// Rules handed to the markup validator.
    pub fn markup_rules(&self) -> MarkupRules {
        MarkupRules {
            expected_root: self.expected_root.clone(),
            stripped_namespace: self.stripped_namespace.clone(),
            content_leaf_tags: self.content_leaf_tags.clone(),
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            default_tolerance: Self::default_tolerance(),
            expected_root: Self::default_expected_root(),
            stripped_namespace: Self::default_stripped_namespace(),
            content_leaf_tags: Self::default_content_leaf_tags(),
            default_symbols: Self::default_symbols(),
            max_sum_terms: Self::default_max_sum_terms(),
            quadrature_depth: Self::default_quadrature_depth(),
            limit_iterations: Self::default_limit_iterations(),
            markup_preview_chars: Self::default_markup_preview_chars(),
        }
    }
}
