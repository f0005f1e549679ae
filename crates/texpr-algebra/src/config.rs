use serde::{Deserialize, Serialize};

/// Work bounds for the reference engine.
///
/// None of these are timeouts; they cap loops whose length depends on the
/// expression text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of terms any intermediate polynomial may hold.
    #[serde(default = "EngineConfig::default_max_terms")]
    pub max_terms: usize,
    /// Largest integer power expanded for multi-term bases.
    #[serde(default = "EngineConfig::default_max_power")]
    pub max_power: u32,
    /// Maximum number of explicit terms when forcing sums and products.
    #[serde(default = "EngineConfig::default_max_sum_terms")]
    pub max_sum_terms: usize,
    /// Recursion depth of adaptive Simpson quadrature.
    #[serde(default = "EngineConfig::default_quadrature_depth")]
    pub quadrature_depth: u32,
    /// Maximum L'Hôpital differentiation rounds per limit.
    #[serde(default = "EngineConfig::default_limit_iterations")]
    pub limit_iterations: u32,
    /// Deepest run of brackets, signs, and powers the parser accepts.
    #[serde(default = "EngineConfig::default_max_nesting")]
    pub max_nesting: usize,
    /// Deepest syntax tree the parser builds, counting operator chains.
    #[serde(default = "EngineConfig::default_max_syntax_depth")]
    pub max_syntax_depth: usize,
}

impl EngineConfig {
    const fn default_max_terms() -> usize {
        20_000
    }

    const fn default_max_power() -> u32 {
        64
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

    const fn default_max_nesting() -> usize {
        200
    }

    const fn default_max_syntax_depth() -> usize {
        1_000
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_terms: Self::default_max_terms(),
            max_power: Self::default_max_power(),
            max_sum_terms: Self::default_max_sum_terms(),
            quadrature_depth: Self::default_quadrature_depth(),
            limit_iterations: Self::default_limit_iterations(),
            max_nesting: Self::default_max_nesting(),
            max_syntax_depth: Self::default_max_syntax_depth(),
        }
    }
}
