use serde::{Deserialize, Serialize};

/// Configuration for fragment analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Lines matching this (multi-line) regex are IPython magics and get removed
    pub magic_pattern: String,

    /// Lines matching this (multi-line) regex are shell escapes and get removed
    pub shell_pattern: String,

    /// Substrings that mark a fragment as visualization code
    pub visualization_keywords: Vec<String>,

    /// Substrings that mark a fragment as tabular data loading
    pub data_loading_keywords: Vec<String>,

    /// Keyword argument that turns a method call into an in-place mutation
    pub mutation_keyword: String,

    /// Variable name conventionally holding a literal Vega-Lite spec
    pub spec_variable: String,

    /// Key whose presence identifies a literal mapping as a chart spec
    pub schema_marker: String,

    /// Substrings that enable the stub chart evaluator
    pub chart_call_patterns: Vec<String>,

    /// Run the stub chart evaluator when no literal spec was found
    pub enable_stub_evaluation: bool,

    /// Maximum number of expression nodes the stub evaluator may visit
    pub eval_step_limit: usize,

    /// Number of distinct fragment texts whose analysis is memoized
    pub cache_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            magic_pattern: r"(?m)^\s*%.*$".to_string(),
            shell_pattern: r"(?m)^\s*!.*$".to_string(),
            visualization_keywords: [
                ".plot", "plt.show", "sns.", "px.", "go.Figure", "alt.Chart", "\"$schema\"",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            data_loading_keywords: ["read_csv", "read_excel", "read_sql"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            mutation_keyword: "inplace".to_string(),
            spec_variable: "spec".to_string(),
            schema_marker: "$schema".to_string(),
            chart_call_patterns: vec!["alt.Chart".to_string()],
            enable_stub_evaluation: true,
            eval_step_limit: 10_000,
            cache_capacity: 128,
        }
    }
}

impl AnalyzerConfig {
    /// Configuration that never runs the stub chart evaluator
    pub fn static_only() -> Self {
        Self {
            enable_stub_evaluation: false,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if self.eval_step_limit == 0 {
            return Err("eval_step_limit must be > 0".to_string());
        }

        if self.mutation_keyword.trim().is_empty() {
            return Err("mutation_keyword cannot be empty".to_string());
        }

        if self.spec_variable.trim().is_empty() {
            return Err("spec_variable cannot be empty".to_string());
        }

        for (field, pattern) in [
            ("magic_pattern", &self.magic_pattern),
            ("shell_pattern", &self.shell_pattern),
        ] {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(format!("{field} is not a valid regex: {e}"));
            }
        }

        Ok(())
    }
}
