use nbflow_analyzer::{AnalyzerConfig, Category};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Complete converter configuration, validated once and shared by reference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    pub analyzer: AnalyzerConfig,
    pub layout: LayoutConfig,
    pub export: ExportConfig,
}

/// Fragment ordering and canvas placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between topological generations
    pub spacing_x: f64,

    /// Vertical distance between nodes of one generation
    pub spacing_y: f64,

    /// Category priority defining the logical fragment order
    pub category_order: Vec<Category>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing_x: 800.0,
            spacing_y: 500.0,
            category_order: Category::ALL.to_vec(),
        }
    }
}

/// Output document settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Name of the generic input every emitted fragment receives
    pub input_placeholder: String,

    /// Value of `dataflow.name`
    pub workflow_name: String,

    /// Curio node type per category
    pub node_types: BTreeMap<Category, String>,

    /// Node type for categories missing from `node_types`
    pub default_node_type: String,

    /// Multi-line regex whose first group is the data-loading call to return
    pub load_data_pattern: String,

    /// Fill colors for DOT export
    pub node_colors: BTreeMap<Category, String>,

    /// Border colors for DOT export
    pub node_borders: BTreeMap<Category, String>,
}

fn category_map(entries: &[(Category, &str)]) -> BTreeMap<Category, String> {
    entries
        .iter()
        .map(|(category, value)| (*category, (*value).to_string()))
        .collect()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input_placeholder: "arg".to_string(),
            workflow_name: "GeneratedWorkflow".to_string(),
            node_types: category_map(&[
                (Category::LoadData, "DATA_LOADING"),
                (Category::Transform, "DATA_CLEANING"),
                (Category::Visualize, "VIS_VEGA"),
            ]),
            default_node_type: "DATA_CLEANING".to_string(),
            load_data_pattern: r"(?m)^\s*\w+\s*=\s*(pd\.read_.*)".to_string(),
            node_colors: category_map(&[
                (Category::Imports, "#cde4ff"),
                (Category::LoadData, "#d4edda"),
                (Category::Transform, "#fff3cd"),
                (Category::Visualize, "#f8d7da"),
                (Category::Other, "#e2e3e5"),
            ]),
            node_borders: category_map(&[
                (Category::Imports, "#5b9bd5"),
                (Category::LoadData, "#57a465"),
                (Category::Transform, "#c7a84a"),
                (Category::Visualize, "#c85a62"),
                (Category::Other, "#6c757d"),
            ]),
        }
    }
}

impl ExportConfig {
    /// Curio node type for a category
    pub fn node_type(&self, category: Category) -> &str {
        self.node_types
            .get(&category)
            .map_or(self.default_node_type.as_str(), String::as_str)
    }
}

impl ConverterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.analyzer.validate()?;

        let layout = &self.layout;
        if !(layout.spacing_x > 0.0 && layout.spacing_x.is_finite()) {
            return Err("layout.spacing_x must be a positive number".to_string());
        }
        if !(layout.spacing_y > 0.0 && layout.spacing_y.is_finite()) {
            return Err("layout.spacing_y must be a positive number".to_string());
        }

        let unique: HashSet<_> = layout.category_order.iter().collect();
        if unique.len() != layout.category_order.len() {
            return Err("layout.category_order contains duplicates".to_string());
        }
        if let Some(missing) = Category::ALL.iter().find(|c| !unique.contains(c)) {
            return Err(format!("layout.category_order is missing `{missing}`"));
        }

        if self.export.input_placeholder.trim().is_empty() {
            return Err("export.input_placeholder cannot be empty".to_string());
        }

        if let Err(e) = regex::Regex::new(&self.export.load_data_pattern) {
            return Err(format!("export.load_data_pattern is not a valid regex: {e}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_valid() {
        assert!(ConverterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_category_order_validation() {
        let mut config = ConverterConfig::default();

        config.layout.category_order.pop();
        assert_eq!(
            config.validate(),
            Err("layout.category_order is missing `other`".to_string())
        );

        config.layout.category_order.push(Category::Imports);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spacing_validation() {
        let mut config = ConverterConfig::default();
        config.layout.spacing_y = 0.0;
        assert!(config.validate().is_err());

        config.layout.spacing_y = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_analyzer_errors_surface() {
        let mut config = ConverterConfig::default();
        config.analyzer.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_type_fallback() {
        let export = ExportConfig::default();
        assert_eq!(export.node_type(Category::LoadData), "DATA_LOADING");
        assert_eq!(export.node_type(Category::Visualize), "VIS_VEGA");
        assert_eq!(export.node_type(Category::Other), "DATA_CLEANING");
    }

    #[test]
    fn test_toml_overrides() {
        let config: ConverterConfig = toml::from_str(
            r#"
[layout]
spacing_x = 400.0
category_order = ["imports", "transform", "load_data", "visualize", "other"]

[export.node_types]
other = "COMPUTATION_ANALYSIS"
"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.layout.spacing_x, 400.0);
        assert_eq!(config.layout.spacing_y, 500.0);
        assert_eq!(config.layout.category_order[1], Category::Transform);
        assert_eq!(config.export.node_type(Category::Other), "COMPUTATION_ANALYSIS");
        // A partial table replaces the whole map.
        assert_eq!(config.export.node_type(Category::LoadData), "DATA_CLEANING");
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }
}
