use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Variable names in order of first appearance in the fragment
pub type NameSet = IndexSet<String>;

/// One notebook code cell handed to the analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    /// Unique, stable identifier within one run
    pub id: String,

    /// Raw cell source, including magics
    pub text: String,
}

impl Fragment {
    /// Create a new fragment
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Content category of a fragment.
///
/// Declaration order is the default logical order used by the graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Only import statements
    Imports,
    /// Reads tabular data
    LoadData,
    /// Assignments, calls and other expression statements
    Transform,
    /// Plotting or chart specs
    Visualize,
    /// Anything else (definitions, control flow, unparseable code)
    Other,
}

impl Category {
    /// All categories in default logical order
    pub const ALL: [Category; 5] = [
        Category::Imports,
        Category::LoadData,
        Category::Transform,
        Category::Visualize,
        Category::Other,
    ];

    /// Get category name as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::LoadData => "load_data",
            Self::Transform => "transform",
            Self::Visualize => "visualize",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analyzing one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentAnalysis {
    /// Names bound by the fragment
    pub defined: NameSet,

    /// Names read by the fragment, mutated names included, imports excluded
    pub used: NameSet,

    /// Names assigned without being read on the right-hand side
    pub pure_overwrites: NameSet,

    /// Content category
    pub category: Category,

    /// Vega-Lite document found in (or recovered from) the fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_spec: Option<Value>,
}

impl FragmentAnalysis {
    /// Degenerate analysis used for fragments that do not parse
    #[must_use]
    pub fn unparsed() -> Self {
        Self {
            defined: NameSet::new(),
            used: NameSet::new(),
            pure_overwrites: NameSet::new(),
            category: Category::Other,
            embedded_spec: None,
        }
    }

    /// First defined name, used as the fragment's output variable
    #[must_use]
    pub fn primary_output(&self) -> Option<&str> {
        self.defined.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> NameSet {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_primary_output_is_first_defined() {
        let analysis = FragmentAnalysis {
            defined: names(&["total", "count"]),
            used: names(&["rows", "count"]),
            pure_overwrites: names(&["count"]),
            category: Category::Transform,
            embedded_spec: None,
        };

        assert_eq!(analysis.primary_output(), Some("total"));
    }

    #[test]
    fn test_unparsed_is_empty_other() {
        let analysis = FragmentAnalysis::unparsed();
        assert_eq!(analysis.category, Category::Other);
        assert!(analysis.defined.is_empty());
        assert!(analysis.used.is_empty());
        assert_eq!(analysis.primary_output(), None);
    }

    #[test]
    fn test_category_order_and_names() {
        let mut shuffled = vec![Category::Other, Category::Imports, Category::Visualize];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Category::Imports, Category::Visualize, Category::Other]
        );
        assert_eq!(Category::LoadData.to_string(), "load_data");
        assert_eq!(
            serde_json::to_string(&Category::LoadData).unwrap(),
            "\"load_data\""
        );
    }
}
