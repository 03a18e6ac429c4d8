use crate::config::AnalyzerConfig;
use crate::types::Category;

/// Facts about a fragment that categorization rules look at
#[derive(Debug, Clone, Copy)]
pub struct CategorySignals<'a> {
    /// Raw fragment text, magics included
    pub text: &'a str,

    /// Every top-level statement is an import (vacuously true when empty)
    pub only_imports: bool,

    /// At least one top-level expression statement (assignment, call, bare expression)
    pub has_expression_statement: bool,

    /// An embedded chart spec was extracted
    pub has_embedded_spec: bool,
}

type Rule = fn(&Categorizer, &CategorySignals<'_>) -> bool;

/// Ordered rule list; the first matching rule decides the category
const RULES: &[(Category, Rule)] = &[
    (Category::Imports, is_import_only),
    (Category::Visualize, is_visualization),
    (Category::LoadData, is_data_loading),
    (Category::Transform, is_transform),
];

fn is_import_only(_: &Categorizer, s: &CategorySignals<'_>) -> bool {
    s.only_imports
}

fn is_visualization(c: &Categorizer, s: &CategorySignals<'_>) -> bool {
    s.has_embedded_spec || contains_any(s.text, &c.visualization_keywords)
}

fn is_data_loading(c: &Categorizer, s: &CategorySignals<'_>) -> bool {
    contains_any(s.text, &c.data_loading_keywords)
}

fn is_transform(_: &Categorizer, s: &CategorySignals<'_>) -> bool {
    s.has_expression_statement
}

/// Keyword-based content classifier
#[derive(Debug, Clone)]
pub struct Categorizer {
    visualization_keywords: Vec<String>,
    data_loading_keywords: Vec<String>,
}

impl Categorizer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            visualization_keywords: config.visualization_keywords.clone(),
            data_loading_keywords: config.data_loading_keywords.clone(),
        }
    }

    /// Apply the rule list, falling back to `Other`
    pub fn categorize(&self, signals: &CategorySignals<'_>) -> Category {
        RULES
            .iter()
            .find(|(_, rule)| rule(self, signals))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other)
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| text.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(text: &str) -> CategorySignals<'_> {
        CategorySignals {
            text,
            only_imports: false,
            has_expression_statement: true,
            has_embedded_spec: false,
        }
    }

    fn categorizer() -> Categorizer {
        Categorizer::new(&AnalyzerConfig::default())
    }

    #[test]
    fn test_imports_win_over_keywords() {
        let s = CategorySignals {
            only_imports: true,
            ..signals("import matplotlib.pyplot as plt")
        };
        assert_eq!(categorizer().categorize(&s), Category::Imports);
    }

    #[test]
    fn test_visualize_before_load_data() {
        let s = signals("pd.read_csv('a.csv').plot()");
        assert_eq!(categorizer().categorize(&s), Category::Visualize);
    }

    #[test]
    fn test_spec_marks_visualize() {
        let s = CategorySignals {
            has_embedded_spec: true,
            ..signals("chart = make()")
        };
        assert_eq!(categorizer().categorize(&s), Category::Visualize);
    }

    #[test]
    fn test_load_transform_other() {
        let c = categorizer();
        assert_eq!(c.categorize(&signals("df = pd.read_csv('x')")), Category::LoadData);
        assert_eq!(c.categorize(&signals("df = df.dropna()")), Category::Transform);

        let s = CategorySignals {
            has_expression_statement: false,
            ..signals("def f():\n    pass")
        };
        assert_eq!(c.categorize(&s), Category::Other);
    }
}
