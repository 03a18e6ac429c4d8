use crate::category::{CategorySignals, Categorizer};
use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};
use crate::literal::{is_truthy_constant, node_text};
use crate::spec_extract::{ParsedFragment, SpecExtractorChain};
use crate::types::{FragmentAnalysis, NameSet};
use lru::LruCache;
use regex::Regex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tree_sitter::{Node, Parser};

const IMPORT_KINDS: &[&str] = &[
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

/// Tree-sitter analyzer for notebook code fragments
pub struct FragmentAnalyzer {
    config: AnalyzerConfig,
    parser: Parser,
    magic_pattern: Regex,
    shell_pattern: Regex,
    categorizer: Categorizer,
    extractors: SpecExtractorChain,
    /// Memoized analyses keyed by exact fragment text
    cache: LruCache<String, FragmentAnalysis>,
}

impl FragmentAnalyzer {
    /// Create a new analyzer with the default spec extractors
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let extractors = SpecExtractorChain::from_config(&config);
        Self::with_extractors(config, extractors)
    }

    /// Create a new analyzer with a custom extractor chain
    pub fn with_extractors(config: AnalyzerConfig, extractors: SpecExtractorChain) -> Result<Self> {
        config.validate().map_err(AnalyzerError::invalid_config)?;

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AnalyzerError::tree_sitter(format!("Failed to set language: {e}")))?;

        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| AnalyzerError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        let magic_pattern = compile(&config.magic_pattern)?;
        let shell_pattern = compile(&config.shell_pattern)?;

        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| AnalyzerError::invalid_config("cache_capacity must be > 0"))?;

        Ok(Self {
            categorizer: Categorizer::new(&config),
            config,
            parser,
            magic_pattern,
            shell_pattern,
            extractors,
            cache: LruCache::new(capacity),
        })
    }

    /// Analyze one fragment; identical texts return identical (cached) results
    pub fn analyze(&mut self, text: &str) -> FragmentAnalysis {
        if let Some(hit) = self.cache.get(text) {
            return hit.clone();
        }

        let analysis = self.analyze_uncached(text);
        self.cache.put(text.to_string(), analysis.clone());
        analysis
    }

    /// Remove IPython magic and shell lines before parsing
    pub fn clean_source(&self, text: &str) -> String {
        let cleaned = self.magic_pattern.replace_all(text, "");
        self.shell_pattern.replace_all(&cleaned, "").into_owned()
    }

    fn analyze_uncached(&mut self, text: &str) -> FragmentAnalysis {
        let cleaned = self.clean_source(text);

        let Some(tree) = self.parser.parse(&cleaned, None) else {
            log::warn!("Could not parse a cell: parser returned no tree");
            return FragmentAnalysis::unparsed();
        };

        let root = tree.root_node();
        if root.has_error() {
            log::warn!(
                "Could not parse a cell: syntax error near line {}",
                first_error_line(root).map_or(0, |row| row + 1)
            );
            return FragmentAnalysis::unparsed();
        }

        let mut collector = NameCollector::new(&cleaned, &self.config);
        collector.visit(root);

        let NameCollector {
            defined,
            mut used,
            mutated,
            pure_overwrites,
            imported,
            spec_candidates,
            ..
        } = collector;

        let parsed = ParsedFragment {
            source: &cleaned,
            root,
            spec_candidates,
        };
        let embedded_spec = self.extractors.extract(&parsed);

        let category = self.categorizer.categorize(&CategorySignals {
            text,
            only_imports: top_level_statements(root).all(|n| IMPORT_KINDS.contains(&n.kind())),
            has_expression_statement: top_level_statements(root).any(is_transform_statement),
            has_embedded_spec: embedded_spec.is_some(),
        });

        used.extend(mutated);
        used.retain(|name| !imported.contains(name));

        FragmentAnalysis {
            defined,
            used,
            pure_overwrites,
            category,
            embedded_spec,
        }
    }
}

fn top_level_statements(root: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    let mut cursor = root.walk();
    let statements: Vec<_> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    statements.into_iter()
}

/// Plain assignments, calls and bare expressions. Augmented and annotated
/// assignments do not count.
fn is_transform_statement(statement: Node<'_>) -> bool {
    if statement.kind() != "expression_statement" {
        return false;
    }
    let mut cursor = statement.walk();
    let mut children = statement.named_children(&mut cursor);
    children.all(|child| match child.kind() {
        "augmented_assignment" => false,
        "assignment" => child.child_by_field_name("type").is_none(),
        _ => true,
    })
}

fn first_error_line(node: Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}

/// Single-pass name collector over a fragment's syntax tree
struct NameCollector<'a> {
    source: &'a str,
    mutation_keyword: &'a str,
    spec_variable: &'a str,
    defined: NameSet,
    used: NameSet,
    mutated: NameSet,
    pure_overwrites: NameSet,
    imported: HashSet<String>,
    /// Reads seen while visiting enclosing assignment right-hand sides
    rhs_frames: Vec<HashSet<String>>,
    spec_candidates: Vec<Node<'a>>,
}

impl<'a> NameCollector<'a> {
    fn new(source: &'a str, config: &'a AnalyzerConfig) -> Self {
        Self {
            source,
            mutation_keyword: &config.mutation_keyword,
            spec_variable: &config.spec_variable,
            defined: NameSet::new(),
            used: NameSet::new(),
            mutated: NameSet::new(),
            pure_overwrites: NameSet::new(),
            imported: HashSet::new(),
            rhs_frames: Vec::new(),
            spec_candidates: Vec::new(),
        }
    }

    fn text(&self, node: Node<'a>) -> &'a str {
        node_text(node, self.source)
    }

    fn read(&mut self, name: &str) {
        for frame in &mut self.rhs_frames {
            frame.insert(name.to_string());
        }
        self.used.insert(name.to_string());
    }

    fn write(&mut self, name: &str) {
        self.defined.insert(name.to_string());
    }

    fn visit_children(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    /// Visit a node in read context
    fn visit(&mut self, node: Node<'a>) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.read(name);
            }
            "comment" => {}
            "assignment" => self.visit_assignment(node),
            "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let name = self.text(left);
                        self.read(name);
                        self.write(name);
                    } else {
                        self.visit(left);
                    }
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right);
                }
            }
            "for_statement" | "for_in_clause" => {
                let left = node.child_by_field_name("left");
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                for child in children {
                    if Some(child) == left {
                        self.visit_target(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "named_expression" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.visit_target(name);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "as_pattern" | "except_clause" => {
                let alias = node.child_by_field_name("alias");
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                for child in children {
                    if Some(child) == alias || child.kind() == "as_pattern_target" {
                        self.visit_target(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "function_definition" | "class_definition" => {
                let name = node.child_by_field_name("name");
                let parameters = node.child_by_field_name("parameters");
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                for child in children {
                    if Some(child) == name {
                        let defined = self.text(child);
                        self.write(defined);
                    } else if Some(child) == parameters {
                        self.visit_parameters(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "lambda" => {
                if let Some(parameters) = node.child_by_field_name("parameters") {
                    self.visit_parameters(parameters);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body);
                }
            }
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                self.collect_imports(node);
            }
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "call" => {
                self.check_mutating_call(node);
                self.visit_children(node);
            }
            "global_statement" | "nonlocal_statement" => {}
            "delete_statement" => {
                let mut cursor = node.walk();
                let targets: Vec<_> = node.named_children(&mut cursor).collect();
                for target in targets {
                    if target.kind() == "expression_list" {
                        let mut inner = target.walk();
                        let items: Vec<_> = target.named_children(&mut inner).collect();
                        for item in items.into_iter().filter(|n| n.kind() != "identifier") {
                            self.visit(item);
                        }
                    } else if target.kind() != "identifier" {
                        self.visit(target);
                    }
                }
            }
            _ => self.visit_children(node),
        }
    }

    /// Visit a node in write context (assignment and loop targets)
    fn visit_target(&mut self, node: Node<'a>) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.write(name);
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "expression_list" | "parenthesized_expression" | "list_splat_pattern"
            | "list_splat" | "as_pattern_target" => {
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                for child in children {
                    self.visit_target(child);
                }
            }
            // Subscript and attribute targets read their base object.
            _ => self.visit(node),
        }
    }

    /// Parameter names bind nothing; defaults and annotations are reads
    fn visit_parameters(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        let parameters: Vec<_> = node.named_children(&mut cursor).collect();
        for parameter in parameters {
            match parameter.kind() {
                "default_parameter" | "typed_parameter" | "typed_default_parameter" => {
                    for field in ["type", "value"] {
                        if let Some(child) = parameter.child_by_field_name(field) {
                            self.visit(child);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_assignment(&mut self, node: Node<'a>) {
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(left);
            }
            if let Some(annotation) = current.child_by_field_name("type") {
                self.visit(annotation);
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                other => break other,
            }
        };

        for &target in &targets {
            if target.kind() == "subscript" {
                if let Some(base) = target
                    .child_by_field_name("value")
                    .filter(|base| base.kind() == "identifier")
                {
                    let name = self.text(base).to_string();
                    self.mutated.insert(name);
                }
            }
            self.visit_target(target);
        }

        let Some(value) = value else {
            return;
        };

        self.rhs_frames.push(HashSet::new());
        self.visit(value);
        let rhs_reads = self.rhs_frames.pop().unwrap_or_default();

        let bare_targets: Vec<&'a str> = targets
            .iter()
            .filter(|target| target.kind() == "identifier")
            .map(|&target| self.text(target))
            .collect();

        for name in &bare_targets {
            if !rhs_reads.contains(*name) {
                self.pure_overwrites.insert((*name).to_string());
            }
        }

        if bare_targets.contains(&self.spec_variable) {
            self.spec_candidates.push(value);
        }
    }

    /// `obj.method(..., inplace=True)` mutates `obj`
    fn check_mutating_call(&mut self, node: Node<'a>) {
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return;
        };

        let mut cursor = arguments.walk();
        let mutates = arguments
            .named_children(&mut cursor)
            .filter(|arg| arg.kind() == "keyword_argument")
            .any(|arg| {
                let name_matches = arg
                    .child_by_field_name("name")
                    .is_some_and(|name| self.text(name) == self.mutation_keyword);
                name_matches
                    && arg
                        .child_by_field_name("value")
                        .is_some_and(|value| is_truthy_constant(value, self.source))
            });

        if !mutates {
            return;
        }

        if let Some(receiver) = node
            .child_by_field_name("function")
            .filter(|function| function.kind() == "attribute")
            .and_then(|function| function.child_by_field_name("object"))
            .filter(|object| object.kind() == "identifier")
        {
            let name = self.text(receiver).to_string();
            self.mutated.insert(name);
        }
    }

    fn collect_imports(&mut self, node: Node<'a>) {
        let from_import = node.kind() == "import_from_statement";
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();

        for name in names {
            let binding = match name.kind() {
                "aliased_import" => name.child_by_field_name("alias").map(|alias| self.text(alias)),
                // `import a.b` binds `a`; `from m import a` binds `a`
                _ => {
                    let dotted = self.text(name);
                    if from_import {
                        Some(dotted)
                    } else {
                        dotted.split('.').next()
                    }
                }
            };

            if let Some(binding) = binding.filter(|b| !b.is_empty()) {
                self.imported.insert(binding.to_string());
            }
        }
    }
}
