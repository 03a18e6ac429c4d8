use crate::config::AnalyzerConfig;
use crate::literal::literal_eval;
use crate::stub_eval::StubEvaluator;
use serde_json::Value;
use tree_sitter::Node;

/// A parsed fragment as seen by spec extractors
pub struct ParsedFragment<'a> {
    /// Fragment text with magics and shell lines removed
    pub source: &'a str,

    /// Root `module` node of the parsed source
    pub root: Node<'a>,

    /// Right-hand sides assigned to the spec variable, in source order
    pub spec_candidates: Vec<Node<'a>>,
}

/// Capability to recover a chart spec from a fragment.
///
/// Implementations must not panic or propagate failures: anything that goes
/// wrong is `None`.
pub trait TrySpecExtractor {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Try to produce a chart spec for the fragment
    fn try_extract(&self, fragment: &ParsedFragment<'_>) -> Option<Value>;
}

/// Evaluates `spec = {...}` literals collected during name traversal
#[derive(Debug, Clone)]
pub struct LiteralSpecExtractor {
    schema_marker: String,
}

impl LiteralSpecExtractor {
    pub fn new(schema_marker: impl Into<String>) -> Self {
        Self {
            schema_marker: schema_marker.into(),
        }
    }
}

impl TrySpecExtractor for LiteralSpecExtractor {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn try_extract(&self, fragment: &ParsedFragment<'_>) -> Option<Value> {
        fragment.spec_candidates.iter().find_map(|&candidate| {
            match literal_eval(candidate, fragment.source) {
                Ok(value @ Value::Object(_)) if value.get(&self.schema_marker).is_some() => {
                    Some(value)
                }
                Ok(_) => None,
                Err(e) => {
                    log::debug!("spec literal rejected: {e}");
                    None
                }
            }
        })
    }
}

/// Runs chart-building code against stub libraries and renders the result
#[derive(Debug, Clone)]
pub struct StubChartExtractor {
    trigger_patterns: Vec<String>,
    step_limit: usize,
}

impl StubChartExtractor {
    pub fn new(trigger_patterns: Vec<String>, step_limit: usize) -> Self {
        Self {
            trigger_patterns,
            step_limit,
        }
    }
}

impl TrySpecExtractor for StubChartExtractor {
    fn name(&self) -> &'static str {
        "stub-eval"
    }

    fn try_extract(&self, fragment: &ParsedFragment<'_>) -> Option<Value> {
        if !self
            .trigger_patterns
            .iter()
            .any(|p| fragment.source.contains(p.as_str()))
        {
            return None;
        }

        let mut evaluator = StubEvaluator::new(fragment.source, self.step_limit);
        match evaluator.render_trailing_chart(fragment.root) {
            Ok(spec) => Some(spec),
            Err(e) => {
                log::debug!("stub chart evaluation gave up: {e}");
                None
            }
        }
    }
}

/// Extractors tried in order; the first spec wins
pub struct SpecExtractorChain {
    extractors: Vec<Box<dyn TrySpecExtractor + Send + Sync>>,
}

impl SpecExtractorChain {
    pub fn new(extractors: Vec<Box<dyn TrySpecExtractor + Send + Sync>>) -> Self {
        Self { extractors }
    }

    /// Literal extraction, then stub evaluation when enabled
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let mut extractors: Vec<Box<dyn TrySpecExtractor + Send + Sync>> =
            vec![Box::new(LiteralSpecExtractor::new(config.schema_marker.clone()))];

        if config.enable_stub_evaluation {
            extractors.push(Box::new(StubChartExtractor::new(
                config.chart_call_patterns.clone(),
                config.eval_step_limit,
            )));
        }

        Self::new(extractors)
    }

    pub fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<Value> {
        self.extractors.iter().find_map(|extractor| {
            let spec = extractor.try_extract(fragment);
            if spec.is_some() {
                log::debug!("embedded spec recovered by {} extractor", extractor.name());
            }
            spec
        })
    }
}
