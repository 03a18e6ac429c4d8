use crate::config::ConverterConfig;
use crate::error::{GraphError, Result};
use crate::types::{DependencyGraph, FragmentNode};
use nbflow_analyzer::{Category, Fragment, FragmentAnalyzer};
use std::collections::HashMap;

/// Build a dependency graph from notebook fragments
pub struct GraphBuilder {
    analyzer: FragmentAnalyzer,
    /// Category -> priority rank in the logical order
    priority: HashMap<Category, usize>,
}

impl GraphBuilder {
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        config.validate().map_err(GraphError::InvalidConfig)?;
        let analyzer = FragmentAnalyzer::new(config.analyzer.clone())?;
        Ok(Self::with_analyzer(analyzer, &config.layout.category_order))
    }

    /// Use an existing analyzer (and its cache) with the given category priority
    pub fn with_analyzer(analyzer: FragmentAnalyzer, category_order: &[Category]) -> Self {
        let priority = category_order
            .iter()
            .enumerate()
            .map(|(rank, category)| (*category, rank))
            .collect();
        Self { analyzer, priority }
    }

    /// Build graph from fragments
    pub fn build(&mut self, fragments: &[Fragment]) -> DependencyGraph {
        // Phase 1: Analyze every fragment
        let mut nodes: Vec<FragmentNode> = fragments
            .iter()
            .map(|fragment| FragmentNode::new(fragment, self.analyzer.analyze(&fragment.text)))
            .collect();

        // Phase 2: Stable sort into logical order
        let unranked = self.priority.len();
        nodes.sort_by_key(|node| self.priority.get(&node.category).copied().unwrap_or(unranked));

        let mut graph = DependencyGraph::new();
        let order: Vec<_> = nodes.into_iter().map(|node| graph.add_node(node)).collect();

        // Phase 3: Nearest-definer resolution
        for (position, &consumer) in order.iter().enumerate() {
            let relevant: Vec<String> = graph
                .get_node(consumer)
                .map(|node| node.relevant_uses().map(str::to_string).collect())
                .unwrap_or_default();

            for var in &relevant {
                let producer = order[..position].iter().rev().copied().find(|&candidate| {
                    graph
                        .get_node(candidate)
                        .is_some_and(|node| node.defined.contains(var))
                });

                if let Some(producer) = producer {
                    graph.add_dependency(producer, consumer, var);
                }
            }
        }

        log::info!(
            "Dependency graph built: {} fragments, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        if log::log_enabled!(log::Level::Debug) {
            for category in Category::ALL {
                let count = graph.nodes().filter(|(_, n)| n.category == category).count();
                if count > 0 {
                    log::debug!("  {category}: {count}");
                }
            }
        }

        graph
    }
}
