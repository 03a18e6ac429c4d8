use indexmap::IndexSet;
use nbflow_analyzer::{Category, Fragment, FragmentAnalysis, NameSet};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Node in the dependency graph: one analyzed fragment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FragmentNode {
    /// Fragment id (unique within the input)
    pub id: String,

    /// Raw fragment text
    pub source: String,

    pub category: Category,

    pub defined: NameSet,
    pub used: NameSet,
    pub pure_overwrites: NameSet,

    /// Vega-Lite document found in the fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_spec: Option<Value>,
}

impl FragmentNode {
    pub fn new(fragment: &Fragment, analysis: FragmentAnalysis) -> Self {
        Self {
            id: fragment.id.clone(),
            source: fragment.text.clone(),
            category: analysis.category,
            defined: analysis.defined,
            used: analysis.used,
            pure_overwrites: analysis.pure_overwrites,
            embedded_spec: analysis.embedded_spec,
        }
    }

    /// Used names that can create an inbound edge
    pub fn relevant_uses(&self) -> impl Iterator<Item = &str> {
        self.used
            .iter()
            .filter(|name| !self.pure_overwrites.contains(*name))
            .map(String::as_str)
    }

    /// First defined name, the value this fragment hands downstream
    pub fn output_variable(&self) -> Option<&str> {
        self.defined.first().map(String::as_str)
    }
}

/// Edge in the dependency graph: variables flowing from producer to consumer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataEdge {
    /// Names justifying the edge, in resolution order
    pub vars: IndexSet<String>,
}

impl DataEdge {
    pub fn first_var(&self) -> Option<&str> {
        self.vars.first().map(String::as_str)
    }
}

/// Fragment dependency graph.
///
/// Nodes are stored in logical order, so `NodeIndex` order is logical order
/// and every edge points from a lower to a higher index.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Directed graph (producer -> consumer)
    pub graph: DiGraph<FragmentNode, DataEdge>,

    /// Fragment id -> NodeIndex mapping for fast lookup
    pub id_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add node to graph
    pub fn add_node(&mut self, node: FragmentNode) -> NodeIndex {
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        idx
    }

    /// Record `var` on the edge `from -> to`, creating the edge if needed
    pub fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex, var: &str) {
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                if let Some(weight) = self.graph.edge_weight_mut(edge) {
                    weight.vars.insert(var.to_string());
                }
            }
            None => {
                let mut edge = DataEdge::default();
                edge.vars.insert(var.to_string());
                self.graph.add_edge(from, to, edge);
            }
        }
    }

    /// Find node by fragment id
    pub fn find_node(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    /// Get node data
    pub fn get_node(&self, idx: NodeIndex) -> Option<&FragmentNode> {
        self.graph.node_weight(idx)
    }

    /// Get all nodes in logical order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &FragmentNode)> {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx).map(|node| (idx, node)))
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
