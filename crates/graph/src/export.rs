//! Textual views of a dependency graph: a JSON-friendly summary and Graphviz DOT.

use crate::config::ExportConfig;
use crate::types::DependencyGraph;
use nbflow_analyzer::Category;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryNode {
    pub id: String,
    pub category: Category,
    pub defined: Vec<String>,
    pub used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub has_embedded_spec: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryEdge {
    pub source: String,
    pub target: String,
    pub vars: Vec<String>,
}

/// Serializable overview of a dependency graph, nodes in logical order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphSummary {
    pub nodes: Vec<SummaryNode>,
    pub edges: Vec<SummaryEdge>,
}

impl GraphSummary {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(_, node)| SummaryNode {
                id: node.id.clone(),
                category: node.category,
                defined: node.defined.iter().cloned().collect(),
                used: node.used.iter().cloned().collect(),
                output: node.output_variable().map(str::to_string),
                has_embedded_spec: node.embedded_spec.is_some(),
            })
            .collect();

        let edges = graph
            .nodes()
            .flat_map(|(idx, source)| {
                graph.outgoing(idx).into_iter().filter_map(move |(target, edge)| {
                    Some(SummaryEdge {
                        source: source.id.clone(),
                        target: graph.get_node(target)?.id.clone(),
                        vars: edge.vars.iter().cloned().collect(),
                    })
                })
            })
            .collect();

        Self { nodes, edges }
    }
}

/// Render the graph as Graphviz DOT using the configured category palette
pub fn to_dot(graph: &DependencyGraph, export: &ExportConfig) -> String {
    let mut out = String::from("digraph notebook {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];\n");

    for (idx, node) in graph.nodes() {
        let fill = export.node_colors.get(&node.category).map_or("white", String::as_str);
        let border = export.node_borders.get(&node.category).map_or("black", String::as_str);
        let _ = writeln!(
            out,
            "    n{} [label=\"{}\\n({})\", fillcolor=\"{}\", color=\"{}\"];",
            idx.index(),
            escape(&node.id),
            node.category,
            escape(fill),
            escape(border)
        );
    }

    for edge in graph.graph.edge_references() {
        let vars: Vec<&str> = edge.weight().vars.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "    n{} -> n{} [label=\"{}\"];",
            edge.source().index(),
            edge.target().index(),
            escape(&vars.join(", "))
        );
    }

    out.push_str("}\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
