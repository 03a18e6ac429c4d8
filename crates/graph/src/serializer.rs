use crate::config::{ConverterConfig, ExportConfig, LayoutConfig};
use crate::error::{GraphError, Result};
use crate::layout::{compute_layout, Position};
use crate::types::{DependencyGraph, FragmentNode};
use nbflow_analyzer::Category;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

const DEFAULT_PORT: &str = "DEFAULT";

/// Top-level Curio workflow document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurioDocument {
    pub dataflow: Dataflow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataflow {
    pub nodes: Vec<CurioNode>,
    pub edges: Vec<CurioEdge>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurioNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub out: String,
    #[serde(rename = "in")]
    pub input: String,
    pub goal: String,
    pub metadata: NodeMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadata {
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurioEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Emits a dependency graph as a Curio dataflow document
pub struct CurioSerializer {
    layout: LayoutConfig,
    export: ExportConfig,
    load_data_pattern: Regex,
}

impl CurioSerializer {
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        config.validate().map_err(GraphError::InvalidConfig)?;

        let pattern = &config.export.load_data_pattern;
        let load_data_pattern = Regex::new(pattern).map_err(|source| GraphError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;

        Ok(Self {
            layout: config.layout.clone(),
            export: config.export.clone(),
            load_data_pattern,
        })
    }

    /// Build the document; `Imports` fragments are left out
    pub fn serialize(&self, graph: &DependencyGraph) -> CurioDocument {
        let graph = graph.without_imports();
        let positions = compute_layout(&graph, &self.layout);

        let ids: HashMap<NodeIndex, String> = graph
            .graph
            .node_indices()
            .map(|idx| (idx, Uuid::new_v4().to_string()))
            .collect();

        let nodes = graph
            .nodes()
            .map(|(idx, node)| {
                let input = graph
                    .input_variable(idx)
                    .unwrap_or(self.export.input_placeholder.as_str());
                let output = node.output_variable().unwrap_or(input);
                let position = positions.get(&idx).copied().unwrap_or_default();
                self.emit_node(&ids[&idx], node, input, output, position)
            })
            .collect();

        let edges = graph
            .graph
            .edge_references()
            .map(|edge| {
                let source = ids[&edge.source()].clone();
                let target = ids[&edge.target()].clone();
                CurioEdge {
                    id: format!("reactflow__edge-{source}out-{target}in"),
                    source,
                    target,
                }
            })
            .collect();

        CurioDocument {
            dataflow: Dataflow {
                nodes,
                edges,
                name: self.export.workflow_name.clone(),
            },
        }
    }

    /// Build the document as a JSON value
    pub fn to_value(&self, graph: &DependencyGraph) -> Result<Value> {
        Ok(serde_json::to_value(self.serialize(graph))?)
    }

    fn emit_node(
        &self,
        id: &str,
        node: &FragmentNode,
        input: &str,
        output: &str,
        position: Position,
    ) -> CurioNode {
        CurioNode {
            id: id.to_string(),
            node_type: self.export.node_type(node.category).to_string(),
            x: position.x,
            y: position.y,
            content: self.rewrite_content(node, input, output),
            out: DEFAULT_PORT.to_string(),
            input: DEFAULT_PORT.to_string(),
            goal: String::new(),
            metadata: NodeMetadata::default(),
        }
    }

    /// Make a fragment self-contained under the `arg in, value out` convention
    pub fn rewrite_content(&self, node: &FragmentNode, input: &str, output: &str) -> String {
        match (node.category, &node.embedded_spec) {
            (Category::Visualize, Some(spec)) => {
                let mut spec = spec.clone();
                if let Value::Object(map) = &mut spec {
                    map.insert("data".to_string(), json!({ "name": input }));
                }
                serde_json::to_string_pretty(&spec).unwrap_or_else(|e| {
                    log::warn!("Could not render spec for {}: {e}", node.id);
                    node.source.clone()
                })
            }
            (Category::LoadData, _) => self
                .load_data_pattern
                .replace_all(&node.source, "import pandas as pd\nreturn ${1}")
                .into_owned(),
            (Category::Transform, _) => format!(
                "{input} = {}\n{}\nreturn {output}",
                self.export.input_placeholder, node.source
            ),
            _ => node.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use nbflow_analyzer::Fragment;
    use pretty_assertions::assert_eq;

    fn document(fragments: &[(&str, &str)]) -> CurioDocument {
        let config = ConverterConfig::default();
        let fragments: Vec<Fragment> = fragments
            .iter()
            .map(|(id, text)| Fragment::new(*id, *text))
            .collect();
        let graph = GraphBuilder::new(&config).unwrap().build(&fragments);
        CurioSerializer::new(&config).unwrap().serialize(&graph)
    }

    #[test]
    fn test_pipeline_document() {
        let doc = document(&[
            ("imp", "import pandas as pd"),
            ("load", "df = pd.read_csv('sales.csv')"),
            ("clean", "clean = df.dropna()"),
            (
                "viz",
                "spec = {\"$schema\": \"https://vega.github.io/schema/vega-lite/v5.json\", \"mark\": \"bar\", \"data\": {\"url\": \"x.csv\"}}",
            ),
        ]);

        let flow = &doc.dataflow;
        assert_eq!(flow.name, "GeneratedWorkflow");
        assert_eq!(flow.nodes.len(), 3);

        let load = &flow.nodes[0];
        assert_eq!(load.node_type, "DATA_LOADING");
        assert_eq!(load.content, "import pandas as pd\nreturn pd.read_csv('sales.csv')");
        assert_eq!((load.x, load.y), (0.0, -250.0));

        let clean = &flow.nodes[1];
        assert_eq!(clean.node_type, "DATA_CLEANING");
        assert_eq!(clean.content, "df = arg\nclean = df.dropna()\nreturn clean");
        assert_eq!((clean.x, clean.y), (800.0, 0.0));

        // The spec fragment reads nothing, so it shares the first column.
        let viz = &flow.nodes[2];
        assert_eq!(viz.node_type, "VIS_VEGA");
        let spec: Value = serde_json::from_str(&viz.content).unwrap();
        assert_eq!(spec["data"], json!({"name": "arg"}));
        assert_eq!(spec["mark"], "bar");
        assert_eq!((viz.x, viz.y), (0.0, 250.0));

        assert_eq!(flow.edges.len(), 1);
        let edge = &flow.edges[0];
        assert_eq!(edge.source, load.id);
        assert_eq!(edge.target, clean.id);
        assert_eq!(edge.id, format!("reactflow__edge-{}out-{}in", load.id, clean.id));
    }

    #[test]
    fn test_to_value_matches_document() {
        let config = ConverterConfig::default();
        let graph = GraphBuilder::new(&config)
            .unwrap()
            .build(&[Fragment::new("a", "x = 1")]);
        let value = CurioSerializer::new(&config).unwrap().to_value(&graph).unwrap();

        assert_eq!(value["dataflow"]["name"], "GeneratedWorkflow");
        assert_eq!(value["dataflow"]["nodes"][0]["content"], "arg = arg\nx = 1\nreturn x");
        assert_eq!(value["dataflow"]["edges"], json!([]));
    }

    #[test]
    fn test_node_shape() {
        let doc = document(&[("a", "x = 1")]);
        let value = serde_json::to_value(&doc).unwrap();
        let node = &value["dataflow"]["nodes"][0];

        assert!(Uuid::parse_str(node["id"].as_str().unwrap()).is_ok());
        assert_eq!(node["type"], "DATA_CLEANING");
        assert_eq!(node["in"], "DEFAULT");
        assert_eq!(node["out"], "DEFAULT");
        assert_eq!(node["goal"], "");
        assert_eq!(node["metadata"], json!({"keywords": []}));
        assert_eq!(node["content"], "arg = arg\nx = 1\nreturn x");
    }

    #[test]
    fn test_visualization_receives_upstream_variable() {
        let doc = document(&[
            ("load", "df = pd.read_csv('a.csv')"),
            (
                "viz",
                "spec = {'$schema': 'https://vega.github.io/schema/vega-lite/v5.json', 'mark': 'point'}\nshow(df, spec)",
            ),
        ]);

        let viz = &doc.dataflow.nodes[1];
        let spec: Value = serde_json::from_str(&viz.content).unwrap();
        assert_eq!(spec["data"], json!({"name": "df"}));
    }

    #[test]
    fn test_other_passes_through() {
        let source = "def helper(x):\n    return x * 2";
        let doc = document(&[("def", source)]);
        assert_eq!(doc.dataflow.nodes[0].content, source);
        assert_eq!(doc.dataflow.nodes[0].node_type, "DATA_CLEANING");
    }

    #[test]
    fn test_output_defaults_to_input() {
        let doc = document(&[
            ("load", "df = pd.read_csv('a.csv')"),
            ("mutate", "df.dropna(inplace=True)"),
        ]);
        assert_eq!(
            doc.dataflow.nodes[1].content,
            "df = arg\ndf.dropna(inplace=True)\nreturn df"
        );
    }

    #[test]
    fn test_imports_only_gives_empty_document() {
        let doc = document(&[("imp", "import os\nimport sys")]);
        assert!(doc.dataflow.nodes.is_empty());
        assert!(doc.dataflow.edges.is_empty());
    }

    #[test]
    fn test_fresh_ids_per_run() {
        let first = document(&[("a", "x = 1")]);
        let second = document(&[("a", "x = 1")]);
        assert_ne!(first.dataflow.nodes[0].id, second.dataflow.nodes[0].id);
    }
}
