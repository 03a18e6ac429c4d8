use crate::config::LayoutConfig;
use crate::types::DependencyGraph;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canvas position of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Place nodes column by column, one column per topological generation,
/// each column centered on y = 0. Falls back to a single row when the graph
/// has a cycle.
pub fn compute_layout(graph: &DependencyGraph, config: &LayoutConfig) -> HashMap<NodeIndex, Position> {
    if graph.is_empty() {
        return HashMap::new();
    }

    let Some(generations) = graph.topological_generations() else {
        log::warn!("Cycle detected in dependency graph; using linear layout");
        return graph
            .graph
            .node_indices()
            .enumerate()
            .map(|(i, node)| {
                (
                    node,
                    Position {
                        x: i as f64 * config.spacing_x,
                        y: 0.0,
                    },
                )
            })
            .collect();
    };

    let mut positions = HashMap::with_capacity(graph.node_count());
    for (column, layer) in generations.iter().enumerate() {
        // Written as (1 - n) so a single-node column sits at +0.0, not -0.0.
        let start_y = (1.0 - layer.len() as f64) * config.spacing_y / 2.0;
        for (row, &node) in layer.iter().enumerate() {
            positions.insert(
                node,
                Position {
                    x: column as f64 * config.spacing_x,
                    y: start_y + row as f64 * config.spacing_y,
                },
            );
        }
    }
    positions
}
