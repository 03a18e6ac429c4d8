use crate::error::{GraphError, Result};
use crate::types::{DataEdge, DependencyGraph, FragmentNode};
use nbflow_analyzer::Category;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

impl DependencyGraph {
    /// Inbound edges of `node` as (producer, edge), in creation order
    pub fn incoming(&self, node: NodeIndex) -> Vec<(NodeIndex, &DataEdge)> {
        self.edges_in_order(node, Direction::Incoming)
    }

    /// Outbound edges of `node` as (consumer, edge), in creation order
    pub fn outgoing(&self, node: NodeIndex) -> Vec<(NodeIndex, &DataEdge)> {
        self.edges_in_order(node, Direction::Outgoing)
    }

    fn edges_in_order(&self, node: NodeIndex, direction: Direction) -> Vec<(NodeIndex, &DataEdge)> {
        let mut edges: Vec<(EdgeIndex, NodeIndex, &DataEdge)> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (e.id(), other, e.weight())
            })
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges
            .into_iter()
            .map(|(_, other, weight)| (other, weight))
            .collect()
    }

    /// Variable feeding `node`: first variable of its first inbound edge
    pub fn input_variable(&self, node: NodeIndex) -> Option<&str> {
        self.incoming(node)
            .into_iter()
            .find_map(|(_, edge)| edge.first_var())
    }

    /// Variables a fragment consumes, keyed by producer fragment id
    pub fn dependencies_of(&self, id: &str) -> Result<Vec<(&str, Vec<&str>)>> {
        let node = self
            .find_node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        Ok(self
            .incoming(node)
            .into_iter()
            .filter_map(|(producer, edge)| {
                let producer = self.get_node(producer)?;
                Some((
                    producer.id.as_str(),
                    edge.vars.iter().map(String::as_str).collect(),
                ))
            })
            .collect())
    }

    /// Copy of the graph without `Imports` nodes and their edges
    pub fn without_imports(&self) -> DependencyGraph {
        let graph = self.graph.filter_map(
            |_, node: &FragmentNode| (node.category != Category::Imports).then(|| node.clone()),
            |_, edge| Some(edge.clone()),
        );

        let id_index: HashMap<String, NodeIndex> = graph
            .node_indices()
            .filter_map(|idx| graph.node_weight(idx).map(|node| (node.id.clone(), idx)))
            .collect();

        DependencyGraph { graph, id_index }
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Topological generations: sources first, each node one past its
    /// deepest producer. `None` if the graph has a cycle.
    pub fn topological_generations(&self) -> Option<Vec<Vec<NodeIndex>>> {
        let order = petgraph::algo::toposort(&self.graph, None).ok()?;

        let mut generation: HashMap<NodeIndex, usize> = HashMap::with_capacity(order.len());
        for &node in &order {
            let depth = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|producer| generation.get(&producer))
                .map(|g| g + 1)
                .max()
                .unwrap_or(0);
            generation.insert(node, depth);
        }

        let depth = generation.values().max().map_or(0, |g| g + 1);
        let mut layers = vec![Vec::new(); depth];
        // Node index order keeps each generation in logical order.
        for node in self.graph.node_indices() {
            if let Some(&g) = generation.get(&node) {
                layers[g].push(node);
            }
        }
        Some(layers)
    }
}
