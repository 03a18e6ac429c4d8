//! # nbflow graph
//!
//! Dataflow between notebook fragments, inferred from the names each one
//! defines and reads, and emitted as a Curio workflow.
//!
//! ## Features
//!
//! - **Logical ordering** - fragments grouped by category priority (stable)
//! - **Nearest-definer edges** - each read binds to the closest earlier writer
//! - **Layered layout** - one column per topological generation
//! - **Curio serialization** - self-contained node bodies, UUID node ids
//!
//! ## Architecture
//!
//! ```text
//! Fragment[]
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Analyze fragments (nbflow-analyzer)
//!     │      ├─ Sort into logical order
//!     │      └─ Build edges (producer -> consumer, with variables)
//!     │
//!     ├──> Dependency Graph (petgraph)
//!     │      ├─ Nodes: fragments in logical order
//!     │      └─ Edges: variables flowing downstream
//!     │
//!     └──> Curio Serializer
//!            ├─ Strip import fragments
//!            ├─ Layout by topological generation
//!            └─ Rewrite bodies to the `arg` in / value out convention
//! ```
//!
//! ## Example
//!
//! ```rust
//! use nbflow_graph::{convert, ConverterConfig, Fragment};
//!
//! let fragments = vec![
//!     Fragment::new("load", "df = pd.read_csv('sales.csv')"),
//!     Fragment::new("clean", "df = df.dropna()"),
//! ];
//! let document = convert(&fragments, &ConverterConfig::default()).unwrap();
//!
//! assert_eq!(document.dataflow.nodes.len(), 2);
//! assert_eq!(document.dataflow.edges.len(), 1);
//! ```

mod builder;
mod config;
mod error;
mod export;
mod graph;
mod layout;
mod serializer;
mod types;

pub use builder::GraphBuilder;
pub use config::{ConverterConfig, ExportConfig, LayoutConfig};
pub use error::{GraphError, Result};
pub use export::{to_dot, GraphSummary, SummaryEdge, SummaryNode};
pub use layout::{compute_layout, Position};
pub use serializer::{CurioDocument, CurioEdge, CurioNode, CurioSerializer, Dataflow, NodeMetadata};
pub use types::{DataEdge, DependencyGraph, FragmentNode};

pub use nbflow_analyzer::{Category, Fragment};

/// Analyze, link and serialize fragments in one call
pub fn convert(fragments: &[Fragment], config: &ConverterConfig) -> Result<CurioDocument> {
    let graph = GraphBuilder::new(config)?.build(fragments);
    Ok(CurioSerializer::new(config)?.serialize(&graph))
}
