//! Dual Graph
//!
//! A transactional, in-memory attributed graph that keeps readers and a
//! single writer out of each other's way by maintaining two synchronized
//! copies of the same graph.
//!
//! # Architecture
//!
//! - [`graph`]: the single-instance graph with vertices, transactions,
//!   links, typed attributes, primary keys and modification counters
//! - [`locking`]: the dual-graph lock, read and write handles, commit
//!   publication and commit listeners
//! - [`config`]: YAML-loadable settings for building a [`DualGraph`]
//!
//! ## Example Usage
//!
//! ```rust
//! use dualgraph::{AttributeType, DualGraph, ElementType, Graph, GraphReadMethods, GraphWriteMethods};
//!
//! let graph = DualGraph::new(Graph::new());
//!
//! let mut wg = graph.get_writable_graph("Add vertex", true).unwrap();
//! let name = wg
//!     .add_attribute(ElementType::Vertex, AttributeType::String, "name", "Vertex name", None, None)
//!     .unwrap();
//! let v = wg.add_vertex().unwrap();
//! wg.set_string_value(name, v, "Hello".to_string()).unwrap();
//! wg.commit().unwrap();
//!
//! let rg = graph.get_readable_graph();
//! assert_eq!(rg.get_string_value(name, v).unwrap(), "Hello");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod locking;

// Re-export main types for convenience
pub use graph::{
    AttributeDescriptor, AttributeId, AttributeMerger, AttributeType, AttributeValue, BareSchema,
    Color, Direction, EditOp, ElementId, ElementType, Graph, GraphCapacity, GraphError, GraphId,
    GraphReadMethods, GraphResult, GraphWriteMethods, LinkId, MergerRegistry,
    ModificationCounters, NoSchema, Schema, TransactionId, VertexId,
};

pub use locking::{
    CommitEvent, CommitListener, DualGraph, Interrupter, LockOptions, LockSnapshot, ReadHandle,
    WriteHandle,
};

pub use config::{ConfigError, ConfigResult, DualGraphConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
