//! Attributed graph model
//!
//! This module implements the single-instance graph:
//! - Vertices, transactions and the links aggregating them
//! - Typed attribute columns for vertices, transactions and graph-level data
//! - Modification counters for cheap change detection
//! - Primary keys with merge-on-duplicate validation
//! - A replayable, undoable edit journal

pub mod attribute;
pub mod counters;
pub mod edit;
pub(crate) mod element;
mod keys;
pub mod merger;
pub mod methods;
pub mod schema;
pub mod storage;
pub mod store;
pub mod types;
pub mod value;

// Re-export main types
pub use attribute::AttributeDescriptor;
pub use counters::ModificationCounters;
pub use edit::EditOp;
pub use merger::{AttributeMerger, ConcatenateMerger, DefaultMerger, MergerRegistry, ReplaceMerger};
pub use methods::{GraphReadMethods, GraphWriteMethods};
pub use schema::{schema_by_name, BareSchema, NoSchema, Schema};
pub use storage::Column;
pub use store::{Graph, GraphCapacity, GraphError, GraphResult};
pub use types::{
    AttributeId, Direction, ElementId, ElementType, GraphId, Incidence, LinkId, TransactionId,
    VertexId,
};
pub use value::{AttributeType, AttributeValue, Color, KeyFragment};
