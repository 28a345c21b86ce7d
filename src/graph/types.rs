//! Core type definitions for the dual graph
//!
//! Element identifiers are dense `u32` values handed out by the element
//! tables; they are stable for the lifetime of an element and reused only
//! after the element has been removed.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                $name(id)
            }

            pub fn as_u32(&self) -> u32 {
                self.0
            }

            pub(crate) fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                $name(id)
            }
        }
    };
}

element_id!(
    /// Identifier of a vertex
    VertexId,
    "VertexId"
);

element_id!(
    /// Identifier of a transaction (a single edge instance between two vertices)
    TransactionId,
    "TransactionId"
);

element_id!(
    /// Identifier of a link (all transactions between one unordered vertex pair)
    LinkId,
    "LinkId"
);

element_id!(
    /// Identifier of an attribute column
    AttributeId,
    "AttributeId"
);

/// Untyped element reference used by the attribute accessors.
///
/// Which table the id refers to is decided by the element type of the
/// attribute being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl ElementId {
    /// The single element of the GRAPH and META element types
    pub const GRAPH: ElementId = ElementId(0);

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

impl From<u32> for ElementId {
    fn from(id: u32) -> Self {
        ElementId(id)
    }
}

impl From<VertexId> for ElementId {
    fn from(id: VertexId) -> Self {
        ElementId(id.0)
    }
}

impl From<TransactionId> for ElementId {
    fn from(id: TransactionId) -> Self {
        ElementId(id.0)
    }
}

/// The kinds of element an attribute can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ElementType {
    Vertex,
    Transaction,
    Graph,
    Meta,
}

impl ElementType {
    pub const ALL: [ElementType; 4] = [
        ElementType::Vertex,
        ElementType::Transaction,
        ElementType::Graph,
        ElementType::Meta,
    ];

    pub fn ordinal(&self) -> usize {
        match self {
            ElementType::Vertex => 0,
            ElementType::Transaction => 1,
            ElementType::Graph => 2,
            ElementType::Meta => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Vertex => "vertex",
            ElementType::Transaction => "transaction",
            ElementType::Graph => "graph",
            ElementType::Meta => "meta",
        }
    }

    /// Whether this element type has exactly one element (id 0)
    pub fn is_singleton(&self) -> bool {
        matches!(self, ElementType::Graph | ElementType::Meta)
    }

    /// Whether primary keys may be defined for this element type
    pub fn supports_primary_key(&self) -> bool {
        matches!(self, ElementType::Vertex | ElementType::Transaction)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Direction of a transaction relative to its link's low and high vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Directed from the low vertex to the high vertex (self loops included)
    Uphill,
    /// Directed from the high vertex to the low vertex
    Downhill,
    /// Undirected
    Flat,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Uphill, Direction::Downhill, Direction::Flat];

    pub(crate) fn slot(&self) -> usize {
        match self {
            Direction::Uphill => 0,
            Direction::Downhill => 1,
            Direction::Flat => 2,
        }
    }

    pub fn is_directed(&self) -> bool {
        !matches!(self, Direction::Flat)
    }
}

/// How a transaction touches a particular vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Incidence {
    Outgoing,
    Incoming,
    Undirected,
}

/// Stable identity shared by both targets of a dual graph.
///
/// External consumers that keep per-graph state key it on this value rather
/// than on process-wide globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(Uuid);

impl GraphId {
    pub fn new() -> Self {
        GraphId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_id() {
        let id = VertexId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(format!("{}", id), "VertexId(42)");

        let id2: VertexId = 100.into();
        assert_eq!(id2.as_u32(), 100);
    }

    #[test]
    fn test_transaction_id() {
        let id = TransactionId::new(99);
        assert_eq!(id.as_u32(), 99);
        assert_eq!(format!("{}", id), "TransactionId(99)");
    }

    #[test]
    fn test_element_id_conversions() {
        let from_vertex: ElementId = VertexId::new(7).into();
        let from_transaction: ElementId = TransactionId::new(7).into();
        assert_eq!(from_vertex, from_transaction);
        assert_eq!(ElementId::GRAPH.as_u32(), 0);
    }

    #[test]
    fn test_element_type_table() {
        for (i, et) in ElementType::ALL.iter().enumerate() {
            assert_eq!(et.ordinal(), i);
        }
        assert!(ElementType::Graph.is_singleton());
        assert!(!ElementType::Vertex.is_singleton());
        assert!(ElementType::Transaction.supports_primary_key());
        assert!(!ElementType::Meta.supports_primary_key());
    }

    #[test]
    fn test_graph_ids_are_distinct() {
        assert_ne!(GraphId::new(), GraphId::new());
    }
}
