//! Read and write method surface of graph handles
//!
//! [`GraphReadMethods`] is implemented by read and write handles,
//! [`GraphWriteMethods`] by write handles only, so mutating through a read
//! handle does not compile. Every method reports handle misuse (for example
//! access after release) as a [`GraphError`].

use super::attribute::AttributeDescriptor;
use super::counters::ModificationCounters;
use super::store::{Graph, GraphResult};
use super::types::{
    AttributeId, Direction, ElementId, ElementType, GraphId, Incidence, LinkId, TransactionId,
    VertexId,
};
use super::value::{AttributeType, AttributeValue, Color};

macro_rules! typed_getters {
    ($($get:ident -> $ty:ty;)*) => {
        $(
            fn $get(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<$ty> {
                let element = element.into();
                self.with_read(|g| g.$get(attribute, element))
            }
        )*
    };
}

macro_rules! typed_setters {
    ($($set:ident($ty:ty);)*) => {
        $(
            fn $set(&self, attribute: AttributeId, element: impl Into<ElementId>, value: $ty) -> GraphResult<()> {
                let element = element.into();
                self.with_write(|g| g.$set(attribute, element, value))
            }
        )*
    };
}

/// Queries available on every graph handle
pub trait GraphReadMethods {
    /// Run `f` against the graph this handle reads
    fn with_read<R, F>(&self, f: F) -> GraphResult<R>
    where
        F: FnOnce(&Graph) -> GraphResult<R>;

    fn id(&self) -> GraphResult<GraphId> {
        self.with_read(|g| Ok(g.id()))
    }

    // Modification counters

    fn global_modification_counter(&self) -> GraphResult<u64> {
        self.with_read(|g| Ok(g.global_modification_counter()))
    }

    fn structure_modification_counter(&self) -> GraphResult<u64> {
        self.with_read(|g| Ok(g.structure_modification_counter()))
    }

    fn attribute_modification_counter(&self) -> GraphResult<u64> {
        self.with_read(|g| Ok(g.attribute_modification_counter()))
    }

    fn value_modification_counter(&self, attribute: AttributeId) -> GraphResult<u64> {
        self.with_read(|g| g.value_modification_counter(attribute))
    }

    fn modification_counters(&self) -> GraphResult<ModificationCounters> {
        self.with_read(|g| Ok(g.modification_counters()))
    }

    // Elements by type

    fn element_count(&self, element_type: ElementType) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.element_count(element_type)))
    }

    fn element_at(&self, element_type: ElementType, position: usize) -> GraphResult<Option<ElementId>> {
        self.with_read(|g| Ok(g.element_at(element_type, position)))
    }

    fn element_exists(&self, element_type: ElementType, element: ElementId) -> GraphResult<bool> {
        self.with_read(|g| Ok(g.element_exists(element_type, element)))
    }

    // Vertices

    fn vertex_count(&self) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.vertex_count()))
    }

    fn vertex_capacity(&self) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.vertex_capacity()))
    }

    fn vertex(&self, position: usize) -> GraphResult<Option<VertexId>> {
        self.with_read(|g| Ok(g.vertex(position)))
    }

    fn vertex_position(&self, vertex: VertexId) -> GraphResult<usize> {
        self.with_read(|g| g.vertex_position(vertex))
    }

    fn has_vertex(&self, vertex: VertexId) -> GraphResult<bool> {
        self.with_read(|g| Ok(g.has_vertex(vertex)))
    }

    fn vertex_uid(&self, vertex: VertexId) -> GraphResult<u64> {
        self.with_read(|g| g.vertex_uid(vertex))
    }

    fn vertex_transaction_count(&self, vertex: VertexId) -> GraphResult<usize> {
        self.with_read(|g| g.vertex_transaction_count(vertex))
    }

    fn vertex_transaction(&self, vertex: VertexId, position: usize) -> GraphResult<Option<TransactionId>> {
        self.with_read(|g| g.vertex_transaction(vertex, position))
    }

    fn vertex_transaction_count_in(&self, vertex: VertexId, incidence: Incidence) -> GraphResult<usize> {
        self.with_read(|g| g.vertex_transaction_count_in(vertex, incidence))
    }

    fn vertex_link_count(&self, vertex: VertexId) -> GraphResult<usize> {
        self.with_read(|g| g.vertex_link_count(vertex))
    }

    fn vertex_link(&self, vertex: VertexId, position: usize) -> GraphResult<Option<LinkId>> {
        self.with_read(|g| g.vertex_link(vertex, position))
    }

    fn vertex_neighbour(&self, vertex: VertexId, position: usize) -> GraphResult<Option<VertexId>> {
        self.with_read(|g| g.vertex_neighbour(vertex, position))
    }

    // Transactions

    fn transaction_count(&self) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.transaction_count()))
    }

    fn transaction_capacity(&self) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.transaction_capacity()))
    }

    fn transaction(&self, position: usize) -> GraphResult<Option<TransactionId>> {
        self.with_read(|g| Ok(g.transaction(position)))
    }

    fn transaction_position(&self, transaction: TransactionId) -> GraphResult<usize> {
        self.with_read(|g| g.transaction_position(transaction))
    }

    fn has_transaction(&self, transaction: TransactionId) -> GraphResult<bool> {
        self.with_read(|g| Ok(g.has_transaction(transaction)))
    }

    fn transaction_uid(&self, transaction: TransactionId) -> GraphResult<u64> {
        self.with_read(|g| g.transaction_uid(transaction))
    }

    fn transaction_source(&self, transaction: TransactionId) -> GraphResult<VertexId> {
        self.with_read(|g| g.transaction_source(transaction))
    }

    fn transaction_destination(&self, transaction: TransactionId) -> GraphResult<VertexId> {
        self.with_read(|g| g.transaction_destination(transaction))
    }

    fn transaction_direction(&self, transaction: TransactionId) -> GraphResult<Direction> {
        self.with_read(|g| g.transaction_direction(transaction))
    }

    fn transaction_directed(&self, transaction: TransactionId) -> GraphResult<bool> {
        self.with_read(|g| g.transaction_directed(transaction))
    }

    fn transaction_link(&self, transaction: TransactionId) -> GraphResult<LinkId> {
        self.with_read(|g| g.transaction_link(transaction))
    }

    // Links

    fn link_count(&self) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.link_count()))
    }

    fn link(&self, position: usize) -> GraphResult<Option<LinkId>> {
        self.with_read(|g| Ok(g.link(position)))
    }

    fn link_position(&self, link: LinkId) -> GraphResult<usize> {
        self.with_read(|g| g.link_position(link))
    }

    fn link_between(&self, a: VertexId, b: VertexId) -> GraphResult<Option<LinkId>> {
        self.with_read(|g| Ok(g.link_between(a, b)))
    }

    fn link_low_vertex(&self, link: LinkId) -> GraphResult<VertexId> {
        self.with_read(|g| g.link_low_vertex(link))
    }

    fn link_high_vertex(&self, link: LinkId) -> GraphResult<VertexId> {
        self.with_read(|g| g.link_high_vertex(link))
    }

    fn link_transaction_count(&self, link: LinkId) -> GraphResult<usize> {
        self.with_read(|g| g.link_transaction_count(link))
    }

    fn link_transaction_count_in(&self, link: LinkId, direction: Direction) -> GraphResult<usize> {
        self.with_read(|g| g.link_transaction_count_in(link, direction))
    }

    fn link_transaction(&self, link: LinkId, direction: Direction, position: usize) -> GraphResult<Option<TransactionId>> {
        self.with_read(|g| g.link_transaction(link, direction, position))
    }

    // Attributes

    fn attribute(&self, element_type: ElementType, name: &str) -> GraphResult<Option<AttributeId>> {
        self.with_read(|g| Ok(g.attribute(element_type, name)))
    }

    fn attribute_descriptor(&self, attribute: AttributeId) -> GraphResult<AttributeDescriptor> {
        self.with_read(|g| g.attribute_descriptor(attribute))
    }

    fn attribute_count(&self, element_type: ElementType) -> GraphResult<usize> {
        self.with_read(|g| Ok(g.attribute_count(element_type)))
    }

    fn attribute_at(&self, element_type: ElementType, position: usize) -> GraphResult<Option<AttributeId>> {
        self.with_read(|g| Ok(g.attribute_at(element_type, position)))
    }

    fn attributes(&self, element_type: ElementType) -> GraphResult<Vec<AttributeId>> {
        self.with_read(|g| Ok(g.attributes(element_type)))
    }

    fn primary_key(&self, element_type: ElementType) -> GraphResult<Vec<AttributeId>> {
        self.with_read(|g| Ok(g.primary_key(element_type)))
    }

    // Values

    fn get_value(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<AttributeValue> {
        let element = element.into();
        self.with_read(|g| g.get_value(attribute, element))
    }

    fn is_default_value(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<bool> {
        let element = element.into();
        self.with_read(|g| g.is_default_value(attribute, element))
    }

    typed_getters! {
        get_byte_value -> i8;
        get_short_value -> i16;
        get_int_value -> i32;
        get_long_value -> i64;
        get_float_value -> f32;
        get_double_value -> f64;
        get_boolean_value -> bool;
        get_char_value -> char;
        get_string_value -> String;
        get_color_value -> Color;
        get_object_value -> serde_json::Value;
    }
}

/// Mutations, available on write handles only
pub trait GraphWriteMethods: GraphReadMethods {
    /// Run `f` against the write target
    fn with_write<R, F>(&self, f: F) -> GraphResult<R>
    where
        F: FnOnce(&mut Graph) -> GraphResult<R>;

    fn add_vertex(&self) -> GraphResult<VertexId> {
        self.with_write(|g| g.add_vertex())
    }

    /// Remove a vertex and every transaction touching it
    fn remove_vertex(&self, vertex: VertexId) -> GraphResult<()> {
        self.with_write(|g| g.remove_vertex(vertex))
    }

    fn add_transaction(&self, source: VertexId, destination: VertexId, directed: bool) -> GraphResult<TransactionId> {
        self.with_write(|g| g.add_transaction(source, destination, directed))
    }

    fn remove_transaction(&self, transaction: TransactionId) -> GraphResult<()> {
        self.with_write(|g| g.remove_transaction(transaction))
    }

    fn add_attribute(
        &self,
        element_type: ElementType,
        attribute_type: AttributeType,
        name: &str,
        description: &str,
        default: Option<AttributeValue>,
        merger: Option<&str>,
    ) -> GraphResult<AttributeId> {
        self.with_write(|g| g.add_attribute(element_type, attribute_type, name, description, default, merger))
    }

    fn remove_attribute(&self, attribute: AttributeId) -> GraphResult<()> {
        self.with_write(|g| g.remove_attribute(attribute))
    }

    fn update_attribute_name(&self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        self.with_write(|g| g.update_attribute_name(attribute, name))
    }

    fn update_attribute_description(&self, attribute: AttributeId, description: &str) -> GraphResult<()> {
        self.with_write(|g| g.update_attribute_description(attribute, description))
    }

    fn update_attribute_default_value(&self, attribute: AttributeId, default: Option<AttributeValue>) -> GraphResult<()> {
        self.with_write(|g| g.update_attribute_default_value(attribute, default))
    }

    fn set_value(&self, attribute: AttributeId, element: impl Into<ElementId>, value: impl Into<AttributeValue>) -> GraphResult<()> {
        let element = element.into();
        let value = value.into();
        self.with_write(|g| g.set_value(attribute, element, value))
    }

    fn clear_value(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<()> {
        let element = element.into();
        self.with_write(|g| g.clear_value(attribute, element))
    }

    typed_setters! {
        set_byte_value(i8);
        set_short_value(i16);
        set_int_value(i32);
        set_long_value(i64);
        set_float_value(f32);
        set_double_value(f64);
        set_boolean_value(bool);
        set_char_value(char);
        set_string_value(String);
        set_color_value(Color);
        set_object_value(serde_json::Value);
    }

    /// Replace the primary key; an empty slice clears it
    fn set_primary_key(&self, element_type: ElementType, attributes: &[AttributeId]) -> GraphResult<()> {
        self.with_write(|g| g.set_primary_key(element_type, attributes))
    }

    /// See [`Graph::validate_key`]. Merging fails with `DuplicateKey` when
    /// any attribute of the type lacks both its own merger and a schema
    /// default merger.
    fn validate_key(&self, element_type: ElementType, allow_merging: bool) -> GraphResult<()> {
        self.with_write(|g| g.validate_key(element_type, allow_merging))
    }

    fn validate_keys(&self) -> GraphResult<()> {
        self.with_write(|g| g.validate_keys())
    }

    fn add_schema_vertex(&self) -> GraphResult<VertexId> {
        self.with_write(|g| g.add_schema_vertex())
    }

    fn add_schema_transaction(&self, source: VertexId, destination: VertexId, directed: bool) -> GraphResult<TransactionId> {
        self.with_write(|g| g.add_schema_transaction(source, destination, directed))
    }

    fn complete_with_schema(&self) -> GraphResult<()> {
        self.with_write(|g| g.complete_with_schema())
    }

    fn set_modification_counters(&self, global: u64, structure: u64, attribute: u64) -> GraphResult<()> {
        self.with_write(|g| {
            g.set_modification_counters(global, structure, attribute);
            Ok(())
        })
    }

    fn set_value_modification_counter(&self, attribute: AttributeId, value: u64) -> GraphResult<()> {
        self.with_write(|g| g.set_value_modification_counter(attribute, value))
    }
}
