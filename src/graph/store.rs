//! In-memory attributed graph
//!
//! A [`Graph`] owns the element tables, the attribute columns, the primary
//! keys and the modification counters of one physical graph instance. All
//! mutations funnel through a small set of id-explicit primitives that bump
//! counters and append to the edit journal, so that any sequence of edits
//! can be replayed onto another instance with identical results.

use super::attribute::{AttributeDescriptor, AttributeStore};
use super::counters::ModificationCounters;
use super::edit::{EditOp, Frame, Journal};
use super::element::{ElementTable, Topology, TransactionRecord};
use super::merger::MergerRegistry;
use super::schema::{NoSchema, Schema};
use super::types::{
    AttributeId, Direction, ElementId, ElementType, GraphId, Incidence, LinkId, TransactionId,
    VertexId,
};
use super::value::{AttributeType, AttributeValue, Color, ConversionFailure};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Vertex {0} not found")]
    UnknownVertex(VertexId),

    #[error("Transaction {0} not found")]
    UnknownTransaction(TransactionId),

    #[error("Link {0} not found")]
    UnknownLink(LinkId),

    #[error("Attribute {0} not found")]
    UnknownAttribute(AttributeId),

    #[error("No {element_type} element with id {id}")]
    UnknownElement {
        element_type: ElementType,
        id: ElementId,
    },

    #[error("A {element_type} attribute named '{name}' already exists with a different type")]
    DuplicateAttribute {
        element_type: ElementType,
        name: String,
    },

    #[error("Duplicate {element_type} key: {duplicate} has the same key as {existing} ({description})")]
    DuplicateKey {
        element_type: ElementType,
        existing: ElementId,
        duplicate: ElementId,
        description: String,
    },

    #[error("Attribute {attribute} belongs to {found} elements, not {expected}")]
    WrongElementType {
        attribute: AttributeId,
        expected: ElementType,
        found: ElementType,
    },

    #[error("Attribute {0} is part of a primary key")]
    AttributeInPrimaryKey(AttributeId),

    #[error("Unknown merger '{0}'")]
    UnknownMerger(String),

    #[error("Value conversion failed: {0}")]
    ValueConversion(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Interrupted while waiting for the write lock")]
    Interrupted,
}

impl From<ConversionFailure> for GraphError {
    fn from(failure: ConversionFailure) -> Self {
        GraphError::ValueConversion(failure.to_string())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Initial table sizes for a new graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphCapacity {
    pub vertices: usize,
    pub transactions: usize,
    pub attributes: usize,
}

impl Default for GraphCapacity {
    fn default() -> Self {
        GraphCapacity {
            vertices: 64,
            transactions: 256,
            attributes: 16,
        }
    }
}

/// One physical graph instance
#[derive(Debug, Clone)]
pub struct Graph {
    id: GraphId,
    schema: Arc<dyn Schema>,
    mergers: Arc<MergerRegistry>,
    topology: Topology,
    attributes: AttributeStore,
    /// Primary key attributes indexed by element type ordinal
    primary_keys: [Vec<AttributeId>; 4],
    pub(crate) counters: ModificationCounters,
    /// Open edit frames while this instance is the active write target
    pub(crate) journal: Option<Journal>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph without a schema
    pub fn new() -> Self {
        Self::with_schema(Arc::new(NoSchema))
    }

    pub fn with_schema(schema: Arc<dyn Schema>) -> Self {
        Self::with_capacity(schema, GraphCapacity::default())
    }

    pub fn with_capacity(schema: Arc<dyn Schema>, capacity: GraphCapacity) -> Self {
        let id = GraphId::new();
        debug!("Creating graph {} with schema '{}'", id, schema.name());
        Graph {
            id,
            schema,
            mergers: Arc::new(MergerRegistry::with_builtins()),
            topology: Topology::with_capacity(capacity.vertices, capacity.transactions),
            attributes: AttributeStore::with_capacity(capacity.attributes),
            primary_keys: Default::default(),
            counters: ModificationCounters::new(),
            journal: None,
        }
    }

    /// Replace the merger registry
    pub fn with_mergers(mut self, mergers: Arc<MergerRegistry>) -> Self {
        self.mergers = mergers;
        self
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    pub fn mergers(&self) -> &Arc<MergerRegistry> {
        &self.mergers
    }

    /// Copy of this graph detached from any open edit frames
    pub(crate) fn detached_copy(&self) -> Graph {
        let mut copy = self.clone();
        copy.journal = None;
        copy
    }

    fn record(&mut self, op: EditOp) {
        if let Some(journal) = self.journal.as_mut() {
            journal.record(op);
        }
    }

    // ============================================================
    // Edit frames
    // ============================================================

    /// Open a new journal frame, nested inside any open frame
    pub(crate) fn begin_frame(&mut self, name: &str) {
        let counters = self.counters.clone();
        self.journal.get_or_insert_with(Journal::default).open(name, counters);
    }

    pub(crate) fn frame_depth(&self) -> usize {
        self.journal.as_ref().map_or(0, Journal::depth)
    }

    /// Close the innermost frame, keeping its edits.
    ///
    /// Returns the ops of the outermost frame once it is closed.
    pub(crate) fn commit_frame(&mut self) -> Option<Frame> {
        let frame = self.journal.as_mut()?.fold();
        if self.frame_depth() == 0 {
            self.journal = None;
        }
        frame
    }

    /// Close the innermost frame and revert its edits
    pub(crate) fn roll_back_frame(&mut self) -> GraphResult<()> {
        let frame = self
            .journal
            .as_mut()
            .and_then(Journal::close)
            .ok_or_else(|| GraphError::IllegalState("no open edit frame".to_string()))?;
        let result = self.undo(frame);
        if self.frame_depth() == 0 {
            self.journal = None;
        }
        result
    }

    // ============================================================
    // Modification counters
    // ============================================================

    pub fn global_modification_counter(&self) -> u64 {
        self.counters.global()
    }

    pub fn structure_modification_counter(&self) -> u64 {
        self.counters.structure()
    }

    pub fn attribute_modification_counter(&self) -> u64 {
        self.counters.attribute()
    }

    pub fn value_modification_counter(&self, attribute: AttributeId) -> GraphResult<u64> {
        self.descriptor(attribute)?;
        Ok(self.counters.value(attribute))
    }

    pub fn modification_counters(&self) -> ModificationCounters {
        self.counters.clone()
    }

    /// Overwrite the global, structure and attribute counters
    pub fn set_modification_counters(&mut self, global: u64, structure: u64, attribute: u64) {
        self.raw_set_modification_counters(global, structure, attribute);
    }

    pub fn set_value_modification_counter(&mut self, attribute: AttributeId, value: u64) -> GraphResult<()> {
        self.descriptor(attribute)?;
        self.raw_set_value_modification_counter(attribute, value);
        Ok(())
    }

    // ============================================================
    // Element type behavior table
    // ============================================================

    fn table(&self, element_type: ElementType) -> Option<&ElementTable> {
        match element_type {
            ElementType::Vertex => Some(self.topology.vertices()),
            ElementType::Transaction => Some(self.topology.transactions()),
            ElementType::Graph | ElementType::Meta => None,
        }
    }

    /// Number of elements of the type (1 for GRAPH and META)
    pub fn element_count(&self, element_type: ElementType) -> usize {
        self.table(element_type).map_or(1, ElementTable::len)
    }

    /// Element at a position of the type's position array
    pub fn element_at(&self, element_type: ElementType, position: usize) -> Option<ElementId> {
        match self.table(element_type) {
            Some(table) => table.id_at(position).map(ElementId),
            None => (position == 0).then_some(ElementId::GRAPH),
        }
    }

    pub fn element_exists(&self, element_type: ElementType, element: ElementId) -> bool {
        match self.table(element_type) {
            Some(table) => table.contains(element.0),
            None => element == ElementId::GRAPH,
        }
    }

    fn check_element(&self, element_type: ElementType, element: ElementId) -> GraphResult<()> {
        if self.element_exists(element_type, element) {
            return Ok(());
        }
        Err(match element_type {
            ElementType::Vertex => GraphError::UnknownVertex(VertexId(element.0)),
            ElementType::Transaction => GraphError::UnknownTransaction(TransactionId(element.0)),
            _ => GraphError::UnknownElement {
                element_type,
                id: element,
            },
        })
    }

    // ============================================================
    // Vertices
    // ============================================================

    pub fn add_vertex(&mut self) -> GraphResult<VertexId> {
        let id = self.topology.next_vertex_id();
        let uid = self.counters.structure() + 1;
        self.raw_add_vertex(id, uid)?;
        Ok(id)
    }

    /// Remove a vertex together with its incident transactions
    pub fn remove_vertex(&mut self, id: VertexId) -> GraphResult<()> {
        self.check_vertex(id)?;
        let incident = self.topology.vertex_transactions(id).to_vec();
        for transaction in incident {
            self.remove_transaction(TransactionId(transaction))?;
        }
        self.clear_element_values(ElementType::Vertex, id.into())?;
        self.raw_remove_vertex(id)
    }

    pub fn has_vertex(&self, id: VertexId) -> bool {
        self.topology.has_vertex(id)
    }

    fn check_vertex(&self, id: VertexId) -> GraphResult<()> {
        if self.has_vertex(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownVertex(id))
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.topology.vertices().len()
    }

    /// One past the highest vertex id in use or on the free list
    pub fn vertex_capacity(&self) -> usize {
        self.topology.vertices().capacity()
    }

    pub fn vertex(&self, position: usize) -> Option<VertexId> {
        self.topology.vertices().id_at(position).map(VertexId)
    }

    pub fn vertex_position(&self, id: VertexId) -> GraphResult<usize> {
        self.topology
            .vertices()
            .position_of(id.0)
            .ok_or(GraphError::UnknownVertex(id))
    }

    pub fn vertex_uid(&self, id: VertexId) -> GraphResult<u64> {
        self.topology
            .vertices()
            .uid(id.0)
            .ok_or(GraphError::UnknownVertex(id))
    }

    pub fn vertex_transaction_count(&self, id: VertexId) -> GraphResult<usize> {
        self.check_vertex(id)?;
        Ok(self.topology.vertex_transactions(id).len())
    }

    pub fn vertex_transaction(&self, id: VertexId, position: usize) -> GraphResult<Option<TransactionId>> {
        self.check_vertex(id)?;
        Ok(self
            .topology
            .vertex_transactions(id)
            .get(position)
            .map(|&t| TransactionId(t)))
    }

    pub fn vertex_transaction_count_in(&self, id: VertexId, incidence: Incidence) -> GraphResult<usize> {
        self.check_vertex(id)?;
        Ok(self.topology.vertex_transaction_count_in(id, incidence))
    }

    pub fn vertex_link_count(&self, id: VertexId) -> GraphResult<usize> {
        self.check_vertex(id)?;
        Ok(self.topology.vertex_links(id).len())
    }

    pub fn vertex_link(&self, id: VertexId, position: usize) -> GraphResult<Option<LinkId>> {
        self.check_vertex(id)?;
        Ok(self.topology.vertex_links(id).get(position).map(|&l| LinkId(l)))
    }

    /// The vertex at the other end of the vertex's link at `position`
    pub fn vertex_neighbour(&self, id: VertexId, position: usize) -> GraphResult<Option<VertexId>> {
        Ok(self.vertex_link(id, position)?.and_then(|link| {
            self.topology
                .link_endpoints(link)
                .map(|(low, high)| if low == id { high } else { low })
        }))
    }

    // ============================================================
    // Transactions
    // ============================================================

    /// Add a transaction between two existing vertices.
    ///
    /// Undirected transactions are stored with their endpoints ordered low to
    /// high.
    pub fn add_transaction(
        &mut self,
        source: VertexId,
        destination: VertexId,
        directed: bool,
    ) -> GraphResult<TransactionId> {
        self.check_vertex(source)?;
        self.check_vertex(destination)?;
        let (source, destination, direction) = if !directed {
            (source.min(destination), source.max(destination), Direction::Flat)
        } else if source <= destination {
            (source, destination, Direction::Uphill)
        } else {
            (source, destination, Direction::Downhill)
        };
        let id = self.topology.next_transaction_id();
        let link = self.topology.link_for_pair(source, destination);
        let uid = self.counters.structure() + 1;
        self.raw_add_transaction(id, source, destination, direction, link, uid)?;
        Ok(id)
    }

    pub fn remove_transaction(&mut self, id: TransactionId) -> GraphResult<()> {
        self.check_transaction(id)?;
        self.clear_element_values(ElementType::Transaction, id.into())?;
        self.raw_remove_transaction(id).map(|_| ())
    }

    pub fn has_transaction(&self, id: TransactionId) -> bool {
        self.topology.transaction(id).is_some()
    }

    fn check_transaction(&self, id: TransactionId) -> GraphResult<&TransactionRecord> {
        self.topology
            .transaction(id)
            .ok_or(GraphError::UnknownTransaction(id))
    }

    pub fn transaction_count(&self) -> usize {
        self.topology.transactions().len()
    }

    pub fn transaction_capacity(&self) -> usize {
        self.topology.transactions().capacity()
    }

    pub fn transaction(&self, position: usize) -> Option<TransactionId> {
        self.topology.transactions().id_at(position).map(TransactionId)
    }

    pub fn transaction_position(&self, id: TransactionId) -> GraphResult<usize> {
        self.topology
            .transactions()
            .position_of(id.0)
            .ok_or(GraphError::UnknownTransaction(id))
    }

    pub fn transaction_uid(&self, id: TransactionId) -> GraphResult<u64> {
        self.topology
            .transactions()
            .uid(id.0)
            .ok_or(GraphError::UnknownTransaction(id))
    }

    pub fn transaction_source(&self, id: TransactionId) -> GraphResult<VertexId> {
        Ok(self.check_transaction(id)?.source)
    }

    pub fn transaction_destination(&self, id: TransactionId) -> GraphResult<VertexId> {
        Ok(self.check_transaction(id)?.destination)
    }

    pub fn transaction_direction(&self, id: TransactionId) -> GraphResult<Direction> {
        Ok(self.check_transaction(id)?.direction)
    }

    pub fn transaction_directed(&self, id: TransactionId) -> GraphResult<bool> {
        Ok(self.check_transaction(id)?.is_directed())
    }

    pub fn transaction_link(&self, id: TransactionId) -> GraphResult<LinkId> {
        Ok(self.check_transaction(id)?.link)
    }

    // ============================================================
    // Links
    // ============================================================

    fn check_link(&self, id: LinkId) -> GraphResult<()> {
        if self.topology.has_link(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownLink(id))
        }
    }

    pub fn link_count(&self) -> usize {
        self.topology.links().len()
    }

    pub fn link(&self, position: usize) -> Option<LinkId> {
        self.topology.links().id_at(position).map(LinkId)
    }

    pub fn link_position(&self, id: LinkId) -> GraphResult<usize> {
        self.topology
            .links()
            .position_of(id.0)
            .ok_or(GraphError::UnknownLink(id))
    }

    pub fn link_between(&self, a: VertexId, b: VertexId) -> Option<LinkId> {
        self.topology.link_between(a, b)
    }

    pub fn link_low_vertex(&self, id: LinkId) -> GraphResult<VertexId> {
        self.topology
            .link_endpoints(id)
            .map(|(low, _)| low)
            .ok_or(GraphError::UnknownLink(id))
    }

    pub fn link_high_vertex(&self, id: LinkId) -> GraphResult<VertexId> {
        self.topology
            .link_endpoints(id)
            .map(|(_, high)| high)
            .ok_or(GraphError::UnknownLink(id))
    }

    pub fn link_transaction_count(&self, id: LinkId) -> GraphResult<usize> {
        self.topology
            .link_transaction_count(id)
            .ok_or(GraphError::UnknownLink(id))
    }

    pub fn link_transaction_count_in(&self, id: LinkId, direction: Direction) -> GraphResult<usize> {
        self.check_link(id)?;
        Ok(self
            .topology
            .link_transactions_in(id, direction)
            .map_or(0, <[u32]>::len))
    }

    pub fn link_transaction(
        &self,
        id: LinkId,
        direction: Direction,
        position: usize,
    ) -> GraphResult<Option<TransactionId>> {
        self.check_link(id)?;
        Ok(self
            .topology
            .link_transactions_in(id, direction)
            .and_then(|list| list.get(position))
            .map(|&t| TransactionId(t)))
    }

    // ============================================================
    // Attributes
    // ============================================================

    fn descriptor(&self, attribute: AttributeId) -> GraphResult<&AttributeDescriptor> {
        self.attributes
            .descriptor(attribute)
            .ok_or(GraphError::UnknownAttribute(attribute))
    }

    /// Add an attribute, or return the existing one of the same name and type
    pub fn add_attribute(
        &mut self,
        element_type: ElementType,
        attribute_type: AttributeType,
        name: &str,
        description: &str,
        default: Option<AttributeValue>,
        merger: Option<&str>,
    ) -> GraphResult<AttributeId> {
        if let Some(existing) = self.attributes.find(element_type, name) {
            let descriptor = self.descriptor(existing)?;
            if descriptor.attribute_type == attribute_type {
                return Ok(existing);
            }
            return Err(GraphError::DuplicateAttribute {
                element_type,
                name: name.to_string(),
            });
        }
        if let Some(merger) = merger {
            if !self.mergers.contains(merger) {
                return Err(GraphError::UnknownMerger(merger.to_string()));
            }
        }
        let default_value = match default {
            Some(value) => value.convert(attribute_type)?,
            None => attribute_type.native_default(),
        };
        let descriptor = AttributeDescriptor {
            id: self.attributes.next_id(),
            element_type,
            attribute_type,
            name: name.to_string(),
            description: description.to_string(),
            default_value,
            merger: merger.map(str::to_string),
        };
        let id = descriptor.id;
        self.raw_add_attribute(descriptor)?;
        Ok(id)
    }

    /// Remove an attribute and all its values
    pub fn remove_attribute(&mut self, attribute: AttributeId) -> GraphResult<()> {
        self.descriptor(attribute)?;
        if self.in_primary_key(attribute) {
            return Err(GraphError::AttributeInPrimaryKey(attribute));
        }
        for element in self.attributes.set_elements(attribute) {
            self.raw_set_value(attribute, ElementId(element as u32), None)?;
        }
        self.raw_remove_attribute(attribute)
    }

    pub fn attribute(&self, element_type: ElementType, name: &str) -> Option<AttributeId> {
        self.attributes.find(element_type, name)
    }

    pub fn attribute_descriptor(&self, attribute: AttributeId) -> GraphResult<AttributeDescriptor> {
        self.descriptor(attribute).cloned()
    }

    pub fn attribute_count(&self, element_type: ElementType) -> usize {
        self.attributes.attributes_of(element_type).len()
    }

    /// Total number of attributes across all element types
    pub fn attribute_total(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_at(&self, element_type: ElementType, position: usize) -> Option<AttributeId> {
        self.attributes.attributes_of(element_type).get(position).copied()
    }

    pub fn attributes(&self, element_type: ElementType) -> Vec<AttributeId> {
        self.attributes.attributes_of(element_type).to_vec()
    }

    pub fn update_attribute_name(&mut self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        if self.descriptor(attribute)?.name == name {
            return Ok(());
        }
        self.raw_rename_attribute(attribute, name)
    }

    pub fn update_attribute_description(&mut self, attribute: AttributeId, description: &str) -> GraphResult<()> {
        if self.descriptor(attribute)?.description == description {
            return Ok(());
        }
        self.raw_describe_attribute(attribute, description)
    }

    /// Change an attribute's default; `None` restores the type's native default
    pub fn update_attribute_default_value(
        &mut self,
        attribute: AttributeId,
        default: Option<AttributeValue>,
    ) -> GraphResult<()> {
        let descriptor = self.descriptor(attribute)?;
        let default = match default {
            Some(value) => value.convert(descriptor.attribute_type)?,
            None => descriptor.attribute_type.native_default(),
        };
        if descriptor.default_value.same_as(&default) {
            return Ok(());
        }
        self.raw_set_attribute_default(attribute, default)
    }

    // ============================================================
    // Values
    // ============================================================

    /// Value of an attribute on an element, the default if never set
    pub fn get_value(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<AttributeValue> {
        let element = element.into();
        let element_type = self.descriptor(attribute)?.element_type;
        self.check_element(element_type, element)?;
        self.attributes
            .value(attribute, element.index())
            .ok_or(GraphError::UnknownAttribute(attribute))
    }

    /// Whether the element currently holds the attribute's default value
    pub fn is_default_value(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<bool> {
        let element = element.into();
        let element_type = self.descriptor(attribute)?.element_type;
        self.check_element(element_type, element)?;
        Ok(self.attributes.stored(attribute, element.index()).is_none())
    }

    pub fn set_value(
        &mut self,
        attribute: AttributeId,
        element: impl Into<ElementId>,
        value: impl Into<AttributeValue>,
    ) -> GraphResult<()> {
        let element = element.into();
        let element_type = self.descriptor(attribute)?.element_type;
        self.check_element(element_type, element)?;
        let normalized = self
            .attributes
            .normalize(attribute, Some(value.into()))
            .ok_or(GraphError::UnknownAttribute(attribute))??;
        self.raw_set_value(attribute, element, normalized).map(|_| ())
    }

    /// Reset an element's value to the attribute default
    pub fn clear_value(&mut self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<()> {
        let element = element.into();
        let element_type = self.descriptor(attribute)?.element_type;
        self.check_element(element_type, element)?;
        self.raw_set_value(attribute, element, None).map(|_| ())
    }

    fn clear_element_values(&mut self, element_type: ElementType, element: ElementId) -> GraphResult<()> {
        for attribute in self.attributes(element_type) {
            self.raw_set_value(attribute, element, None)?;
        }
        Ok(())
    }

    // ============================================================
    // Primary keys
    // ============================================================

    /// Replace the primary key of an element type; an empty list clears it.
    ///
    /// The new key is not validated against existing elements.
    pub fn set_primary_key(&mut self, element_type: ElementType, attributes: &[AttributeId]) -> GraphResult<()> {
        if !element_type.supports_primary_key() && !attributes.is_empty() {
            return Err(GraphError::IllegalState(format!(
                "{} elements cannot have a primary key",
                element_type
            )));
        }
        for &attribute in attributes {
            let found = self.descriptor(attribute)?.element_type;
            if found != element_type {
                return Err(GraphError::WrongElementType {
                    attribute,
                    expected: element_type,
                    found,
                });
            }
        }
        self.raw_set_primary_key(element_type, attributes.to_vec());
        Ok(())
    }

    pub fn primary_key(&self, element_type: ElementType) -> Vec<AttributeId> {
        self.primary_keys[element_type.ordinal()].clone()
    }

    fn in_primary_key(&self, attribute: AttributeId) -> bool {
        self.primary_keys.iter().any(|key| key.contains(&attribute))
    }

    // ============================================================
    // Journaled primitives
    // ============================================================

    pub(crate) fn raw_add_vertex(&mut self, id: VertexId, uid: u64) -> GraphResult<()> {
        if !self.topology.insert_vertex(id, uid) {
            return Err(GraphError::IllegalState(format!("{} already exists", id)));
        }
        self.counters.bump_structure();
        self.counters.bump_global();
        self.record(EditOp::AddVertex { id, uid });
        Ok(())
    }

    pub(crate) fn raw_remove_vertex(&mut self, id: VertexId) -> GraphResult<()> {
        let uid = self.vertex_uid(id)?;
        if !self.topology.remove_vertex(id) {
            return Err(GraphError::IllegalState(format!(
                "{} still has incident transactions",
                id
            )));
        }
        self.counters.bump_structure();
        self.counters.bump_global();
        self.record(EditOp::RemoveVertex { id, uid });
        Ok(())
    }

    pub(crate) fn raw_add_transaction(
        &mut self,
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        direction: Direction,
        link: LinkId,
        uid: u64,
    ) -> GraphResult<()> {
        self.check_vertex(source)?;
        self.check_vertex(destination)?;
        let link = self
            .topology
            .insert_transaction(id, source, destination, direction, link, uid)
            .ok_or_else(|| GraphError::IllegalState(format!("{} already exists", id)))?;
        self.counters.bump_structure();
        self.counters.bump_global();
        self.record(EditOp::AddTransaction {
            id,
            source,
            destination,
            direction,
            link,
            uid,
        });
        Ok(())
    }

    pub(crate) fn raw_remove_transaction(&mut self, id: TransactionId) -> GraphResult<TransactionRecord> {
        let uid = self.transaction_uid(id)?;
        let record = self
            .topology
            .remove_transaction(id)
            .ok_or(GraphError::UnknownTransaction(id))?;
        self.counters.bump_structure();
        self.counters.bump_global();
        self.record(EditOp::RemoveTransaction {
            id,
            source: record.source,
            destination: record.destination,
            direction: record.direction,
            link: record.link,
            uid,
        });
        Ok(record)
    }

    pub(crate) fn raw_add_attribute(&mut self, descriptor: AttributeDescriptor) -> GraphResult<()> {
        let id = descriptor.id;
        if !self.attributes.insert(descriptor.clone()) {
            return Err(GraphError::DuplicateAttribute {
                element_type: descriptor.element_type,
                name: descriptor.name,
            });
        }
        self.counters.set_value(id, 0);
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::AddAttribute { descriptor });
        Ok(())
    }

    pub(crate) fn raw_remove_attribute(&mut self, attribute: AttributeId) -> GraphResult<()> {
        if self.in_primary_key(attribute) {
            return Err(GraphError::AttributeInPrimaryKey(attribute));
        }
        let descriptor = self
            .attributes
            .remove(attribute)
            .ok_or(GraphError::UnknownAttribute(attribute))?;
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::RemoveAttribute { descriptor });
        Ok(())
    }

    /// Store a normalized value; returns whether the stored value changed
    pub(crate) fn raw_set_value(
        &mut self,
        attribute: AttributeId,
        element: ElementId,
        new: Option<AttributeValue>,
    ) -> GraphResult<bool> {
        let old = self.attributes.stored(attribute, element.index());
        let unchanged = match (&old, &new) {
            (Some(old), Some(new)) => old.same_as(new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(false);
        }
        self.attributes.store(attribute, element.index(), new.clone())?;
        self.counters.bump_value(attribute);
        self.counters.bump_global();
        self.record(EditOp::SetValue {
            attribute,
            element,
            old,
            new,
        });
        Ok(true)
    }

    pub(crate) fn raw_set_primary_key(&mut self, element_type: ElementType, new: Vec<AttributeId>) {
        let old = std::mem::replace(&mut self.primary_keys[element_type.ordinal()], new.clone());
        for &attribute in old.iter().chain(new.iter()) {
            self.counters.bump_value(attribute);
        }
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::SetPrimaryKey {
            element_type,
            old,
            new,
        });
    }

    pub(crate) fn raw_rename_attribute(&mut self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        let element_type = self.descriptor(attribute)?.element_type;
        if self.attributes.find(element_type, name).is_some() {
            return Err(GraphError::DuplicateAttribute {
                element_type,
                name: name.to_string(),
            });
        }
        let old = self
            .attributes
            .rename(attribute, name)
            .ok_or(GraphError::UnknownAttribute(attribute))?;
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::RenameAttribute {
            attribute,
            old,
            new: name.to_string(),
        });
        Ok(())
    }

    pub(crate) fn raw_describe_attribute(&mut self, attribute: AttributeId, description: &str) -> GraphResult<()> {
        let old = self
            .attributes
            .set_description(attribute, description)
            .ok_or(GraphError::UnknownAttribute(attribute))?;
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::DescribeAttribute {
            attribute,
            old,
            new: description.to_string(),
        });
        Ok(())
    }

    pub(crate) fn raw_set_attribute_default(&mut self, attribute: AttributeId, default: AttributeValue) -> GraphResult<()> {
        let old = self
            .attributes
            .set_default(attribute, default.clone())
            .ok_or(GraphError::UnknownAttribute(attribute))?;
        self.counters.bump_attribute();
        self.counters.bump_global();
        self.record(EditOp::SetAttributeDefault {
            attribute,
            old,
            new: default,
        });
        Ok(())
    }

    pub(crate) fn raw_set_modification_counters(&mut self, global: u64, structure: u64, attribute: u64) {
        let old = [
            self.counters.global(),
            self.counters.structure(),
            self.counters.attribute(),
        ];
        self.counters.set(global, structure, attribute);
        self.record(EditOp::SetModificationCounters {
            old,
            new: [global, structure, attribute],
        });
    }

    pub(crate) fn raw_set_value_modification_counter(&mut self, attribute: AttributeId, value: u64) {
        let old = self.counters.value(attribute);
        self.counters.set_value(attribute, value);
        self.record(EditOp::SetValueModificationCounter {
            attribute,
            old,
            new: value,
        });
    }
}

macro_rules! typed_accessors {
    ($($get:ident, $set:ident, $ty:ty, $variant:ident;)*) => {
        impl Graph {
            $(
                pub fn $get(&self, attribute: AttributeId, element: impl Into<ElementId>) -> GraphResult<$ty> {
                    match self.get_value(attribute, element)?.convert(AttributeType::$variant)? {
                        AttributeValue::$variant(v) => Ok(v),
                        other => Err(GraphError::ValueConversion(format!(
                            "expected {} but found {}",
                            AttributeType::$variant,
                            other.type_name()
                        ))),
                    }
                }

                pub fn $set(&mut self, attribute: AttributeId, element: impl Into<ElementId>, value: $ty) -> GraphResult<()> {
                    self.set_value(attribute, element, AttributeValue::$variant(value))
                }
            )*
        }
    };
}

typed_accessors! {
    get_byte_value, set_byte_value, i8, Byte;
    get_short_value, set_short_value, i16, Short;
    get_int_value, set_int_value, i32, Integer;
    get_long_value, set_long_value, i64, Long;
    get_float_value, set_float_value, f32, Float;
    get_double_value, set_double_value, f64, Double;
    get_boolean_value, set_boolean_value, bool, Boolean;
    get_char_value, set_char_value, char, Char;
    get_string_value, set_string_value, String, String;
    get_color_value, set_color_value, Color, Color;
    get_object_value, set_object_value, serde_json::Value, Object;
}
