//! Graph schemas
//!
//! A schema is a strategy object injected into a graph. It can initialise
//! new elements, complete elements once a batch of edits is done, supply a
//! default merger for primary-key merges and pick the surviving element of a
//! merge.

use super::merger::{AttributeMerger, DefaultMerger};
use super::store::{Graph, GraphResult};
use super::types::{ElementId, ElementType, TransactionId, VertexId};
use std::fmt;
use std::sync::Arc;

pub trait Schema: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Called after a vertex is added through `add_schema_vertex`
    fn new_vertex(&self, _graph: &mut Graph, _vertex: VertexId) -> GraphResult<()> {
        Ok(())
    }

    /// Called for every vertex by `complete_with_schema`
    fn complete_vertex(&self, _graph: &mut Graph, _vertex: VertexId) -> GraphResult<()> {
        Ok(())
    }

    /// Called after a transaction is added through `add_schema_transaction`
    fn new_transaction(&self, _graph: &mut Graph, _transaction: TransactionId) -> GraphResult<()> {
        Ok(())
    }

    /// Called for every transaction by `complete_with_schema`
    fn complete_transaction(&self, _graph: &mut Graph, _transaction: TransactionId) -> GraphResult<()> {
        Ok(())
    }

    /// Merger used for attributes that do not name their own
    fn default_merger(&self) -> Option<Arc<dyn AttributeMerger>> {
        None
    }

    /// The element that survives a merge of elements sharing a primary key.
    ///
    /// Defaults to the lowest id.
    fn merge_survivor(
        &self,
        _graph: &Graph,
        _element_type: ElementType,
        candidates: &[ElementId],
    ) -> Option<ElementId> {
        candidates.iter().copied().min()
    }
}

/// The absence of a schema: no hooks, no default merger
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl Schema for NoSchema {
    fn name(&self) -> &str {
        "none"
    }
}

/// Minimal schema merging duplicate keys with the `default` merger
#[derive(Debug, Clone, Copy, Default)]
pub struct BareSchema;

impl Schema for BareSchema {
    fn name(&self) -> &str {
        "bare"
    }

    fn default_merger(&self) -> Option<Arc<dyn AttributeMerger>> {
        Some(Arc::new(DefaultMerger))
    }
}

/// Built-in schema by name (`none` or `bare`)
pub fn schema_by_name(name: &str) -> Option<Arc<dyn Schema>> {
    match name {
        "none" => Some(Arc::new(NoSchema)),
        "bare" => Some(Arc::new(BareSchema)),
        _ => None,
    }
}

impl Graph {
    /// Add a vertex and let the schema initialise it
    pub fn add_schema_vertex(&mut self) -> GraphResult<VertexId> {
        let vertex = self.add_vertex()?;
        let schema = Arc::clone(self.schema());
        schema.new_vertex(self, vertex)?;
        Ok(vertex)
    }

    /// Add a transaction and let the schema initialise it
    pub fn add_schema_transaction(
        &mut self,
        source: VertexId,
        destination: VertexId,
        directed: bool,
    ) -> GraphResult<TransactionId> {
        let transaction = self.add_transaction(source, destination, directed)?;
        let schema = Arc::clone(self.schema());
        schema.new_transaction(self, transaction)?;
        Ok(transaction)
    }

    /// Run the schema's completion hooks over every vertex and transaction
    pub fn complete_with_schema(&mut self) -> GraphResult<()> {
        let schema = Arc::clone(self.schema());
        let vertices: Vec<VertexId> = (0..self.vertex_count()).filter_map(|p| self.vertex(p)).collect();
        for vertex in vertices {
            if self.has_vertex(vertex) {
                schema.complete_vertex(self, vertex)?;
            }
        }
        let transactions: Vec<TransactionId> = (0..self.transaction_count())
            .filter_map(|p| self.transaction(p))
            .collect();
        for transaction in transactions {
            if self.has_transaction(transaction) {
                schema.complete_transaction(self, transaction)?;
            }
        }
        Ok(())
    }
}
