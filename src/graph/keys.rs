//! Primary key validation and element merging

use super::merger::AttributeMerger;
use super::store::{Graph, GraphError, GraphResult};
use super::types::{AttributeId, ElementId, ElementType, TransactionId, VertexId};
use super::value::KeyFragment;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Elements sharing one primary key value, in position order
type KeyGroup = Vec<ElementId>;

impl Graph {
    /// Check that no two elements of the type share a primary key value.
    ///
    /// With `allow_merging` set, each group of duplicates is merged into a
    /// single survivor instead of failing. Mergers for every attribute of the
    /// element type are resolved before anything is changed, so a failure
    /// leaves the graph untouched.
    ///
    /// Merging needs a merger for every attribute of the element type, either
    /// the attribute's own or the schema default. If any single attribute has
    /// neither, duplicates fail with `DuplicateKey` even when the other
    /// attributes have mergers of their own.
    pub fn validate_key(&mut self, element_type: ElementType, allow_merging: bool) -> GraphResult<()> {
        let key = self.primary_key(element_type);
        if key.is_empty() {
            return Ok(());
        }
        let groups = self.duplicate_key_groups(element_type, &key)?;
        let first = match groups.first() {
            Some(group) => group,
            None => return Ok(()),
        };
        if !allow_merging {
            return Err(self.duplicate_key_error(element_type, &key, first, "merging not allowed".to_string()));
        }
        let mergers = self.resolve_mergers(element_type, &key, first)?;

        let schema = Arc::clone(self.schema());
        let mut plans: Vec<(ElementId, Vec<ElementId>)> = groups
            .iter()
            .map(|group| {
                let survivor = schema
                    .merge_survivor(self, element_type, group)
                    .filter(|s| group.contains(s))
                    .unwrap_or(group[0]);
                let losers = group.iter().copied().filter(|&e| e != survivor).collect();
                (survivor, losers)
            })
            .collect();
        plans.sort_by_key(|(survivor, _)| *survivor);

        for (survivor, losers) in plans {
            for loser in losers {
                self.merge_element(element_type, &mergers, survivor, loser)?;
            }
        }
        Ok(())
    }

    /// Validate vertex keys then transaction keys, merging duplicates
    pub fn validate_keys(&mut self) -> GraphResult<()> {
        self.validate_key(ElementType::Vertex, true)?;
        self.validate_key(ElementType::Transaction, true)
    }

    fn key_of(&self, element_type: ElementType, key: &[AttributeId], element: ElementId) -> GraphResult<Vec<KeyFragment>> {
        let mut fragments = Vec::with_capacity(key.len() + 3);
        for &attribute in key {
            fragments.push(self.get_value(attribute, element)?.key_fragment());
        }
        if element_type == ElementType::Transaction {
            let transaction = TransactionId(element.0);
            fragments.push(KeyFragment::Int(i64::from(self.transaction_source(transaction)?.as_u32())));
            fragments.push(KeyFragment::Int(i64::from(self.transaction_destination(transaction)?.as_u32())));
            fragments.push(KeyFragment::Bool(self.transaction_directed(transaction)?));
        }
        Ok(fragments)
    }

    /// Groups of more than one element sharing a key, ordered by first member
    fn duplicate_key_groups(&self, element_type: ElementType, key: &[AttributeId]) -> GraphResult<Vec<KeyGroup>> {
        let mut index: FxHashMap<Vec<KeyFragment>, usize> = FxHashMap::default();
        let mut groups: Vec<KeyGroup> = Vec::new();
        for position in 0..self.element_count(element_type) {
            let element = match self.element_at(element_type, position) {
                Some(element) => element,
                None => continue,
            };
            let fragments = self.key_of(element_type, key, element)?;
            match index.get(&fragments) {
                Some(&group) => groups[group].push(element),
                None => {
                    index.insert(fragments, groups.len());
                    groups.push(vec![element]);
                }
            }
        }
        groups.retain(|group| group.len() > 1);
        Ok(groups)
    }

    fn duplicate_key_error(
        &self,
        element_type: ElementType,
        key: &[AttributeId],
        group: &[ElementId],
        reason: String,
    ) -> GraphError {
        let values: Vec<String> = key
            .iter()
            .filter_map(|&attribute| {
                let descriptor = self.attribute_descriptor(attribute).ok()?;
                let value = self.get_value(attribute, group[0]).ok()?;
                Some(format!("{}={}", descriptor.name, value))
            })
            .collect();
        GraphError::DuplicateKey {
            element_type,
            existing: group[0],
            duplicate: group[1],
            description: format!("[{}]: {}", values.join(", "), reason),
        }
    }

    /// A merger for every attribute of the element type
    fn resolve_mergers(
        &self,
        element_type: ElementType,
        key: &[AttributeId],
        group: &[ElementId],
    ) -> GraphResult<Vec<(AttributeId, Arc<dyn AttributeMerger>)>> {
        let fallback = self.schema().default_merger();
        let mut mergers = Vec::new();
        for attribute in self.attributes(element_type) {
            let descriptor = self.attribute_descriptor(attribute)?;
            let merger = match &descriptor.merger {
                Some(id) => Some(
                    self.mergers()
                        .get(id)
                        .ok_or_else(|| GraphError::UnknownMerger(id.clone()))?,
                ),
                None => fallback.clone(),
            };
            match merger {
                Some(merger) => mergers.push((attribute, merger)),
                None => {
                    return Err(self.duplicate_key_error(
                        element_type,
                        key,
                        group,
                        format!("no merger for attribute '{}'", descriptor.name),
                    ))
                }
            }
        }
        Ok(mergers)
    }

    /// Merge `loser` into `survivor` and remove it
    fn merge_element(
        &mut self,
        element_type: ElementType,
        mergers: &[(AttributeId, Arc<dyn AttributeMerger>)],
        survivor: ElementId,
        loser: ElementId,
    ) -> GraphResult<()> {
        debug!("Merging {} {} into {}", element_type, loser, survivor);
        for (attribute, merger) in mergers {
            let descriptor = self.attribute_descriptor(*attribute)?;
            let kept = self.get_value(*attribute, survivor)?;
            let merged = self.get_value(*attribute, loser)?;
            let value = merger.merge(&descriptor, &kept, &merged);
            if value != kept {
                self.set_value(*attribute, survivor, value)?;
            }
        }
        match element_type {
            ElementType::Vertex => {
                let (survivor, loser) = (VertexId(survivor.0), VertexId(loser.0));
                self.reattach_transactions(survivor, loser)?;
                self.remove_vertex(loser)
            }
            ElementType::Transaction => self.remove_transaction(TransactionId(loser.0)),
            _ => Err(GraphError::IllegalState(format!(
                "{} elements cannot be merged",
                element_type
            ))),
        }
    }

    /// Copy every transaction of `loser` onto `survivor`, values included
    fn reattach_transactions(&mut self, survivor: VertexId, loser: VertexId) -> GraphResult<()> {
        let count = self.vertex_transaction_count(loser)?;
        let incident: Vec<TransactionId> = (0..count)
            .filter_map(|p| self.vertex_transaction(loser, p).ok().flatten())
            .collect();
        let attributes = self.attributes(ElementType::Transaction);
        for transaction in incident {
            let swap = |v: VertexId| if v == loser { survivor } else { v };
            let source = swap(self.transaction_source(transaction)?);
            let destination = swap(self.transaction_destination(transaction)?);
            let directed = self.transaction_directed(transaction)?;
            let copy = self.add_transaction(source, destination, directed)?;
            for &attribute in &attributes {
                if !self.is_default_value(attribute, transaction)? {
                    let value = self.get_value(attribute, transaction)?;
                    self.set_value(attribute, copy, value)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::BareSchema;
    use crate::graph::value::{AttributeType, AttributeValue};

    fn keyed_graph(schema: Arc<dyn crate::graph::schema::Schema>) -> (Graph, AttributeId) {
        let mut graph = Graph::with_schema(schema);
        let key = graph
            .add_attribute(ElementType::Vertex, AttributeType::String, "identifier", "", None, None)
            .unwrap();
        graph.set_primary_key(ElementType::Vertex, &[key]).unwrap();
        (graph, key)
    }

    #[test]
    fn test_unique_keys_validate() {
        let (mut graph, key) = keyed_graph(Arc::new(BareSchema));
        for name in ["a", "b", "c"] {
            let v = graph.add_vertex().unwrap();
            graph.set_value(key, v, name).unwrap();
        }
        graph.validate_key(ElementType::Vertex, false).unwrap();
        assert_eq!(graph.vertex_count(), 3);
    }

    #[test]
    fn test_duplicate_without_merging_fails() {
        let (mut graph, key) = keyed_graph(Arc::new(BareSchema));
        for _ in 0..2 {
            let v = graph.add_vertex().unwrap();
            graph.set_value(key, v, "same").unwrap();
        }
        let err = graph.validate_key(ElementType::Vertex, false).unwrap_err();
        match err {
            GraphError::DuplicateKey { existing, duplicate, description, .. } => {
                assert_eq!(existing, ElementId(0));
                assert_eq!(duplicate, ElementId(1));
                assert!(description.contains("identifier=same"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_merge_moves_transactions_to_survivor() {
        let (mut graph, key) = keyed_graph(Arc::new(BareSchema));
        let colour = graph
            .add_attribute(ElementType::Vertex, AttributeType::String, "colour", "", None, None)
            .unwrap();
        let weight = graph
            .add_attribute(ElementType::Transaction, AttributeType::Integer, "weight", "", None, None)
            .unwrap();

        let a = graph.add_vertex().unwrap();
        let b = graph.add_vertex().unwrap();
        let other = graph.add_vertex().unwrap();
        graph.set_value(key, a, "dup").unwrap();
        graph.set_value(key, b, "dup").unwrap();
        graph.set_value(key, other, "other").unwrap();
        graph.set_value(colour, b, "red").unwrap();
        let t = graph.add_transaction(other, b, true).unwrap();
        graph.set_value(weight, t, 5).unwrap();

        graph.validate_key(ElementType::Vertex, true).unwrap();

        assert_eq!(graph.vertex_count(), 2);
        assert!(!graph.has_vertex(b));
        assert_eq!(graph.get_value(colour, a).unwrap(), AttributeValue::from("red"));
        assert_eq!(graph.transaction_count(), 1);
        let moved = graph.transaction(0).unwrap();
        assert_eq!(graph.transaction_source(moved).unwrap(), other);
        assert_eq!(graph.transaction_destination(moved).unwrap(), a);
        assert_eq!(graph.get_int_value(weight, moved).unwrap(), 5);
    }

    #[test]
    fn test_missing_merger_leaves_graph_untouched() {
        let (mut graph, key) = keyed_graph(Arc::new(crate::graph::schema::NoSchema));
        for _ in 0..2 {
            let v = graph.add_vertex().unwrap();
            graph.set_value(key, v, "same").unwrap();
        }
        let before = graph.modification_counters();
        assert!(matches!(
            graph.validate_key(ElementType::Vertex, true),
            Err(GraphError::DuplicateKey { .. })
        ));
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.modification_counters(), before);
    }

    #[test]
    fn test_attribute_merger_without_schema() {
        let mut graph = Graph::new();
        let key = graph
            .add_attribute(ElementType::Vertex, AttributeType::Boolean, "flag", "", None, Some("default"))
            .unwrap();
        let note = graph
            .add_attribute(ElementType::Vertex, AttributeType::String, "note", "", None, Some("concatenate"))
            .unwrap();
        graph.set_primary_key(ElementType::Vertex, &[key]).unwrap();
        for text in ["x", "y"] {
            let v = graph.add_vertex().unwrap();
            graph.set_value(key, v, true).unwrap();
            graph.set_value(note, v, text).unwrap();
        }
        graph.validate_key(ElementType::Vertex, true).unwrap();
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.get_string_value(note, VertexId(0)).unwrap(), "x, y");
    }

    #[test]
    fn test_transaction_keys_include_endpoints() {
        let mut graph = Graph::with_schema(Arc::new(BareSchema));
        let kind = graph
            .add_attribute(ElementType::Transaction, AttributeType::String, "kind", "", None, None)
            .unwrap();
        graph.set_primary_key(ElementType::Transaction, &[kind]).unwrap();
        let a = graph.add_vertex().unwrap();
        let b = graph.add_vertex().unwrap();
        let c = graph.add_vertex().unwrap();
        for (s, d) in [(a, b), (a, b), (a, c), (b, a)] {
            let t = graph.add_transaction(s, d, true).unwrap();
            graph.set_value(kind, t, "call").unwrap();
        }
        graph.validate_keys().unwrap();
        assert_eq!(graph.transaction_count(), 3);
    }
}
