//! Attribute definitions and their value columns

use super::element::ElementTable;
use super::storage::Column;
use super::types::{AttributeId, ElementType};
use super::value::{AttributeType, AttributeValue, ConversionFailure};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Definition of an attribute column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub id: AttributeId,
    pub element_type: ElementType,
    pub attribute_type: AttributeType,
    pub name: String,
    pub description: String,
    pub default_value: AttributeValue,
    /// Merger used when elements with equal primary keys are merged
    pub merger: Option<String>,
}

#[derive(Debug, Clone)]
struct AttributeSlot {
    descriptor: AttributeDescriptor,
    column: Column,
}

/// All attribute columns of one graph
#[derive(Debug, Clone, Default)]
pub(crate) struct AttributeStore {
    ids: ElementTable,
    slots: Vec<Option<AttributeSlot>>,
    /// Attributes per element type in creation order
    by_type: [Vec<AttributeId>; 4],
    names: FxHashMap<(ElementType, String), AttributeId>,
}

impl AttributeStore {
    pub fn with_capacity(capacity: usize) -> Self {
        AttributeStore {
            ids: ElementTable::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn next_id(&self) -> AttributeId {
        AttributeId(self.ids.next_id())
    }

    #[cfg(test)]
    pub fn contains(&self, id: AttributeId) -> bool {
        self.ids.contains(id.0)
    }

    pub fn descriptor(&self, id: AttributeId) -> Option<&AttributeDescriptor> {
        self.slot(id).map(|s| &s.descriptor)
    }

    pub fn find(&self, element_type: ElementType, name: &str) -> Option<AttributeId> {
        self.names.get(&(element_type, name.to_string())).copied()
    }

    pub fn attributes_of(&self, element_type: ElementType) -> &[AttributeId] {
        &self.by_type[element_type.ordinal()]
    }

    fn slot(&self, id: AttributeId) -> Option<&AttributeSlot> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: AttributeId) -> Option<&mut AttributeSlot> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Register an attribute under the id carried by its descriptor
    pub fn insert(&mut self, descriptor: AttributeDescriptor) -> bool {
        let id = descriptor.id;
        let key = (descriptor.element_type, descriptor.name.clone());
        if self.names.contains_key(&key) || !self.ids.insert(id.0, 0) {
            return false;
        }
        if id.index() >= self.slots.len() {
            self.slots.resize(id.index() + 1, None);
        }
        self.by_type[descriptor.element_type.ordinal()].push(id);
        self.names.insert(key, id);
        self.slots[id.index()] = Some(AttributeSlot {
            column: Column::for_type(descriptor.attribute_type),
            descriptor,
        });
        true
    }

    pub fn remove(&mut self, id: AttributeId) -> Option<AttributeDescriptor> {
        let slot = self.slots.get_mut(id.index())?.take()?;
        self.ids.remove(id.0);
        let descriptor = slot.descriptor;
        self.by_type[descriptor.element_type.ordinal()].retain(|&a| a != id);
        self.names
            .remove(&(descriptor.element_type, descriptor.name.clone()));
        Some(descriptor)
    }

    /// Explicitly stored value, `None` when the element holds the default
    pub fn stored(&self, id: AttributeId, element: usize) -> Option<AttributeValue> {
        self.slot(id).and_then(|s| s.column.get(element))
    }

    /// Effective value: the stored value or the attribute's default
    pub fn value(&self, id: AttributeId, element: usize) -> Option<AttributeValue> {
        let slot = self.slot(id)?;
        Some(
            slot.column
                .get(element)
                .unwrap_or_else(|| slot.descriptor.default_value.clone()),
        )
    }

    /// Normalize a value for storage: converted to the column type, `None`
    /// when it equals the default
    pub fn normalize(
        &self,
        id: AttributeId,
        value: Option<AttributeValue>,
    ) -> Option<Result<Option<AttributeValue>, ConversionFailure>> {
        let descriptor = &self.slot(id)?.descriptor;
        Some(match value {
            None => Ok(None),
            Some(v) => v.convert(descriptor.attribute_type).map(|converted| {
                if converted.same_as(&descriptor.default_value) {
                    None
                } else {
                    Some(converted)
                }
            }),
        })
    }

    /// Store an already normalized value, returning the previous stored value
    pub fn store(
        &mut self,
        id: AttributeId,
        element: usize,
        value: Option<AttributeValue>,
    ) -> Result<Option<AttributeValue>, ConversionFailure> {
        match self.slot_mut(id) {
            Some(slot) => slot.column.set(element, value),
            None => Ok(None),
        }
    }

    /// Elements of the attribute's element type holding a non-default value
    pub fn set_elements(&self, id: AttributeId) -> Vec<usize> {
        self.slot(id)
            .map(|s| s.column.set_indices())
            .unwrap_or_default()
    }

    pub fn rename(&mut self, id: AttributeId, name: &str) -> Option<String> {
        let slot = self.slots.get_mut(id.index()).and_then(Option::as_mut)?;
        let element_type = slot.descriptor.element_type;
        let old = std::mem::replace(&mut slot.descriptor.name, name.to_string());
        self.names.remove(&(element_type, old.clone()));
        self.names.insert((element_type, name.to_string()), id);
        Some(old)
    }

    pub fn set_description(&mut self, id: AttributeId, description: &str) -> Option<String> {
        let slot = self.slot_mut(id)?;
        Some(std::mem::replace(
            &mut slot.descriptor.description,
            description.to_string(),
        ))
    }

    pub fn set_default(&mut self, id: AttributeId, default: AttributeValue) -> Option<AttributeValue> {
        let slot = self.slot_mut(id)?;
        Some(std::mem::replace(&mut slot.descriptor.default_value, default))
    }
}
