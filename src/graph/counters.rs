//! Modification counters
//!
//! Monotonic 64-bit counters used by consumers to detect change cheaply: a
//! global counter, one for structure (elements), one for attribute
//! definitions and one per attribute for its values. Category bumps do not
//! touch the global counter; every mutation bumps global exactly once.

use super::types::AttributeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModificationCounters {
    global: u64,
    structure: u64,
    attribute: u64,
    /// Value counters indexed by attribute id
    values: Vec<u64>,
}

impl ModificationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> u64 {
        self.global
    }

    pub fn structure(&self) -> u64 {
        self.structure
    }

    pub fn attribute(&self) -> u64 {
        self.attribute
    }

    /// Value counter of an attribute, 0 for ids never seen
    pub fn value(&self, attribute: AttributeId) -> u64 {
        self.values.get(attribute.index()).copied().unwrap_or(0)
    }

    pub(crate) fn bump_global(&mut self) {
        self.global += 1;
    }

    pub(crate) fn bump_structure(&mut self) {
        self.structure += 1;
    }

    pub(crate) fn bump_attribute(&mut self) {
        self.attribute += 1;
    }

    pub(crate) fn bump_value(&mut self, attribute: AttributeId) {
        *self.value_slot(attribute) += 1;
    }

    pub(crate) fn set(&mut self, global: u64, structure: u64, attribute: u64) {
        self.global = global;
        self.structure = structure;
        self.attribute = attribute;
    }

    pub(crate) fn set_value(&mut self, attribute: AttributeId, value: u64) {
        *self.value_slot(attribute) = value;
    }

    fn trimmed_values(&self) -> &[u64] {
        let len = self.values.iter().rposition(|&v| v != 0).map_or(0, |p| p + 1);
        &self.values[..len]
    }

    fn value_slot(&mut self, attribute: AttributeId) -> &mut u64 {
        let idx = attribute.index();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, 0);
        }
        &mut self.values[idx]
    }
}

// Attributes whose value counter is still zero compare equal to unseen ids
impl PartialEq for ModificationCounters {
    fn eq(&self, other: &Self) -> bool {
        self.global == other.global
            && self.structure == other.structure
            && self.attribute == other.attribute
            && self.trimmed_values() == other.trimmed_values()
    }
}

impl Eq for ModificationCounters {}
