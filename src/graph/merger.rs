//! Attribute mergers
//!
//! When two elements share a primary key and merging is allowed, every
//! attribute of the element type is combined by a merger: the attribute's own
//! merger if it names one, otherwise the schema's default merger.

use super::attribute::AttributeDescriptor;
use super::value::AttributeValue;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Combines the values of a surviving element and an element merged into it
pub trait AttributeMerger: Send + Sync + fmt::Debug {
    /// Registry id of the merger
    fn id(&self) -> &str;

    /// Value the survivor should carry after the merge
    fn merge(
        &self,
        descriptor: &AttributeDescriptor,
        survivor: &AttributeValue,
        merged: &AttributeValue,
    ) -> AttributeValue;
}

/// Keeps the survivor's value unless it is the attribute default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMerger;

impl AttributeMerger for DefaultMerger {
    fn id(&self) -> &str {
        "default"
    }

    fn merge(
        &self,
        descriptor: &AttributeDescriptor,
        survivor: &AttributeValue,
        merged: &AttributeValue,
    ) -> AttributeValue {
        if survivor.same_as(&descriptor.default_value) {
            merged.clone()
        } else {
            survivor.clone()
        }
    }
}

/// Takes the merged element's value unless it is the attribute default
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceMerger;

impl AttributeMerger for ReplaceMerger {
    fn id(&self) -> &str {
        "replace"
    }

    fn merge(
        &self,
        descriptor: &AttributeDescriptor,
        survivor: &AttributeValue,
        merged: &AttributeValue,
    ) -> AttributeValue {
        if merged.same_as(&descriptor.default_value) {
            survivor.clone()
        } else {
            merged.clone()
        }
    }
}

/// Joins differing values as `"survivor, merged"`.
///
/// For attribute types the joined text cannot be converted back into, the
/// survivor's value is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatenateMerger;

impl AttributeMerger for ConcatenateMerger {
    fn id(&self) -> &str {
        "concatenate"
    }

    fn merge(
        &self,
        descriptor: &AttributeDescriptor,
        survivor: &AttributeValue,
        merged: &AttributeValue,
    ) -> AttributeValue {
        let default = &descriptor.default_value;
        if merged.same_as(default) || merged.same_as(survivor) {
            return survivor.clone();
        }
        if survivor.same_as(default) {
            return merged.clone();
        }
        AttributeValue::String(format!("{}, {}", survivor, merged))
            .convert(descriptor.attribute_type)
            .unwrap_or_else(|_| survivor.clone())
    }
}

/// Mergers addressable by id
#[derive(Debug, Clone, Default)]
pub struct MergerRegistry {
    mergers: FxHashMap<String, Arc<dyn AttributeMerger>>,
}

impl MergerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `default`, `replace` and `concatenate`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DefaultMerger));
        registry.register(Arc::new(ReplaceMerger));
        registry.register(Arc::new(ConcatenateMerger));
        registry
    }

    /// Register a merger, replacing any merger with the same id
    pub fn register(&mut self, merger: Arc<dyn AttributeMerger>) {
        self.mergers.insert(merger.id().to_string(), merger);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AttributeMerger>> {
        self.mergers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mergers.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.mergers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
