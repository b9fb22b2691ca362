//! The property context threaded through the synthesis pipeline.

use indexmap::IndexMap;

/// An ordered accumulator of properties (addresses, database names,
/// credential material) produced by synthesis steps.
///
/// Keys are inserted left-to-right as the pipeline advances and are never
/// removed within a reconciliation pass. A synthesis step may read any key
/// written by an earlier step, but never one that is first written later;
/// there is no removal API, so the only way to violate this is to reorder the
/// pipeline itself.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PropertyContext {
    properties: IndexMap<String, String>,
}

impl PropertyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a property. Re-inserting an existing key overwrites the value
    /// but keeps its original pipeline position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
