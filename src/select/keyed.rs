//! By-name field access for map-like state types.

use std::collections::{BTreeMap, HashMap};

/// State types whose fields can be looked up by name.
///
/// Backs [`Store::select_key`](crate::Store::select_key) for dynamic
/// state shapes where a projection is just a field read.
pub trait Keyed {
    /// The value produced by a field lookup.
    type Value: Clone;

    /// Look up a field by name.
    fn field(&self, key: &str) -> Self::Value;
}

impl Keyed for serde_json::Value {
    type Value = serde_json::Value;

    /// Missing members resolve to `null`.
    fn field(&self, key: &str) -> serde_json::Value {
        self.get(key).cloned().unwrap_or(serde_json::Value::Null)
    }
}

impl<V: Clone> Keyed for HashMap<String, V> {
    type Value = Option<V>;

    fn field(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }
}

impl<V: Clone> Keyed for BTreeMap<String, V> {
    type Value = Option<V>;

    fn field(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }
}
