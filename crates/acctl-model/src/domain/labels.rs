use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Free-form metadata attached by whoever requested an admission.
///
/// Stored as an ordered list of key–value pairs and serialized as a plain array.
/// The controller never interprets it; it is carried through the queue so that
/// dashboards can show who is waiting and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterLabels(pub Vec<KeyValue>);

impl RequesterLabels {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Create a label set containing a single pair.
    pub fn single<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vec![KeyValue::new(key, value)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key; the last matching entry wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Append a pair. Later entries override earlier ones in [`RequesterLabels::get`].
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }
}

impl Default for RequesterLabels {
    fn default() -> Self {
        Self::new()
    }
}
