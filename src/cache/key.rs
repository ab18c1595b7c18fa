//! Cache Key Module
//!
//! Derives a stable cache key from an endpoint path and its request parameters.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// == Cache Key ==
/// `endpoint` followed by the canonical JSON form of the parameters.
///
/// The key remembers where the endpoint ends, so entries can be grouped by
/// endpoint without guessing from the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    endpoint_len: usize,
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The endpoint part of the key, without parameters.
    pub fn endpoint(&self) -> &str {
        &self.key[..self.endpoint_len]
    }

    pub fn into_string(self) -> String {
        self.key
    }
}

/// A plain string is a key for an endpoint called without parameters.
impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        let endpoint_len = key.len();
        Self { key, endpoint_len }
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::from(key.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key)
    }
}

// == Derive Key ==
/// Builds the cache key for `endpoint` called with `params`.
///
/// Object keys are sorted at every depth, so two parameter objects that differ
/// only in property order map to the same key. Missing or `null` params add
/// nothing to the endpoint.
pub fn derive_key(endpoint: &str, params: Option<&Value>) -> CacheKey {
    match params {
        None | Some(Value::Null) => CacheKey::from(endpoint),
        Some(params) => CacheKey {
            key: format!("{endpoint}{}", canonical_json(params)),
            endpoint_len: endpoint.len(),
        },
    }
}

/// Serializes `value` compactly with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            // Insertion order is the sorted order whether or not the map preserves it
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
