//! Core memory type definitions.
//!
//! Defines typed [`Metadata`] (an ordered map of scalar or array values), the
//! request/response shapes of the write and search paths, and the records
//! returned by direct lookup and statistics.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::error::MemoryError;

/// A single metadata value. Nulls and nested objects are not representable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<MetadataValue>),
}

impl MetadataValue {
    /// Convert a JSON value, rejecting null, objects and out-of-range integers.
    pub fn from_json(key: &str, value: &serde_json::Value) -> Result<Self, MemoryError> {
        use serde_json::Value;
        match value {
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if n.is_u64() {
                    Err(MemoryError::validation(format!(
                        "metadata '{key}': integer {n} exceeds the signed 64-bit range"
                    )))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .map(Self::Float)
                        .ok_or_else(|| {
                            MemoryError::validation(format!("metadata '{key}': invalid number"))
                        })
                }
            }
            Value::Array(items) => items
                .iter()
                .map(|item| Self::from_json(key, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            Value::Null => Err(MemoryError::validation(format!(
                "metadata '{key}': null values are not supported"
            ))),
            Value::Object(_) => Err(MemoryError::validation(format!(
                "metadata '{key}': nested objects are not supported"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

/// Ordered string-keyed metadata. Insertion order is preserved through
/// storage and back; a repeated key replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(Vec<(String, MetadataValue)>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build from a JSON object. `null` means no metadata.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, MemoryError> {
        match value {
            serde_json::Value::Null => Ok(Self::new()),
            serde_json::Value::Object(map) => {
                let mut metadata = Self::new();
                for (key, value) in map {
                    metadata.insert(key.clone(), MetadataValue::from_json(key, value)?);
                }
                Ok(metadata)
            }
            _ => Err(MemoryError::validation("metadata must be a JSON object")),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Size of the JSON serialization in bytes, as checked against the limit.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, MetadataValue)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

/// Input to the write path.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub content: String,
    pub metadata: Metadata,
}

impl WriteRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Returned once a write has committed.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    /// UUID v7 (time-sortable) identifier.
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// Input to the read path.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum results, 1 to 100.
    pub limit: usize,
    /// Minimum cosine similarity, 0.0 to 1.0.
    pub threshold: f64,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize, threshold: f64) -> Self {
        Self {
            query: query.into(),
            limit,
            threshold,
        }
    }
}

/// One decrypted search hit. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub memory_id: String,
    /// Cosine similarity against the query, higher is closer.
    pub similarity: f64,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub execution_time_ms: f64,
    /// `true` if served from the result cache.
    pub cached: bool,
}

/// A memory fetched by id.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub total_memories: u64,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub encryption_enabled: bool,
    pub embedding_cache: CacheStats,
    pub result_cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn json_object_keeps_key_order() {
        let metadata = Metadata::from_json(&json!({"zeta": 1, "alpha": "a", "mid": true})).unwrap();
        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn json_numbers_keep_integer_and_float_apart() {
        let metadata = Metadata::from_json(&json!({"n": 3, "x": 3.5, "y": 2.0})).unwrap();
        assert_eq!(metadata.get("n"), Some(&MetadataValue::Integer(3)));
        assert_eq!(metadata.get("x"), Some(&MetadataValue::Float(3.5)));
        assert_eq!(metadata.get("y"), Some(&MetadataValue::Float(2.0)));
    }

    #[test]
    fn null_and_objects_are_rejected() {
        for bad in [json!({"a": null}), json!({"a": {"b": 1}}), json!({"a": [1, null]})] {
            let err = Metadata::from_json(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(Metadata::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn oversized_unsigned_integer_is_rejected() {
        let err = Metadata::from_json(&json!({"big": u64::MAX})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn null_means_empty() {
        assert!(Metadata::from_json(&serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let metadata = Metadata::new()
            .with("tag", MetadataValue::String("devops".into()))
            .with(
                "nums",
                MetadataValue::Array(vec![MetadataValue::Integer(1), MetadataValue::Bool(false)]),
            );
        let text = serde_json::to_string(&metadata).unwrap();
        assert_eq!(text, r#"{"tag":"devops","nums":[1,false]}"#);
        assert_eq!(metadata.serialized_len(), text.len());
        assert_eq!(metadata.to_json(), json!({"tag": "devops", "nums": [1, false]}));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut metadata = Metadata::new()
            .with("a", MetadataValue::Integer(1))
            .with("b", MetadataValue::Integer(2));
        metadata.insert("a", MetadataValue::Integer(9));
        let pairs: Vec<_> = metadata.iter().collect();
        assert_eq!(pairs[0], ("a", &MetadataValue::Integer(9)));
        assert_eq!(metadata.len(), 2);
    }
}
