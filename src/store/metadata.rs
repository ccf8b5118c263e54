//! Typed metadata to string-only storage, and back.
//!
//! Each value is written as a one-letter type tag, a colon, and a payload:
//!
//! | value | stored |
//! |---|---|
//! | `String("x")` | `s:x` |
//! | `Integer(-3)` | `i:-3` |
//! | `Float(0.5)` | `f:0.5` |
//! | `Bool(true)` | `b:true` |
//! | `Array([..])` | `a:` + JSON array of the encoded elements |
//!
//! The tag carries the type, so `decode(encode(v)) == v` for every value,
//! including strings that look like numbers and floats with no fraction.

use thiserror::Error;

use crate::memory::types::{Metadata, MetadataValue};

#[derive(Debug, Error)]
#[error("undecodable metadata value {value:?}: {reason}")]
pub struct DecodeError {
    value: String,
    reason: String,
}

impl DecodeError {
    fn new(value: &str, reason: impl Into<String>) -> Self {
        Self {
            value: value.chars().take(64).collect(),
            reason: reason.into(),
        }
    }
}

pub fn encode_value(value: &MetadataValue) -> String {
    match value {
        MetadataValue::String(s) => format!("s:{s}"),
        MetadataValue::Integer(i) => format!("i:{i}"),
        MetadataValue::Float(f) => format!("f:{f:?}"),
        MetadataValue::Bool(b) => format!("b:{b}"),
        MetadataValue::Array(items) => {
            let encoded: Vec<String> = items.iter().map(encode_value).collect();
            // Vec<String> always serializes
            format!("a:{}", serde_json::Value::from(encoded))
        }
    }
}

pub fn decode_value(stored: &str) -> Result<MetadataValue, DecodeError> {
    let (tag, payload) = stored
        .split_once(':')
        .ok_or_else(|| DecodeError::new(stored, "missing type tag"))?;
    match tag {
        "s" => Ok(MetadataValue::String(payload.to_owned())),
        "i" => payload
            .parse()
            .map(MetadataValue::Integer)
            .map_err(|e| DecodeError::new(stored, format!("bad integer: {e}"))),
        "f" => payload
            .parse()
            .map(MetadataValue::Float)
            .map_err(|e| DecodeError::new(stored, format!("bad float: {e}"))),
        "b" => match payload {
            "true" => Ok(MetadataValue::Bool(true)),
            "false" => Ok(MetadataValue::Bool(false)),
            _ => Err(DecodeError::new(stored, "bad boolean")),
        },
        "a" => {
            let items: Vec<String> = serde_json::from_str(payload)
                .map_err(|e| DecodeError::new(stored, format!("bad array: {e}")))?;
            items
                .iter()
                .map(|item| decode_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(MetadataValue::Array)
        }
        other => Err(DecodeError::new(stored, format!("unknown type tag '{other}'"))),
    }
}

/// Encode every entry, preserving order.
pub fn encode(metadata: &Metadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(key, value)| (key.to_owned(), encode_value(value)))
        .collect()
}

pub fn decode<I>(entries: I) -> Result<Metadata, DecodeError>
where
    I: IntoIterator<Item = (String, String)>,
{
    entries
        .into_iter()
        .map(|(key, stored)| decode_value(&stored).map(|value| (key, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: MetadataValue) {
        let stored = encode_value(&value);
        assert_eq!(decode_value(&stored).unwrap(), value, "stored as {stored}");
    }

    #[test]
    fn strings_round_trip() {
        round_trip(MetadataValue::String("devops".into()));
        round_trip(MetadataValue::String(String::new()));
        round_trip(MetadataValue::String("a:b:c".into()));
        round_trip(MetadataValue::String("42".into()));
        round_trip(MetadataValue::String("true".into()));
        round_trip(MetadataValue::String("ünïcødé ✓".into()));
    }

    #[test]
    fn integers_round_trip() {
        round_trip(MetadataValue::Integer(0));
        round_trip(MetadataValue::Integer(-17));
        round_trip(MetadataValue::Integer(i64::MAX));
        round_trip(MetadataValue::Integer(i64::MIN));
    }

    #[test]
    fn floats_round_trip() {
        round_trip(MetadataValue::Float(0.5));
        round_trip(MetadataValue::Float(2.0));
        round_trip(MetadataValue::Float(-1.0e-300));
        round_trip(MetadataValue::Float(std::f64::consts::PI));
    }

    #[test]
    fn float_without_fraction_stays_float() {
        assert_eq!(encode_value(&MetadataValue::Float(2.0)), "f:2.0");
        assert_eq!(decode_value("f:2.0").unwrap(), MetadataValue::Float(2.0));
    }

    #[test]
    fn booleans_round_trip() {
        round_trip(MetadataValue::Bool(true));
        round_trip(MetadataValue::Bool(false));
    }

    #[test]
    fn arrays_round_trip() {
        round_trip(MetadataValue::Array(vec![]));
        round_trip(MetadataValue::Array(vec![
            MetadataValue::String("x,y".into()),
            MetadataValue::Integer(7),
            MetadataValue::Float(1.25),
            MetadataValue::Bool(false),
        ]));
        round_trip(MetadataValue::Array(vec![MetadataValue::Array(vec![
            MetadataValue::String("\"quoted\"".into()),
        ])]));
    }

    #[test]
    fn whole_map_keeps_order() {
        let metadata = Metadata::new()
            .with("tag", MetadataValue::String("devops".into()))
            .with("priority", MetadataValue::Integer(2))
            .with("pinned", MetadataValue::Bool(true));
        let encoded = encode(&metadata);
        assert_eq!(encoded[0], ("tag".to_string(), "s:devops".to_string()));
        assert_eq!(decode(encoded).unwrap(), metadata);
    }

    #[test]
    fn malformed_values_are_errors() {
        for bad in ["devops", "i:abc", "f:", "b:yes", "a:not json", "x:1", "a:[1]"] {
            assert!(decode_value(bad).is_err(), "{bad} should not decode");
        }
    }
}
