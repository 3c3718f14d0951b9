//! Tagged property-bag value, used for entity/relationship `properties`
//! and result `metadata`.
//!
//! Entity and relationship properties are heterogeneous key→value maps
//! supplied by callers (extractors, connectors, direct API use). Rather
//! than opaque JSON text, they're represented as a closed tagged variant
//! so the core can pattern-match on them without re-parsing, while still
//! round-tripping losslessly through `serde_json::Value` at the API
//! boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single property value: string, number, bool, null, array, or a
/// nested map of the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

/// A property bag: ordered by key for deterministic serialization.
pub type Properties = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`, for API responses that need raw JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Null => serde_json::Value::Null,
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::json!(n),
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            PropertyValue::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }

    /// Build from a `serde_json::Value`, coercing numbers to `f64`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(*b),
            serde_json::Value::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => PropertyValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                PropertyValue::Array(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(obj) => PropertyValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), PropertyValue::from("alice"));
        map.insert("age".to_string(), PropertyValue::from(30i64));
        map.insert(
            "tags".to_string(),
            PropertyValue::Array(vec![PropertyValue::from("a"), PropertyValue::from("b")]),
        );
        let value = PropertyValue::Map(map);

        let json = value.to_json();
        let back = PropertyValue::from_json(&json);
        assert_eq!(value, back);
    }

    #[test]
    fn null_roundtrip() {
        assert_eq!(
            PropertyValue::from_json(&serde_json::Value::Null),
            PropertyValue::Null
        );
    }
}
