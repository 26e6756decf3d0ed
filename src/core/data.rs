//! Nested value model traversed by the engine

use crate::core::error::EngineError;
use serde_json::Value;
use std::collections::BTreeMap;

/// A pipeline value: scalar, ordered sequence, or keyed mapping.
///
/// This is a superset of JSON: `Bytes` carries encoded binary payloads
/// (image buffers) that the image-collection storage format moves through
/// the pipeline. Converting a `Bytes`-bearing value to JSON fails, which is
/// what makes "must be JSON-serializable" checkable at the database boundary
/// and at final-output time.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Data>),
    Map(BTreeMap<String, Data>),
}

impl Data {
    /// Convert a JSON value into engine data. Total: every JSON value maps.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(b),
            Value::Number(n) => Data::Number(n),
            Value::String(s) => Data::Text(s),
            Value::Array(items) => Data::List(items.into_iter().map(Data::from_json).collect()),
            Value::Object(map) => Data::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Data::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert engine data back to JSON.
    ///
    /// Fails with a validation error if the value contains `Bytes` anywhere,
    /// since JSON has no binary representation.
    pub fn to_json(&self) -> Result<Value, EngineError> {
        match self {
            Data::Null => Ok(Value::Null),
            Data::Bool(b) => Ok(Value::Bool(*b)),
            Data::Number(n) => Ok(Value::Number(n.clone())),
            Data::Text(s) => Ok(Value::String(s.clone())),
            Data::Bytes(_) => Err(EngineError::Validation(
                "binary data cannot be represented as JSON".to_string(),
            )),
            Data::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(Data::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Data::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// Parse a JSON document into engine data.
    pub fn parse_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Data::from_json(serde_json::from_str(text)?))
    }

    /// Render as pretty-printed JSON (fails on `Bytes`).
    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        let value = self.to_json()?;
        serde_json::to_string_pretty(&value)
            .map_err(|e| EngineError::Validation(format!("cannot serialize value: {e}")))
    }

    /// Short type label used in log output and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "bool",
            Data::Number(_) => "number",
            Data::Text(_) => "text",
            Data::Bytes(_) => "bytes",
            Data::List(_) => "sequence",
            Data::Map(_) => "mapping",
        }
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Text(s.to_string())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Text(s)
    }
}

impl From<i64> for Data {
    fn from(n: i64) -> Self {
        Data::Number(serde_json::Number::from(n))
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Data::Bool(b)
    }
}

impl From<Vec<Data>> for Data {
    fn from(items: Vec<Data>) -> Self {
        Data::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let value = json!({
            "name": "report",
            "pages": [1, 2, 3],
            "meta": { "ok": true, "score": 1.5, "none": null }
        });

        let data = Data::from_json(value.clone());
        assert_eq!(data.to_json().unwrap(), value);
    }

    #[test]
    fn test_bytes_are_not_json() {
        let data = Data::List(vec![Data::Bytes(vec![1, 2, 3])]);
        let err = data.to_json().unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_parse_json() {
        let data = Data::parse_json(r#"{"a": [1, "two"]}"#).unwrap();
        assert_eq!(
            data,
            Data::from_json(json!({"a": [1, "two"]}))
        );
        assert!(Data::parse_json("not json").is_err());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Data::Null.type_name(), "null");
        assert_eq!(Data::from(3i64).type_name(), "number");
        assert_eq!(Data::Map(Default::default()).type_name(), "mapping");
        assert_eq!(Data::Bytes(vec![]).type_name(), "bytes");
    }
}
