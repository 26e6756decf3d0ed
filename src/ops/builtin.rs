//! Built-in operation modules
//!
//! A small library of transformations registered by
//! `OperationRegistry::with_builtins`: identity, text shaping, integer
//! arithmetic, and collection labeling. They double as the reference
//! operations the scenario tests drive pipelines with.

use super::OperationRegistry;
use crate::core::data::Data;
use anyhow::{bail, Result};

/// Register every built-in module into the given registry
pub fn register(registry: &mut OperationRegistry) {
    registry.register("core", "identity", |data| Ok(data.clone()));

    registry.register("text", "uppercase", |data| {
        Ok(Data::Text(scalar_string(data)?.to_uppercase()))
    });

    registry.register("text", "wrap", |data| {
        Ok(Data::Text(format!("PREFIX_{}_SUFFIX", scalar_string(data)?)))
    });

    registry.register("math", "double", |data| numeric(data, "math.double", 2, 2.0));

    registry.register("math", "increment", |data| match data {
        Data::Number(n) => {
            if let Some(i) = n.as_i64() {
                let incremented = i
                    .checked_add(1)
                    .ok_or_else(|| anyhow::anyhow!("math.increment overflowed on {}", i))?;
                Ok(Data::Number(serde_json::Number::from(incremented)))
            } else if let Some(f) = n.as_f64() {
                float_number(f + 1.0, "math.increment")
            } else {
                bail!("math.increment cannot represent {}", n)
            }
        }
        other => bail!("math.increment expects a number, got {}", other.type_name()),
    });

    registry.register("collection", "index_prefix", |data| match data {
        Data::List(items) => {
            let labeled = items
                .iter()
                .enumerate()
                .map(|(i, item)| Ok(Data::Text(format!("item_{}_{}", i, scalar_string(item)?))))
                .collect::<Result<Vec<_>>>()?;
            Ok(Data::List(labeled))
        }
        other => bail!(
            "collection.index_prefix expects a sequence, got {}",
            other.type_name()
        ),
    });

    registry.register("collection", "key_prefix", |data| match data {
        Data::Map(map) => {
            let labeled = map
                .iter()
                .map(|(k, v)| {
                    Ok((
                        k.clone(),
                        Data::Text(format!("key_{}_{}", k, scalar_string(v)?)),
                    ))
                })
                .collect::<Result<_>>()?;
            Ok(Data::Map(labeled))
        }
        other => bail!(
            "collection.key_prefix expects a mapping, got {}",
            other.type_name()
        ),
    });
}

/// Render a scalar as a string; collections and binary data are rejected
fn scalar_string(data: &Data) -> Result<String> {
    match data {
        Data::Text(s) => Ok(s.clone()),
        Data::Number(n) => Ok(n.to_string()),
        Data::Bool(b) => Ok(b.to_string()),
        Data::Null => Ok("null".to_string()),
        other => bail!("expected a scalar value, got {}", other.type_name()),
    }
}

fn numeric(data: &Data, op: &str, int_factor: i64, float_factor: f64) -> Result<Data> {
    match data {
        Data::Number(n) => {
            if let Some(i) = n.as_i64() {
                let scaled = i
                    .checked_mul(int_factor)
                    .ok_or_else(|| anyhow::anyhow!("{} overflowed on {}", op, i))?;
                Ok(Data::Number(serde_json::Number::from(scaled)))
            } else if let Some(f) = n.as_f64() {
                float_number(f * float_factor, op)
            } else {
                bail!("{} cannot represent {}", op, n)
            }
        }
        other => bail!("{} expects a number, got {}", op, other.type_name()),
    }
}

fn float_number(value: f64, op: &str) -> Result<Data> {
    serde_json::Number::from_f64(value)
        .map(Data::Number)
        .ok_or_else(|| anyhow::anyhow!("{} produced a non-finite number", op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builtins() -> OperationRegistry {
        OperationRegistry::with_builtins()
    }

    #[test]
    fn test_identity() {
        let op = builtins().resolve("core", "identity").unwrap();
        let value = Data::from_json(json!({"a": [1, 2]}));
        assert_eq!(op(&value).unwrap(), value);
    }

    #[test]
    fn test_uppercase() {
        let op = builtins().resolve("text", "uppercase").unwrap();
        assert_eq!(op(&Data::from("hello")).unwrap(), Data::from("HELLO"));
        assert_eq!(op(&Data::from(7i64)).unwrap(), Data::from("7"));
        assert!(op(&Data::List(vec![])).is_err());
    }

    #[test]
    fn test_wrap() {
        let op = builtins().resolve("text", "wrap").unwrap();
        assert_eq!(
            op(&Data::from("core")).unwrap(),
            Data::from("PREFIX_core_SUFFIX")
        );
    }

    #[test]
    fn test_double() {
        let op = builtins().resolve("math", "double").unwrap();
        assert_eq!(op(&Data::from(21i64)).unwrap(), Data::from(42i64));

        let half = Data::Number(serde_json::Number::from_f64(1.5).unwrap());
        assert_eq!(
            op(&half).unwrap(),
            Data::Number(serde_json::Number::from_f64(3.0).unwrap())
        );

        assert!(op(&Data::from("2")).is_err());
        assert!(op(&Data::from(i64::MAX)).is_err());
    }

    #[test]
    fn test_increment() {
        let op = builtins().resolve("math", "increment").unwrap();
        assert_eq!(op(&Data::from(5i64)).unwrap(), Data::from(6i64));
        assert!(op(&Data::Null).is_err());
    }

    #[test]
    fn test_index_prefix() {
        let op = builtins().resolve("collection", "index_prefix").unwrap();
        let input = Data::from_json(json!(["a", "b", "c"]));
        assert_eq!(
            op(&input).unwrap(),
            Data::from_json(json!(["item_0_a", "item_1_b", "item_2_c"]))
        );
        assert!(op(&Data::from("not a list")).is_err());
    }

    #[test]
    fn test_key_prefix() {
        let op = builtins().resolve("collection", "key_prefix").unwrap();
        let input = Data::from_json(json!({"key1": "value1", "key2": "value2"}));
        assert_eq!(
            op(&input).unwrap(),
            Data::from_json(json!({
                "key1": "key_key1_value1",
                "key2": "key_key2_value2"
            }))
        );
    }
}
