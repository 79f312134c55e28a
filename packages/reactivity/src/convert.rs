use crate::array::ArrayRef;
use crate::error::{CallError, CallResult};
use crate::graph::TargetId;
use crate::object::ObjectRef;
use crate::value::Value;
use std::collections::HashSet;

/// Make a value observable. Containers are always reactive, so handles pass
/// through unchanged and wrapping twice yields the same container.
pub fn make_reactive(value: impl Into<Value>) -> Value {
    value.into()
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        from_json(&json)
    }
}

/// Build reactive containers from JSON data
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::Array(ArrayRef::from_vec(items.iter().map(from_json).collect()))
        }
        serde_json::Value::Object(map) => Value::Object(ObjectRef::from_entries(
            map.iter().map(|(key, value)| (key.as_str(), from_json(value))),
        )),
    }
}

/// Serialize to JSON. Functions and undefined are dropped from objects and
/// become null inside arrays; cycles are an error.
pub fn to_json(value: &Value) -> CallResult<serde_json::Value> {
    let mut seen = HashSet::new();
    to_json_inner(value, &mut seen)
}

fn to_json_inner(value: &Value, seen: &mut HashSet<TargetId>) -> CallResult<serde_json::Value> {
    Ok(match value {
        Value::Undefined | Value::Null | Value::Function(_) | Value::Promise(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Ref(cell) => to_json_inner(&cell.get(), seen)?,
        Value::Host(host) => serde_json::Value::String(host.display()),
        Value::Array(array) => {
            if !seen.insert(array.id()) {
                return Err(CallError::type_error("Converting circular structure to JSON"));
            }
            let items = array
                .snapshot()
                .iter()
                .map(|item| to_json_inner(item, seen))
                .collect::<CallResult<Vec<_>>>()?;
            seen.remove(&array.id());
            serde_json::Value::Array(items)
        }
        Value::Object(object) => {
            if !seen.insert(object.id()) {
                return Err(CallError::type_error("Converting circular structure to JSON"));
            }
            let mut map = serde_json::Map::new();
            for (key, item) in object.entries() {
                if matches!(item, Value::Undefined | Value::Function(_)) {
                    continue;
                }
                map.insert(key.to_string(), to_json_inner(&item, seen)?);
            }
            seen.remove(&object.id());
            serde_json::Value::Object(map)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_keeps_structure() {
        let value = from_json(&json!({ "items": [1, "two", null], "open": true }));
        let items = value.get("items");
        assert_eq!(items.get("length"), Value::from(3));
        assert_eq!(items.get("1"), Value::from("two"));

        let back = to_json(&value).unwrap();
        assert_eq!(back, json!({ "items": [1.0, "two", null], "open": true }));
    }

    #[test]
    fn test_make_reactive_is_idempotent() {
        let object = ObjectRef::new();
        let wrapped = make_reactive(object.clone());
        assert_eq!(make_reactive(wrapped.clone()), wrapped);
        assert_eq!(wrapped, Value::Object(object));
    }

    #[test]
    fn test_cycles_are_reported() {
        let object = ObjectRef::new();
        object.set("me", Value::Object(object.clone()));
        assert!(to_json(&Value::Object(object.clone())).is_err());
        object.delete("me");
    }
}
