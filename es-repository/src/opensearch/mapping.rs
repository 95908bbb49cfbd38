//! Mapping request bodies.

use serde_json::{json, Map, Value};

/// Build the body of a put-mapping request adding `key` with type `value_type`.
///
/// With a `root`, the field is nested under that object field, e.g. search
/// attributes stored under `attr`.
pub fn put_mapping_body(root: Option<&str>, key: &str, value_type: &str) -> Value {
    let mut field = Map::new();
    field.insert(key.to_string(), json!({ "type": value_type }));

    match root.filter(|root| !root.is_empty()) {
        Some(root) => {
            let mut nested = Map::new();
            nested.insert(root.to_string(), json!({ "properties": field }));
            json!({ "properties": nested })
        }
        None => json!({ "properties": field }),
    }
}
