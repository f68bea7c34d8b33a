//! Field-by-field overlay used by partial updates
//!
//! `{"address": {"city": "Cusco"}}` applied to a stored customer changes only
//! `address.city`. Keys are taken literally, so a stored key such as
//! `"v1.2"` is never split into nested objects.

use serde_json::{Map, Value};

/// Overlays `partial` onto `existing`, field by field at any depth.
///
/// Where both sides hold a non-empty object the merge recurses; any other
/// partial value (scalar, array, empty object) replaces what was stored.
/// Subtrees the partial does not name are carried over untouched.
pub fn deep_merge(existing: &Map<String, Value>, partial: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = existing.clone();
    merge_into(&mut merged, partial);
    merged
}

fn merge_into(target: &mut Map<String, Value>, partial: &Map<String, Value>) {
    for (key, value) in partial {
        match (target.get_mut(key), value) {
            (Some(Value::Object(current)), Value::Object(nested)) if !nested.is_empty() => {
                merge_into(current, nested);
            },
            _ => {
                target.insert(key.clone(), value.clone());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_deep_merge_preserves_siblings() {
        let existing = obj(json!({
            "_id": "c-1",
            "name": "Ada",
            "address": { "city": "Lima", "zip": "15001", "geo": { "lat": 1.5 } }
        }));
        let partial = obj(json!({ "address": { "city": "Cusco", "geo": { "lng": 2.5 } } }));

        assert_eq!(
            Value::Object(deep_merge(&existing, &partial)),
            json!({
                "_id": "c-1",
                "name": "Ada",
                "address": { "city": "Cusco", "zip": "15001", "geo": { "lat": 1.5, "lng": 2.5 } }
            })
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays_and_types() {
        let existing = obj(json!({
            "tags": ["a", "b"],
            "status": "draft",
            "meta": { "source": "import" },
            "extra": { "keep": true }
        }));
        let partial = obj(json!({
            "tags": ["c"],
            "status": { "code": 2 },
            "meta": "manual",
            "extra": {}
        }));

        assert_eq!(
            Value::Object(deep_merge(&existing, &partial)),
            json!({
                "tags": ["c"],
                "status": { "code": 2 },
                "meta": "manual",
                "extra": {}
            })
        );
    }

    #[test]
    fn test_deep_merge_keeps_dotted_keys_literal() {
        let existing = obj(json!({
            "name": "a",
            "metadata": { "v1.2": "x", "nested": { "a.b": 1 } }
        }));
        let partial = obj(json!({ "name": "b", "metadata": { "nested": { "c.d": 2 } } }));

        assert_eq!(
            Value::Object(deep_merge(&existing, &partial)),
            json!({
                "name": "b",
                "metadata": { "v1.2": "x", "nested": { "a.b": 1, "c.d": 2 } }
            })
        );
    }

    #[test]
    fn test_deep_merge_with_empty_partial() {
        let existing = obj(json!({ "a": { "b": 1 }, "c.d": 2 }));
        assert_eq!(deep_merge(&existing, &Map::new()), existing);
    }
}
