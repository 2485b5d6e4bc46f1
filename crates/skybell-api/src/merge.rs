// Deep merge of JSON-shaped fragments
//
// Every "partial update" in the client (auth cache writes, device
// profile/snapshot/settings fragments, token refresh) goes through here.

use serde_json::{Map, Value};

/// Merge `incoming` into `target`, recursing through nested objects.
///
/// Leaves in `incoming` overwrite the leaf at the same path in `target`;
/// paths only present in `target` are preserved. An empty incoming object
/// is treated as a leaf and replaces whatever was there, which is how a
/// key gets cleared.
pub fn deep_merge(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(inner) if !inner.is_empty() => match target.get_mut(&key) {
                Some(Value::Object(existing)) => deep_merge(existing, inner),
                _ => {
                    target.insert(key, Value::Object(inner));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Merge a `Value` into a map. Non-object values are ignored.
pub fn deep_merge_value(target: &mut Map<String, Value>, incoming: Value) {
    if let Value::Object(map) = incoming {
        deep_merge(target, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn leaves_overwrite_and_untouched_paths_survive() {
        let mut target = obj(json!({
            "name": "Front Door",
            "settings": { "brightness": 10, "led_color": "#ff0000" },
            "telemetry": { "link_quality": "good" }
        }));
        deep_merge(
            &mut target,
            obj(json!({ "settings": { "brightness": 50 }, "lat": "1.0" })),
        );

        assert_eq!(
            Value::Object(target),
            json!({
                "name": "Front Door",
                "settings": { "brightness": 50, "led_color": "#ff0000" },
                "telemetry": { "link_quality": "good" },
                "lat": "1.0"
            })
        );
    }

    #[test]
    fn empty_object_clears_key() {
        let mut target = obj(json!({ "AuthenticationResult": { "AccessToken": "abc" } }));
        deep_merge(&mut target, obj(json!({ "AuthenticationResult": {} })));
        assert_eq!(Value::Object(target), json!({ "AuthenticationResult": {} }));
    }

    #[test]
    fn object_replaces_scalar() {
        let mut target = obj(json!({ "settings": "none" }));
        deep_merge(&mut target, obj(json!({ "settings": { "a": 1 } })));
        assert_eq!(Value::Object(target), json!({ "settings": { "a": 1 } }));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let partial = obj(json!({ "a": { "b": { "c": 1 } }, "d": [1, 2] }));
        let mut once = obj(json!({ "a": { "x": true } }));
        deep_merge(&mut once, partial.clone());
        let mut twice = once.clone();
        deep_merge(&mut twice, partial);
        assert_eq!(once, twice);
    }
}
