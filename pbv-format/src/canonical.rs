//! JSON canonicalization transforms.
//!
//! Extraction rewrites an entry's JSON into a deterministic, pretty-printed
//! text form; compression reverses every step. Key order is preserved from
//! the source document throughout - the host format is key-order sensitive,
//! so canonical order is "whatever the document said", applied consistently.
//!
//! Two transforms leave explicit markers in the canonical form so the reverse
//! pass can identify them without out-of-band state:
//!
//! - a string field on the per-schema allow-list whose content parses as a
//!   JSON object or array becomes `{"__pbv-embedded-json__": <value>}`;
//! - a string containing line breaks becomes
//!   `{"__pbv-multiline__": ["line", ...]}` (diffable mode only).

use serde_json::{Map, Value};

use crate::schema::{NoiseField, NoisePolicy, NOISE_PLACEHOLDER};

/// Marker key wrapping a parsed nested-JSON string field.
pub const EMBEDDED_JSON_KEY: &str = "__pbv-embedded-json__";

/// Marker key wrapping a multi-line string split into an array of lines.
pub const MULTILINE_KEY: &str = "__pbv-multiline__";

/// Parse string fields on the allow-list into embedded documents.
///
/// Only fields named on the allow-list are eligible: a string that merely
/// happens to parse as JSON stays a string. Scalars under allow-listed names
/// also stay put - only objects and arrays are embedded.
pub fn embed_nested_json(value: Value, allow: &[&str]) -> Value {
    if allow.is_empty() {
        return value;
    }
    embed_walk(None, value, allow)
}

fn embed_walk(key: Option<&str>, value: Value, allow: &[&str]) -> Value {
    match value {
        Value::String(s) => {
            if key.is_some_and(|k| allow.contains(&k)) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&s) {
                    if parsed.is_object() || parsed.is_array() {
                        let embedded = embed_walk(None, parsed, allow);
                        let mut wrapper = Map::new();
                        wrapper.insert(EMBEDDED_JSON_KEY.to_string(), embedded);
                        return Value::Object(wrapper);
                    }
                }
            }
            Value::String(s)
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let walked = embed_walk(Some(k.as_str()), v, allow);
                out.insert(k, walked);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| embed_walk(None, v, allow))
                .collect(),
        ),
        other => other,
    }
}

/// Re-serialize embedded documents back into single-line string fields.
pub fn unembed_nested_json(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if map.len() == 1 {
                if let Some(inner) = map.remove(EMBEDDED_JSON_KEY) {
                    let inner = unembed_nested_json(inner);
                    return Value::String(to_compact_text(&inner));
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, unembed_nested_json(v)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(unembed_nested_json).collect())
        }
        other => other,
    }
}

/// Split strings containing line breaks into tagged line arrays.
///
/// The host consistently uses `\n`, never `\r\n`.
pub fn split_multiline_strings(value: Value) -> Value {
    match value {
        Value::String(s) if s.contains('\n') => {
            let lines: Vec<Value> = s.split('\n').map(|l| Value::String(l.to_string())).collect();
            let mut wrapper = Map::new();
            wrapper.insert(MULTILINE_KEY.to_string(), Value::Array(lines));
            Value::Object(wrapper)
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, split_multiline_strings(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(split_multiline_strings).collect())
        }
        other => other,
    }
}

/// Rejoin tagged line arrays into single strings.
pub fn join_multiline_strings(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::Array(lines)) = map.get(MULTILINE_KEY) {
                    if lines.iter().all(|l| l.is_string()) {
                        let joined = lines
                            .iter()
                            .filter_map(|l| l.as_str())
                            .collect::<Vec<_>>()
                            .join("\n");
                        return Value::String(joined);
                    }
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, join_multiline_strings(v)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(join_multiline_strings).collect())
        }
        other => other,
    }
}

/// Suppress declared noise fields.
///
/// Only string-valued fields are treated as noise; a nested object that
/// happens to share a noise field's name is left alone.
pub fn apply_noise_filter(value: Value, fields: &[NoiseField]) -> Value {
    if fields.is_empty() {
        return value;
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                match fields.iter().find(|f| f.name == k && v.is_string()) {
                    Some(field) => match field.policy {
                        NoisePolicy::Drop => {}
                        NoisePolicy::Scrub => {
                            out.insert(k, Value::String(NOISE_PLACEHOLDER.to_string()));
                        }
                    },
                    None => {
                        let walked = apply_noise_filter(v, fields);
                        out.insert(k, walked);
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| apply_noise_filter(v, fields))
                .collect(),
        ),
        other => other,
    }
}

/// Recursively sort object keys. Used by textconv output only; the canonical
/// on-disk form keeps document order.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(pairs.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Canonical pretty text: 2-space indent, document key order, trailing newline.
pub fn to_pretty_text(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).expect("JSON value always serializes");
    text.push('\n');
    text
}

/// Host-convention compact text: single line, `,`/`:` separators.
pub fn to_compact_text(value: &Value) -> String {
    serde_json::to_string(value).expect("JSON value always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::REPORT_LAYOUT;
    use serde_json::json;

    #[test]
    fn embeds_allow_listed_json_string() {
        let doc = json!({"config": "{\"x\":1}"});
        let out = embed_nested_json(doc, REPORT_LAYOUT.embedded_json_fields);
        assert_eq!(out, json!({"config": {EMBEDDED_JSON_KEY: {"x": 1}}}));
    }

    #[test]
    fn ignores_json_shaped_string_outside_allow_list() {
        let doc = json!({"note": "{\"x\":1}"});
        let out = embed_nested_json(doc.clone(), REPORT_LAYOUT.embedded_json_fields);
        assert_eq!(out, doc);
    }

    #[test]
    fn ignores_scalar_json_under_allow_listed_name() {
        let doc = json!({"config": "42"});
        let out = embed_nested_json(doc.clone(), REPORT_LAYOUT.embedded_json_fields);
        assert_eq!(out, doc);
    }

    #[test]
    fn embeds_recursively_inside_embedded_document() {
        let inner = "{\"filters\":\"[1,2]\"}";
        let doc = json!({"config": inner});
        let out = embed_nested_json(doc, REPORT_LAYOUT.embedded_json_fields);
        assert_eq!(
            out,
            json!({"config": {EMBEDDED_JSON_KEY: {"filters": {EMBEDDED_JSON_KEY: [1, 2]}}}})
        );
    }

    #[test]
    fn unembed_restores_compact_string() {
        let doc = json!({"config": {EMBEDDED_JSON_KEY: {"x": 1, "y": [2, 3]}}});
        let out = unembed_nested_json(doc);
        assert_eq!(out, json!({"config": "{\"x\":1,\"y\":[2,3]}"}));
    }

    #[test]
    fn multiline_split_and_join_are_inverse() {
        let doc = json!({"expression": "let\n  x = 1\nin x", "plain": "no breaks"});
        let split = split_multiline_strings(doc.clone());
        assert_eq!(
            split,
            json!({
                "expression": {MULTILINE_KEY: ["let", "  x = 1", "in x"]},
                "plain": "no breaks"
            })
        );
        assert_eq!(join_multiline_strings(split), doc);
    }

    #[test]
    fn noise_drop_removes_field_everywhere() {
        let fields = crate::schema::DATA_MODEL.noise_fields;
        let doc = json!({
            "name": "m",
            "modifiedTime": "2024-05-01T10:00:00",
            "model": {"refreshedTime": "2024-05-01T10:00:01", "culture": "en-US"}
        });
        let out = apply_noise_filter(doc, fields);
        assert_eq!(out, json!({"name": "m", "model": {"culture": "en-US"}}));
    }

    #[test]
    fn noise_scrub_replaces_with_placeholder() {
        let fields = &[NoiseField {
            name: "lastSaved",
            policy: NoisePolicy::Scrub,
        }];
        let doc = json!({"lastSaved": "2024-05-01T10:00:00"});
        let out = apply_noise_filter(doc, fields);
        assert_eq!(out, json!({"lastSaved": NOISE_PLACEHOLDER}));
    }

    #[test]
    fn noise_filter_leaves_non_string_values_alone() {
        let fields = crate::schema::DATA_MODEL.noise_fields;
        let doc = json!({"modifiedTime": {"nested": true}});
        let out = apply_noise_filter(doc.clone(), fields);
        assert_eq!(out, doc);
    }

    #[test]
    fn pretty_text_keeps_document_key_order() {
        let doc: Value = serde_json::from_str("{\"zebra\":1,\"apple\":2}").unwrap();
        let text = to_pretty_text(&doc);
        let zebra = text.find("zebra").unwrap();
        let apple = text.find("apple").unwrap();
        assert!(zebra < apple);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn sort_keys_orders_lexicographically() {
        let doc: Value = serde_json::from_str("{\"b\":{\"d\":1,\"c\":2},\"a\":3}").unwrap();
        let sorted = sort_keys(doc);
        assert_eq!(to_compact_text(&sorted), "{\"a\":3,\"b\":{\"c\":2,\"d\":1}}");
    }

    #[test]
    fn compact_text_keeps_non_ascii_unescaped() {
        let doc = json!({"label": "© café"});
        assert_eq!(to_compact_text(&doc), "{\"label\":\"© café\"}");
    }
}
