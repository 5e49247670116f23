//! Deterministic reordering of visual-container arrays.
//!
//! Insertion order of visuals churns every time a report is edited, which
//! makes diffs unreadable. Sorting by the stable identifier fixes that, but
//! the host application is known to reject containers whose visuals were
//! reordered - so this transform only ever runs on the extract path, and only
//! when explicitly enabled.

use std::cmp::Ordering;

use serde_json::Value;

/// Stable-sort the declared array fields by member identifier.
///
/// The identifier is the member's `z` field, falling back to `id`. Numeric
/// identifiers order numerically, anything else lexicographically by its
/// JSON rendering; members without an identifier sort last. Ties keep
/// original position.
pub fn sort_identified_arrays(value: Value, groups: &[&str]) -> Value {
    if groups.is_empty() {
        return value;
    }
    sort_walk(None, value, groups)
}

fn sort_walk(key: Option<&str>, value: Value, groups: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let walked = sort_walk(Some(k.as_str()), v, groups);
                    (k, walked)
                })
                .collect(),
        ),
        Value::Array(mut items) => {
            items = items
                .into_iter()
                .map(|v| sort_walk(None, v, groups))
                .collect();
            if key.is_some_and(|k| groups.contains(&k)) {
                items.sort_by(|a, b| compare_identifiers(identifier(a), identifier(b)));
            }
            Value::Array(items)
        }
        other => other,
    }
}

fn identifier(member: &Value) -> Option<&Value> {
    let obj = member.as_object()?;
    obj.get("z").or_else(|| obj.get("id"))
}

fn compare_identifiers(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
