//! Split groups: decompose oversized arrays into per-member documents.
//!
//! A split group is a named array field (tables, sections, bookmarks) whose
//! members each become an independent file so diffs stay small. The array in
//! the parent document is replaced by a `{"__pbv-split-group__": "<name>"}`
//! marker, and array order is captured in an ordering record of sanitized
//! member identifiers. Reassembly is driven entirely by the marker and the
//! record, so the canonical form stays self-describing.

use serde_json::{Map, Value};

use crate::error::{PbvError, Result};

/// Marker key replacing a split-out array in its parent document.
pub const SPLIT_GROUP_KEY: &str = "__pbv-split-group__";

/// Fallback identifier for members whose name sanitizes to nothing.
const UNNAMED: &str = "unnamed";

/// One split group lifted out of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitGroup {
    /// Field name the group came from.
    pub name: String,
    /// Sanitized member identifiers, in original array order. This is the
    /// ordering record.
    pub order: Vec<String>,
    /// Member documents keyed by sanitized identifier.
    pub members: Map<String, Value>,
}

/// Member identifier: `displayName` if present, else `name`.
fn member_identifier(member: &Value) -> Option<&str> {
    let obj = member.as_object()?;
    obj.get("displayName")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
}

/// Sanitize an identifier to a filesystem-safe file stem.
pub fn sanitize_identifier(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if safe.is_empty() {
        UNNAMED.to_string()
    } else {
        safe
    }
}

/// Whether an array qualifies as a split group: non-empty, and every member
/// is an object carrying an identifier.
fn is_splittable(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|m| member_identifier(m).is_some())
}

/// Lift the declared split groups out of a document.
///
/// Returns the document with each split array replaced by its marker, plus
/// the lifted groups. Only the first occurrence of each group name (in
/// document order, embedded documents included) is lifted; identifier
/// collisions after sanitization are a [`PbvError::DuplicateIdentifier`].
pub fn extract_groups(value: Value, groups: &[&str]) -> Result<(Value, Vec<SplitGroup>)> {
    if groups.is_empty() {
        return Ok((value, Vec::new()));
    }
    let mut lifted = Vec::new();
    let value = extract_walk(None, value, groups, &mut lifted)?;
    Ok((value, lifted))
}

fn extract_walk(
    key: Option<&str>,
    value: Value,
    groups: &[&str],
    lifted: &mut Vec<SplitGroup>,
) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let walked = extract_walk(Some(k.as_str()), v, groups, lifted)?;
                out.insert(k, walked);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let group_name = key.filter(|k| {
                groups.contains(k) && !lifted.iter().any(|g| g.name == **k)
            });
            match group_name {
                Some(name) if is_splittable(&items) => {
                    // reserve the name before recursing so a same-named array
                    // inside a member body stays inline
                    lifted.push(SplitGroup {
                        name: name.to_string(),
                        order: Vec::new(),
                        members: Map::new(),
                    });
                    let slot = lifted.len() - 1;
                    let mut order = Vec::with_capacity(items.len());
                    let mut members = Map::with_capacity(items.len());
                    for member in items {
                        // identifier checked by is_splittable
                        let id = member_identifier(&member).unwrap_or(UNNAMED);
                        let id = sanitize_identifier(id);
                        // member bodies may hold further groups (bookmarks
                        // live inside the embedded layout config)
                        let member = extract_walk(None, member, groups, lifted)?;
                        if members.contains_key(&id) {
                            return Err(PbvError::DuplicateIdentifier {
                                group: name.to_string(),
                                identifier: id,
                            });
                        }
                        order.push(id.clone());
                        members.insert(id, member);
                    }
                    lifted[slot].order = order;
                    lifted[slot].members = members;
                    let mut marker = Map::new();
                    marker.insert(
                        SPLIT_GROUP_KEY.to_string(),
                        Value::String(name.to_string()),
                    );
                    Ok(Value::Object(marker))
                }
                _ => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(extract_walk(None, item, groups, lifted)?);
                    }
                    Ok(Value::Array(out))
                }
            }
        }
        other => Ok(other),
    }
}

/// Collect the group names referenced by markers in a document.
pub fn collect_group_markers(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_walk(value, &mut names);
    names
}

fn collect_walk(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(name)) = map.get(SPLIT_GROUP_KEY) {
                    names.push(name.clone());
                    return;
                }
            }
            for v in map.values() {
                collect_walk(v, names);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_walk(v, names);
            }
        }
        _ => {}
    }
}

/// Replace each split-group marker with the reassembled member array, in
/// ordering-record order.
pub fn inject_groups(value: Value, groups: &[SplitGroup]) -> Result<Value> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(name)) = map.get(SPLIT_GROUP_KEY) {
                    let group = groups.iter().find(|g| &g.name == name).ok_or_else(|| {
                        PbvError::MissingMember {
                            group: name.clone(),
                            identifier: ".order".to_string(),
                        }
                    })?;
                    let mut items = Vec::with_capacity(group.order.len());
                    for id in &group.order {
                        let member =
                            group
                                .members
                                .get(id)
                                .cloned()
                                .ok_or_else(|| PbvError::MissingMember {
                                    group: group.name.clone(),
                                    identifier: id.clone(),
                                })?;
                        items.push(inject_groups(member, groups)?);
                    }
                    return Ok(Value::Array(items));
                }
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let walked = inject_groups(v, groups)?;
                out.insert(k, walked);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(inject_groups(item, groups)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_with_tables() -> Value {
        json!({
            "name": "model",
            "model": {
                "tables": [
                    {"name": "Sales", "columns": []},
                    {"name": "Dates", "columns": []},
                    {"name": "Geo", "columns": []}
                ]
            }
        })
    }

    #[test]
    fn split_replaces_array_with_marker() {
        let (doc, groups) = extract_groups(model_with_tables(), &["tables"]).unwrap();
        assert_eq!(
            doc,
            json!({"name": "model", "model": {"tables": {SPLIT_GROUP_KEY: "tables"}}})
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].order, vec!["Sales", "Dates", "Geo"]);
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn join_restores_original_order() {
        let original = model_with_tables();
        let (doc, groups) = extract_groups(original.clone(), &["tables"]).unwrap();
        let rejoined = inject_groups(doc, &groups).unwrap();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn single_member_group_roundtrips() {
        let original = json!({"tables": [{"name": "Only"}]});
        let (doc, groups) = extract_groups(original.clone(), &["tables"]).unwrap();
        assert_eq!(groups[0].order, vec!["Only"]);
        assert_eq!(inject_groups(doc, &groups).unwrap(), original);
    }

    #[test]
    fn empty_array_is_not_split() {
        let original = json!({"tables": []});
        let (doc, groups) = extract_groups(original.clone(), &["tables"]).unwrap();
        assert!(groups.is_empty());
        assert_eq!(doc, original);
    }

    #[test]
    fn unidentified_members_are_not_split() {
        let original = json!({"tables": [{"name": "A"}, {"rows": 3}]});
        let (doc, groups) = extract_groups(original.clone(), &["tables"]).unwrap();
        assert!(groups.is_empty());
        assert_eq!(doc, original);
    }

    #[test]
    fn display_name_wins_over_name() {
        let doc = json!({"bookmarks": [{"displayName": "Q1 view", "name": "bm01"}]});
        let (_, groups) = extract_groups(doc, &["bookmarks"]).unwrap();
        assert_eq!(groups[0].order, vec!["Q1view"]);
    }

    #[test]
    fn sanitization_collision_is_an_error() {
        let doc = json!({"tables": [{"name": "a b"}, {"name": "a-b"}]});
        let err = extract_groups(doc, &["tables"]).unwrap_err();
        assert!(matches!(err, PbvError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn missing_member_is_an_error() {
        let doc = json!({"tables": {SPLIT_GROUP_KEY: "tables"}});
        let groups = vec![SplitGroup {
            name: "tables".to_string(),
            order: vec!["Ghost".to_string()],
            members: Map::new(),
        }];
        let err = inject_groups(doc, &groups).unwrap_err();
        assert!(matches!(err, PbvError::MissingMember { .. }));
    }

    #[test]
    fn marker_collection_finds_nested_markers() {
        let doc = json!({
            "sections": {SPLIT_GROUP_KEY: "sections"},
            "config": {"deep": {"bookmarks": {SPLIT_GROUP_KEY: "bookmarks"}}}
        });
        assert_eq!(collect_group_markers(&doc), vec!["sections", "bookmarks"]);
    }

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_identifier("Sales / Region #2"), "SalesRegion2");
        assert_eq!(sanitize_identifier("日本語"), "unnamed");
        assert_eq!(sanitize_identifier("under_score"), "under_score");
    }
}
