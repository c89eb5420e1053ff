use serde_json::{Map, Value};

use crate::types::DeviceSnapshot;

pub(crate) type Change = (String, Value, Value);

/// Collects `(path, old, new)` for every leaf that differs. Keys that
/// disappear from `current` are reported with `Null` as the new value.
pub(crate) fn diff_json(previous: &Value, current: &Value, path_prefix: &str, changes: &mut Vec<Change>) {
    let join = |key: &str| {
        if path_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{path_prefix}.{key}")
        }
    };
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = join(key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_json(&Value::Object(Map::new()), curr_val, &path, changes);
                    }
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    changes.push((join(key), prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Dotted paths of the snapshot fields that changed between two refreshes.
pub(crate) fn changed_fields(previous: &DeviceSnapshot, current: &DeviceSnapshot) -> Vec<String> {
    let (Ok(prev), Ok(curr)) = (serde_json::to_value(previous), serde_json::to_value(current)) else {
        return vec![];
    };
    let mut changes = Vec::new();
    diff_json(&prev, &curr, "", &mut changes);
    changes.into_iter().map(|(path, _, _)| path).collect()
}
