//! Dotted field paths.
//!
//! Constraint paths and error paths share one format: segments separated by
//! `.`, where a segment made only of digits indexes into an array
//! (`items.0.productId`). Resolution never panics; a path that does not fit
//! the data simply resolves to nothing.

use serde_json::{Map, Value};

/// Split a dotted path into its non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Join a parent path and a child path. An empty parent yields the child.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

/// Resolve a path against a value.
pub fn resolve<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in split_path(path) {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a path mutably.
pub fn resolve_mut<'v>(value: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    let mut current = value;
    for segment in split_path(path) {
        current = match current {
            Value::Object(obj) => obj.get_mut(segment)?,
            Value::Array(arr) => arr.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new_value` at `path`, creating intermediate objects for missing
/// object segments. Returns `false` when the path crosses a scalar or an
/// out-of-range array index.
pub fn set(value: &mut Value, path: &str, new_value: Value) -> bool {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *value = new_value;
        return true;
    };

    let mut current = value;
    for segment in parents {
        current = match current {
            Value::Object(obj) => obj
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(arr) => match segment.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            _ => return false,
        };
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
    }

    match current {
        Value::Object(obj) => {
            obj.insert(last.to_string(), new_value);
            true
        }
        Value::Array(arr) => match last.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
            Some(slot) => {
                *slot = new_value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Remove the value at `path` from its parent object.
pub fn remove(value: &mut Value, path: &str) -> Option<Value> {
    let segments = split_path(path);
    let (last, parents) = segments.split_last()?;
    let parent = resolve_mut(value, &parents.join("."))?;
    parent.as_object_mut()?.remove(*last)
}
