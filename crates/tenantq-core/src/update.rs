//! Update actions applied by `update_item`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{UpdateError, ValidationError};
use crate::types::Record;

/// A single change to apply to a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpdateAction {
    /// Set the attribute at a dot-separated path, creating intermediate objects.
    Set { path: String, value: Value },
    /// Remove the attribute at a dot-separated path. Missing paths are ignored.
    Remove { path: String },
    /// Increment a number or union into an array. Missing attributes are
    /// initialized to `value`.
    Add { path: String, value: Value },
}

impl UpdateAction {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        UpdateAction::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        UpdateAction::Remove { path: path.into() }
    }

    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        UpdateAction::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Dot-separated path targeted by this action.
    pub fn path(&self) -> &str {
        match self {
            UpdateAction::Set { path, .. }
            | UpdateAction::Remove { path }
            | UpdateAction::Add { path, .. } => path,
        }
    }

    fn top_level(&self) -> &str {
        let path = self.path();
        path.split('.').next().unwrap_or(path)
    }
}

/// Reject a change set that is empty or touches a key attribute.
///
/// `key` is the full primary key of the target record. Only the top-level
/// segment of each path is compared, so `"meta.userid"` is allowed while
/// `"userid"` and `"userid.x"` are not.
pub fn validate_changes(key: &Record, actions: &[UpdateAction]) -> Result<(), ValidationError> {
    if actions.is_empty() {
        return Err(ValidationError::EmptyUpdate);
    }
    for action in actions {
        let top = action.top_level();
        if key.contains_key(top) {
            return Err(ValidationError::KeyAttributeUpdate(top.to_string()));
        }
    }
    Ok(())
}

/// Apply actions to a record in order.
pub fn apply_updates(record: &mut Record, actions: &[UpdateAction]) -> Result<(), UpdateError> {
    for action in actions {
        let segments: Vec<&str> = action.path().split('.').collect();
        match action {
            UpdateAction::Set { value, .. } => set_path(record, &segments, value.clone()),
            UpdateAction::Remove { .. } => remove_path(record, &segments),
            UpdateAction::Add { path, value } => apply_add(record, &segments, value, path)?,
        }
    }
    Ok(())
}

fn set_path(map: &mut Record, segments: &[&str], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Record::new()));
        if !entry.is_object() {
            *entry = Value::Object(Record::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        current = child;
    }
    current.insert(leaf.to_string(), value);
}

fn remove_path(map: &mut Record, segments: &[&str]) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    if let Some(parent) = parent_mut(map, parents) {
        parent.remove(*leaf);
    }
}

fn parent_mut<'a>(map: &'a mut Record, parents: &[&str]) -> Option<&'a mut Record> {
    let mut current = map;
    for segment in parents {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    Some(current)
}

fn get_mut<'a>(map: &'a mut Record, segments: &[&str]) -> Option<&'a mut Value> {
    let (leaf, parents) = segments.split_last()?;
    parent_mut(map, parents)?.get_mut(*leaf)
}

fn apply_add(
    record: &mut Record,
    segments: &[&str],
    value: &Value,
    path: &str,
) -> Result<(), UpdateError> {
    let Some(existing) = get_mut(record, segments) else {
        if !value.is_number() && !value.is_array() {
            return Err(UpdateError::TypeMismatch {
                attribute: path.to_string(),
                message: format!("ADD requires a number or array, got {}", type_name(value)),
            });
        }
        set_path(record, segments, value.clone());
        return Ok(());
    };

    match (existing, value) {
        (Value::Number(a), Value::Number(b)) => {
            let sum = match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.checked_add(y).map(Value::from),
                _ => None,
            };
            let sum = sum.unwrap_or_else(|| {
                Value::from(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default())
            });
            if let Value::Number(n) = sum {
                *a = n;
            }
            Ok(())
        }
        (Value::Array(arr), Value::Array(items)) => {
            for item in items {
                if !arr.contains(item) {
                    arr.push(item.clone());
                }
            }
            Ok(())
        }
        (existing, value) => Err(UpdateError::TypeMismatch {
            attribute: path.to_string(),
            message: format!(
                "ADD requires both numbers or both arrays, got existing={}, value={}",
                type_name(existing),
                type_name(value)
            ),
        }),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
