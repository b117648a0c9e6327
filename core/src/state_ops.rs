//! Application of [`StateOp`] mutations against a workspace's JSON state
//! tree.
//!
//! Paths are JSON-Pointer-style (`/a/b/0`), but unlike strict JSON Pointer,
//! `Set`/`Increment`/`Append`/`Merge` create missing intermediate objects
//! rather than erroring, since the state tree has no fixed schema.

use crate::error::{CoreError, Result};
use crate::models::{StateOp, StateOpType};
use serde_json::Value;

/// Apply a single operation to `root` in place.
pub fn apply(root: &mut Value, op: &StateOp) -> Result<()> {
    let segments = split_path(&op.path)?;
    match op.op_type {
        StateOpType::Set => {
            let slot = navigate_create(root, &segments)?;
            *slot = op.value.clone();
        }
        StateOpType::Increment => {
            let by = op
                .value
                .as_f64()
                .ok_or_else(|| CoreError::Validation("increment value must be a number".into()))?;
            let slot = navigate_create(root, &segments)?;
            let current = slot.as_f64().unwrap_or(0.0);
            *slot = serde_json::json!(current + by);
        }
        StateOpType::Append => {
            let slot = navigate_create(root, &segments)?;
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            match slot.as_array_mut() {
                Some(arr) => arr.push(op.value.clone()),
                None => {
                    return Err(CoreError::Validation(format!(
                        "path '{}' is not an array",
                        op.path
                    )))
                }
            }
        }
        StateOpType::Remove => {
            remove(root, &segments)?;
        }
        StateOpType::Merge => {
            let patch = op
                .value
                .as_object()
                .ok_or_else(|| CoreError::Validation("merge value must be an object".into()))?
                .clone();
            let slot = navigate_create(root, &segments)?;
            if slot.is_null() {
                *slot = Value::Object(serde_json::Map::new());
            }
            match slot.as_object_mut() {
                Some(obj) => {
                    for (k, v) in patch {
                        obj.insert(k, v);
                    }
                }
                None => {
                    return Err(CoreError::Validation(format!(
                        "path '{}' is not an object",
                        op.path
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Apply a batch of operations in order, stopping (and leaving `root`
/// partially mutated) on the first error. Callers that need atomicity
/// should clone `root`, apply here, and only commit on success.
pub fn apply_all(root: &mut Value, ops: &[StateOp]) -> Result<()> {
    for op in ops {
        apply(root, op)?;
    }
    Ok(())
}

fn split_path(path: &str) -> Result<Vec<String>> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(trimmed
        .split('/')
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Walk `segments` from `root`, creating missing object nodes along the way,
/// and return a mutable reference to the final slot.
fn navigate_create<'a>(root: &'a mut Value, segments: &[String]) -> Result<&'a mut Value> {
    let mut current = root;
    for seg in segments {
        if !current.is_object() {
            if current.is_null() {
                *current = Value::Object(serde_json::Map::new());
            } else {
                return Err(CoreError::Validation(format!(
                    "cannot descend into non-object at segment '{seg}'"
                )));
            }
        }
        let obj = current.as_object_mut().expect("checked above");
        current = obj.entry(seg.clone()).or_insert(Value::Null);
    }
    Ok(current)
}

fn remove(root: &mut Value, segments: &[String]) -> Result<()> {
    if segments.is_empty() {
        *root = Value::Object(serde_json::Map::new());
        return Ok(());
    }
    let (last, parents) = segments.split_last().expect("checked non-empty");
    let mut current = root;
    for seg in parents {
        current = match current.get_mut(seg) {
            Some(next) => next,
            None => return Ok(()),
        };
    }
    if let Some(obj) = current.as_object_mut() {
        obj.remove(last);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = serde_json::json!({});
        apply(&mut root, &StateOp::set("/a/b/c", serde_json::json!(1))).unwrap();
        assert_eq!(root, serde_json::json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn increment_defaults_missing_to_zero() {
        let mut root = serde_json::json!({});
        apply(&mut root, &StateOp::increment("/counters/x", 3.0)).unwrap();
        apply(&mut root, &StateOp::increment("/counters/x", 2.0)).unwrap();
        assert_eq!(root["counters"]["x"], serde_json::json!(5.0));
    }

    #[test]
    fn append_pushes_onto_array() {
        let mut root = serde_json::json!({"items": [1, 2]});
        apply(&mut root, &StateOp::append("/items", serde_json::json!(3))).unwrap();
        assert_eq!(root["items"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn append_to_missing_path_starts_a_new_array() {
        let mut root = serde_json::json!({});
        apply(&mut root, &StateOp::append("/items", serde_json::json!("x"))).unwrap();
        assert_eq!(root["items"], serde_json::json!(["x"]));
    }

    #[test]
    fn remove_deletes_the_subtree() {
        let mut root = serde_json::json!({"a": {"b": 1, "c": 2}});
        apply(&mut root, &StateOp::remove("/a/b")).unwrap();
        assert_eq!(root, serde_json::json!({"a": {"c": 2}}));
    }

    #[test]
    fn merge_adds_keys_without_clobbering_siblings() {
        let mut root = serde_json::json!({"settings": {"theme": "dark"}});
        apply(
            &mut root,
            &StateOp::merge("/settings", serde_json::json!({"lang": "en"})),
        )
        .unwrap();
        assert_eq!(
            root["settings"],
            serde_json::json!({"theme": "dark", "lang": "en"})
        );
    }

    #[test]
    fn increment_rejects_non_numeric_value() {
        let mut root = serde_json::json!({});
        let op = StateOp {
            op_type: StateOpType::Increment,
            path: "/x".into(),
            value: serde_json::json!("not a number"),
        };
        assert!(apply(&mut root, &op).is_err());
    }

    #[test]
    fn apply_all_runs_operations_in_order() {
        let mut root = serde_json::json!({});
        let ops = vec![
            StateOp::set("/n", serde_json::json!(1)),
            StateOp::increment("/n", 9.0),
        ];
        apply_all(&mut root, &ops).unwrap();
        assert_eq!(root["n"], serde_json::json!(10.0));
    }
}
