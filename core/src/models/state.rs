use serde::{Deserialize, Serialize};

/// The workspace state tree is a single JSON document per workspace, rooted
/// at `/`, mutated only through these path operations. See
/// [`crate::state_ops`] for the application logic.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum StateOpType {
    Set,
    Increment,
    Append,
    Remove,
    Merge,
}

/// A single path-addressed mutation against a workspace's state tree.
///
/// `path` uses JSON-Pointer-style segments, e.g. `/counters/tasks_completed`.
/// `value` is interpreted according to `op_type`:
/// - `Set`: written verbatim at `path`, creating intermediate objects.
/// - `Increment`: `value` must be a number; added to the existing number at
///   `path` (default 0 if absent).
/// - `Append`: `value` is pushed onto the array at `path` (default `[]`).
/// - `Remove`: `value` is ignored; the subtree at `path` is deleted.
/// - `Merge`: `value` must be an object; shallow-merged into the object at
///   `path` (default `{}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateOp {
    pub op_type: StateOpType,
    pub path: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl StateOp {
    pub fn set(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op_type: StateOpType::Set,
            path: path.into(),
            value,
        }
    }

    pub fn increment(path: impl Into<String>, by: f64) -> Self {
        Self {
            op_type: StateOpType::Increment,
            path: path.into(),
            value: serde_json::json!(by),
        }
    }

    pub fn append(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op_type: StateOpType::Append,
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op_type: StateOpType::Remove,
            path: path.into(),
            value: serde_json::Value::Null,
        }
    }

    pub fn merge(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op_type: StateOpType::Merge,
            path: path.into(),
            value,
        }
    }
}

/// Snapshot of a workspace's state tree plus its row version, as returned by
/// `GetState`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceState {
    pub data: serde_json::Value,
    pub version: u64,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            data: serde_json::json!({}),
            version: 0,
        }
    }
}
