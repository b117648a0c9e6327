//! Strongly-typed identifiers.
//!
//! Every entity in the data model is addressed by a 128-bit UUID. Wrapping each
//! kind in its own newtype keeps a `TaskId` from being passed where a
//! `WorkspaceId` is expected, at zero runtime cost.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. one read back from storage).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(TenantId);
uuid_id!(TaskId);
uuid_id!(WorkflowId);
uuid_id!(ExecutionId);
uuid_id!(WorkspaceId);
uuid_id!(DocumentId);

/// Agents are external actors identified by a caller-supplied stable string,
/// not a generated UUID — they are provisioned outside this system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        let id = TaskId::new();
        let rendered = id.to_string();
        let parsed: TaskId = rendered.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_newtypes_do_not_compare() {
        let task = TaskId::new();
        let workspace = WorkspaceId::new();
        // Different wrapper types entirely; this just checks the underlying
        // UUIDs aren't forced equal by construction.
        assert_ne!(task.as_uuid(), workspace.as_uuid());
    }

    #[test]
    fn agent_id_from_str() {
        let agent: AgentId = "rust-architect".into();
        assert_eq!(agent.as_str(), "rust-architect");
    }
}
