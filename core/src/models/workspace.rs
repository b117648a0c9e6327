use crate::ids::{AgentId, TenantId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberRole {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    /// Owner and Admin can perform any operation; Member can read/write
    /// documents and state; Viewer is read-only.
    pub fn can_write(self) -> bool {
        matches!(self, MemberRole::Member | MemberRole::Admin | MemberRole::Owner)
    }

    pub fn can_administer(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Owner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub owner_id: AgentId,
    pub is_public: bool,
    pub status: WorkspaceStatus,
    pub settings: serde_json::Value,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWorkspace {
    pub name: String,
    pub description: String,
    pub owner_id: AgentId,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_settings")]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_settings() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub settings: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
    /// Set by `Archive`/`Delete`; plain `Update` calls leave this `None`.
    pub status: Option<WorkspaceStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceFilter {
    pub owner_id: Option<AgentId>,
    pub is_active: Option<bool>,
    pub tag: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceMember {
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A single entry returned by `GetMemberActivity` — the last time a member
/// touched the workspace (document edit, state mutation, etc).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberActivity {
    pub agent_id: AgentId,
    pub last_active_at: DateTime<Utc>,
    pub action_count: u64,
}
