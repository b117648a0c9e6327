use crate::ids::{AgentId, DocumentId, TenantId, WorkspaceId};
use crate::vector_clock::VectorClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedDocument {
    pub id: DocumentId,
    pub tenant_id: TenantId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub content: serde_json::Value,
    pub content_type: String,
    pub doc_type: String,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDocument {
    pub title: String,
    pub content: serde_json::Value,
    pub content_type: String,
    pub doc_type: String,
    pub created_by: AgentId,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// The kind of effect a document operation has on the document's content.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentOpType {
    Insert,
    Replace,
    Delete,
}

/// A single entry in a document's append-only operation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentOperation {
    pub id: uuid::Uuid,
    pub document_id: DocumentId,
    pub op_type: DocumentOpType,
    pub path: String,
    pub value: serde_json::Value,
    pub agent_id: AgentId,
    pub vector_clock: VectorClock,
    pub applied_at: DateTime<Utc>,
}

/// Caller-supplied operation, before the service stamps `id`/`applied_at`
/// and merges the server-side vector clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDocumentOperation {
    pub op_type: DocumentOpType,
    pub path: String,
    pub value: serde_json::Value,
    pub agent_id: AgentId,
    /// The caller's view of the vector clock at the time it formed this op;
    /// merged (not overwritten) into the document's authoritative clock.
    #[serde(default)]
    pub vector_clock: VectorClock,
}
