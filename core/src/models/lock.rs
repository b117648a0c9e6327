use crate::ids::{AgentId, DocumentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A held document-level lock, as returned by `AcquireDocumentLock`.
///
/// Holding this excludes every other holder of a lock on the same
/// `document_id`; it says nothing about section locks within the document,
/// which live in a disjoint namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentLock {
    pub document_id: DocumentId,
    pub holder: AgentId,
    /// Opaque token the holder must present to `Release`/`Extend`/`Refresh`.
    pub token: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DocumentLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A held lock on a named section within a document, e.g. a field path or a
/// logical region agreed on by callers. Keyed by `(document_id, section)`,
/// independent of any `DocumentLock` on the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionLock {
    pub document_id: DocumentId,
    pub section: String,
    pub holder: AgentId,
    pub token: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SectionLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
