//! Distributed lock broker contract.
//!
//! Implementations back this with a KV store supporting atomic
//! set-if-absent-with-TTL (Redis `SET key value NX PX`) and a
//! compare-then-delete/extend script keyed on the stored holder. The
//! `kv-lock` crate provides the Redis-backed implementation; `test-fakes`
//! provides an in-memory one guarded by `parking_lot`.

use crate::error::Result;
use crate::ids::{AgentId, DocumentId};
use crate::models::{DocumentLock, SectionLock};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait KvLockBroker: Send + Sync {
    /// Acquire the whole-document lock. Fails with `CoreError::Locked` if
    /// another agent currently holds it.
    async fn lock_document(
        &self,
        document_id: DocumentId,
        agent: &AgentId,
        ttl: Duration,
    ) -> Result<DocumentLock>;

    /// Release a document lock. Fails with `CoreError::NotOwner` if `agent`
    /// is not the current holder (including if the lock already expired and
    /// was reclaimed by someone else).
    async fn unlock_document(&self, document_id: DocumentId, agent: &AgentId) -> Result<()>;

    /// Extend an already-held document lock's TTL. Fails with
    /// `CoreError::Expired` if the lease lapsed, or `CoreError::NotOwner` if
    /// held by someone else.
    async fn extend_document_lock(
        &self,
        document_id: DocumentId,
        agent: &AgentId,
        ttl: Duration,
    ) -> Result<DocumentLock>;

    /// Current lock state for a document, if any non-expired lease exists.
    async fn is_document_locked(&self, document_id: DocumentId) -> Result<Option<DocumentLock>>;

    async fn lock_section(
        &self,
        document_id: DocumentId,
        section: &str,
        agent: &AgentId,
        ttl: Duration,
    ) -> Result<SectionLock>;

    async fn unlock_section(
        &self,
        document_id: DocumentId,
        section: &str,
        agent: &AgentId,
    ) -> Result<()>;

    async fn extend_section_lock(
        &self,
        document_id: DocumentId,
        section: &str,
        agent: &AgentId,
        ttl: Duration,
    ) -> Result<SectionLock>;

    /// All currently held (non-expired) section locks for a document.
    async fn get_section_locks(&self, document_id: DocumentId) -> Result<Vec<SectionLock>>;
}

/// Default TTL threshold below which an auto-refresh task re-extends a
/// held lock on the owner's behalf, per the lock broker's auto-refresh
/// contract.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(30);

/// Default lease length for newly acquired document/section locks.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);
