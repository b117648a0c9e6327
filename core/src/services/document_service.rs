//! Document Service — owns the append-only operation log for
//! `SharedDocument`s and the vector-clock merge that orders concurrent
//! edits. Callers are expected to hold the relevant document/section lock
//! (via `KvLockBroker`) for the duration of an `apply_operation` call; the
//! service itself does not acquire locks, mirroring the lock-ordering
//! convention of "caller acquires, service just persists".

use std::sync::Arc;

use tracing::instrument;

use crate::clock::Clock;
use crate::error::Result;
use crate::ids::{DocumentId, TenantId, WorkspaceId};
use crate::models::{DocumentOpType, DocumentOperation, NewDocument, NewDocumentOperation, SharedDocument};
use crate::notify::{Event, NotificationBus};
use crate::repository::Store;

pub struct DocumentService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    bus: NotificationBus,
}

impl DocumentService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, bus: NotificationBus) -> Self {
        Self { store, clock, bus }
    }

    pub async fn create(
        &self,
        tenant_id: TenantId,
        workspace_id: WorkspaceId,
        document: NewDocument,
    ) -> Result<SharedDocument> {
        self.store.create_document(tenant_id, workspace_id, document).await
    }

    pub async fn get(&self, tenant_id: TenantId, id: DocumentId) -> Result<SharedDocument> {
        self.store.get_document(tenant_id, id).await
    }

    /// Crate-internal: callers outside `core` must go through
    /// `WorkspaceService::list_documents`, which checks membership first.
    pub(crate) async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<SharedDocument>> {
        self.store.list_documents(workspace_id).await
    }

    /// Applies `op` against a document's content and operation log.
    ///
    /// Content effect by `op_type`:
    /// - `Replace` overwrites the whole content with `value`.
    /// - `Insert` concatenates the existing content with `value` at `path`
    ///   (string concatenation for string leaves, array append for arrays).
    /// - `Delete` removes the subtree addressed by `path`.
    ///
    /// Crate-internal: callers outside `core` must go through
    /// `WorkspaceService::update_document`, which checks write access first.
    #[instrument(skip(self, op))]
    pub(crate) async fn apply_operation(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        op: NewDocumentOperation,
    ) -> Result<(SharedDocument, DocumentOperation)> {
        let (document, recorded) = self.store.apply_document_operation(tenant_id, document_id, op).await?;
        self.bus
            .publish(Event::DocumentUpdated {
                document_id,
                version: document.version,
            })
            .await;
        Ok((document, recorded))
    }

    pub async fn get_operations(&self, document_id: DocumentId) -> Result<Vec<DocumentOperation>> {
        self.store.get_document_operations(document_id).await
    }

    /// Pure content-transform helper used by `Store` implementations to
    /// compute the new content for a document operation; exposed here so
    /// both the Postgres store and the in-memory fake apply identical
    /// semantics.
    pub fn apply_content(current: &serde_json::Value, op_type: DocumentOpType, path: &str, value: &serde_json::Value) -> serde_json::Value {
        match op_type {
            DocumentOpType::Replace => value.clone(),
            DocumentOpType::Insert => {
                let mut content = current.clone();
                let existing_string = content.pointer(path).and_then(|v| v.as_str()).map(str::to_string);
                if let Some(existing) = existing_string {
                    let addition = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                    let concatenated = serde_json::Value::String(format!("{existing}{addition}"));
                    let _ = crate::state_ops::apply(&mut content, &crate::models::StateOp::set(path, concatenated));
                    return content;
                }
                if let Err(err) = crate::state_ops::apply(
                    &mut content,
                    &crate::models::StateOp::append(path, value.clone()),
                ) {
                    tracing::warn!(%err, "insert into non-array, non-string path; falling back to set");
                    let _ = crate::state_ops::apply(&mut content, &crate::models::StateOp::set(path, value.clone()));
                }
                content
            }
            DocumentOpType::Delete => {
                let mut content = current.clone();
                let _ = crate::state_ops::apply(&mut content, &crate::models::StateOp::remove(path));
                content
            }
        }
    }

    /// Exposes the injected clock for implementations that need
    /// `applied_at` stamps outside of `Store::apply_document_operation`.
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
