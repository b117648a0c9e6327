//! `WorkspaceService::list_documents`/`update_document` are the only path to
//! a workspace's documents: a non-member is refused outright, and a Viewer
//! can list but not write.

use std::sync::Arc;

use orchestrator_core::ids::{DocumentId, TenantId};
use orchestrator_core::models::{DocumentOpType, MemberRole, NewDocument, NewDocumentOperation, NewWorkspace};
use orchestrator_core::repository::Store;
use orchestrator_core::{CoreConfig, CoreError, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

#[tokio::test]
async fn non_members_cannot_list_or_update_documents() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let owner = "workspace-owner";
    let outsider = "not-a-member";

    let workspace = services
        .workspaces
        .create(
            tenant_id,
            NewWorkspace {
                name: "launch plan".into(),
                description: "coordination workspace".into(),
                owner_id: owner.into(),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    let list_result = services.workspaces.list_documents(workspace.id, &outsider.into()).await;
    assert!(matches!(list_result, Err(CoreError::PermissionDenied(_))));

    let update_result = services
        .workspaces
        .update_document(
            workspace.id,
            tenant_id,
            DocumentId::new(),
            &outsider.into(),
            NewDocumentOperation {
                op_type: DocumentOpType::Replace,
                path: "/".into(),
                value: serde_json::json!({}),
                agent_id: outsider.into(),
                vector_clock: Default::default(),
            },
        )
        .await;
    assert!(matches!(update_result, Err(CoreError::PermissionDenied(_))));
}

#[tokio::test]
async fn a_viewer_can_read_but_not_write_documents() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store.clone(), Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let owner = "workspace-owner";
    let viewer = "read-only-reviewer";

    let workspace = services
        .workspaces
        .create(
            tenant_id,
            NewWorkspace {
                name: "launch plan".into(),
                description: "coordination workspace".into(),
                owner_id: owner.into(),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    services
        .workspaces
        .add_member(workspace.id, viewer.into(), MemberRole::Viewer)
        .await
        .unwrap();

    let document = store
        .create_document(
            tenant_id,
            workspace.id,
            NewDocument {
                title: "runbook".into(),
                content: serde_json::json!({"body": "hello "}),
                content_type: "application/json".into(),
                doc_type: "runbook".into(),
                created_by: owner.into(),
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    let listed = services.workspaces.list_documents(workspace.id, &viewer.into()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, document.id);

    let write_result = services
        .workspaces
        .update_document(
            workspace.id,
            tenant_id,
            document.id,
            &viewer.into(),
            NewDocumentOperation {
                op_type: DocumentOpType::Insert,
                path: "/body".into(),
                value: serde_json::json!("world"),
                agent_id: viewer.into(),
                vector_clock: Default::default(),
            },
        )
        .await;
    assert!(matches!(write_result, Err(CoreError::PermissionDenied(_))));
}
