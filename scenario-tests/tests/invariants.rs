//! Quantified invariants and boundary behaviors that must hold regardless
//! of which concrete `Store`/`KvLockBroker` backs the services layer.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{MemberRole, NewDocument, NewWorkspace};
use orchestrator_core::state_ops;
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use proptest::prelude::*;
use test_fakes::generators::state_op_strategy;
use test_fakes::InMemoryStore;

#[tokio::test]
async fn a_workspace_always_has_exactly_one_owner() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let owner = "owner-agent";

    let workspace = services
        .workspaces
        .create(
            tenant_id,
            NewWorkspace {
                name: "single-owner workspace".to_string(),
                description: "".to_string(),
                owner_id: owner.into(),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    services.workspaces.add_member(workspace.id, "member-1".into(), MemberRole::Member).await.unwrap();
    services.workspaces.add_member(workspace.id, "member-2".into(), MemberRole::Admin).await.unwrap();

    let members = services.workspaces.list_members(workspace.id).await.unwrap();
    let owners = members.iter().filter(|m| m.role == MemberRole::Owner).count();
    assert_eq!(owners, 1, "exactly one member should hold the Owner role");
}

#[tokio::test]
async fn removing_the_owner_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let owner = "owner-agent";

    let workspace = services
        .workspaces
        .create(
            tenant_id,
            NewWorkspace {
                name: "owner workspace".to_string(),
                description: "".to_string(),
                owner_id: owner.into(),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    let result = services.workspaces.remove_member(tenant_id, workspace.id, &owner.into()).await;
    assert!(result.unwrap_err().is_validation(), "removing the owner should fail validation, not silently succeed");
}

#[tokio::test]
async fn idempotency_replays_return_the_same_task_across_many_callers() {
    let store = Arc::new(InMemoryStore::new());
    let services = Arc::new(CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default()));
    let tenant_id = TenantId::new();

    let mut handles = Vec::new();
    for i in 0..20 {
        let services = services.clone();
        handles.push(tokio::spawn(async move {
            services
                .tasks
                .create(
                    tenant_id,
                    orchestrator_core::models::NewTask::new("agent-1", format!("replay {i}"), "d"),
                    Some("shared-idempotency-key"),
                )
                .await
                .unwrap()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    let mut titles = std::collections::HashSet::new();
    for handle in handles {
        let task = handle.await.unwrap();
        ids.insert(task.id);
        titles.insert(task.title);
    }
    assert_eq!(ids.len(), 1, "every replay of the same idempotency key should return the same task id");
    assert_eq!(titles.len(), 1, "only the first caller's fields should have been persisted");
}

#[tokio::test]
async fn the_document_operation_log_replays_to_the_current_content() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = TenantId::new();
    let workspace_id = test_fakes::test_workspace_id();

    // create_document and apply_document_operation are Store methods used
    // directly here since the document service layer requires a live lock
    // broker to gate section writes, which is orthogonal to this invariant.
    use orchestrator_core::repository::Store;

    let document = store
        .create_document(
            tenant_id,
            workspace_id,
            NewDocument {
                title: "shared notes".to_string(),
                content: serde_json::json!({"lines": []}),
                content_type: "application/json".to_string(),
                doc_type: "note".to_string(),
                created_by: "agent-1".into(),
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    use orchestrator_core::models::{DocumentOpType, NewDocumentOperation};
    let edits = [
        ("alice", DocumentOpType::Insert, "/lines", serde_json::json!("first line")),
        ("bob", DocumentOpType::Insert, "/lines", serde_json::json!("second line")),
        ("alice", DocumentOpType::Insert, "/lines", serde_json::json!("third line")),
    ];
    for (agent, op_type, path, value) in edits {
        store
            .apply_document_operation(
                tenant_id,
                document.id,
                NewDocumentOperation {
                    op_type,
                    path: path.to_string(),
                    value,
                    agent_id: agent.into(),
                    vector_clock: Default::default(),
                },
            )
            .await
            .unwrap();
    }

    let current = store.get_document(tenant_id, document.id).await.unwrap();
    let log = store.get_document_operations(document.id).await.unwrap();
    assert_eq!(log.len(), 3);

    // Replaying the log from the document's original content must reproduce
    // its current content exactly, mirroring the append/remove semantics
    // `DocumentService::apply_content` gives each op type.
    let mut replayed = document.content.clone();
    for op in &log {
        match op.op_type {
            DocumentOpType::Insert => {
                let state_op = orchestrator_core::models::StateOp::append(op.path.as_str(), op.value.clone());
                state_ops::apply(&mut replayed, &state_op).unwrap();
            }
            DocumentOpType::Delete => {
                let state_op = orchestrator_core::models::StateOp::remove(op.path.as_str());
                state_ops::apply(&mut replayed, &state_op).unwrap();
            }
            DocumentOpType::Replace => replayed = op.value.clone(),
        }
    }
    assert_eq!(replayed, current.content);
}

proptest! {
    /// `state_ops::apply` must never panic regardless of path shape or
    /// operation type; the state tree has no fixed schema to violate.
    #[test]
    fn applying_arbitrary_state_ops_never_panics(ops in proptest::collection::vec(state_op_strategy(), 0..20)) {
        let mut root = serde_json::json!({});
        for op in &ops {
            let _ = state_ops::apply(&mut root, op);
        }
    }
}
