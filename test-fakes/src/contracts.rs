//! Contract test helpers for validating `Store` implementations.
//!
//! Run the same assertions against both the in-memory fake and a real
//! Postgres-backed store to keep their behavior aligned.

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{NewTask, TaskFilter, TaskStatus, StateOp};
use orchestrator_core::repository::Store;

/// Run the full contract suite against any `Store` implementation.
pub async fn test_store_contract<S: Store>(store: &S) {
    test_task_lifecycle_contract(store).await;
    test_idempotency_contract(store).await;
    test_search_contract(store).await;
    test_workspace_state_contract(store).await;
    test_health_check_contract(store).await;
}

/// A task created via `create_task` starts `Pending` and moves through the
/// legal transitions enforced by `cas_update_task`.
pub async fn test_task_lifecycle_contract<S: Store>(store: &S) {
    let tenant_id = TenantId::new();
    let task = store
        .create_task(tenant_id, NewTask::new("agent-1", "contract task", "d"), None)
        .await
        .expect("create_task should succeed");
    assert_eq!(task.status, TaskStatus::Pending, "new task should start Pending");

    let assigned = store
        .cas_update_task(tenant_id, task.id, TaskStatus::Pending, Box::new(|t| t.status = TaskStatus::Assigned))
        .await
        .expect("valid CAS transition should succeed");
    assert_eq!(assigned.status, TaskStatus::Assigned);

    let conflict = store
        .cas_update_task(tenant_id, task.id, TaskStatus::Pending, Box::new(|t| t.status = TaskStatus::Cancelled))
        .await;
    assert!(conflict.unwrap_err().is_conflict(), "stale expected_status should surface a conflict");

    let missing = store.get_task(tenant_id, orchestrator_core::ids::TaskId::new()).await;
    assert!(missing.unwrap_err().is_not_found(), "unknown task id should surface not_found");
}

/// Creating a task twice with the same idempotency key returns the first
/// task rather than inserting a duplicate.
pub async fn test_idempotency_contract<S: Store>(store: &S) {
    let tenant_id = TenantId::new();
    let first = store
        .create_task(tenant_id, NewTask::new("agent-1", "first", "d"), Some("idem-1"))
        .await
        .expect("create should succeed");
    let second = store
        .create_task(tenant_id, NewTask::new("agent-1", "second", "d"), Some("idem-1"))
        .await
        .expect("replayed create should succeed");
    assert_eq!(first.id, second.id, "replaying an idempotency key should return the same task");
    assert_eq!(second.title, "first", "the replayed task should keep the original fields");
}

/// `search_tasks` filters by both text and status.
pub async fn test_search_contract<S: Store>(store: &S) {
    let tenant_id = TenantId::new();
    store.create_task(tenant_id, NewTask::new("agent-1", "alpha widget", "d"), None).await.unwrap();
    let beta = store.create_task(tenant_id, NewTask::new("agent-1", "beta widget", "d"), None).await.unwrap();
    store
        .cas_update_task(tenant_id, beta.id, TaskStatus::Pending, Box::new(|t| t.status = TaskStatus::Assigned))
        .await
        .unwrap();

    let pending_widgets = store
        .search_tasks(
            tenant_id,
            "widget",
            TaskFilter {
                status: Some(TaskStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .expect("search should succeed");
    assert_eq!(pending_widgets.len(), 1, "only the still-pending widget should match");
    assert_eq!(pending_widgets[0].title, "alpha widget");
}

/// Workspace state mutations compose through `apply_state_op` in order.
pub async fn test_workspace_state_contract<S: Store>(store: &S) {
    let tenant_id = TenantId::new();
    let workspace = store
        .create_workspace(
            tenant_id,
            orchestrator_core::models::NewWorkspace {
                name: "contract workspace".into(),
                description: "".into(),
                owner_id: orchestrator_core::ids::AgentId::new("agent-1"),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .expect("create_workspace should succeed");

    let initial = store.get_state(workspace.id).await.expect("get_state should succeed for a fresh workspace");
    assert_eq!(initial.version, 0);

    let after_set = store
        .apply_state_op(workspace.id, StateOp::set("/status", serde_json::json!("active")))
        .await
        .expect("apply_state_op should succeed");
    assert_eq!(after_set.data["status"], serde_json::json!("active"));
    assert_eq!(after_set.version, 1);

    let after_increment = store
        .apply_state_op(workspace.id, StateOp::increment("/count", 3.0))
        .await
        .expect("increment should succeed");
    assert_eq!(after_increment.data["count"], serde_json::json!(3.0));
    assert_eq!(after_increment.version, 2);
}

/// `health_check` succeeds for a working store.
pub async fn test_health_check_contract<S: Store>(store: &S) {
    store.health_check().await.expect("health_check should succeed for a working store");
}
