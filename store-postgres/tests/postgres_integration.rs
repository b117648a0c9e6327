//! End-to-end tests against a real Postgres instance.
//!
//! Gated on `#[ignore]` since this crate's test suite otherwise runs with
//! no external services. Run with:
//!
//! ```text
//! TEST_DATABASE_URL=postgres://localhost/orchestrator_test cargo test -p store-postgres -- --ignored
//! ```
//!
//! Every test opens its own tenant id and cleans up via `cleanup_tenant`
//! rather than truncating shared tables, so tests can run concurrently
//! against one database.

use orchestrator_core::ids::{AgentId, TenantId};
use orchestrator_core::models::{NewTask, NewWorkspace, TaskFilter, TaskStatus};
use orchestrator_core::repository::Store;
use store_postgres::PostgresStore;

async fn connect() -> PostgresStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set to run ignored postgres tests");
    let store = PostgresStore::connect(&url).await.expect("connect to postgres");
    store.migrate().await.expect("run migrations");
    store
}

#[tokio::test]
#[ignore]
async fn create_and_fetch_round_trips_a_task() {
    let store = connect().await;
    let tenant_id = TenantId::new();

    let created = store
        .create_task(
            tenant_id,
            NewTask::new("agent-1", "write the report", "quarterly numbers"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Pending);

    let fetched = store.get_task(tenant_id, created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.title, "write the report");

    store.cleanup_tenant(tenant_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn idempotency_key_returns_the_same_task_on_replay() {
    let store = connect().await;
    let tenant_id = TenantId::new();

    let first = store
        .create_task(
            tenant_id,
            NewTask::new("agent-1", "send the invoice", "to acme corp"),
            Some("invoice-42"),
        )
        .await
        .unwrap();

    let second = store
        .create_task(
            tenant_id,
            NewTask::new("agent-1", "send the invoice (duplicate)", "should not apply"),
            Some("invoice-42"),
        )
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "send the invoice");

    store.cleanup_tenant(tenant_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn cas_update_rejects_a_stale_expected_status() {
    let store = connect().await;
    let tenant_id = TenantId::new();

    let task = store
        .create_task(tenant_id, NewTask::new("agent-1", "t", "d"), None)
        .await
        .unwrap();

    let updated = store
        .cas_update_task(
            tenant_id,
            task.id,
            TaskStatus::Pending,
            Box::new(|t| t.status = TaskStatus::Assigned),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Assigned);

    let conflict = store
        .cas_update_task(
            tenant_id,
            task.id,
            TaskStatus::Pending,
            Box::new(|t| t.status = TaskStatus::Cancelled),
        )
        .await;
    assert!(conflict.unwrap_err().is_conflict());

    store.cleanup_tenant(tenant_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn search_tasks_filters_by_status_and_text() {
    let store = connect().await;
    let tenant_id = TenantId::new();

    store
        .create_task(tenant_id, NewTask::new("agent-1", "alpha report", "d"), None)
        .await
        .unwrap();
    let beta = store
        .create_task(tenant_id, NewTask::new("agent-1", "beta report", "d"), None)
        .await
        .unwrap();
    store
        .cas_update_task(
            tenant_id,
            beta.id,
            TaskStatus::Pending,
            Box::new(|t| t.status = TaskStatus::Assigned),
        )
        .await
        .unwrap();

    let pending = store
        .search_tasks(tenant_id, "report", TaskFilter {
            status: Some(TaskStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "alpha report");

    store.cleanup_tenant(tenant_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn workspace_state_ops_apply_under_concurrent_increments() {
    let store = connect().await;
    let tenant_id = TenantId::new();

    let workspace = store
        .create_workspace(
            tenant_id,
            NewWorkspace {
                name: "shared counter".into(),
                description: "".into(),
                owner_id: AgentId::new("agent-1"),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = store.clone();
        let workspace_id = workspace.id;
        handles.push(tokio::spawn(async move {
            store
                .apply_state_op(workspace_id, orchestrator_core::models::StateOp::increment("/count", 1.0))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let state = store.get_state(workspace.id).await.unwrap();
    assert_eq!(state.data["count"].as_f64().unwrap(), 50.0);

    store.cleanup_tenant(tenant_id).await.unwrap();
}
