//! Integration tests for the test-fakes crate: the fakes should behave like
//! real implementations of their respective traits, not just compile
//! against them.

use std::sync::Arc;
use std::time::Duration;

use orchestrator_core::ids::{AgentId, DocumentId, TenantId};
use orchestrator_core::kv::KvLockBroker;
use orchestrator_core::models::TaskStatus;
use orchestrator_core::repository::Store;
use test_fakes::*;

#[tokio::test]
async fn store_create_and_get_round_trips_a_task() {
    let store = InMemoryStore::new();
    let tenant_id = TenantId::new();
    let task = store.create_task(tenant_id, create_new_task(), None).await.unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    store.assert_called("create_task");

    let retrieved = store.get_task(tenant_id, task.id).await.unwrap();
    assert_eq!(retrieved.id, task.id);
    store.assert_called("get_task");
}

#[tokio::test]
async fn store_error_injection_is_one_shot() {
    let store = InMemoryStore::new();
    let tenant_id = TenantId::new();

    store.inject_error(orchestrator_core::error::CoreError::Internal("boom".into()));
    let result = store.get_task(tenant_id, orchestrator_core::ids::TaskId::new()).await;
    assert!(result.is_err());

    store.clear_error();
    let result = store.get_task(tenant_id, orchestrator_core::ids::TaskId::new()).await;
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn store_cas_update_rejects_stale_expected_status() {
    let store = InMemoryStore::new();
    let tenant_id = TenantId::new();
    let task = store.create_task(tenant_id, create_new_task(), None).await.unwrap();

    let updated = store
        .cas_update_task(tenant_id, task.id, TaskStatus::Pending, Box::new(|t| t.status = TaskStatus::Assigned))
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Assigned);

    let result = store
        .cas_update_task(tenant_id, task.id, TaskStatus::Pending, Box::new(|t| t.status = TaskStatus::Cancelled))
        .await;
    assert!(result.unwrap_err().is_conflict());
}

#[tokio::test]
async fn store_concurrent_task_creation_yields_unique_ids() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = TenantId::new();

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create_task(tenant_id, NewTaskBuilder::new().with_title(format!("task {i}")).build(), None)
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "every concurrently created task should have a unique id");
}

#[tokio::test]
async fn fixtures_cover_every_task_status() {
    let tenant_id = test_tenant();
    let tasks = create_tasks_in_all_statuses(tenant_id);
    assert_eq!(tasks.len(), 9);

    let completed: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Completed).collect();
    assert!(completed[0].completed_at.is_some());
}

#[tokio::test]
async fn builders_produce_the_requested_fields() {
    let task = NewTaskBuilder::new()
        .with_title("Built Task")
        .with_created_by("builder-agent")
        .with_tag("urgent")
        .build();

    assert_eq!(task.title, "Built Task");
    assert_eq!(task.created_by.as_str(), "builder-agent");
    assert!(task.tags.contains(&"urgent".to_string()));
}

#[tokio::test]
async fn assertions_catch_mismatched_tasks() {
    let tenant_id = test_tenant();
    let task1 = create_test_task(tenant_id);
    let mut task2 = task1.clone();
    assert_task_equals(&task1, &task2);

    task2.title = "Different".to_string();
    let result = std::panic::catch_unwind(|| assert_task_equals(&task1, &task2));
    assert!(result.is_err());
}

#[tokio::test]
async fn contract_suite_passes_against_the_in_memory_store() {
    let store = InMemoryStore::new();
    test_store_contract(&store).await;
    assert!(!store.call_history().is_empty());
}

#[tokio::test]
async fn lock_broker_enforces_single_holder_per_document() {
    let broker = InMemoryLockBroker::new();
    let document_id = DocumentId::new();
    let alice = AgentId::new("alice");
    let bob = AgentId::new("bob");

    broker.lock_document(document_id, &alice, Duration::from_secs(5)).await.unwrap();
    let contested = broker.lock_document(document_id, &bob, Duration::from_secs(5)).await;
    assert!(contested.unwrap_err().is_locked());

    broker.unlock_document(document_id, &alice).await.unwrap();
    assert!(broker.lock_document(document_id, &bob, Duration::from_secs(5)).await.is_ok());
}
