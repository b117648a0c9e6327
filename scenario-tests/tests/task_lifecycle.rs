//! Task lifecycle with retries to exhaustion: a task is walked through
//! Assigned -> Accepted -> InProgress -> Failed and retried until
//! `retry_count` reaches `max_retries`, at which point `retry_task` must
//! refuse with `RetriesExhausted` rather than silently resetting the task.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{NewTask, TaskStatus};
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

#[tokio::test]
async fn retry_task_is_refused_once_retries_are_exhausted() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let agent = "flaky-agent";

    let mut task = NewTask::new(agent, "flaky task", "fails a couple of times before succeeding");
    task.max_retries = 2;
    let task = services.tasks.create(tenant_id, task, None).await.unwrap();

    for attempt in 0..=task.max_retries {
        services.tasks.assign_task(tenant_id, task.id, &agent.into()).await.unwrap();
        services.tasks.accept_task(tenant_id, task.id, &agent.into()).await.unwrap();
        services.tasks.start_task(tenant_id, task.id, &agent.into()).await.unwrap();
        let failed = services.tasks.fail_task(tenant_id, task.id, &agent.into(), "transient failure").await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.retry_count, attempt);

        if attempt < task.max_retries {
            let retried = services.tasks.retry_task(tenant_id, task.id).await.unwrap();
            assert_eq!(retried.status, TaskStatus::Pending);
            assert_eq!(retried.retry_count, attempt + 1);
            assert!(retried.assigned_to.is_none(), "a retried task should be unassigned again");
        }
    }

    let exhausted = services.tasks.retry_task(tenant_id, task.id).await;
    match exhausted {
        Err(orchestrator_core::CoreError::RetriesExhausted { retry_count, max_retries }) => {
            assert_eq!(retry_count, task.max_retries);
            assert_eq!(max_retries, task.max_retries);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }

    let final_task = services.tasks.get(tenant_id, task.id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Failed, "a task that exhausted retries stays in its terminal-ish Failed state");
}
