//! Standard test fixtures: pre-built entities for consistent tests without
//! re-deriving every field at each call site.

use chrono::Utc;

use orchestrator_core::ids::{AgentId, TaskId, TenantId, WorkspaceId};
use orchestrator_core::models::{NewTask, Task, TaskStatus};

use crate::builders::NewTaskBuilder;

/// A task fresh out of `create_task`: `Pending`, no assignment, no retries.
pub fn create_test_task(tenant_id: TenantId) -> Task {
    Task {
        id: TaskId::new(),
        tenant_id,
        task_type: "generic".to_string(),
        created_by: AgentId::new("test-agent"),
        created_at: Utc::now(),
        parent_task_id: None,
        status: TaskStatus::Pending,
        priority: 5.0,
        assigned_to: None,
        assigned_at: None,
        started_at: None,
        completed_at: None,
        retry_count: 0,
        max_retries: 3,
        timeout_seconds: None,
        parameters: serde_json::json!({}),
        result: None,
        tags: Vec::new(),
        title: "Test Task".to_string(),
        description: "A standard test task with default values".to_string(),
        coordination_mode: None,
        completion_mode: None,
    }
}

/// A task already in `status`, with timestamps filled in the way the task
/// service would have written them on the way there.
pub fn create_test_task_with_status(tenant_id: TenantId, status: TaskStatus) -> Task {
    let mut task = create_test_task(tenant_id);
    task.status = status;
    let now = Utc::now();
    match status {
        TaskStatus::Assigned | TaskStatus::Accepted => {
            task.assigned_to = Some(AgentId::new("test-agent"));
            task.assigned_at = Some(now);
        }
        TaskStatus::InProgress => {
            task.assigned_to = Some(AgentId::new("test-agent"));
            task.assigned_at = Some(now);
            task.started_at = Some(now);
        }
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::TimedOut => {
            task.assigned_to = Some(AgentId::new("test-agent"));
            task.assigned_at = Some(now);
            task.started_at = Some(now);
            task.completed_at = Some(now);
        }
        TaskStatus::Pending | TaskStatus::Rejected => {}
    }
    task
}

/// One task in each reachable status, for list/filter tests.
pub fn create_tasks_in_all_statuses(tenant_id: TenantId) -> Vec<Task> {
    [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Accepted,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Rejected,
        TaskStatus::Cancelled,
        TaskStatus::TimedOut,
    ]
    .into_iter()
    .map(|status| create_test_task_with_status(tenant_id, status))
    .collect()
}

/// A standard `NewTask` for testing creation.
pub fn create_new_task() -> NewTask {
    NewTaskBuilder::new().build()
}

/// Several unique `NewTask`s, distributed across 3 agents.
pub fn create_new_tasks(count: usize) -> Vec<NewTask> {
    (0..count)
        .map(|i| {
            NewTaskBuilder::new()
                .with_title(format!("Test Task {i}"))
                .with_description(format!("Test task number {i} for bulk testing"))
                .with_created_by(format!("agent-{}", i % 3 + 1))
                .build()
        })
        .collect()
}

pub fn test_tenant() -> TenantId {
    TenantId::new()
}

pub fn test_workspace_id() -> WorkspaceId {
    WorkspaceId::new()
}
