//! Random test data generators using the `fake` crate, plus `proptest`
//! strategies for property-based tests.

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;

use orchestrator_core::ids::{AgentId, TenantId};
use orchestrator_core::models::{NewTask, StateOp, StateOpType, Task, TaskFilter, TaskStatus};

/// Generate a realistic agent name.
pub fn generate_agent_name() -> String {
    let agents = [
        "rust-architect",
        "database-engineer",
        "protocol-specialist",
        "integration-lead",
        "testing-expert",
        "documentation-specialist",
        "project-finalizer",
        "security-auditor",
        "performance-optimizer",
    ];
    agents[rand::thread_rng().gen_range(0..agents.len())].to_string()
}

/// Generate a realistic task title.
pub fn generate_task_title() -> String {
    Sentence(3..8).fake()
}

/// Generate a realistic task description.
pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

/// Generate a random, uniformly weighted task status.
pub fn generate_random_task_status() -> TaskStatus {
    let statuses = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Accepted,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Rejected,
        TaskStatus::Cancelled,
        TaskStatus::TimedOut,
    ];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// Generate a random `NewTask` with realistic data.
pub fn generate_new_task() -> NewTask {
    NewTask::new(generate_agent_name(), generate_task_title(), generate_task_description())
}

/// Generate a fully-formed `Task` with realistic data, as if freshly read
/// back from a store.
pub fn generate_random_task(tenant_id: TenantId) -> Task {
    let status = generate_random_task_status();
    let now = Utc::now();
    Task {
        id: orchestrator_core::ids::TaskId::new(),
        tenant_id,
        task_type: "generic".to_string(),
        created_by: AgentId::new(generate_agent_name()),
        created_at: now,
        parent_task_id: None,
        status,
        priority: rand::thread_rng().gen_range(1.0..10.0),
        assigned_to: Some(AgentId::new(generate_agent_name())),
        assigned_at: Some(now),
        started_at: None,
        completed_at: if status.is_terminal() { Some(now) } else { None },
        retry_count: 0,
        max_retries: 3,
        timeout_seconds: None,
        parameters: serde_json::json!({}),
        result: None,
        tags: Vec::new(),
        title: generate_task_title(),
        description: generate_task_description(),
        coordination_mode: None,
        completion_mode: None,
    }
}

/// Configurable task generator for bulk fixture generation.
pub struct TaskGenerator {
    pub tenant_id: TenantId,
    pub agent_pool: Vec<String>,
}

impl TaskGenerator {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            agent_pool: vec!["agent-1".to_string(), "agent-2".to_string(), "agent-3".to_string()],
        }
    }

    pub fn generate(&self) -> NewTask {
        let agent = &self.agent_pool[rand::thread_rng().gen_range(0..self.agent_pool.len())];
        NewTask::new(agent.clone(), generate_task_title(), generate_task_description())
    }
}

/// Proptest strategy for generating valid task statuses.
pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::Assigned),
        Just(TaskStatus::Accepted),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Failed),
        Just(TaskStatus::Rejected),
        Just(TaskStatus::Cancelled),
        Just(TaskStatus::TimedOut),
    ]
}

/// Proptest strategy for generating `NewTask`s.
pub fn new_task_strategy() -> impl Strategy<Value = NewTask> {
    (
        "[a-z-]{5,20}",
        "[A-Za-z ]{5,50}",
        "[A-Za-z0-9 .,!?]{10,200}",
        0u32..5,
    )
        .prop_map(|(agent, title, description, max_retries)| {
            let mut task = NewTask::new(agent, title, description);
            task.max_retries = max_retries;
            task
        })
}

/// Proptest strategy for generating task filters.
pub fn task_filter_strategy() -> impl Strategy<Value = TaskFilter> {
    (
        proptest::option::of("[a-z-]{5,20}"),
        proptest::option::of(task_status_strategy()),
    )
        .prop_map(|(assigned_to, status)| TaskFilter {
            assigned_to: assigned_to.map(AgentId::new),
            created_by: None,
            status,
            task_type: None,
            tag: None,
            date_from: None,
            date_to: None,
            completed_after: None,
            completed_before: None,
            limit: None,
            offset: None,
        })
}

/// Proptest strategy for generating single state-tree operations, used to
/// check that `apply`/`apply_all` never panic regardless of path shape.
pub fn state_op_strategy() -> impl Strategy<Value = StateOp> {
    (
        "/[a-z]{1,10}(/[a-z]{1,10}){0,3}",
        prop_oneof![
            Just(StateOpType::Set),
            Just(StateOpType::Increment),
            Just(StateOpType::Append),
            Just(StateOpType::Remove),
            Just(StateOpType::Merge),
        ],
    )
        .prop_map(|(path, op_type)| {
            let value = match op_type {
                StateOpType::Increment => serde_json::json!(1.0),
                StateOpType::Merge => serde_json::json!({"k": "v"}),
                StateOpType::Set | StateOpType::Append => serde_json::json!("value"),
                StateOpType::Remove => serde_json::Value::Null,
            };
            StateOp { op_type, path, value }
        })
}
