use crate::ids::{AgentId, TaskId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task lifecycle states. See the state graph in the workflow documentation
/// for the full transition table; `can_transition_to` below is the single
/// source of truth the services consult before writing a new status.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Failed,
    Rejected,
    Cancelled,
    TimedOut,
}

impl TaskStatus {
    /// Absorbing states that no operation (other than the explicit retry
    /// paths handled separately) can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn can_transition_to(self, new: TaskStatus) -> bool {
        use TaskStatus::*;
        if self == new {
            return false;
        }
        matches!(
            (self, new),
            (Pending, Assigned)
                | (Rejected, Assigned)
                | (Assigned, Accepted)
                | (Assigned, Rejected)
                | (Accepted, Rejected)
                | (Accepted, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, TimedOut)
                | (Failed, Pending)
                | (TimedOut, Pending)
                // Delegation and cancellation can reach into any live task.
                | (Assigned, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
                | (Pending, Cancelled)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Assigned => "Assigned",
            TaskStatus::Accepted => "Accepted",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Rejected => "Rejected",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::TimedOut => "TimedOut",
        };
        write!(f, "{s}")
    }
}

/// Coordination mode for a distributed task's children.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoordinationMode {
    Sequential,
    Parallel,
}

/// Completion mode deciding when a parent distributed task is considered
/// done, given the terminal states of its children.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionMode {
    All,
    Any,
    Majority,
}

/// Type of a recorded task delegation.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum DelegationType {
    Manual,
    Automatic,
    LoadBalance,
    Failover,
}

/// Core task representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub task_type: String,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
    pub parent_task_id: Option<TaskId>,

    pub status: TaskStatus,
    pub priority: f64,
    pub assigned_to: Option<AgentId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_seconds: Option<i64>,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub title: String,
    pub description: String,

    /// Distributed-task bookkeeping: how a parent should interpret its
    /// children's terminal states. `None` for leaf tasks.
    pub coordination_mode: Option<CoordinationMode>,
    pub completion_mode: Option<CompletionMode>,
}

impl Task {
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Whether this task is a distributed-task parent (has children created
    /// via `CreateDistributedTask`).
    pub fn is_distributed_parent(&self) -> bool {
        self.coordination_mode.is_some()
    }
}

/// Data needed to create a new task. `id`/`created_at`/`status` are assigned
/// by the service, not supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub task_type: String,
    pub created_by: AgentId,
    pub parent_task_id: Option<TaskId>,
    pub title: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub max_retries: u32,
    pub timeout_seconds: Option<i64>,
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_priority() -> f64 {
    5.0
}

fn default_parameters() -> serde_json::Value {
    serde_json::json!({})
}

impl NewTask {
    pub fn new(created_by: impl Into<AgentId>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: "generic".to_string(),
            created_by: created_by.into(),
            parent_task_id: None,
            title: title.into(),
            description: description.into(),
            priority: default_priority(),
            max_retries: 0,
            timeout_seconds: None,
            parameters: default_parameters(),
            tags: Vec::new(),
        }
    }
}

/// Filter criteria for listing/searching tasks. All fields are optional and
/// combined with AND semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub assigned_to: Option<AgentId>,
    pub created_by: Option<AgentId>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<String>,
    pub tag: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub completed_after: Option<DateTime<Utc>>,
    pub completed_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A recorded transfer of a task's assignment from one agent to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDelegation {
    pub task_id: TaskId,
    pub task_created_at: DateTime<Utc>,
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    pub reason: String,
    pub delegation_type: DelegationType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied data for a new delegation; `created_at` is set by the
/// service at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDelegation {
    pub task_id: TaskId,
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    pub reason: String,
    pub delegation_type: DelegationType,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

/// A subtask's children, keyed by parent, as returned by `GetTaskTree`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskTree {
    pub root: Option<Task>,
    pub children: HashMap<TaskId, Vec<Task>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_from_pending() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Assigned));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn retry_paths_return_to_pending() {
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::TimedOut.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn terminal_states_are_sink_except_retry() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn full_lifecycle_walk() {
        let mut status = TaskStatus::Pending;
        for next in [
            TaskStatus::Assigned,
            TaskStatus::Accepted,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            assert!(status.can_transition_to(next), "{status} -> {next}");
            status = next;
        }
    }
}
