use crate::ids::{AgentId, ExecutionId, TenantId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level distinction between a plain step-graph workflow and one meant
/// for multi-agent collaboration. Per the design notes, the source shows no
/// divergent scheduling logic between the two — `Collaborative` is an
/// opaque label callers can filter or report on.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowType {
    Standard,
    Collaborative,
}

/// The kind of work a step performs. Closed sum type — the dispatcher in
/// the workflow engine matches on this rather than inspecting a string tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepType {
    /// A step whose completion is driven entirely by the caller invoking
    /// `CompleteStep`/`FailStep`.
    Manual,
    /// A step that creates a task in the Task Service and waits for it to
    /// reach a terminal state.
    Task { assignee: Option<AgentId> },
    /// A step with no externally observable effect, useful for structural
    /// placeholders in tests and examples.
    NoOp,
}

/// A single entry in a workflow's step sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    pub id: String,
    pub name: String,
    pub step_type: StepType,
    pub config: StepConfig,
    /// Maximum number of retries via `RetryStep`, beyond the single attempt.
    #[serde(default)]
    pub retries: u32,
    /// Whether a failed, retry-exhausted step fails the whole execution.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Step configuration. `parallel` groups adjacent steps into a parallel
/// band (see `band_index` in `WorkflowDefinition`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Workflow definition — the immutable-ish template an execution runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub tenant_id: TenantId,
    pub name: String,
    pub workflow_type: WorkflowType,
    pub created_by: AgentId,
    pub is_active: bool,
    pub steps: Vec<StepDefinition>,
    pub config: serde_json::Value,
}

impl WorkflowDefinition {
    /// Partition `steps` into maximal contiguous runs, each either a single
    /// sequential step or a parallel band. Returned as index ranges into
    /// `self.steps`, in execution order.
    pub fn bands(&self) -> Vec<std::ops::Range<usize>> {
        let mut bands = Vec::new();
        let mut i = 0;
        while i < self.steps.len() {
            let start = i;
            if self.steps[i].config.parallel {
                while i < self.steps.len() && self.steps[i].config.parallel {
                    i += 1;
                }
            } else {
                i += 1;
            }
            bands.push(start..i);
        }
        bands
    }
}

/// Status of a workflow execution.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// A running (or finished) instance of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub initiator_id: AgentId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input: serde_json::Value,
    pub context: serde_json::Value,
}

/// Status of an individual step execution.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// Execution state for one step within one workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecution {
    pub execution_id: ExecutionId,
    pub step_id: String,
    pub step_name: String,
    pub status: StepStatus,
    pub retry_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: serde_json::Value,
    pub error: Option<String>,
}

/// Aggregate metrics for a workflow, per `GetWorkflowMetrics`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetrics {
    pub total_executions: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    /// Seconds, averaged over completed executions only.
    pub average_run_time_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, parallel: bool) -> StepDefinition {
        StepDefinition {
            id: id.to_string(),
            name: id.to_string(),
            step_type: StepType::NoOp,
            config: StepConfig {
                parallel,
                extra: serde_json::json!({}),
            },
            retries: 0,
            required: true,
        }
    }

    #[test]
    fn bands_group_adjacent_parallel_steps() {
        let wf = WorkflowDefinition {
            id: WorkflowId::new(),
            tenant_id: TenantId::new(),
            name: "w".into(),
            workflow_type: WorkflowType::Standard,
            created_by: "owner".into(),
            is_active: true,
            steps: vec![
                step("setup", false),
                step("p1", true),
                step("p2", true),
                step("p3", true),
                step("finalize", false),
            ],
            config: serde_json::json!({}),
        };

        let bands = wf.bands();
        assert_eq!(bands, vec![0..1, 1..4, 4..5]);
    }

    #[test]
    fn all_parallel_is_one_band() {
        let wf = WorkflowDefinition {
            id: WorkflowId::new(),
            tenant_id: TenantId::new(),
            name: "w".into(),
            workflow_type: WorkflowType::Standard,
            created_by: "owner".into(),
            is_active: true,
            steps: vec![step("a", true), step("b", true)],
            config: serde_json::json!({}),
        };
        assert_eq!(wf.bands(), vec![0..2]);
    }
}
