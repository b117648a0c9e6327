//! Task Service — create/assign/lifecycle operations over `Task`, including
//! delegation and distributed (parent/child) tasks.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::ids::{AgentId, TaskId, TenantId};
use crate::models::{
    CompletionMode, CoordinationMode, NewDelegation, NewTask, Task, TaskFilter, TaskStatus, TaskTree,
};
use crate::notify::{Event, NotificationBus};
use crate::repository::Store;
use crate::validation::TaskValidator;

pub struct TaskService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    bus: NotificationBus,
    config: CoreConfig,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, bus: NotificationBus, config: CoreConfig) -> Self {
        Self {
            store,
            clock,
            bus,
            config,
        }
    }

    #[instrument(skip(self, task))]
    pub async fn create(
        &self,
        tenant_id: TenantId,
        task: NewTask,
        idempotency_key: Option<&str>,
    ) -> Result<Task> {
        TaskValidator::validate_new_task(&task)?;
        let created = self.store.create_task(tenant_id, task, idempotency_key).await?;
        info!(task_id = %created.id, "task created");
        Ok(created)
    }

    pub async fn create_batch(&self, tenant_id: TenantId, tasks: Vec<NewTask>) -> Result<Vec<Task>> {
        for task in &tasks {
            TaskValidator::validate_new_task(task)?;
        }
        self.store.create_tasks_batch(tenant_id, tasks).await
    }

    pub async fn get(&self, tenant_id: TenantId, id: TaskId) -> Result<Task> {
        self.store.get_task(tenant_id, id).await
    }

    pub async fn get_batch(&self, tenant_id: TenantId, ids: &[TaskId]) -> Result<Vec<Task>> {
        self.store.get_tasks_batch(tenant_id, ids).await
    }

    pub async fn search_tasks(&self, tenant_id: TenantId, text: &str, filter: TaskFilter) -> Result<Vec<Task>> {
        self.store.search_tasks(tenant_id, text, filter).await
    }

    pub async fn get_agent_tasks(&self, tenant_id: TenantId, agent: &AgentId, filter: TaskFilter) -> Result<Vec<Task>> {
        self.store.get_agent_tasks(tenant_id, agent, filter).await
    }

    #[instrument(skip(self))]
    pub async fn assign_task(&self, tenant_id: TenantId, id: TaskId, agent: &AgentId) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        if task.assigned_to.as_ref() == Some(agent) && task.status == TaskStatus::Assigned {
            return Err(CoreError::Conflict(format!("task {id} already assigned to {agent}")));
        }
        TaskValidator::validate_transition(&task, TaskStatus::Assigned)?;
        let agent = agent.clone();
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.status = TaskStatus::Assigned;
                    t.assigned_to = Some(agent);
                    t.assigned_at = Some(now);
                }),
            )
            .await?;
        self.publish_status_change(id, task.status, updated.status).await;
        Ok(updated)
    }

    pub async fn accept_task(&self, tenant_id: TenantId, id: TaskId, agent: &AgentId) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        if task.assigned_to.as_ref() != Some(agent) {
            return Err(CoreError::PermissionDenied(format!(
                "{agent} is not the assignee of task {id}"
            )));
        }
        TaskValidator::validate_transition(&task, TaskStatus::Accepted)?;
        let prior_status = task.status;
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(|t| t.status = TaskStatus::Accepted),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        Ok(updated)
    }

    pub async fn reject_task(&self, tenant_id: TenantId, id: TaskId, _agent: &AgentId, _reason: &str) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        TaskValidator::validate_transition(&task, TaskStatus::Rejected)?;
        let prior_status = task.status;
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(|t| {
                    t.status = TaskStatus::Rejected;
                    t.assigned_to = None;
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        Ok(updated)
    }

    pub async fn start_task(&self, tenant_id: TenantId, id: TaskId, agent: &AgentId) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        if task.assigned_to.as_ref() != Some(agent) {
            return Err(CoreError::PermissionDenied(format!(
                "{agent} is not the assignee of task {id}"
            )));
        }
        TaskValidator::validate_transition(&task, TaskStatus::InProgress)?;
        let prior_status = task.status;
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.status = TaskStatus::InProgress;
                    t.started_at = Some(now);
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        Ok(updated)
    }

    /// Annotates progress without transitioning status.
    pub async fn update_progress(&self, tenant_id: TenantId, id: TaskId, percent: f64, message: &str) -> Result<Task> {
        TaskValidator::validate_progress_percent(percent)?;
        let task = self.store.get_task(tenant_id, id).await?;
        let message = message.to_string();
        self.store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.parameters["progress_percent"] = serde_json::json!(percent);
                    t.parameters["progress_message"] = serde_json::json!(message);
                }),
            )
            .await
    }

    pub async fn complete_task(
        &self,
        tenant_id: TenantId,
        id: TaskId,
        _agent: &AgentId,
        result: serde_json::Value,
    ) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        TaskValidator::validate_transition(&task, TaskStatus::Completed)?;
        let prior_status = task.status;
        let parent_task_id = task.parent_task_id;
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.status = TaskStatus::Completed;
                    t.completed_at = Some(now);
                    t.result = Some(result);
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        if let Some(parent_id) = parent_task_id {
            self.reevaluate_parent_completion(tenant_id, parent_id).await?;
        }
        Ok(updated)
    }

    pub async fn fail_task(&self, tenant_id: TenantId, id: TaskId, _agent: &AgentId, error: &str) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        TaskValidator::validate_transition(&task, TaskStatus::Failed)?;
        let prior_status = task.status;
        let parent_task_id = task.parent_task_id;
        let error = error.to_string();
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.status = TaskStatus::Failed;
                    t.result = Some(serde_json::json!({ "error": error }));
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        if let Some(parent_id) = parent_task_id {
            self.reevaluate_parent_completion(tenant_id, parent_id).await?;
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn retry_task(&self, tenant_id: TenantId, id: TaskId) -> Result<Task> {
        let task = self.store.get_task(tenant_id, id).await?;
        TaskValidator::validate_transition(&task, TaskStatus::Pending)?;
        if task.retry_count >= task.max_retries {
            return Err(CoreError::RetriesExhausted {
                retry_count: task.retry_count,
                max_retries: task.max_retries,
            });
        }
        let prior_status = task.status;
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(|t| {
                    t.status = TaskStatus::Pending;
                    t.retry_count += 1;
                    t.assigned_to = None;
                    t.started_at = None;
                    t.completed_at = None;
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        Ok(updated)
    }

    pub async fn delegate_task(&self, tenant_id: TenantId, delegation: NewDelegation) -> Result<Task> {
        let task = self.store.get_task(tenant_id, delegation.task_id).await?;
        if !matches!(
            task.status,
            TaskStatus::Assigned | TaskStatus::Accepted | TaskStatus::InProgress | TaskStatus::Rejected
        ) {
            return Err(CoreError::illegal_transition(task.status, TaskStatus::Assigned));
        }
        let id = delegation.task_id;
        let to_agent = delegation.to_agent_id.clone();
        self.store.insert_delegation(tenant_id, delegation).await?;
        let prior_status = task.status;
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(move |t| {
                    t.assigned_to = Some(to_agent);
                    t.status = TaskStatus::Assigned;
                }),
            )
            .await?;
        self.publish_status_change(id, prior_status, updated.status).await;
        Ok(updated)
    }

    /// Creates a parent task plus `subtasks` children, all with
    /// `parent_task_id` set to the parent.
    pub async fn create_distributed_task(
        &self,
        tenant_id: TenantId,
        parent: NewTask,
        subtasks: Vec<NewTask>,
        coordination_mode: CoordinationMode,
        completion_mode: CompletionMode,
    ) -> Result<Task> {
        TaskValidator::validate_new_task(&parent)?;
        TaskValidator::validate_subtask_count(subtasks.len(), self.config.max_subtasks_per_task)?;
        for subtask in &subtasks {
            TaskValidator::validate_new_task(subtask)?;
        }

        let created_parent = self.store.create_task(tenant_id, parent, None).await?;
        let parent = self
            .store
            .cas_update_task(
                tenant_id,
                created_parent.id,
                created_parent.status,
                Box::new(move |t| {
                    t.coordination_mode = Some(coordination_mode);
                    t.completion_mode = Some(completion_mode);
                }),
            )
            .await?;

        let children: Vec<NewTask> = subtasks
            .into_iter()
            .map(|mut t| {
                t.parent_task_id = Some(parent.id);
                t
            })
            .collect();
        self.store.create_tasks_batch(tenant_id, children).await?;
        Ok(parent)
    }

    pub async fn get_task_tree(&self, tenant_id: TenantId, root_id: TaskId) -> Result<TaskTree> {
        self.store.get_task_tree(tenant_id, root_id).await
    }

    /// Re-checks whether a distributed parent's children now satisfy its
    /// completion mode, and if so, completes the parent.
    #[instrument(skip(self))]
    pub async fn reevaluate_parent_completion(&self, tenant_id: TenantId, parent_id: TaskId) -> Result<()> {
        let parent = self.store.get_task(tenant_id, parent_id).await?;
        if parent.status.is_terminal() {
            return Ok(());
        }
        let Some(completion_mode) = parent.completion_mode else {
            return Ok(());
        };
        let tree = self.store.get_task_tree(tenant_id, parent_id).await?;
        let children = tree.children.get(&parent_id).cloned().unwrap_or_default();
        if children.is_empty() {
            return Ok(());
        }

        let completed = children.iter().filter(|c| c.status == TaskStatus::Completed).count();
        let terminal = children.iter().filter(|c| c.status.is_terminal()).count();
        let total = children.len();

        let parent_done = match completion_mode {
            CompletionMode::All => terminal == total,
            CompletionMode::Any => completed >= 1,
            CompletionMode::Majority => completed >= majority_threshold(total),
        };

        if !parent_done {
            return Ok(());
        }

        let now = self.clock.now();
        let prior_status = parent.status;
        let updated = self
            .store
            .cas_update_task(
                tenant_id,
                parent_id,
                parent.status,
                Box::new(move |t| {
                    t.status = TaskStatus::Completed;
                    t.completed_at = Some(now);
                }),
            )
            .await?;
        self.publish_status_change(parent_id, prior_status, updated.status).await;

        if completion_mode == CompletionMode::Any {
            for sibling in children.iter().filter(|c| !c.status.is_terminal()) {
                if let Err(err) = self.cancel_sibling(tenant_id, sibling.id).await {
                    warn!(task_id = %sibling.id, error = %err, "failed to cancel sibling after Any completion");
                }
            }
        }

        Ok(())
    }

    async fn cancel_sibling(&self, tenant_id: TenantId, id: TaskId) -> Result<()> {
        let task = self.store.get_task(tenant_id, id).await?;
        if task.status.is_terminal() {
            return Ok(());
        }
        self.store
            .cas_update_task(
                tenant_id,
                id,
                task.status,
                Box::new(|t| t.status = TaskStatus::Cancelled),
            )
            .await?;
        Ok(())
    }

    pub async fn submit_subtask_result(
        &self,
        tenant_id: TenantId,
        parent_id: TaskId,
        subtask_id: TaskId,
        agent: &AgentId,
        result: serde_json::Value,
    ) -> Result<()> {
        self.complete_task(tenant_id, subtask_id, agent, result).await?;
        self.reevaluate_parent_completion(tenant_id, parent_id).await
    }

    /// Marks any task whose `started_at + timeout_seconds` has elapsed as
    /// `TimedOut`. Intended to be driven by a periodic sweep at
    /// `CoreConfig::task_timeout_sweep_interval`; idempotent across runs.
    pub async fn sweep_timeouts(&self, tenant_id: TenantId, in_progress: Vec<Task>) -> Result<Vec<TaskId>> {
        let now = self.clock.now();
        let mut timed_out = Vec::new();
        for task in in_progress {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            let Some(timeout_seconds) = task.timeout_seconds else {
                continue;
            };
            let Some(started_at) = task.started_at else {
                continue;
            };
            if now < started_at + chrono::Duration::seconds(timeout_seconds) {
                continue;
            }
            match self
                .store
                .cas_update_task(
                    tenant_id,
                    task.id,
                    TaskStatus::InProgress,
                    Box::new(|t| t.status = TaskStatus::TimedOut),
                )
                .await
            {
                Ok(_) => {
                    self.publish_status_change(task.id, TaskStatus::InProgress, TaskStatus::TimedOut)
                        .await;
                    timed_out.push(task.id);
                }
                Err(CoreError::Conflict(_)) => {
                    // Raced with another transition since the snapshot was
                    // taken; the next sweep tick will re-evaluate.
                }
                Err(err) => return Err(err),
            }
        }
        Ok(timed_out)
    }

    async fn publish_status_change(&self, task_id: TaskId, from: TaskStatus, to: TaskStatus) {
        self.bus
            .publish(Event::TaskStatusChanged {
                task_id,
                from: from.to_string(),
                to: to.to_string(),
            })
            .await;
    }
}

/// `⌈N/2⌉`, the resolved tie-break for an even-sized child set under
/// `CompletionMode::Majority`.
fn majority_threshold(total: usize) -> usize {
    total.div_ceil(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_threshold_rounds_up() {
        assert_eq!(majority_threshold(1), 1);
        assert_eq!(majority_threshold(2), 1);
        assert_eq!(majority_threshold(3), 2);
        assert_eq!(majority_threshold(4), 2);
        assert_eq!(majority_threshold(5), 3);
    }
}
