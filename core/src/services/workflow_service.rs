//! Workflow Engine — advances a `WorkflowExecution`'s position over its
//! definition's step sequence, one parallel band at a time.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::ids::{AgentId, ExecutionId, TenantId, WorkflowId};
use crate::models::{
    ExecutionStatus, StepExecution, StepStatus, WorkflowDefinition, WorkflowExecution, WorkflowMetrics,
};
use crate::notify::{Event, NotificationBus};
use crate::repository::Store;
use crate::validation::WorkflowValidator;

pub struct WorkflowService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    bus: NotificationBus,
    max_steps_per_workflow: u32,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, bus: NotificationBus, max_steps_per_workflow: u32) -> Self {
        Self {
            store,
            clock,
            bus,
            max_steps_per_workflow,
        }
    }

    pub async fn create_workflow(&self, tenant_id: TenantId, definition: WorkflowDefinition) -> Result<WorkflowDefinition> {
        WorkflowValidator::validate_definition(&definition, self.max_steps_per_workflow)?;
        self.store.create_workflow(tenant_id, definition).await
    }

    pub async fn get_workflow(&self, tenant_id: TenantId, id: WorkflowId) -> Result<WorkflowDefinition> {
        self.store.get_workflow(tenant_id, id).await
    }

    pub async fn list_workflows(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>> {
        self.store.list_workflows(tenant_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn start_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        initiator: &AgentId,
        input: serde_json::Value,
    ) -> Result<WorkflowExecution> {
        let definition = self.store.get_workflow(tenant_id, workflow_id).await?;
        if !definition.is_active {
            return Err(CoreError::Validation(format!("workflow {workflow_id} is not active")));
        }
        let bands = definition.bands();
        let first_band = bands
            .first()
            .ok_or_else(|| CoreError::Validation("workflow has no steps".to_string()))?;

        let execution = WorkflowExecution {
            id: ExecutionId::new(),
            workflow_id,
            tenant_id,
            initiator_id: initiator.clone(),
            status: ExecutionStatus::Running,
            started_at: self.clock.now(),
            completed_at: None,
            input,
            context: serde_json::json!({}),
        };
        let execution = self.store.create_execution(tenant_id, execution).await?;

        for step in &definition.steps[first_band.clone()] {
            let step_execution = StepExecution {
                execution_id: execution.id,
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                status: StepStatus::Running,
                retry_count: 0,
                started_at: Some(self.clock.now()),
                completed_at: None,
                output: serde_json::json!({}),
                error: None,
            };
            self.store.upsert_step_execution(step_execution).await?;
        }
        for step in &definition.steps[first_band.end..] {
            let step_execution = StepExecution {
                execution_id: execution.id,
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                status: StepStatus::Pending,
                retry_count: 0,
                started_at: None,
                completed_at: None,
                output: serde_json::json!({}),
                error: None,
            };
            self.store.upsert_step_execution(step_execution).await?;
        }

        info!(execution_id = %execution.id, workflow_id = %workflow_id, "workflow execution started");
        Ok(execution)
    }

    pub async fn get_current_step(&self, execution_id: ExecutionId) -> Result<Option<StepExecution>> {
        let steps = self.store.list_step_executions(execution_id).await?;
        Ok(steps.into_iter().find(|s| !s.status.is_terminal()))
    }

    pub async fn get_pending_steps(&self, execution_id: ExecutionId) -> Result<Vec<StepExecution>> {
        let steps = self.store.list_step_executions(execution_id).await?;
        Ok(steps
            .into_iter()
            .filter(|s| matches!(s.status, StepStatus::Pending | StepStatus::Running))
            .collect())
    }

    #[instrument(skip(self, output))]
    pub async fn complete_step(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        step_name: &str,
        output: serde_json::Value,
    ) -> Result<WorkflowExecution> {
        let mut steps = self.store.list_step_executions(execution_id).await?;
        let step = steps
            .iter_mut()
            .find(|s| s.step_name == step_name)
            .ok_or_else(|| CoreError::not_found("step", step_name))?;

        // Idempotent: a duplicate completion of an already-completed step is
        // a no-op success.
        if step.status == StepStatus::Completed {
            return self.store.get_execution(tenant_id, execution_id).await;
        }
        if step.status != StepStatus::Running {
            return Err(CoreError::illegal_transition(step.status, StepStatus::Completed));
        }

        step.status = StepStatus::Completed;
        step.completed_at = Some(self.clock.now());
        step.output = output;
        let step = step.clone();
        self.store.upsert_step_execution(step.clone()).await?;
        self.bus
            .publish(Event::WorkflowStepCompleted {
                execution_id,
                step_id: step.step_id.clone(),
            })
            .await;

        self.advance_band(tenant_id, execution_id, &steps).await
    }

    /// Inspect the current band's completion state and, if every member is
    /// terminal, either open the next band or complete the execution.
    async fn advance_band(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        steps_before: &[StepExecution],
    ) -> Result<WorkflowExecution> {
        let execution = self.store.get_execution(tenant_id, execution_id).await?;

        // A paused (or otherwise non-running) execution keeps in-flight steps
        // as they are; completing one of them must not open the next band.
        if execution.status != ExecutionStatus::Running {
            return Ok(execution);
        }

        let definition = self.store.get_workflow(tenant_id, execution.workflow_id).await?;
        let bands = definition.bands();

        let steps = self.store.list_step_executions(execution_id).await?;
        let step_status = |id: &str| steps.iter().find(|s| s.step_id == id).map(|s| s.status);

        let current_band_index = bands.iter().position(|band| {
            definition.steps[band.clone()]
                .iter()
                .any(|s| step_status(&s.id).is_some_and(|status| !status.is_terminal()) || step_status(&s.id) == Some(StepStatus::Running))
        });

        // If no band has an in-flight step, find the first band that isn't
        // fully terminal yet (covers the instant right after the last
        // member of a band just completed).
        let target_band = current_band_index.or_else(|| {
            bands.iter().position(|band| {
                !definition.steps[band.clone()]
                    .iter()
                    .all(|s| step_status(&s.id).map(|st| st.is_terminal()).unwrap_or(false))
            })
        });

        let Some(band_idx) = target_band else {
            return self.complete_execution(tenant_id, execution_id).await;
        };

        let band_done = definition.steps[bands[band_idx].clone()]
            .iter()
            .all(|s| step_status(&s.id).map(|st| st.is_terminal()).unwrap_or(false));

        if !band_done {
            return self.store.get_execution(tenant_id, execution_id).await;
        }

        let band_failed = definition.steps[bands[band_idx].clone()]
            .iter()
            .any(|s| step_status(&s.id) == Some(StepStatus::Failed) && s.required);
        if band_failed {
            return self.fail_execution(tenant_id, execution_id, "required step failed").await;
        }

        match bands.get(band_idx + 1) {
            Some(next_band) => {
                for step in &definition.steps[next_band.clone()] {
                    if let Some(mut existing) = steps.iter().find(|s| s.step_id == step.id).cloned() {
                        existing.status = StepStatus::Running;
                        existing.started_at = Some(self.clock.now());
                        self.store.upsert_step_execution(existing).await?;
                    }
                }
                let _ = steps_before;
                self.store.get_execution(tenant_id, execution_id).await
            }
            None => self.complete_execution(tenant_id, execution_id).await,
        }
    }

    async fn complete_execution(&self, tenant_id: TenantId, execution_id: ExecutionId) -> Result<WorkflowExecution> {
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_execution(
                tenant_id,
                execution_id,
                Box::new(move |e| {
                    e.status = ExecutionStatus::Completed;
                    e.completed_at = Some(now);
                }),
            )
            .await?;
        self.bus
            .publish(Event::WorkflowExecutionFinished {
                execution_id,
                workflow_id: updated.workflow_id,
            })
            .await;
        Ok(updated)
    }

    async fn fail_execution(&self, tenant_id: TenantId, execution_id: ExecutionId, _reason: &str) -> Result<WorkflowExecution> {
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_execution(
                tenant_id,
                execution_id,
                Box::new(move |e| {
                    e.status = ExecutionStatus::Failed;
                    e.completed_at = Some(now);
                }),
            )
            .await?;
        self.bus
            .publish(Event::WorkflowExecutionFinished {
                execution_id,
                workflow_id: updated.workflow_id,
            })
            .await;
        Ok(updated)
    }

    pub async fn fail_step(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        step_name: &str,
        error: &str,
        _details: serde_json::Value,
    ) -> Result<WorkflowExecution> {
        let mut steps = self.store.list_step_executions(execution_id).await?;
        let step = steps
            .iter_mut()
            .find(|s| s.step_name == step_name)
            .ok_or_else(|| CoreError::not_found("step", step_name))?;
        if step.status != StepStatus::Running {
            return Err(CoreError::illegal_transition(step.status, StepStatus::Failed));
        }

        step.status = StepStatus::Failed;
        step.completed_at = Some(self.clock.now());
        step.error = Some(error.to_string());
        let retries_left = {
            let execution = self.store.get_execution(tenant_id, execution_id).await?;
            let definition = self.store.get_workflow(tenant_id, execution.workflow_id).await?;
            definition
                .steps
                .iter()
                .find(|s| s.id == step.step_id)
                .map(|def| (def.retries, def.required))
        };
        self.store.upsert_step_execution(step.clone()).await?;

        if let Some((retries, required)) = retries_left {
            if step.retry_count < retries {
                // Stays Failed until an explicit RetryStep call.
                return self.store.get_execution(tenant_id, execution_id).await;
            }
            if required {
                return self.fail_execution(tenant_id, execution_id, error).await;
            }
        }
        self.advance_band(tenant_id, execution_id, &steps).await
    }

    pub async fn retry_step(&self, tenant_id: TenantId, execution_id: ExecutionId, step_name: &str) -> Result<StepExecution> {
        let mut steps = self.store.list_step_executions(execution_id).await?;
        let step = steps
            .iter_mut()
            .find(|s| s.step_name == step_name)
            .ok_or_else(|| CoreError::not_found("step", step_name))?;
        if step.status != StepStatus::Failed {
            return Err(CoreError::illegal_transition(step.status, StepStatus::Running));
        }

        let execution = self.store.get_execution(tenant_id, execution_id).await?;
        let definition = self.store.get_workflow(tenant_id, execution.workflow_id).await?;
        let max_retries = definition
            .steps
            .iter()
            .find(|s| s.id == step.step_id)
            .map(|s| s.retries)
            .unwrap_or(0);

        if step.retry_count >= max_retries {
            return Err(CoreError::RetriesExhausted {
                retry_count: step.retry_count,
                max_retries,
            });
        }

        step.status = StepStatus::Running;
        step.retry_count += 1;
        step.started_at = Some(self.clock.now());
        step.completed_at = None;
        step.error = None;
        self.store.upsert_step_execution(step.clone()).await?;
        Ok(step.clone())
    }

    pub async fn pause_execution(&self, tenant_id: TenantId, execution_id: ExecutionId, _reason: &str) -> Result<WorkflowExecution> {
        let execution = self.store.get_execution(tenant_id, execution_id).await?;
        if execution.status != ExecutionStatus::Running {
            return Err(CoreError::illegal_transition(execution.status, ExecutionStatus::Paused));
        }
        self.store
            .cas_update_execution(
                tenant_id,
                execution_id,
                Box::new(|e| e.status = ExecutionStatus::Paused),
            )
            .await
    }

    pub async fn resume_execution(&self, tenant_id: TenantId, execution_id: ExecutionId) -> Result<WorkflowExecution> {
        let execution = self.store.get_execution(tenant_id, execution_id).await?;
        if execution.status != ExecutionStatus::Paused {
            return Err(CoreError::illegal_transition(execution.status, ExecutionStatus::Running));
        }
        self.store
            .cas_update_execution(
                tenant_id,
                execution_id,
                Box::new(|e| e.status = ExecutionStatus::Running),
            )
            .await
    }

    pub async fn cancel_execution(&self, tenant_id: TenantId, execution_id: ExecutionId, _reason: &str) -> Result<WorkflowExecution> {
        let execution = self.store.get_execution(tenant_id, execution_id).await?;
        if execution.status.is_terminal() {
            return Err(CoreError::illegal_transition(execution.status, ExecutionStatus::Cancelled));
        }
        let now = self.clock.now();
        let updated = self
            .store
            .cas_update_execution(
                tenant_id,
                execution_id,
                Box::new(move |e| {
                    e.status = ExecutionStatus::Cancelled;
                    e.completed_at = Some(now);
                }),
            )
            .await?;

        let steps = self.store.list_step_executions(execution_id).await?;
        for mut step in steps.into_iter().filter(|s| !s.status.is_terminal()) {
            step.status = StepStatus::Skipped;
            step.completed_at = Some(now);
            self.store.upsert_step_execution(step).await?;
        }

        Ok(updated)
    }

    pub async fn get_execution_history(&self, execution_id: ExecutionId) -> Result<Vec<StepExecution>> {
        self.store.list_step_executions(execution_id).await
    }

    pub async fn get_workflow_history(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkflowExecution>> {
        self.store.get_workflow_history(tenant_id, workflow_id, limit, offset).await
    }

    pub async fn get_workflow_metrics(&self, tenant_id: TenantId, workflow_id: WorkflowId) -> Result<WorkflowMetrics> {
        self.store.get_workflow_metrics(tenant_id, workflow_id).await
    }
}
