//! Postgres-backed [`Store`] implementation. Every write opens (or reuses)
//! a transaction; compare-and-set methods run at `SERIALIZABLE` isolation
//! and re-read the row with `FOR UPDATE` before applying the caller's
//! mutation, so a concurrent writer that changed the row first causes this
//! transaction to fail on commit rather than clobber it.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Row};

use orchestrator_core::error::{CoreError, Result};
use orchestrator_core::ids::{AgentId, DocumentId, ExecutionId, TaskId, TenantId, WorkflowId, WorkspaceId};
use orchestrator_core::models::{
    DocumentOpType, DocumentOperation, MemberActivity, MemberRole, NewDelegation, NewDocument,
    NewDocumentOperation, NewTask, NewWorkspace, SharedDocument, StateOp, StepExecution, StepStatus,
    Task, TaskDelegation, TaskFilter, TaskStatus, TaskTree, WorkflowDefinition,
    WorkflowExecution, WorkflowMetrics, Workspace, WorkspaceFilter, WorkspaceMember, WorkspaceState,
    WorkspaceStatus, WorkspaceUpdate,
};
use orchestrator_core::repository::Store;
use orchestrator_core::services::DocumentService;
use orchestrator_core::state_ops;
use orchestrator_core::VectorClock;

use crate::common::{
    completion_mode_to_str, coordination_mode_to_str, map_sqlx_error, row_to_task, status_to_str,
    str_to_completion_mode, str_to_coordination_mode, str_to_status,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_task(&self, tenant_id: TenantId, task: NewTask, idempotency_key: Option<&str>) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        if let Some(key) = idempotency_key {
            let existing: Option<uuid::Uuid> =
                sqlx::query_scalar("SELECT task_id FROM idempotency_keys WHERE tenant_id = $1 AND key = $2")
                    .bind(tenant_id.as_uuid())
                    .bind(key)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            if let Some(task_id) = existing {
                let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2")
                    .bind(tenant_id.as_uuid())
                    .bind(task_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                tx.commit().await.map_err(map_sqlx_error)?;
                return row_to_task(&row);
            }
        }

        let id = TaskId::new();
        let created_at = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO tasks (tenant_id, id, task_type, created_by, created_at, parent_task_id, \
             status, priority, retry_count, max_retries, timeout_seconds, parameters, tags, title, description) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(&task.task_type)
        .bind(task.created_by.as_str())
        .bind(created_at)
        .bind(task.parent_task_id.map(|p| p.as_uuid()))
        .bind(status_to_str(TaskStatus::Pending))
        .bind(task.priority)
        .bind(0i32)
        .bind(task.max_retries as i32)
        .bind(task.timeout_seconds)
        .bind(&task.parameters)
        .bind(serde_json::to_value(&task.tags).unwrap())
        .bind(&task.title)
        .bind(&task.description)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(key) = idempotency_key {
            sqlx::query("INSERT INTO idempotency_keys (tenant_id, key, task_id) VALUES ($1, $2, $3)")
                .bind(tenant_id.as_uuid())
                .bind(key)
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        row_to_task(&row)
    }

    async fn create_tasks_batch(&self, tenant_id: TenantId, tasks: Vec<NewTask>) -> Result<Vec<Task>> {
        let mut created = Vec::with_capacity(tasks.len());
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for task in tasks {
            let id = TaskId::new();
            sqlx::query(
                "INSERT INTO tasks (tenant_id, id, task_type, created_by, created_at, parent_task_id, \
                 status, priority, retry_count, max_retries, timeout_seconds, parameters, tags, title, description) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
            )
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .bind(&task.task_type)
            .bind(task.created_by.as_str())
            .bind(chrono::Utc::now())
            .bind(task.parent_task_id.map(|p| p.as_uuid()))
            .bind(status_to_str(TaskStatus::Pending))
            .bind(task.priority)
            .bind(0i32)
            .bind(task.max_retries as i32)
            .bind(task.timeout_seconds)
            .bind(&task.parameters)
            .bind(serde_json::to_value(&task.tags).unwrap())
            .bind(&task.title)
            .bind(&task.description)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id.as_uuid())
                .bind(id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            created.push(row_to_task(&row)?);
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(created)
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> Result<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("task", id))?;
        row_to_task(&row)
    }

    async fn get_tasks_batch(&self, tenant_id: TenantId, ids: &[TaskId]) -> Result<Vec<Task>> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|i| i.as_uuid()).collect();
        let rows = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = ANY($2)")
            .bind(tenant_id.as_uuid())
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn search_tasks(&self, tenant_id: TenantId, text: &str, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM tasks WHERE tenant_id = ");
        qb.push_bind(tenant_id.as_uuid());
        if !text.is_empty() {
            qb.push(" AND (title ILIKE ");
            qb.push_bind(format!("%{text}%"));
            qb.push(" OR description ILIKE ");
            qb.push_bind(format!("%{text}%"));
            qb.push(")");
        }
        push_task_filter(&mut qb, &filter);
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }
        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn get_agent_tasks(&self, tenant_id: TenantId, agent: &AgentId, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM tasks WHERE tenant_id = ");
        qb.push_bind(tenant_id.as_uuid());
        qb.push(" AND assigned_to = ");
        qb.push_bind(agent.as_str());
        push_task_filter(&mut qb, &filter);
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }
        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn cas_update_task(
        &self,
        tenant_id: TenantId,
        id: TaskId,
        expected_status: TaskStatus,
        mutate: Box<dyn FnOnce(&mut Task) + Send>,
    ) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("task", id))?;
        let mut task = row_to_task(&row)?;
        if task.status != expected_status {
            return Err(CoreError::Conflict(format!(
                "task {id} status is {} (expected {expected_status})",
                task.status
            )));
        }
        mutate(&mut task);

        sqlx::query(
            "UPDATE tasks SET status=$1, assigned_to=$2, assigned_at=$3, started_at=$4, completed_at=$5, \
             retry_count=$6, result=$7, parameters=$8, coordination_mode=$9, completion_mode=$10 \
             WHERE tenant_id=$11 AND id=$12",
        )
        .bind(status_to_str(task.status))
        .bind(task.assigned_to.as_ref().map(|a| a.as_str()))
        .bind(task.assigned_at)
        .bind(task.started_at)
        .bind(task.completed_at)
        .bind(task.retry_count as i32)
        .bind(&task.result)
        .bind(&task.parameters)
        .bind(task.coordination_mode.map(coordination_mode_to_str))
        .bind(task.completion_mode.map(completion_mode_to_str))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(task)
    }

    async fn insert_delegation(&self, tenant_id: TenantId, delegation: NewDelegation) -> Result<TaskDelegation> {
        let task = self.get_task(tenant_id, delegation.task_id).await?;
        let created_at = chrono::Utc::now();
        let delegation_type_str = match delegation.delegation_type {
            orchestrator_core::models::DelegationType::Manual => "Manual",
            orchestrator_core::models::DelegationType::Automatic => "Automatic",
            orchestrator_core::models::DelegationType::LoadBalance => "LoadBalance",
            orchestrator_core::models::DelegationType::Failover => "Failover",
        };
        sqlx::query(
            "INSERT INTO task_delegations (tenant_id, task_id, task_created_at, from_agent_id, to_agent_id, reason, delegation_type, metadata, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
        )
        .bind(tenant_id.as_uuid())
        .bind(delegation.task_id.as_uuid())
        .bind(task.created_at)
        .bind(delegation.from_agent_id.as_str())
        .bind(delegation.to_agent_id.as_str())
        .bind(&delegation.reason)
        .bind(delegation_type_str)
        .bind(&delegation.metadata)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(TaskDelegation {
            task_id: delegation.task_id,
            task_created_at: task.created_at,
            from_agent_id: delegation.from_agent_id,
            to_agent_id: delegation.to_agent_id,
            reason: delegation.reason,
            delegation_type: delegation.delegation_type,
            metadata: delegation.metadata,
            created_at,
        })
    }

    async fn get_task_tree(&self, tenant_id: TenantId, root_id: TaskId) -> Result<TaskTree> {
        let root = self.get_task(tenant_id, root_id).await?;
        let mut children: HashMap<TaskId, Vec<Task>> = HashMap::new();
        let mut frontier = vec![root_id];
        while let Some(parent_id) = frontier.pop() {
            let rows = sqlx::query("SELECT * FROM tasks WHERE tenant_id = $1 AND parent_task_id = $2")
                .bind(tenant_id.as_uuid())
                .bind(parent_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let kids: Vec<Task> = rows.iter().map(row_to_task).collect::<Result<_>>()?;
            for kid in &kids {
                frontier.push(kid.id);
            }
            if !kids.is_empty() {
                children.insert(parent_id, kids);
            }
        }
        Ok(TaskTree {
            root: Some(root),
            children,
        })
    }

    async fn resolve_idempotency_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<TaskId>> {
        let id: Option<uuid::Uuid> =
            sqlx::query_scalar("SELECT task_id FROM idempotency_keys WHERE tenant_id = $1 AND key = $2")
                .bind(tenant_id.as_uuid())
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(id.map(TaskId::from_uuid))
    }

    async fn bind_idempotency_key(&self, tenant_id: TenantId, key: &str, task_id: TaskId) -> Result<()> {
        sqlx::query("INSERT INTO idempotency_keys (tenant_id, key, task_id) VALUES ($1, $2, $3)")
            .bind(tenant_id.as_uuid())
            .bind(key)
            .bind(task_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn create_workflow(&self, tenant_id: TenantId, definition: WorkflowDefinition) -> Result<WorkflowDefinition> {
        let workflow_type_str = match definition.workflow_type {
            orchestrator_core::models::WorkflowType::Standard => "Standard",
            orchestrator_core::models::WorkflowType::Collaborative => "Collaborative",
        };
        sqlx::query(
            "INSERT INTO workflows (tenant_id, id, name, workflow_type, created_by, is_active, steps, config) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(tenant_id.as_uuid())
        .bind(definition.id.as_uuid())
        .bind(&definition.name)
        .bind(workflow_type_str)
        .bind(definition.created_by.as_str())
        .bind(definition.is_active)
        .bind(serde_json::to_value(&definition.steps).unwrap())
        .bind(&definition.config)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(definition)
    }

    async fn get_workflow(&self, tenant_id: TenantId, id: WorkflowId) -> Result<WorkflowDefinition> {
        let row = sqlx::query("SELECT * FROM workflows WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("workflow", id))?;
        row_to_workflow(&row)
    }

    async fn list_workflows(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>> {
        let rows = sqlx::query("SELECT * FROM workflows WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_workflow).collect()
    }

    async fn create_execution(&self, tenant_id: TenantId, execution: WorkflowExecution) -> Result<WorkflowExecution> {
        sqlx::query(
            "INSERT INTO workflow_executions (tenant_id, id, workflow_id, initiator_id, status, started_at, completed_at, input, context) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
        )
        .bind(tenant_id.as_uuid())
        .bind(execution.id.as_uuid())
        .bind(execution.workflow_id.as_uuid())
        .bind(execution.initiator_id.as_str())
        .bind(execution_status_to_str(execution.status))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.input)
        .bind(&execution.context)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(execution)
    }

    async fn get_execution(&self, tenant_id: TenantId, id: ExecutionId) -> Result<WorkflowExecution> {
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("execution", id))?;
        row_to_execution(&row)
    }

    async fn cas_update_execution(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        mutate: Box<dyn FnOnce(&mut WorkflowExecution) + Send>,
    ) -> Result<WorkflowExecution> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("execution", id))?;
        let mut execution = row_to_execution(&row)?;
        mutate(&mut execution);
        sqlx::query("UPDATE workflow_executions SET status=$1, completed_at=$2, context=$3 WHERE tenant_id=$4 AND id=$5")
            .bind(execution_status_to_str(execution.status))
            .bind(execution.completed_at)
            .bind(&execution.context)
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(execution)
    }

    async fn list_step_executions(&self, execution_id: ExecutionId) -> Result<Vec<StepExecution>> {
        let rows = sqlx::query("SELECT * FROM workflow_step_executions WHERE execution_id = $1")
            .bind(execution_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_step_execution).collect()
    }

    async fn upsert_step_execution(&self, step: StepExecution) -> Result<StepExecution> {
        sqlx::query(
            "INSERT INTO workflow_step_executions (execution_id, step_id, step_name, status, retry_count, started_at, completed_at, output, error) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9) \
             ON CONFLICT (execution_id, step_id) DO UPDATE SET \
             status=EXCLUDED.status, retry_count=EXCLUDED.retry_count, started_at=EXCLUDED.started_at, \
             completed_at=EXCLUDED.completed_at, output=EXCLUDED.output, error=EXCLUDED.error",
        )
        .bind(step.execution_id.as_uuid())
        .bind(&step.step_id)
        .bind(&step.step_name)
        .bind(step_status_to_str(step.status))
        .bind(step.retry_count as i32)
        .bind(step.started_at)
        .bind(step.completed_at)
        .bind(&step.output)
        .bind(&step.error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(step)
    }

    async fn get_workflow_history(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkflowExecution>> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions WHERE tenant_id = $1 AND workflow_id = $2 \
             ORDER BY started_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(tenant_id.as_uuid())
        .bind(workflow_id.as_uuid())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_execution).collect()
    }

    async fn get_workflow_metrics(&self, tenant_id: TenantId, workflow_id: WorkflowId) -> Result<WorkflowMetrics> {
        let executions = self.get_workflow_history(tenant_id, workflow_id, u32::MAX, 0).await?;
        let total_executions = executions.len() as u64;
        let successful_runs = executions
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Completed)
            .count() as u64;
        let failed_runs = executions
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Failed)
            .count() as u64;
        let completed: Vec<_> = executions
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Completed && e.completed_at.is_some())
            .collect();
        let average_run_time_seconds = if completed.is_empty() {
            0.0
        } else {
            let total: i64 = completed
                .iter()
                .map(|e| (e.completed_at.unwrap() - e.started_at).num_seconds())
                .sum();
            total as f64 / completed.len() as f64
        };
        Ok(WorkflowMetrics {
            total_executions,
            successful_runs,
            failed_runs,
            average_run_time_seconds,
        })
    }

    async fn create_workspace(&self, tenant_id: TenantId, workspace: NewWorkspace) -> Result<Workspace> {
        let id = WorkspaceId::new();
        sqlx::query(
            "INSERT INTO workspaces (tenant_id, id, name, description, owner_id, is_public, status, settings, tags) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(&workspace.name)
        .bind(&workspace.description)
        .bind(workspace.owner_id.as_str())
        .bind(workspace.is_public)
        .bind("Active")
        .bind(&workspace.settings)
        .bind(serde_json::to_value(&workspace.tags).unwrap())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("INSERT INTO workspace_state (workspace_id, data, version) VALUES ($1, $2, 0)")
            .bind(id.as_uuid())
            .bind(serde_json::json!({}))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        self.get_workspace(tenant_id, id).await
    }

    async fn get_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<Workspace> {
        let row = sqlx::query("SELECT * FROM workspaces WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("workspace", id))?;
        row_to_workspace(&row)
    }

    async fn update_workspace(&self, tenant_id: TenantId, id: WorkspaceId, update: WorkspaceUpdate) -> Result<Workspace> {
        let mut workspace = self.get_workspace(tenant_id, id).await?;
        if let Some(name) = update.name {
            workspace.name = name;
        }
        if let Some(description) = update.description {
            workspace.description = description;
        }
        if let Some(is_public) = update.is_public {
            workspace.is_public = is_public;
        }
        if let Some(settings) = update.settings {
            workspace.settings = settings;
        }
        if let Some(tags) = update.tags {
            workspace.tags = tags;
        }
        if let Some(status) = update.status {
            workspace.status = status;
        }
        let status_str = workspace_status_to_str(workspace.status);
        sqlx::query(
            "UPDATE workspaces SET name=$1, description=$2, is_public=$3, settings=$4, tags=$5, status=$6 \
             WHERE tenant_id=$7 AND id=$8",
        )
        .bind(&workspace.name)
        .bind(&workspace.description)
        .bind(workspace.is_public)
        .bind(&workspace.settings)
        .bind(serde_json::to_value(&workspace.tags).unwrap())
        .bind(status_str)
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(workspace)
    }

    async fn delete_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<()> {
        sqlx::query("DELETE FROM workspaces WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn search_workspaces(&self, tenant_id: TenantId, text: &str, filter: WorkspaceFilter) -> Result<Vec<Workspace>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM workspaces WHERE tenant_id = ");
        qb.push_bind(tenant_id.as_uuid());
        if !text.is_empty() {
            qb.push(" AND name ILIKE ");
            qb.push_bind(format!("%{text}%"));
        }
        if let Some(owner_id) = &filter.owner_id {
            qb.push(" AND owner_id = ");
            qb.push_bind(owner_id.as_str().to_string());
        }
        if let Some(is_active) = filter.is_active {
            qb.push(" AND status = ");
            qb.push_bind(if is_active { "Active" } else { "Archived" });
        }
        if let Some(tag) = &filter.tag {
            qb.push(" AND tags @> ");
            qb.push_bind(serde_json::json!([tag]));
        }
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }
        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(row_to_workspace).collect()
    }

    async fn add_member(&self, workspace_id: WorkspaceId, member: WorkspaceMember) -> Result<WorkspaceMember> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, agent_id, role, joined_at) VALUES ($1,$2,$3,$4)",
        )
        .bind(workspace_id.as_uuid())
        .bind(member.agent_id.as_str())
        .bind(member_role_to_str(member.role))
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(member)
    }

    async fn remove_member(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()> {
        sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1 AND agent_id = $2")
            .bind(workspace_id.as_uuid())
            .bind(agent.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_member_role(&self, workspace_id: WorkspaceId, agent: &AgentId, role: MemberRole) -> Result<WorkspaceMember> {
        sqlx::query("UPDATE workspace_members SET role = $1 WHERE workspace_id = $2 AND agent_id = $3")
            .bind(member_role_to_str(role))
            .bind(workspace_id.as_uuid())
            .bind(agent.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let row = sqlx::query("SELECT * FROM workspace_members WHERE workspace_id = $1 AND agent_id = $2")
            .bind(workspace_id.as_uuid())
            .bind(agent.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("workspace member", agent))?;
        row_to_member(&row)
    }

    async fn list_members(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>> {
        let rows = sqlx::query("SELECT * FROM workspace_members WHERE workspace_id = $1")
            .bind(workspace_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_member).collect()
    }

    async fn get_member_activity(&self, workspace_id: WorkspaceId) -> Result<Vec<MemberActivity>> {
        let rows = sqlx::query(
            "SELECT agent_id, last_active_at, action_count FROM workspace_members WHERE workspace_id = $1",
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| {
                Ok(MemberActivity {
                    agent_id: AgentId::new(row.get::<String, _>("agent_id")),
                    last_active_at: row
                        .get::<Option<chrono::DateTime<chrono::Utc>>, _>("last_active_at")
                        .unwrap_or_else(chrono::Utc::now),
                    action_count: row.get::<i64, _>("action_count") as u64,
                })
            })
            .collect()
    }

    async fn create_document(&self, tenant_id: TenantId, workspace_id: WorkspaceId, document: NewDocument) -> Result<SharedDocument> {
        let id = DocumentId::new();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO shared_documents (tenant_id, id, workspace_id, title, content, content_type, doc_type, \
             created_by, created_at, updated_at, metadata, vector_clock, version) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,0)",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(workspace_id.as_uuid())
        .bind(&document.title)
        .bind(&document.content)
        .bind(&document.content_type)
        .bind(&document.doc_type)
        .bind(document.created_by.as_str())
        .bind(now)
        .bind(now)
        .bind(&document.metadata)
        .bind(serde_json::to_value(VectorClock::new()).unwrap())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        self.get_document(tenant_id, id).await
    }

    async fn get_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<SharedDocument> {
        let row = sqlx::query("SELECT * FROM shared_documents WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("document", id))?;
        row_to_document(&row)
    }

    async fn list_documents(&self, workspace_id: WorkspaceId) -> Result<Vec<SharedDocument>> {
        let rows = sqlx::query("SELECT * FROM shared_documents WHERE workspace_id = $1")
            .bind(workspace_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_document).collect()
    }

    async fn apply_document_operation(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        op: NewDocumentOperation,
    ) -> Result<(SharedDocument, DocumentOperation)> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query("SELECT * FROM shared_documents WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
            .bind(tenant_id.as_uuid())
            .bind(document_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("document", document_id))?;
        let mut document = row_to_document(&row)?;

        let current_clock: VectorClock = serde_json::from_value(
            row.get::<serde_json::Value, _>("vector_clock"),
        )
        .map_err(|e| CoreError::Internal(format!("corrupt vector clock: {e}")))?;
        let new_clock = current_clock.merged(&op.vector_clock).incremented(&op.agent_id);

        document.content = DocumentService::apply_content(&document.content, op.op_type, &op.path, &op.value);
        document.version += 1;
        document.updated_at = chrono::Utc::now();

        sqlx::query(
            "UPDATE shared_documents SET content=$1, version=$2, updated_at=$3, vector_clock=$4 \
             WHERE tenant_id=$5 AND id=$6",
        )
        .bind(&document.content)
        .bind(document.version as i64)
        .bind(document.updated_at)
        .bind(serde_json::to_value(&new_clock).unwrap())
        .bind(tenant_id.as_uuid())
        .bind(document_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let operation = DocumentOperation {
            id: uuid::Uuid::new_v4(),
            document_id,
            op_type: op.op_type,
            path: op.path.clone(),
            value: op.value.clone(),
            agent_id: op.agent_id.clone(),
            vector_clock: new_clock,
            applied_at: document.updated_at,
        };
        sqlx::query(
            "INSERT INTO document_operations (id, document_id, op_type, path, value, agent_id, vector_clock, applied_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(operation.id)
        .bind(document_id.as_uuid())
        .bind(doc_op_type_to_str(operation.op_type))
        .bind(&operation.path)
        .bind(&operation.value)
        .bind(operation.agent_id.as_str())
        .bind(serde_json::to_value(&operation.vector_clock).unwrap())
        .bind(operation.applied_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok((document, operation))
    }

    async fn get_document_operations(&self, document_id: DocumentId) -> Result<Vec<DocumentOperation>> {
        let rows = sqlx::query("SELECT * FROM document_operations WHERE document_id = $1 ORDER BY applied_at ASC")
            .bind(document_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_document_operation).collect()
    }

    async fn get_state(&self, workspace_id: WorkspaceId) -> Result<WorkspaceState> {
        let row = sqlx::query("SELECT data, version FROM workspace_state WHERE workspace_id = $1")
            .bind(workspace_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("workspace state", workspace_id))?;
        Ok(WorkspaceState {
            data: row.get("data"),
            version: row.get::<i64, _>("version") as u64,
        })
    }

    async fn apply_state_op(&self, workspace_id: WorkspaceId, op: StateOp) -> Result<WorkspaceState> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let row = sqlx::query("SELECT data, version FROM workspace_state WHERE workspace_id = $1 FOR UPDATE")
            .bind(workspace_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoreError::not_found("workspace state", workspace_id))?;
        let mut data: serde_json::Value = row.get("data");
        let version: i64 = row.get("version");

        state_ops::apply(&mut data, &op)?;

        sqlx::query("UPDATE workspace_state SET data = $1, version = $2 WHERE workspace_id = $3")
            .bind(&data)
            .bind(version + 1)
            .bind(workspace_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(WorkspaceState {
            data,
            version: (version + 1) as u64,
        })
    }

    async fn cleanup_tenant(&self, tenant_id: TenantId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for table in [
            "task_delegations",
            "tasks",
            "idempotency_keys",
            "workflow_executions",
            "workflows",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE tenant_id = $1"))
                .bind(tenant_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        // workspace-scoped tables have no tenant_id column directly; clean
        // up via their owning workspace rows.
        let workspace_ids: Vec<uuid::Uuid> = sqlx::query_scalar("SELECT id FROM workspaces WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        for ws_id in &workspace_ids {
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1")
                .bind(ws_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            sqlx::query("DELETE FROM workspace_state WHERE workspace_id = $1")
                .bind(ws_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        sqlx::query("DELETE FROM document_operations WHERE document_id IN (SELECT id FROM shared_documents WHERE tenant_id = $1)")
            .bind(tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM shared_documents WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM workspaces WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn push_task_filter(qb: &mut QueryBuilder<Postgres>, filter: &TaskFilter) {
    if let Some(assigned_to) = &filter.assigned_to {
        qb.push(" AND assigned_to = ");
        qb.push_bind(assigned_to.as_str().to_string());
    }
    if let Some(created_by) = &filter.created_by {
        qb.push(" AND created_by = ");
        qb.push_bind(created_by.as_str().to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status_to_str(status));
    }
    if let Some(task_type) = &filter.task_type {
        qb.push(" AND task_type = ");
        qb.push_bind(task_type.clone());
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND tags @> ");
        qb.push_bind(serde_json::json!([tag]));
    }
    if let Some(date_from) = filter.date_from {
        qb.push(" AND created_at >= ");
        qb.push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        qb.push(" AND created_at <= ");
        qb.push_bind(date_to);
    }
    if let Some(completed_after) = filter.completed_after {
        qb.push(" AND completed_at >= ");
        qb.push_bind(completed_after);
    }
    if let Some(completed_before) = filter.completed_before {
        qb.push(" AND completed_at <= ");
        qb.push_bind(completed_before);
    }
}

fn execution_status_to_str(status: orchestrator_core::models::ExecutionStatus) -> &'static str {
    use orchestrator_core::models::ExecutionStatus::*;
    match status {
        Running => "Running",
        Paused => "Paused",
        Completed => "Completed",
        Failed => "Failed",
        Cancelled => "Cancelled",
    }
}

fn str_to_execution_status(s: &str) -> Result<orchestrator_core::models::ExecutionStatus> {
    use orchestrator_core::models::ExecutionStatus::*;
    Ok(match s {
        "Running" => Running,
        "Paused" => Paused,
        "Completed" => Completed,
        "Failed" => Failed,
        "Cancelled" => Cancelled,
        other => return Err(CoreError::Internal(format!("invalid execution status: {other}"))),
    })
}

fn step_status_to_str(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "Pending",
        StepStatus::Running => "Running",
        StepStatus::Completed => "Completed",
        StepStatus::Failed => "Failed",
        StepStatus::Skipped => "Skipped",
    }
}

fn str_to_step_status(s: &str) -> Result<StepStatus> {
    Ok(match s {
        "Pending" => StepStatus::Pending,
        "Running" => StepStatus::Running,
        "Completed" => StepStatus::Completed,
        "Failed" => StepStatus::Failed,
        "Skipped" => StepStatus::Skipped,
        other => return Err(CoreError::Internal(format!("invalid step status: {other}"))),
    })
}

fn member_role_to_str(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Viewer => "Viewer",
        MemberRole::Member => "Member",
        MemberRole::Admin => "Admin",
        MemberRole::Owner => "Owner",
    }
}

fn str_to_member_role(s: &str) -> Result<MemberRole> {
    Ok(match s {
        "Viewer" => MemberRole::Viewer,
        "Member" => MemberRole::Member,
        "Admin" => MemberRole::Admin,
        "Owner" => MemberRole::Owner,
        other => return Err(CoreError::Internal(format!("invalid member role: {other}"))),
    })
}

fn workspace_status_to_str(status: WorkspaceStatus) -> &'static str {
    match status {
        WorkspaceStatus::Active => "Active",
        WorkspaceStatus::Archived => "Archived",
        WorkspaceStatus::Deleted => "Deleted",
    }
}

fn str_to_workspace_status(s: &str) -> Result<WorkspaceStatus> {
    Ok(match s {
        "Active" => WorkspaceStatus::Active,
        "Archived" => WorkspaceStatus::Archived,
        "Deleted" => WorkspaceStatus::Deleted,
        other => return Err(CoreError::Internal(format!("invalid workspace status: {other}"))),
    })
}

fn doc_op_type_to_str(op: DocumentOpType) -> &'static str {
    match op {
        DocumentOpType::Insert => "Insert",
        DocumentOpType::Replace => "Replace",
        DocumentOpType::Delete => "Delete",
    }
}

fn str_to_doc_op_type(s: &str) -> Result<DocumentOpType> {
    Ok(match s {
        "Insert" => DocumentOpType::Insert,
        "Replace" => DocumentOpType::Replace,
        "Delete" => DocumentOpType::Delete,
        other => return Err(CoreError::Internal(format!("invalid document op type: {other}"))),
    })
}

fn row_to_workflow(row: &sqlx::postgres::PgRow) -> Result<WorkflowDefinition> {
    let workflow_type_str: String = row.get("workflow_type");
    let workflow_type = match workflow_type_str.as_str() {
        "Standard" => orchestrator_core::models::WorkflowType::Standard,
        "Collaborative" => orchestrator_core::models::WorkflowType::Collaborative,
        other => return Err(CoreError::Internal(format!("invalid workflow type: {other}"))),
    };
    let steps_json: serde_json::Value = row.get("steps");
    let steps = serde_json::from_value(steps_json).map_err(|e| CoreError::Internal(format!("corrupt steps json: {e}")))?;
    Ok(WorkflowDefinition {
        id: WorkflowId::from_uuid(row.get("id")),
        tenant_id: TenantId::from_uuid(row.get("tenant_id")),
        name: row.get("name"),
        workflow_type,
        created_by: AgentId::new(row.get::<String, _>("created_by")),
        is_active: row.get("is_active"),
        steps,
        config: row.get("config"),
    })
}

fn row_to_execution(row: &sqlx::postgres::PgRow) -> Result<WorkflowExecution> {
    let status_str: String = row.get("status");
    Ok(WorkflowExecution {
        id: ExecutionId::from_uuid(row.get("id")),
        workflow_id: WorkflowId::from_uuid(row.get("workflow_id")),
        tenant_id: TenantId::from_uuid(row.get("tenant_id")),
        initiator_id: AgentId::new(row.get::<String, _>("initiator_id")),
        status: str_to_execution_status(&status_str)?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        input: row.get("input"),
        context: row.get("context"),
    })
}

fn row_to_step_execution(row: &sqlx::postgres::PgRow) -> Result<StepExecution> {
    let status_str: String = row.get("status");
    Ok(StepExecution {
        execution_id: ExecutionId::from_uuid(row.get("execution_id")),
        step_id: row.get("step_id"),
        step_name: row.get("step_name"),
        status: str_to_step_status(&status_str)?,
        retry_count: row.get::<i32, _>("retry_count") as u32,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        output: row.get("output"),
        error: row.get("error"),
    })
}

fn row_to_workspace(row: &sqlx::postgres::PgRow) -> Result<Workspace> {
    let status_str: String = row.get("status");
    let tags_json: serde_json::Value = row.get("tags");
    Ok(Workspace {
        id: WorkspaceId::from_uuid(row.get("id")),
        tenant_id: TenantId::from_uuid(row.get("tenant_id")),
        name: row.get("name"),
        description: row.get("description"),
        owner_id: AgentId::new(row.get::<String, _>("owner_id")),
        is_public: row.get("is_public"),
        status: str_to_workspace_status(&status_str)?,
        settings: row.get("settings"),
        tags: serde_json::from_value(tags_json).unwrap_or_default(),
    })
}

fn row_to_member(row: &sqlx::postgres::PgRow) -> Result<WorkspaceMember> {
    let role_str: String = row.get("role");
    Ok(WorkspaceMember {
        workspace_id: WorkspaceId::from_uuid(row.get("workspace_id")),
        agent_id: AgentId::new(row.get::<String, _>("agent_id")),
        role: str_to_member_role(&role_str)?,
        joined_at: row.get("joined_at"),
    })
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<SharedDocument> {
    Ok(SharedDocument {
        id: DocumentId::from_uuid(row.get("id")),
        tenant_id: TenantId::from_uuid(row.get("tenant_id")),
        workspace_id: WorkspaceId::from_uuid(row.get("workspace_id")),
        title: row.get("title"),
        content: row.get("content"),
        content_type: row.get("content_type"),
        doc_type: row.get("doc_type"),
        created_by: AgentId::new(row.get::<String, _>("created_by")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        metadata: row.get("metadata"),
        version: row.get::<i64, _>("version") as u64,
    })
}

fn row_to_document_operation(row: &sqlx::postgres::PgRow) -> Result<DocumentOperation> {
    let op_type_str: String = row.get("op_type");
    let clock_json: serde_json::Value = row.get("vector_clock");
    Ok(DocumentOperation {
        id: row.get("id"),
        document_id: DocumentId::from_uuid(row.get("document_id")),
        op_type: str_to_doc_op_type(&op_type_str)?,
        path: row.get("path"),
        value: row.get("value"),
        agent_id: AgentId::new(row.get::<String, _>("agent_id")),
        vector_clock: serde_json::from_value(clock_json).map_err(|e| CoreError::Internal(format!("corrupt vector clock: {e}")))?,
        applied_at: row.get("applied_at"),
    })
}
