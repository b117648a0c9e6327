//! In-memory implementation of the `Store` trait.
//!
//! Backed by a single `parking_lot::Mutex`-guarded state struct rather than
//! one lock per table: CAS updates and the workspace-state/document
//! operations need to read-then-write several maps atomically, and a single
//! coarse lock makes that trivially race-free without per-method lock
//! ordering concerns. Error injection and call-history tracking follow the
//! same one-shot/ever-growing pattern as the rest of this crate's fakes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use orchestrator_core::error::{CoreError, Result};
use orchestrator_core::ids::{AgentId, DocumentId, ExecutionId, TaskId, TenantId, WorkflowId, WorkspaceId};
use orchestrator_core::models::{
    DocumentOperation, MemberActivity, MemberRole, NewDelegation, NewDocument, NewDocumentOperation,
    NewTask, NewWorkspace, SharedDocument, StateOp, StepExecution, Task, TaskDelegation, TaskFilter,
    TaskStatus, TaskTree, WorkflowDefinition, WorkflowExecution, WorkflowMetrics, Workspace,
    WorkspaceFilter, WorkspaceMember, WorkspaceState, WorkspaceUpdate,
};
use orchestrator_core::repository::Store;
use orchestrator_core::services::DocumentService;
use orchestrator_core::VectorClock;

#[derive(Default)]
struct StoreState {
    tasks: HashMap<(TenantId, TaskId), Task>,
    idempotency_keys: HashMap<(TenantId, String), TaskId>,
    delegations: Vec<TaskDelegation>,
    workflows: HashMap<(TenantId, WorkflowId), WorkflowDefinition>,
    executions: HashMap<(TenantId, ExecutionId), WorkflowExecution>,
    step_executions: HashMap<(ExecutionId, String), StepExecution>,
    workspaces: HashMap<(TenantId, WorkspaceId), Workspace>,
    members: HashMap<WorkspaceId, Vec<WorkspaceMember>>,
    member_activity: HashMap<(WorkspaceId, AgentId), MemberActivity>,
    documents: HashMap<(TenantId, DocumentId), SharedDocument>,
    document_operations: HashMap<DocumentId, Vec<DocumentOperation>>,
    document_clocks: HashMap<DocumentId, VectorClock>,
    states: HashMap<WorkspaceId, WorkspaceState>,
}

/// In-memory `Store`, suitable for unit and scenario tests that don't need
/// a live Postgres instance.
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    error_injection: Arc<Mutex<Option<CoreError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Inject an error that the next call (of any method) will return
    /// instead of running, consuming the injection.
    pub fn inject_error(&self, error: CoreError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. call history: {:?}",
            *history
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record_call(&self, method: &str) {
        self.call_history.lock().push(method.to_string());
    }

    fn matches_task_filter(task: &Task, filter: &TaskFilter) -> bool {
        if let Some(assigned_to) = &filter.assigned_to {
            if task.assigned_to.as_ref() != Some(assigned_to) {
                return false;
            }
        }
        if let Some(created_by) = &filter.created_by {
            if &task.created_by != created_by {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(task_type) = &filter.task_type {
            if &task.task_type != task_type {
                return false;
            }
        }
        if let Some(tag) = &filter.tag {
            if !task.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(date_from) = filter.date_from {
            if task.created_at < date_from {
                return false;
            }
        }
        if let Some(date_to) = filter.date_to {
            if task.created_at > date_to {
                return false;
            }
        }
        if let Some(completed_after) = filter.completed_after {
            if task.completed_at.map_or(true, |t| t < completed_after) {
                return false;
            }
        }
        if let Some(completed_before) = filter.completed_before {
            if task.completed_at.map_or(true, |t| t > completed_before) {
                return false;
            }
        }
        true
    }

    fn paginate(mut tasks: Vec<Task>, filter: &TaskFilter) -> Vec<Task> {
        tasks.sort_by_key(|t| t.created_at);
        let offset = filter.offset.unwrap_or(0) as usize;
        let tasks: Vec<Task> = tasks.into_iter().skip(offset).collect();
        match filter.limit {
            Some(limit) => tasks.into_iter().take(limit as usize).collect(),
            None => tasks,
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_task(&self, tenant_id: TenantId, task: NewTask, idempotency_key: Option<&str>) -> Result<Task> {
        self.record_call("create_task");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if let Some(key) = idempotency_key {
            if let Some(existing_id) = state.idempotency_keys.get(&(tenant_id, key.to_string())).copied() {
                return state
                    .tasks
                    .get(&(tenant_id, existing_id))
                    .cloned()
                    .ok_or_else(|| CoreError::not_found("task", existing_id));
            }
        }

        let id = TaskId::new();
        let created = Task {
            id,
            tenant_id,
            task_type: task.task_type,
            created_by: task.created_by,
            created_at: Utc::now(),
            parent_task_id: task.parent_task_id,
            status: TaskStatus::Pending,
            priority: task.priority,
            assigned_to: None,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: task.max_retries,
            timeout_seconds: task.timeout_seconds,
            parameters: task.parameters,
            result: None,
            tags: task.tags,
            title: task.title,
            description: task.description,
            coordination_mode: None,
            completion_mode: None,
        };
        state.tasks.insert((tenant_id, id), created.clone());
        if let Some(key) = idempotency_key {
            state.idempotency_keys.insert((tenant_id, key.to_string()), id);
        }
        Ok(created)
    }

    async fn create_tasks_batch(&self, tenant_id: TenantId, tasks: Vec<NewTask>) -> Result<Vec<Task>> {
        self.record_call("create_tasks_batch");
        self.check_error_injection()?;

        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            created.push(self.create_task(tenant_id, task, None).await?);
        }
        Ok(created)
    }

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> Result<Task> {
        self.record_call("get_task");
        self.check_error_injection()?;

        self.state
            .lock()
            .tasks
            .get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("task", id))
    }

    async fn get_tasks_batch(&self, tenant_id: TenantId, ids: &[TaskId]) -> Result<Vec<Task>> {
        self.record_call("get_tasks_batch");
        self.check_error_injection()?;

        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.tasks.get(&(tenant_id, *id)).cloned())
            .collect())
    }

    async fn search_tasks(&self, tenant_id: TenantId, text: &str, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record_call("search_tasks");
        self.check_error_injection()?;

        let state = self.state.lock();
        let needle = text.to_lowercase();
        let matched: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| Self::matches_task_filter(t, &filter))
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(Self::paginate(matched, &filter))
    }

    async fn get_agent_tasks(&self, tenant_id: TenantId, agent: &AgentId, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record_call("get_agent_tasks");
        self.check_error_injection()?;

        let state = self.state.lock();
        let matched: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| t.assigned_to.as_ref() == Some(agent))
            .filter(|t| Self::matches_task_filter(t, &filter))
            .cloned()
            .collect();
        Ok(Self::paginate(matched, &filter))
    }

    async fn cas_update_task(
        &self,
        tenant_id: TenantId,
        id: TaskId,
        expected_status: TaskStatus,
        mutate: Box<dyn FnOnce(&mut Task) + Send>,
    ) -> Result<Task> {
        self.record_call("cas_update_task");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let task = state
            .tasks
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| CoreError::not_found("task", id))?;
        if task.status != expected_status {
            return Err(CoreError::Conflict(format!(
                "task {id} status is {} not {expected_status}",
                task.status
            )));
        }
        mutate(task);
        Ok(task.clone())
    }

    async fn insert_delegation(&self, tenant_id: TenantId, delegation: NewDelegation) -> Result<TaskDelegation> {
        self.record_call("insert_delegation");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let task_created_at = state
            .tasks
            .get(&(tenant_id, delegation.task_id))
            .map(|t| t.created_at)
            .ok_or_else(|| CoreError::not_found("task", delegation.task_id))?;
        let recorded = TaskDelegation {
            task_id: delegation.task_id,
            task_created_at,
            from_agent_id: delegation.from_agent_id,
            to_agent_id: delegation.to_agent_id,
            reason: delegation.reason,
            delegation_type: delegation.delegation_type,
            metadata: delegation.metadata,
            created_at: Utc::now(),
        };
        state.delegations.push(recorded.clone());
        Ok(recorded)
    }

    async fn get_task_tree(&self, tenant_id: TenantId, root_id: TaskId) -> Result<TaskTree> {
        self.record_call("get_task_tree");
        self.check_error_injection()?;

        let state = self.state.lock();
        let root = state
            .tasks
            .get(&(tenant_id, root_id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("task", root_id))?;

        let mut children: HashMap<TaskId, Vec<Task>> = HashMap::new();
        let mut frontier = vec![root_id];
        while let Some(parent_id) = frontier.pop() {
            let kids: Vec<Task> = state
                .tasks
                .values()
                .filter(|t| t.tenant_id == tenant_id && t.parent_task_id == Some(parent_id))
                .cloned()
                .collect();
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
        self.record_call("resolve_idempotency_key");
        self.check_error_injection()?;

        Ok(self.state.lock().idempotency_keys.get(&(tenant_id, key.to_string())).copied())
    }

    async fn bind_idempotency_key(&self, tenant_id: TenantId, key: &str, task_id: TaskId) -> Result<()> {
        self.record_call("bind_idempotency_key");
        self.check_error_injection()?;

        self.state.lock().idempotency_keys.insert((tenant_id, key.to_string()), task_id);
        Ok(())
    }

    async fn create_workflow(&self, tenant_id: TenantId, definition: WorkflowDefinition) -> Result<WorkflowDefinition> {
        self.record_call("create_workflow");
        self.check_error_injection()?;

        let mut definition = definition;
        definition.tenant_id = tenant_id;
        self.state.lock().workflows.insert((tenant_id, definition.id), definition.clone());
        Ok(definition)
    }

    async fn get_workflow(&self, tenant_id: TenantId, id: WorkflowId) -> Result<WorkflowDefinition> {
        self.record_call("get_workflow");
        self.check_error_injection()?;

        self.state
            .lock()
            .workflows
            .get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("workflow", id))
    }

    async fn list_workflows(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>> {
        self.record_call("list_workflows");
        self.check_error_injection()?;

        Ok(self
            .state
            .lock()
            .workflows
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_execution(&self, tenant_id: TenantId, execution: WorkflowExecution) -> Result<WorkflowExecution> {
        self.record_call("create_execution");
        self.check_error_injection()?;

        let mut execution = execution;
        execution.tenant_id = tenant_id;
        self.state.lock().executions.insert((tenant_id, execution.id), execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, tenant_id: TenantId, id: ExecutionId) -> Result<WorkflowExecution> {
        self.record_call("get_execution");
        self.check_error_injection()?;

        self.state
            .lock()
            .executions
            .get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("execution", id))
    }

    async fn cas_update_execution(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        mutate: Box<dyn FnOnce(&mut WorkflowExecution) + Send>,
    ) -> Result<WorkflowExecution> {
        self.record_call("cas_update_execution");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let execution = state
            .executions
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| CoreError::not_found("execution", id))?;
        mutate(execution);
        Ok(execution.clone())
    }

    async fn list_step_executions(&self, execution_id: ExecutionId) -> Result<Vec<StepExecution>> {
        self.record_call("list_step_executions");
        self.check_error_injection()?;

        Ok(self
            .state
            .lock()
            .step_executions
            .values()
            .filter(|s| s.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn upsert_step_execution(&self, step: StepExecution) -> Result<StepExecution> {
        self.record_call("upsert_step_execution");
        self.check_error_injection()?;

        let key = (step.execution_id, step.step_id.clone());
        self.state.lock().step_executions.insert(key, step.clone());
        Ok(step)
    }

    async fn get_workflow_history(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkflowExecution>> {
        self.record_call("get_workflow_history");
        self.check_error_injection()?;

        let state = self.state.lock();
        let mut matched: Vec<WorkflowExecution> = state
            .executions
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.workflow_id == workflow_id)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.started_at);
        matched.reverse();
        Ok(matched.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn get_workflow_metrics(&self, tenant_id: TenantId, workflow_id: WorkflowId) -> Result<WorkflowMetrics> {
        self.record_call("get_workflow_metrics");
        self.check_error_injection()?;

        let history = self.get_workflow_history(tenant_id, workflow_id, u32::MAX, 0).await?;
        let total_executions = history.len() as u64;
        let successful_runs = history
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Completed)
            .count() as u64;
        let failed_runs = history
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Failed)
            .count() as u64;

        let completed: Vec<&WorkflowExecution> = history
            .iter()
            .filter(|e| e.status == orchestrator_core::models::ExecutionStatus::Completed)
            .filter(|e| e.completed_at.is_some())
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
        self.record_call("create_workspace");
        self.check_error_injection()?;

        let id = WorkspaceId::new();
        let created = Workspace {
            id,
            tenant_id,
            name: workspace.name,
            description: workspace.description,
            owner_id: workspace.owner_id,
            is_public: workspace.is_public,
            status: orchestrator_core::models::WorkspaceStatus::Active,
            settings: workspace.settings,
            tags: workspace.tags,
        };
        let mut state = self.state.lock();
        state.workspaces.insert((tenant_id, id), created.clone());
        state.states.insert(id, WorkspaceState::default());
        Ok(created)
    }

    async fn get_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<Workspace> {
        self.record_call("get_workspace");
        self.check_error_injection()?;

        self.state
            .lock()
            .workspaces
            .get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("workspace", id))
    }

    async fn update_workspace(&self, tenant_id: TenantId, id: WorkspaceId, update: WorkspaceUpdate) -> Result<Workspace> {
        self.record_call("update_workspace");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let workspace = state
            .workspaces
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| CoreError::not_found("workspace", id))?;
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
        Ok(workspace.clone())
    }

    async fn delete_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<()> {
        self.record_call("delete_workspace");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let workspace = state
            .workspaces
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| CoreError::not_found("workspace", id))?;
        workspace.status = orchestrator_core::models::WorkspaceStatus::Deleted;
        Ok(())
    }

    async fn search_workspaces(&self, tenant_id: TenantId, text: &str, filter: WorkspaceFilter) -> Result<Vec<Workspace>> {
        self.record_call("search_workspaces");
        self.check_error_injection()?;

        let state = self.state.lock();
        let needle = text.to_lowercase();
        let mut matched: Vec<Workspace> = state
            .workspaces
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .filter(|w| filter.owner_id.as_ref().map_or(true, |o| &w.owner_id == o))
            .filter(|w| {
                filter
                    .is_active
                    .map_or(true, |active| active == (w.status == orchestrator_core::models::WorkspaceStatus::Active))
            })
            .filter(|w| filter.tag.as_ref().map_or(true, |tag| w.tags.iter().any(|t| t == tag)))
            .filter(|w| needle.is_empty() || w.name.to_lowercase().contains(&needle) || w.description.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        let offset = filter.offset.unwrap_or(0) as usize;
        let matched: Vec<Workspace> = matched.into_iter().skip(offset).collect();
        Ok(match filter.limit {
            Some(limit) => matched.into_iter().take(limit as usize).collect(),
            None => matched,
        })
    }

    async fn add_member(&self, workspace_id: WorkspaceId, member: WorkspaceMember) -> Result<WorkspaceMember> {
        self.record_call("add_member");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let members = state.members.entry(workspace_id).or_default();
        members.retain(|m| m.agent_id != member.agent_id);
        members.push(member.clone());
        Ok(member)
    }

    async fn remove_member(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()> {
        self.record_call("remove_member");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if let Some(members) = state.members.get_mut(&workspace_id) {
            members.retain(|m| &m.agent_id != agent);
        }
        Ok(())
    }

    async fn update_member_role(&self, workspace_id: WorkspaceId, agent: &AgentId, role: MemberRole) -> Result<WorkspaceMember> {
        self.record_call("update_member_role");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let members = state
            .members
            .get_mut(&workspace_id)
            .ok_or_else(|| CoreError::not_found("workspace member", agent))?;
        let member = members
            .iter_mut()
            .find(|m| &m.agent_id == agent)
            .ok_or_else(|| CoreError::not_found("workspace member", agent))?;
        member.role = role;
        Ok(member.clone())
    }

    async fn list_members(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>> {
        self.record_call("list_members");
        self.check_error_injection()?;

        Ok(self.state.lock().members.get(&workspace_id).cloned().unwrap_or_default())
    }

    async fn get_member_activity(&self, workspace_id: WorkspaceId) -> Result<Vec<MemberActivity>> {
        self.record_call("get_member_activity");
        self.check_error_injection()?;

        let state = self.state.lock();
        Ok(state
            .member_activity
            .iter()
            .filter(|((ws, _), _)| ws == &workspace_id)
            .map(|(_, activity)| activity.clone())
            .collect())
    }

    async fn create_document(&self, tenant_id: TenantId, workspace_id: WorkspaceId, document: NewDocument) -> Result<SharedDocument> {
        self.record_call("create_document");
        self.check_error_injection()?;

        let id = DocumentId::new();
        let now = Utc::now();
        let created = SharedDocument {
            id,
            tenant_id,
            workspace_id,
            title: document.title,
            content: document.content,
            content_type: document.content_type,
            doc_type: document.doc_type,
            created_by: document.created_by,
            created_at: now,
            updated_at: now,
            metadata: document.metadata,
            version: 0,
        };
        self.state.lock().documents.insert((tenant_id, id), created.clone());
        Ok(created)
    }

    async fn get_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<SharedDocument> {
        self.record_call("get_document");
        self.check_error_injection()?;

        self.state
            .lock()
            .documents
            .get(&(tenant_id, id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("document", id))
    }

    async fn list_documents(&self, workspace_id: WorkspaceId) -> Result<Vec<SharedDocument>> {
        self.record_call("list_documents");
        self.check_error_injection()?;

        Ok(self
            .state
            .lock()
            .documents
            .values()
            .filter(|d| d.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn apply_document_operation(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        op: NewDocumentOperation,
    ) -> Result<(SharedDocument, DocumentOperation)> {
        self.record_call("apply_document_operation");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let document = state
            .documents
            .get_mut(&(tenant_id, document_id))
            .ok_or_else(|| CoreError::not_found("document", document_id))?;

        let current_clock = state.document_clocks.entry(document_id).or_default().clone();
        let merged_clock = current_clock.merged(&op.vector_clock).incremented(&op.agent_id);

        let new_content = DocumentService::apply_content(&document.content, op.op_type, &op.path, &op.value);
        document.content = new_content;
        document.version += 1;
        document.updated_at = Utc::now();

        let recorded = DocumentOperation {
            id: uuid::Uuid::new_v4(),
            document_id,
            op_type: op.op_type,
            path: op.path,
            value: op.value,
            agent_id: op.agent_id,
            vector_clock: merged_clock.clone(),
            applied_at: document.updated_at,
        };

        state.document_clocks.insert(document_id, merged_clock);
        state.document_operations.entry(document_id).or_default().push(recorded.clone());

        let document = state
            .documents
            .get(&(tenant_id, document_id))
            .cloned()
            .expect("just updated above");
        Ok((document, recorded))
    }

    async fn get_document_operations(&self, document_id: DocumentId) -> Result<Vec<DocumentOperation>> {
        self.record_call("get_document_operations");
        self.check_error_injection()?;

        Ok(self.state.lock().document_operations.get(&document_id).cloned().unwrap_or_default())
    }

    async fn get_state(&self, workspace_id: WorkspaceId) -> Result<WorkspaceState> {
        self.record_call("get_state");
        self.check_error_injection()?;

        Ok(self.state.lock().states.get(&workspace_id).cloned().unwrap_or_default())
    }

    async fn apply_state_op(&self, workspace_id: WorkspaceId, op: StateOp) -> Result<WorkspaceState> {
        self.record_call("apply_state_op");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let entry = state.states.entry(workspace_id).or_default();
        orchestrator_core::state_ops::apply(&mut entry.data, &op)?;
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn cleanup_tenant(&self, tenant_id: TenantId) -> Result<()> {
        self.record_call("cleanup_tenant");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let workspace_ids: Vec<WorkspaceId> = state
            .workspaces
            .keys()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, id)| *id)
            .collect();
        let document_ids: Vec<DocumentId> = state
            .documents
            .keys()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, id)| *id)
            .collect();
        let removed_task_ids: std::collections::HashSet<TaskId> = state
            .tasks
            .keys()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, id)| *id)
            .collect();

        state.tasks.retain(|(t, _), _| *t != tenant_id);
        state.idempotency_keys.retain(|(t, _), _| *t != tenant_id);
        state.delegations.retain(|d| !removed_task_ids.contains(&d.task_id));
        state.workflows.retain(|(t, _), _| *t != tenant_id);
        state.executions.retain(|(t, _), _| *t != tenant_id);
        state.workspaces.retain(|(t, _), _| *t != tenant_id);
        state.documents.retain(|(t, _), _| *t != tenant_id);
        for workspace_id in &workspace_ids {
            state.members.remove(workspace_id);
            state.member_activity.retain(|(ws, _), _| ws != workspace_id);
            state.states.remove(workspace_id);
        }
        for document_id in &document_ids {
            state.document_operations.remove(document_id);
            state.document_clocks.remove(document_id);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.record_call("health_check");
        self.check_error_injection()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::models::TaskStatus;

    #[tokio::test]
    async fn create_and_fetch_round_trips_a_task() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let created = store
            .create_task(tenant_id, NewTask::new("agent-1", "t", "d"), None)
            .await
            .unwrap();
        assert_eq!(created.status, TaskStatus::Pending);

        let fetched = store.get_task(tenant_id, created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        store.assert_called("create_task");
        store.assert_called("get_task");
    }

    #[tokio::test]
    async fn idempotency_key_returns_existing_task() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let first = store
            .create_task(tenant_id, NewTask::new("agent-1", "a", "d"), Some("key-1"))
            .await
            .unwrap();
        let second = store
            .create_task(tenant_id, NewTask::new("agent-1", "b", "d"), Some("key-1"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "a");
    }

    #[tokio::test]
    async fn cas_update_rejects_stale_expected_status() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let task = store.create_task(tenant_id, NewTask::new("agent-1", "t", "d"), None).await.unwrap();

        let conflict = store
            .cas_update_task(tenant_id, task.id, TaskStatus::Assigned, Box::new(|t| t.status = TaskStatus::Cancelled))
            .await;
        assert!(conflict.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn injected_error_is_returned_once() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        store.inject_error(CoreError::Internal("boom".into()));

        let first = store.get_task(tenant_id, TaskId::new()).await;
        assert!(matches!(first.unwrap_err(), CoreError::Internal(_)));

        let second = store.get_task(tenant_id, TaskId::new()).await;
        assert!(second.unwrap_err().is_not_found());
    }
}
