use async_trait::async_trait;

use crate::error::Result;
use crate::ids::{AgentId, DocumentId, ExecutionId, TaskId, TenantId, WorkflowId, WorkspaceId};
use crate::models::{
    DocumentOperation, MemberActivity, NewDelegation, NewDocument, NewDocumentOperation,
    NewTask, NewWorkspace, SharedDocument, StateOp, StepExecution, Task, TaskDelegation,
    TaskFilter, TaskTree, WorkflowDefinition, WorkflowExecution, WorkflowMetrics, Workspace,
    WorkspaceFilter, WorkspaceMember, WorkspaceState, WorkspaceUpdate,
};

/// Transactional persistence for every entity in the data model.
///
/// Every write method is internally atomic: a `Store` implementation opens
/// whatever transaction it needs and commits or rolls back before
/// returning, so callers never see partial writes. Compare-and-set
/// transitions (status changes, retry-count bumps, state-tree mutations)
/// run under serializable isolation; a failed guard surfaces as
/// `CoreError::Conflict` rather than silently overwriting.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Tasks ---------------------------------------------------------

    /// Create a task, binding `idempotency_key` if present. A second call
    /// with the same `(tenant_id, idempotency_key)` returns the
    /// already-bound task instead of erroring or inserting a duplicate.
    async fn create_task(
        &self,
        tenant_id: TenantId,
        task: NewTask,
        idempotency_key: Option<&str>,
    ) -> Result<Task>;

    /// Insert all of `tasks` in a single transaction.
    async fn create_tasks_batch(&self, tenant_id: TenantId, tasks: Vec<NewTask>) -> Result<Vec<Task>>;

    async fn get_task(&self, tenant_id: TenantId, id: TaskId) -> Result<Task>;

    async fn get_tasks_batch(&self, tenant_id: TenantId, ids: &[TaskId]) -> Result<Vec<Task>>;

    async fn search_tasks(&self, tenant_id: TenantId, text: &str, filter: TaskFilter) -> Result<Vec<Task>>;

    async fn get_agent_tasks(&self, tenant_id: TenantId, agent: &AgentId, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Compare-and-set a task's mutable fields, guarded by `expected_status`
    /// matching the row's current status. Fails with `CoreError::Conflict`
    /// if the guard doesn't hold.
    async fn cas_update_task(
        &self,
        tenant_id: TenantId,
        id: TaskId,
        expected_status: crate::models::TaskStatus,
        mutate: Box<dyn FnOnce(&mut Task) + Send>,
    ) -> Result<Task>;

    async fn insert_delegation(&self, tenant_id: TenantId, delegation: NewDelegation) -> Result<TaskDelegation>;

    async fn get_task_tree(&self, tenant_id: TenantId, root_id: TaskId) -> Result<TaskTree>;

    // -- Idempotency -----------------------------------------------------

    async fn resolve_idempotency_key(&self, tenant_id: TenantId, key: &str) -> Result<Option<TaskId>>;

    async fn bind_idempotency_key(&self, tenant_id: TenantId, key: &str, task_id: TaskId) -> Result<()>;

    // -- Workflows ---------------------------------------------------------

    async fn create_workflow(&self, tenant_id: TenantId, definition: WorkflowDefinition) -> Result<WorkflowDefinition>;

    async fn get_workflow(&self, tenant_id: TenantId, id: WorkflowId) -> Result<WorkflowDefinition>;

    async fn list_workflows(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>>;

    async fn create_execution(&self, tenant_id: TenantId, execution: WorkflowExecution) -> Result<WorkflowExecution>;

    async fn get_execution(&self, tenant_id: TenantId, id: ExecutionId) -> Result<WorkflowExecution>;

    /// CAS-update an execution's status/timestamps.
    async fn cas_update_execution(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        mutate: Box<dyn FnOnce(&mut WorkflowExecution) + Send>,
    ) -> Result<WorkflowExecution>;

    async fn list_step_executions(&self, execution_id: ExecutionId) -> Result<Vec<StepExecution>>;

    async fn upsert_step_execution(&self, step: StepExecution) -> Result<StepExecution>;

    async fn get_workflow_history(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkflowExecution>>;

    async fn get_workflow_metrics(&self, tenant_id: TenantId, workflow_id: WorkflowId) -> Result<WorkflowMetrics>;

    // -- Workspaces ---------------------------------------------------------

    async fn create_workspace(&self, tenant_id: TenantId, workspace: NewWorkspace) -> Result<Workspace>;

    async fn get_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<Workspace>;

    async fn update_workspace(&self, tenant_id: TenantId, id: WorkspaceId, update: WorkspaceUpdate) -> Result<Workspace>;

    async fn delete_workspace(&self, tenant_id: TenantId, id: WorkspaceId) -> Result<()>;

    async fn search_workspaces(&self, tenant_id: TenantId, text: &str, filter: WorkspaceFilter) -> Result<Vec<Workspace>>;

    async fn add_member(&self, workspace_id: WorkspaceId, member: WorkspaceMember) -> Result<WorkspaceMember>;

    async fn remove_member(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()>;

    async fn update_member_role(
        &self,
        workspace_id: WorkspaceId,
        agent: &AgentId,
        role: crate::models::MemberRole,
    ) -> Result<WorkspaceMember>;

    async fn list_members(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>>;

    async fn get_member_activity(&self, workspace_id: WorkspaceId) -> Result<Vec<MemberActivity>>;

    // -- Documents ---------------------------------------------------------

    async fn create_document(&self, tenant_id: TenantId, workspace_id: WorkspaceId, document: NewDocument) -> Result<SharedDocument>;

    async fn get_document(&self, tenant_id: TenantId, id: DocumentId) -> Result<SharedDocument>;

    async fn list_documents(&self, workspace_id: WorkspaceId) -> Result<Vec<SharedDocument>>;

    /// Append an operation and persist the document's resulting content,
    /// vector clock, and version in one transaction.
    async fn apply_document_operation(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        op: NewDocumentOperation,
    ) -> Result<(SharedDocument, DocumentOperation)>;

    async fn get_document_operations(&self, document_id: DocumentId) -> Result<Vec<DocumentOperation>>;

    // -- Workspace state ---------------------------------------------------------

    async fn get_state(&self, workspace_id: WorkspaceId) -> Result<WorkspaceState>;

    /// Apply `op` to the workspace's state tree under a serializable CAS on
    /// the state row's version, returning the new snapshot.
    async fn apply_state_op(&self, workspace_id: WorkspaceId, op: StateOp) -> Result<WorkspaceState>;

    // -- Administration ---------------------------------------------------------

    /// Erase every row belonging to `tenant_id`, across all tables. Used by
    /// tests to reset fixtures between scenarios.
    async fn cleanup_tenant(&self, tenant_id: TenantId) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
}
