//! Fluent builders for constructing test data without spelling out every
//! field of the domain model at each call site.

use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::ids::{TenantId, WorkflowId, WorkspaceId};
use orchestrator_core::models::{
    MemberRole, NewDocument, NewTask, NewWorkspace, StepConfig, StepDefinition, StepType,
    TaskFilter, TaskStatus, WorkflowDefinition, WorkflowType, WorkspaceFilter, WorkspaceMember,
};

/// Builds a `NewTask`, defaulting to a generic task type and zero retries.
#[derive(Debug, Clone)]
pub struct NewTaskBuilder {
    task: NewTask,
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self {
            task: NewTask::new("test-agent", "test task", "a task built for testing"),
        }
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task.task_type = task_type.into();
        self
    }

    pub fn with_created_by(mut self, agent: impl Into<AgentId>) -> Self {
        self.task.created_by = agent.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    pub fn with_parent(mut self, parent_task_id: TaskId) -> Self {
        self.task.parent_task_id = Some(parent_task_id);
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.task.max_retries = max_retries;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.task.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.task.parameters = parameters;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.task.tags.push(tag.into());
        self
    }

    pub fn build(self) -> NewTask {
        self.task
    }
}

/// Builds a `TaskFilter` for search/list calls.
#[derive(Debug, Clone, Default)]
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assigned_to(mut self, agent: impl Into<AgentId>) -> Self {
        self.filter.assigned_to = Some(agent.into());
        self
    }

    pub fn with_created_by(mut self, agent: impl Into<AgentId>) -> Self {
        self.filter.created_by = Some(agent.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.filter.task_type = Some(task_type.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tag = Some(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.filter.offset = Some(offset);
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}

/// Builds a `NewWorkspace`.
#[derive(Debug, Clone)]
pub struct NewWorkspaceBuilder {
    workspace: NewWorkspace,
}

impl Default for NewWorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewWorkspaceBuilder {
    pub fn new() -> Self {
        Self {
            workspace: NewWorkspace {
                name: "test workspace".to_string(),
                description: "a workspace built for testing".to_string(),
                owner_id: AgentId::new("test-agent"),
                is_public: false,
                settings: serde_json::json!({}),
                tags: Vec::new(),
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.workspace.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.workspace.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<AgentId>) -> Self {
        self.workspace.owner_id = owner.into();
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.workspace.is_public = is_public;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.workspace.tags.push(tag.into());
        self
    }

    pub fn build(self) -> NewWorkspace {
        self.workspace
    }
}

/// Builds a `WorkspaceFilter`.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFilterBuilder {
    filter: WorkspaceFilter,
}

impl WorkspaceFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: impl Into<AgentId>) -> Self {
        self.filter.owner_id = Some(owner.into());
        self
    }

    pub fn with_is_active(mut self, is_active: bool) -> Self {
        self.filter.is_active = Some(is_active);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tag = Some(tag.into());
        self
    }

    pub fn build(self) -> WorkspaceFilter {
        self.filter
    }
}

/// Builds a `WorkspaceMember`.
#[derive(Debug, Clone)]
pub struct WorkspaceMemberBuilder {
    member: WorkspaceMember,
}

impl WorkspaceMemberBuilder {
    pub fn new(workspace_id: WorkspaceId, agent: impl Into<AgentId>) -> Self {
        Self {
            member: WorkspaceMember {
                workspace_id,
                agent_id: agent.into(),
                role: MemberRole::Member,
                joined_at: chrono::Utc::now(),
            },
        }
    }

    pub fn with_role(mut self, role: MemberRole) -> Self {
        self.member.role = role;
        self
    }

    pub fn build(self) -> WorkspaceMember {
        self.member
    }
}

/// Builds a `NewDocument`.
#[derive(Debug, Clone)]
pub struct NewDocumentBuilder {
    document: NewDocument,
}

impl Default for NewDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewDocumentBuilder {
    pub fn new() -> Self {
        Self {
            document: NewDocument {
                title: "test document".to_string(),
                content: serde_json::json!({}),
                content_type: "application/json".to_string(),
                doc_type: "note".to_string(),
                created_by: AgentId::new("test-agent"),
                metadata: serde_json::json!({}),
            },
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.document.title = title.into();
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.document.content = content;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.document.content_type = content_type.into();
        self
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.document.doc_type = doc_type.into();
        self
    }

    pub fn with_created_by(mut self, agent: impl Into<AgentId>) -> Self {
        self.document.created_by = agent.into();
        self
    }

    pub fn build(self) -> NewDocument {
        self.document
    }
}

/// Builds a `WorkflowDefinition` from a fluent sequence of step declarations.
#[derive(Debug, Clone)]
pub struct WorkflowDefinitionBuilder {
    workflow: WorkflowDefinition,
}

impl Default for WorkflowDefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowDefinitionBuilder {
    pub fn new() -> Self {
        Self {
            workflow: WorkflowDefinition {
                id: WorkflowId::new(),
                tenant_id: TenantId::new(),
                name: "test workflow".to_string(),
                workflow_type: WorkflowType::Standard,
                created_by: AgentId::new("test-agent"),
                is_active: true,
                steps: Vec::new(),
                config: serde_json::json!({}),
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.workflow.name = name.into();
        self
    }

    pub fn with_workflow_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow.workflow_type = workflow_type;
        self
    }

    pub fn with_created_by(mut self, agent: impl Into<AgentId>) -> Self {
        self.workflow.created_by = agent.into();
        self
    }

    pub fn with_step(mut self, id: impl Into<String>, step_type: StepType) -> Self {
        let id = id.into();
        self.workflow.steps.push(StepDefinition {
            name: id.clone(),
            id,
            step_type,
            config: StepConfig::default(),
            retries: 0,
            required: true,
        });
        self
    }

    pub fn with_parallel_step(mut self, id: impl Into<String>, step_type: StepType) -> Self {
        let id = id.into();
        self.workflow.steps.push(StepDefinition {
            name: id.clone(),
            id,
            step_type,
            config: StepConfig {
                parallel: true,
                extra: serde_json::json!({}),
            },
            retries: 0,
            required: true,
        });
        self
    }

    pub fn build(self) -> WorkflowDefinition {
        self.workflow
    }
}
