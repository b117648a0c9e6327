use crate::error::{CoreError, Result};
use crate::models::{NewTask, NewWorkspace, StepType, Task, TaskStatus, WorkflowDefinition};

/// Validation for task-create and task-transition inputs.
pub struct TaskValidator;

impl TaskValidator {
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(CoreError::empty_field("title"));
        }
        if trimmed.len() > 200 {
            return Err(CoreError::Validation(
                "title must be at most 200 characters long".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_description(description: &str) -> Result<()> {
        if description.len() > 2000 {
            return Err(CoreError::Validation(
                "description must be at most 2000 characters long".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_priority(priority: f64) -> Result<()> {
        if !(0.0..=10.0).contains(&priority) {
            return Err(CoreError::Validation(format!(
                "priority {priority} out of range [0, 10]"
            )));
        }
        Ok(())
    }

    pub fn validate_progress_percent(percent: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(CoreError::Validation(format!(
                "progress percent {percent} out of range [0, 100]"
            )));
        }
        Ok(())
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_title(&task.title)?;
        Self::validate_description(&task.description)?;
        Self::validate_priority(task.priority)?;
        if task.task_type.trim().is_empty() {
            return Err(CoreError::empty_field("task_type"));
        }
        Ok(())
    }

    pub fn validate_transition(task: &Task, new_status: TaskStatus) -> Result<()> {
        if task.can_transition_to(new_status) {
            Ok(())
        } else {
            Err(CoreError::illegal_transition(task.status, new_status))
        }
    }

    /// Caps the number of children a single distributed task may fan out
    /// to, per `CoreConfig::max_subtasks_per_task`.
    pub fn validate_subtask_count(count: usize, max_subtasks_per_task: u32) -> Result<()> {
        if count as u32 > max_subtasks_per_task {
            return Err(CoreError::Validation(format!(
                "{count} subtasks exceeds the configured maximum of {max_subtasks_per_task}"
            )));
        }
        Ok(())
    }
}

/// Validation for workflow definitions before they're persisted.
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn validate_definition(definition: &WorkflowDefinition, max_steps_per_workflow: u32) -> Result<()> {
        if definition.name.trim().is_empty() {
            return Err(CoreError::empty_field("name"));
        }
        if definition.steps.is_empty() {
            return Err(CoreError::Validation(
                "workflow must have at least one step".to_string(),
            ));
        }
        if definition.steps.len() as u32 > max_steps_per_workflow {
            return Err(CoreError::Validation(format!(
                "{} steps exceeds the configured maximum of {max_steps_per_workflow}",
                definition.steps.len()
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for step in &definition.steps {
            if step.id.trim().is_empty() {
                return Err(CoreError::empty_field("step.id"));
            }
            if !seen.insert(step.id.clone()) {
                return Err(CoreError::Validation(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
            if let StepType::Task { .. } = &step.step_type {
                // no additional constraints today; reserved for future
                // assignee-existence checks once the Task Service is wired
                // in at the call site.
            }
        }
        Ok(())
    }
}

/// Validation for workspace create/update inputs.
pub struct WorkspaceValidator;

impl WorkspaceValidator {
    pub fn validate_new_workspace(workspace: &NewWorkspace) -> Result<()> {
        let trimmed = workspace.name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::empty_field("name"));
        }
        if trimmed.len() > 200 {
            return Err(CoreError::Validation(
                "workspace name must be at most 200 characters long".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_tag(tag: &str) -> Result<()> {
        if tag.trim().is_empty() {
            return Err(CoreError::empty_field("tag"));
        }
        if tag.len() > 64 {
            return Err(CoreError::Validation(
                "tag must be at most 64 characters long".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionMode, CoordinationMode, StepConfig, StepDefinition, WorkflowType};

    #[test]
    fn rejects_empty_title() {
        assert!(TaskValidator::validate_title("").is_err());
        assert!(TaskValidator::validate_title("   ").is_err());
    }

    #[test]
    fn rejects_priority_out_of_range() {
        assert!(TaskValidator::validate_priority(-1.0).is_err());
        assert!(TaskValidator::validate_priority(11.0).is_err());
        assert!(TaskValidator::validate_priority(5.0).is_ok());
    }

    #[test]
    fn new_task_validation_aggregates_field_checks() {
        let mut task = NewTask::new("agent", "Title", "Description");
        assert!(TaskValidator::validate_new_task(&task).is_ok());
        task.priority = 99.0;
        assert!(TaskValidator::validate_new_task(&task).is_err());
    }

    #[test]
    fn transition_validation_matches_state_machine() {
        let task = Task {
            id: crate::ids::TaskId::new(),
            tenant_id: crate::ids::TenantId::new(),
            task_type: "generic".into(),
            created_by: "agent".into(),
            created_at: chrono::Utc::now(),
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
            tags: vec![],
            title: "t".into(),
            description: "d".into(),
            coordination_mode: None,
            completion_mode: None,
        };
        assert!(TaskValidator::validate_transition(&task, TaskStatus::Assigned).is_ok());
        assert!(TaskValidator::validate_transition(&task, TaskStatus::Completed).is_err());
    }

    #[test]
    fn workflow_definition_rejects_duplicate_step_ids() {
        let step = |id: &str| StepDefinition {
            id: id.to_string(),
            name: id.to_string(),
            step_type: StepType::NoOp,
            config: StepConfig::default(),
            retries: 0,
            required: true,
        };
        let definition = WorkflowDefinition {
            id: crate::ids::WorkflowId::new(),
            tenant_id: crate::ids::TenantId::new(),
            name: "wf".into(),
            workflow_type: WorkflowType::Standard,
            created_by: "agent".into(),
            is_active: true,
            steps: vec![step("a"), step("a")],
            config: serde_json::json!({}),
        };
        assert!(WorkflowValidator::validate_definition(&definition, 256).is_err());
    }

    #[test]
    fn workflow_definition_rejects_exceeding_step_cap() {
        let steps = (0..5)
            .map(|i| StepDefinition {
                id: format!("s{i}"),
                name: format!("s{i}"),
                step_type: StepType::NoOp,
                config: StepConfig::default(),
                retries: 0,
                required: true,
            })
            .collect();
        let definition = WorkflowDefinition {
            id: crate::ids::WorkflowId::new(),
            tenant_id: crate::ids::TenantId::new(),
            name: "wf".into(),
            workflow_type: WorkflowType::Standard,
            created_by: "agent".into(),
            is_active: true,
            steps,
            config: serde_json::json!({}),
        };
        assert!(WorkflowValidator::validate_definition(&definition, 4).is_err());
        assert!(WorkflowValidator::validate_definition(&definition, 5).is_ok());
    }

    #[test]
    fn workspace_name_must_be_non_empty() {
        let workspace = NewWorkspace {
            name: "".into(),
            description: "d".into(),
            owner_id: "agent".into(),
            is_public: false,
            settings: serde_json::json!({}),
            tags: vec![],
        };
        assert!(WorkspaceValidator::validate_new_workspace(&workspace).is_err());
    }

    #[test]
    fn distributed_task_helper_types_are_usable_in_validation_context() {
        // CoordinationMode/CompletionMode aren't themselves validated here
        // (no invalid representations exist), but exercise that they're
        // reachable from this module's imports.
        let _ = CoordinationMode::Parallel;
        let _ = CompletionMode::Majority;
    }
}
