//! Pausing a workflow execution freezes band advancement even when an
//! in-flight step completes while paused; resuming picks normal advancement
//! back up afterward.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{ExecutionStatus, StepStatus, StepType, WorkflowDefinition, WorkflowType};
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

fn status_of(steps: &[orchestrator_core::models::StepExecution], id: &str) -> StepStatus {
    steps.iter().find(|s| s.step_id == id).unwrap().status
}

#[tokio::test]
async fn completing_the_last_band_member_while_paused_does_not_open_the_next_band() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let initiator = "release-manager";

    let definition = test_fakes::WorkflowDefinitionBuilder::new()
        .with_created_by(initiator)
        .with_workflow_type(WorkflowType::Standard)
        .with_parallel_step("a", StepType::NoOp)
        .with_parallel_step("b", StepType::NoOp)
        .with_step("c", StepType::NoOp)
        .build();
    let definition: WorkflowDefinition = services.workflows.create_workflow(tenant_id, definition).await.unwrap();

    let execution = services
        .workflows
        .start_workflow(tenant_id, definition.id, &initiator.into(), serde_json::json!({}))
        .await
        .unwrap();

    services.workflows.complete_step(tenant_id, execution.id, "a", serde_json::json!({})).await.unwrap();

    services.workflows.pause_execution(tenant_id, execution.id, "investigating a flake").await.unwrap();

    // "b" is the last non-terminal member of the first band; completing it
    // must not promote "c" while the execution is paused.
    let after_pause = services.workflows.complete_step(tenant_id, execution.id, "b", serde_json::json!({})).await.unwrap();
    assert_eq!(after_pause.status, ExecutionStatus::Paused, "completing a step while paused must not resume the execution");

    let steps = services.workflows.get_execution_history(execution.id).await.unwrap();
    assert_eq!(status_of(&steps, "b"), StepStatus::Completed, "the step itself still completes");
    assert_eq!(status_of(&steps, "c"), StepStatus::Pending, "the next band must stay closed while paused");
}

#[tokio::test]
async fn resuming_lets_the_workflow_advance_normally_again() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let initiator = "release-manager";

    let definition = test_fakes::WorkflowDefinitionBuilder::new()
        .with_created_by(initiator)
        .with_workflow_type(WorkflowType::Standard)
        .with_parallel_step("a", StepType::NoOp)
        .with_parallel_step("b", StepType::NoOp)
        .with_step("c", StepType::NoOp)
        .build();
    let definition: WorkflowDefinition = services.workflows.create_workflow(tenant_id, definition).await.unwrap();

    let execution = services
        .workflows
        .start_workflow(tenant_id, definition.id, &initiator.into(), serde_json::json!({}))
        .await
        .unwrap();

    let paused = services.workflows.pause_execution(tenant_id, execution.id, "waiting on approval").await.unwrap();
    assert_eq!(paused.status, ExecutionStatus::Paused);

    let resumed = services.workflows.resume_execution(tenant_id, execution.id).await.unwrap();
    assert_eq!(resumed.status, ExecutionStatus::Running);

    services.workflows.complete_step(tenant_id, execution.id, "a", serde_json::json!({})).await.unwrap();
    services.workflows.complete_step(tenant_id, execution.id, "b", serde_json::json!({})).await.unwrap();

    let steps = services.workflows.get_execution_history(execution.id).await.unwrap();
    assert_eq!(status_of(&steps, "c"), StepStatus::Running, "once resumed, completing the band should still fan in normally");

    let finished = services.workflows.complete_step(tenant_id, execution.id, "c", serde_json::json!({})).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
}
