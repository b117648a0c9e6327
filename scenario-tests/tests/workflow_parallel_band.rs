//! Parallel workflow band fan-out/fan-in: a three-step parallel band sits
//! between two sequential steps. Completing the band members out of order
//! must still advance the execution exactly once the whole band is
//! terminal, and the final step only opens after that.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{ExecutionStatus, StepStatus, StepType, WorkflowDefinition, WorkflowType};
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

#[tokio::test]
async fn completing_a_parallel_band_out_of_order_still_fans_in_once() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();
    let initiator = "release-manager";

    let definition = test_fakes::WorkflowDefinitionBuilder::new()
        .with_created_by(initiator)
        .with_workflow_type(WorkflowType::Standard)
        .with_step("setup", StepType::NoOp)
        .with_parallel_step("build-linux", StepType::NoOp)
        .with_parallel_step("build-macos", StepType::NoOp)
        .with_parallel_step("build-windows", StepType::NoOp)
        .with_step("publish", StepType::NoOp)
        .build();
    let definition: WorkflowDefinition = services.workflows.create_workflow(tenant_id, definition).await.unwrap();

    let execution = services
        .workflows
        .start_workflow(tenant_id, definition.id, &initiator.into(), serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Running);

    // The first band is the lone "setup" step; the parallel band isn't
    // running yet.
    let steps = services.workflows.get_execution_history(execution.id).await.unwrap();
    let status_of = |steps: &[orchestrator_core::models::StepExecution], id: &str| {
        steps.iter().find(|s| s.step_id == id).unwrap().status
    };
    assert_eq!(status_of(&steps, "setup"), StepStatus::Running);
    assert_eq!(status_of(&steps, "build-linux"), StepStatus::Pending);

    services.workflows.complete_step(tenant_id, execution.id, "setup", serde_json::json!({})).await.unwrap();

    let steps = services.workflows.get_execution_history(execution.id).await.unwrap();
    assert_eq!(status_of(&steps, "build-linux"), StepStatus::Running);
    assert_eq!(status_of(&steps, "build-macos"), StepStatus::Running);
    assert_eq!(status_of(&steps, "build-windows"), StepStatus::Running);
    assert_eq!(status_of(&steps, "publish"), StepStatus::Pending);

    // Complete the band out of order: macos, then windows, then linux.
    let mid = services.workflows.complete_step(tenant_id, execution.id, "build-macos", serde_json::json!({})).await.unwrap();
    assert_eq!(mid.status, ExecutionStatus::Running, "the band isn't done until every member is terminal");

    services.workflows.complete_step(tenant_id, execution.id, "build-windows", serde_json::json!({})).await.unwrap();
    services.workflows.complete_step(tenant_id, execution.id, "build-linux", serde_json::json!({})).await.unwrap();

    let steps = services.workflows.get_execution_history(execution.id).await.unwrap();
    assert_eq!(status_of(&steps, "publish"), StepStatus::Running, "the band's completion should fan in to the next step exactly once");

    let finished = services.workflows.complete_step(tenant_id, execution.id, "publish", serde_json::json!({})).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert!(finished.completed_at.is_some());
}
