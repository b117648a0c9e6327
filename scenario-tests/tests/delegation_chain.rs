//! Delegation chain across three agents: a task is assigned, accepted, and
//! handed off twice before the final holder completes it. Each delegation
//! must leave exactly one delegation record and move `assigned_to` to the
//! new holder without disturbing the task's other fields.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{DelegationType, NewDelegation, NewTask, TaskStatus};
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

#[tokio::test]
async fn a_task_can_be_delegated_twice_before_completion() {
    let store = Arc::new(InMemoryStore::new());
    let services = CoreServices::new(store.clone(), Arc::new(SystemClock), CoreConfig::default());
    let tenant_id = TenantId::new();

    let alice = "alice";
    let bob = "bob";
    let carol = "carol";

    let task = services
        .tasks
        .create(tenant_id, NewTask::new(alice, "three-way handoff", "passed along a chain"), None)
        .await
        .unwrap();

    services.tasks.assign_task(tenant_id, task.id, &alice.into()).await.unwrap();
    services.tasks.accept_task(tenant_id, task.id, &alice.into()).await.unwrap();

    let after_first = services
        .tasks
        .delegate_task(
            tenant_id,
            NewDelegation {
                task_id: task.id,
                from_agent_id: alice.into(),
                to_agent_id: bob.into(),
                reason: "alice is overloaded".to_string(),
                delegation_type: DelegationType::LoadBalance,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
    assert_eq!(after_first.assigned_to.as_ref().map(|a| a.as_str()), Some(bob));
    assert_eq!(after_first.status, TaskStatus::Assigned);

    services.tasks.accept_task(tenant_id, task.id, &bob.into()).await.unwrap();

    let after_second = services
        .tasks
        .delegate_task(
            tenant_id,
            NewDelegation {
                task_id: task.id,
                from_agent_id: bob.into(),
                to_agent_id: carol.into(),
                reason: "needs carol's expertise".to_string(),
                delegation_type: DelegationType::Manual,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
    assert_eq!(after_second.assigned_to.as_ref().map(|a| a.as_str()), Some(carol));

    services.tasks.accept_task(tenant_id, task.id, &carol.into()).await.unwrap();
    services.tasks.start_task(tenant_id, task.id, &carol.into()).await.unwrap();
    let completed = services
        .tasks
        .complete_task(tenant_id, task.id, &carol.into(), serde_json::json!({"outcome": "done"}))
        .await
        .unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.assigned_to.as_ref().map(|a| a.as_str()), Some(carol));

    let delegation_calls = store.call_history().iter().filter(|c| c.as_str() == "insert_delegation").count();
    assert_eq!(delegation_calls, 2, "exactly two delegations should have been recorded");
}
