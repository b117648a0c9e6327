//! 1,000-way concurrent counter increment: every successful `increment`
//! call against the same workspace state path must be reflected exactly
//! once in the final value, regardless of interleaving.

use std::sync::Arc;

use orchestrator_core::ids::TenantId;
use orchestrator_core::models::{NewWorkspace, StateOp};
use orchestrator_core::{CoreConfig, CoreServices, SystemClock};
use test_fakes::InMemoryStore;

const CONCURRENT_INCREMENTS: usize = 1000;

#[tokio::test]
async fn a_thousand_concurrent_increments_land_exactly_once_each() {
    let store = Arc::new(InMemoryStore::new());
    let services = Arc::new(CoreServices::new(store, Arc::new(SystemClock), CoreConfig::default()));
    let tenant_id = TenantId::new();
    let owner = "workspace-owner";

    let workspace = services
        .workspaces
        .create(
            tenant_id,
            NewWorkspace {
                name: "concurrency workspace".to_string(),
                description: "".to_string(),
                owner_id: owner.into(),
                is_public: false,
                settings: serde_json::json!({}),
                tags: vec![],
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::with_capacity(CONCURRENT_INCREMENTS);
    for _ in 0..CONCURRENT_INCREMENTS {
        let services = services.clone();
        let workspace_id = workspace.id;
        handles.push(tokio::spawn(async move {
            services
                .workspaces
                .update_state(workspace_id, &owner.into(), StateOp::increment("/counters/tasks_completed", 1.0))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let state = services.workspaces.get_state(workspace.id).await.unwrap();
    assert_eq!(state.data["counters"]["tasks_completed"], serde_json::json!(CONCURRENT_INCREMENTS as f64));
    assert_eq!(state.version, CONCURRENT_INCREMENTS as u64);
}
