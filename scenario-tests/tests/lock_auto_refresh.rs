//! Lock auto-refresh extends a held lease's `expires_at` past the refresh
//! threshold without the holder having to call `extend_document_lock`
//! itself, and stops cleanly once the lock is released.

use std::time::Duration;

use orchestrator_core::ids::{AgentId, DocumentId};
use orchestrator_core::kv::KvLockBroker;
use test_fakes::InMemoryLockBroker;

#[tokio::test]
async fn a_held_lease_keeps_extending_itself_past_the_refresh_threshold() {
    let broker = InMemoryLockBroker::new().with_refresh_threshold(Duration::from_millis(40));
    let document_id = DocumentId::new();
    let agent = AgentId::new("long-running-editor");

    let initial = broker.lock_document(document_id, &agent, Duration::from_millis(60)).await.unwrap();

    // Sleep past the original TTL; without auto-refresh the lease would have
    // lapsed and a contender would win it.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let contender = AgentId::new("contender");
    let contested = broker.lock_document(document_id, &contender, Duration::from_secs(5)).await;
    assert!(contested.unwrap_err().is_locked(), "auto-refresh should have kept the original lease alive");

    let current = broker.is_document_locked(document_id).await.unwrap().expect("lease should still be visible");
    assert!(current.expires_at > initial.expires_at, "the lease's expiry should have moved forward");
    assert_eq!(current.holder, agent);

    broker.unlock_document(document_id, &agent).await.unwrap();
    assert!(
        broker.lock_document(document_id, &contender, Duration::from_secs(5)).await.is_ok(),
        "once released, a new holder should be able to acquire the lock"
    );
}
