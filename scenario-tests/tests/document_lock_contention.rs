//! 100-way document lock contention: exactly one of a hundred concurrent
//! `lock_document` callers should win the lease; everyone else must see
//! `ErrLocked`, never a silently-overwritten holder.

use std::sync::Arc;
use std::time::Duration;

use orchestrator_core::ids::{AgentId, DocumentId};
use orchestrator_core::kv::KvLockBroker;
use test_fakes::InMemoryLockBroker;

#[tokio::test]
async fn exactly_one_of_a_hundred_concurrent_lockers_wins() {
    let broker = Arc::new(InMemoryLockBroker::new());
    let document_id = DocumentId::new();

    let mut handles = Vec::with_capacity(100);
    for i in 0..100 {
        let broker = broker.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::new(format!("agent-{i}"));
            broker.lock_document(document_id, &agent, Duration::from_secs(30)).await
        }));
    }

    let mut winners = 0;
    let mut locked_rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => {
                assert!(err.is_locked(), "every loser should see ErrLocked, not some other failure");
                locked_rejections += 1;
            }
        }
    }

    assert_eq!(winners, 1, "exactly one caller should hold the document lock");
    assert_eq!(locked_rejections, 99);

    let current = broker.is_document_locked(document_id).await.unwrap();
    assert!(current.is_some(), "the winning lease should still be visible");
}
