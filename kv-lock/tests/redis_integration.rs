//! End-to-end tests against a real Redis instance.
//!
//! ```text
//! TEST_REDIS_URL=redis://127.0.0.1/ cargo test -p kv-lock -- --ignored
//! ```

use std::time::Duration;

use kv_lock::RedisLockBroker;
use orchestrator_core::ids::{AgentId, DocumentId};
use orchestrator_core::kv::KvLockBroker;

async fn connect() -> RedisLockBroker {
    let url = std::env::var("TEST_REDIS_URL").expect("TEST_REDIS_URL must be set to run ignored redis tests");
    RedisLockBroker::connect(&url).await.expect("connect to redis")
}

#[tokio::test]
#[ignore]
async fn second_lock_attempt_is_rejected_while_first_is_held() {
    let broker = connect().await;
    let document_id = DocumentId::new();
    let alice = AgentId::new("alice");
    let bob = AgentId::new("bob");

    let _lock = broker.lock_document(document_id, &alice, Duration::from_secs(30)).await.unwrap();
    let contested = broker.lock_document(document_id, &bob, Duration::from_secs(30)).await;
    assert!(contested.unwrap_err().is_locked());

    broker.unlock_document(document_id, &alice).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn lock_unlock_relock_succeeds_for_a_new_holder() {
    let broker = connect().await;
    let document_id = DocumentId::new();
    let alice = AgentId::new("alice");
    let bob = AgentId::new("bob");

    broker.lock_document(document_id, &alice, Duration::from_secs(5)).await.unwrap();
    broker.unlock_document(document_id, &alice).await.unwrap();
    let relocked = broker.lock_document(document_id, &bob, Duration::from_secs(5)).await;
    assert!(relocked.is_ok());

    broker.unlock_document(document_id, &bob).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn only_one_of_a_hundred_concurrent_attempts_wins() {
    let broker = std::sync::Arc::new(connect().await);
    let document_id = DocumentId::new();

    let mut handles = Vec::new();
    for i in 0..100 {
        let broker = broker.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::new(format!("agent-{i}"));
            broker.lock_document(document_id, &agent, Duration::from_secs(30)).await.is_ok()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
#[ignore]
async fn auto_refresh_extends_the_lease_past_the_refresh_threshold() {
    let broker = RedisLockBroker::connect(&std::env::var("TEST_REDIS_URL").unwrap())
        .await
        .unwrap()
        .with_refresh_threshold(Duration::from_millis(400));
    let document_id = DocumentId::new();
    let agent = AgentId::new("alice");

    let initial = broker.lock_document(document_id, &agent, Duration::from_millis(500)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    let current = broker.is_document_locked(document_id).await.unwrap().expect("auto-refresh should have kept the lease alive");
    assert!(current.expires_at > initial.expires_at);

    broker.unlock_document(document_id, &agent).await.unwrap();
}
