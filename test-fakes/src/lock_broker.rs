//! In-memory `KvLockBroker`, mirroring `kv-lock`'s Redis-backed broker:
//! the same key namespace, the same auto-refresh-below-threshold
//! background task, and the same error taxonomy — just backed by a
//! `parking_lot::Mutex<HashMap<..>>` instead of a Redis connection, so
//! scenario tests can exercise lock contention without a live broker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use orchestrator_core::error::{CoreError, Result};
use orchestrator_core::ids::{AgentId, DocumentId};
use orchestrator_core::kv::{KvLockBroker, DEFAULT_REFRESH_THRESHOLD};
use orchestrator_core::models::{DocumentLock, SectionLock};

#[derive(Debug, Clone)]
struct Lease {
    agent: AgentId,
    token: String,
    acquired_at: chrono::DateTime<Utc>,
    expires_at: chrono::DateTime<Utc>,
}

fn document_key(document_id: DocumentId) -> String {
    format!("doc:{document_id}")
}

fn section_key(document_id: DocumentId, section: &str) -> String {
    format!("doc:{document_id}:section:{section}")
}

/// In-memory distributed lock broker for tests.
pub struct InMemoryLockBroker {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    refresh_threshold: Duration,
    refresh_tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl Default for InMemoryLockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLockBroker {
    pub fn new() -> Self {
        Self {
            leases: Arc::new(Mutex::new(HashMap::new())),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            refresh_tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    fn acquire(&self, key: &str, agent: &AgentId, ttl: Duration) -> Result<Lease> {
        let mut leases = self.leases.lock();
        if let Some(existing) = leases.get(key) {
            if existing.expires_at > Utc::now() {
                return Err(CoreError::Locked(format!("{key} is already held")));
            }
        }
        let now = Utc::now();
        let lease = Lease {
            agent: agent.clone(),
            token: Uuid::new_v4().to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };
        leases.insert(key.to_string(), lease.clone());
        drop(leases);
        self.start_auto_refresh(key.to_string(), agent.clone(), ttl);
        Ok(lease)
    }

    fn release(&self, key: &str, agent: &AgentId) -> Result<()> {
        self.stop_auto_refresh(key);
        let mut leases = self.leases.lock();
        match leases.get(key) {
            None => Err(CoreError::NotOwner(format!("{key} had already expired"))),
            Some(lease) if lease.expires_at <= Utc::now() => {
                leases.remove(key);
                Err(CoreError::NotOwner(format!("{key} had already expired")))
            }
            Some(lease) if &lease.agent != agent => Err(CoreError::NotOwner(format!("{key} is held by a different agent"))),
            Some(_) => {
                leases.remove(key);
                Ok(())
            }
        }
    }

    fn extend(&self, key: &str, agent: &AgentId, ttl: Duration) -> Result<Lease> {
        let mut leases = self.leases.lock();
        match leases.get_mut(key) {
            None => Err(CoreError::Expired(format!("{key} lease has lapsed"))),
            Some(lease) if lease.expires_at <= Utc::now() => Err(CoreError::Expired(format!("{key} lease has lapsed"))),
            Some(lease) if &lease.agent != agent => Err(CoreError::NotOwner(format!("{key} is held by a different agent"))),
            Some(lease) => {
                lease.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
                Ok(lease.clone())
            }
        }
    }

    fn read(&self, key: &str) -> Option<Lease> {
        let leases = self.leases.lock();
        leases.get(key).filter(|l| l.expires_at > Utc::now()).cloned()
    }

    fn start_auto_refresh(&self, key: String, agent: AgentId, ttl: Duration) {
        let leases = self.leases.clone();
        let threshold = self.refresh_threshold;
        let tasks = self.refresh_tasks.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            loop {
                let sleep_for = ttl.saturating_sub(threshold).max(Duration::from_millis(10));
                tokio::time::sleep(sleep_for).await;

                let mut guard = leases.lock();
                match guard.get_mut(&task_key) {
                    Some(lease) if lease.agent == agent && lease.expires_at > Utc::now() => {
                        lease.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
                    }
                    _ => {
                        warn!(key = %task_key, "auto-refresh stopping: lease lost");
                        break;
                    }
                }
            }
            tasks.lock().remove(&task_key);
        });

        self.refresh_tasks.lock().insert(key, handle);
    }

    fn stop_auto_refresh(&self, key: &str) {
        if let Some(handle) = self.refresh_tasks.lock().remove(key) {
            handle.abort();
        }
    }
}

#[async_trait]
impl KvLockBroker for InMemoryLockBroker {
    async fn lock_document(&self, document_id: DocumentId, agent: &AgentId, ttl: Duration) -> Result<DocumentLock> {
        let lease = self.acquire(&document_key(document_id), agent, ttl)?;
        Ok(DocumentLock {
            document_id,
            holder: agent.clone(),
            token: lease.token,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        })
    }

    async fn unlock_document(&self, document_id: DocumentId, agent: &AgentId) -> Result<()> {
        self.release(&document_key(document_id), agent)
    }

    async fn extend_document_lock(&self, document_id: DocumentId, agent: &AgentId, ttl: Duration) -> Result<DocumentLock> {
        let lease = self.extend(&document_key(document_id), agent, ttl)?;
        Ok(DocumentLock {
            document_id,
            holder: agent.clone(),
            token: lease.token,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        })
    }

    async fn is_document_locked(&self, document_id: DocumentId) -> Result<Option<DocumentLock>> {
        Ok(self.read(&document_key(document_id)).map(|lease| DocumentLock {
            document_id,
            holder: lease.agent,
            token: lease.token,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        }))
    }

    async fn lock_section(&self, document_id: DocumentId, section: &str, agent: &AgentId, ttl: Duration) -> Result<SectionLock> {
        let lease = self.acquire(&section_key(document_id, section), agent, ttl)?;
        Ok(SectionLock {
            document_id,
            section: section.to_string(),
            holder: agent.clone(),
            token: lease.token,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        })
    }

    async fn unlock_section(&self, document_id: DocumentId, section: &str, agent: &AgentId) -> Result<()> {
        self.release(&section_key(document_id, section), agent)
    }

    async fn extend_section_lock(&self, document_id: DocumentId, section: &str, agent: &AgentId, ttl: Duration) -> Result<SectionLock> {
        let lease = self.extend(&section_key(document_id, section), agent, ttl)?;
        Ok(SectionLock {
            document_id,
            section: section.to_string(),
            holder: agent.clone(),
            token: lease.token,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        })
    }

    async fn get_section_locks(&self, document_id: DocumentId) -> Result<Vec<SectionLock>> {
        let prefix = format!("doc:{document_id}:section:");
        let leases = self.leases.lock();
        let now = Utc::now();
        Ok(leases
            .iter()
            .filter(|(key, lease)| key.starts_with(&prefix) && lease.expires_at > now)
            .map(|(key, lease)| SectionLock {
                document_id,
                section: key.rsplit(':').next().unwrap_or_default().to_string(),
                holder: lease.agent.clone(),
                token: lease.token.clone(),
                acquired_at: lease.acquired_at,
                expires_at: lease.expires_at,
            })
            .collect())
    }
}
