//! Redis-backed [`KvLockBroker`].
//!
//! Acquisition is an atomic `SET key value NX PX ttl`; the stored value is
//! `{agent, token, expires_at_unix_ns}`. Release and extension run as Lua
//! scripts so the compare-then-mutate is atomic against a racing holder.
//! Document and section locks live in disjoint key namespaces (`doc:{id}`
//! vs `doc:{id}:section:{sid}`), matching the KV schema the core's services
//! assume.
//!
//! Every successful acquisition spawns a cooperative auto-refresh task: once
//! the held lease's remaining TTL drops below `refresh_threshold`, the task
//! re-runs the extend script on the holder's behalf. The task exits (and
//! stops refreshing) on explicit unlock or the first failed extend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};
use uuid::Uuid;

use orchestrator_core::error::{CoreError, Result};
use orchestrator_core::ids::{AgentId, DocumentId};
use orchestrator_core::kv::{KvLockBroker, DEFAULT_REFRESH_THRESHOLD};
use orchestrator_core::models::{DocumentLock, SectionLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseValue {
    agent: String,
    token: String,
    expires_at_unix_ns: i64,
}

impl LeaseValue {
    fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.expires_at_unix_ns)
    }
}

const UNLOCK_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then return 'EXPIRED' end
local data = cjson.decode(current)
if data.agent ~= ARGV[1] then return 'NOT_OWNER' end
redis.call('DEL', KEYS[1])
return 'OK'
"#;

const EXTEND_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then return 'EXPIRED' end
local data = cjson.decode(current)
if data.agent ~= ARGV[1] then return 'NOT_OWNER' end
data.expires_at_unix_ns = tonumber(ARGV[3])
local encoded = cjson.encode(data)
redis.call('SET', KEYS[1], encoded, 'PX', ARGV[2])
return encoded
"#;

fn map_redis_error(err: redis::RedisError) -> CoreError {
    CoreError::Internal(format!("redis error: {err}"))
}

fn document_key(document_id: DocumentId) -> String {
    format!("doc:{document_id}")
}

fn section_key(document_id: DocumentId, section: &str) -> String {
    format!("doc:{document_id}:section:{section}")
}

enum ScriptOutcome {
    Ok(String),
    Expired,
    NotOwner,
}

async fn run_guarded_script(conn: &mut ConnectionManager, script: &Script, key: &str, agent: &AgentId, extra: &[String]) -> Result<ScriptOutcome> {
    let mut invocation = script.key(key).arg(agent.as_str());
    for arg in extra {
        invocation = invocation.arg(arg.as_str());
    }
    let result: String = invocation.invoke_async(conn).await.map_err(map_redis_error)?;
    Ok(match result.as_str() {
        "EXPIRED" => ScriptOutcome::Expired,
        "NOT_OWNER" => ScriptOutcome::NotOwner,
        "OK" => ScriptOutcome::Ok(result),
        _ => ScriptOutcome::Ok(result),
    })
}

/// Redis-backed distributed lock broker.
pub struct RedisLockBroker {
    conn: ConnectionManager,
    refresh_threshold: Duration,
    refresh_tasks: Arc<AsyncMutex<HashMap<String, JoinHandle<()>>>>,
}

impl RedisLockBroker {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client).await.map_err(map_redis_error)?;
        Ok(Self {
            conn,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            refresh_tasks: Arc::new(AsyncMutex::new(HashMap::new())),
        })
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    async fn acquire(&self, key: &str, agent: &AgentId, ttl: Duration) -> Result<LeaseValue> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        let value = LeaseValue {
            agent: agent.as_str().to_string(),
            token,
            expires_at_unix_ns: expires_at.timestamp_nanos_opt().unwrap_or(0),
        };
        let encoded = serde_json::to_string(&value).map_err(|e| CoreError::Internal(format!("lease encoding failed: {e}")))?;

        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&encoded)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        match set {
            Some(_) => {
                self.start_auto_refresh(key.to_string(), agent.clone(), ttl).await;
                Ok(value)
            }
            None => Err(CoreError::Locked(format!("{key} is already held"))),
        }
    }

    async fn release(&self, key: &str, agent: &AgentId) -> Result<()> {
        self.stop_auto_refresh(key).await;
        let script = Script::new(UNLOCK_SCRIPT);
        let mut conn = self.conn.clone();
        match run_guarded_script(&mut conn, &script, key, agent, &[]).await? {
            ScriptOutcome::Ok(_) => Ok(()),
            ScriptOutcome::Expired => Err(CoreError::NotOwner(format!("{key} had already expired"))),
            ScriptOutcome::NotOwner => Err(CoreError::NotOwner(format!("{key} is held by a different agent"))),
        }
    }

    async fn extend(&self, key: &str, agent: &AgentId, ttl: Duration) -> Result<LeaseValue> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        let args = vec![ttl.as_millis().max(1).to_string(), expires_at.timestamp_nanos_opt().unwrap_or(0).to_string()];
        let script = Script::new(EXTEND_SCRIPT);
        let mut conn = self.conn.clone();
        match run_guarded_script(&mut conn, &script, key, agent, &args).await? {
            ScriptOutcome::Ok(encoded) => {
                let value: LeaseValue = serde_json::from_str(&encoded)
                    .map_err(|e| CoreError::Internal(format!("corrupt lease value: {e}")))?;
                Ok(value)
            }
            ScriptOutcome::Expired => Err(CoreError::Expired(format!("{key} lease has lapsed"))),
            ScriptOutcome::NotOwner => Err(CoreError::NotOwner(format!("{key} is held by a different agent"))),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<LeaseValue>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        match raw {
            None => Ok(None),
            Some(raw) => {
                let value: LeaseValue = serde_json::from_str(&raw)
                    .map_err(|e| CoreError::Internal(format!("corrupt lease value: {e}")))?;
                if value.expires_at() <= Utc::now() {
                    Ok(None)
                } else {
                    Ok(Some(value))
                }
            }
        }
    }

    /// Spawn (or replace) the cooperative refresh task for `key`. Exits
    /// silently once the extend script reports the lease is gone or held by
    /// someone else — there is nothing left for this agent to refresh.
    async fn start_auto_refresh(&self, key: String, agent: AgentId, ttl: Duration) {
        let conn = self.conn.clone();
        let threshold = self.refresh_threshold;
        let tasks = self.refresh_tasks.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            loop {
                let sleep_for = ttl.saturating_sub(threshold).max(Duration::from_millis(50));
                tokio::time::sleep(sleep_for).await;

                let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
                let args = vec![ttl.as_millis().max(1).to_string(), expires_at.timestamp_nanos_opt().unwrap_or(0).to_string()];
                let script = Script::new(EXTEND_SCRIPT);
                let mut conn = conn.clone();
                match run_guarded_script(&mut conn, &script, &task_key, &agent, &args).await {
                    Ok(ScriptOutcome::Ok(_)) => continue,
                    Ok(_) => {
                        warn!(key = %task_key, "auto-refresh stopping: lease lost");
                        break;
                    }
                    Err(err) => {
                        warn!(key = %task_key, %err, "auto-refresh extend failed");
                        break;
                    }
                }
            }
            tasks.lock().await.remove(&task_key);
        });

        self.refresh_tasks.lock().await.insert(key, handle);
    }

    async fn stop_auto_refresh(&self, key: &str) {
        if let Some(handle) = self.refresh_tasks.lock().await.remove(key) {
            handle.abort();
        }
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        use futures::StreamExt;

        let mut conn = self.conn.clone();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await.map_err(map_redis_error)?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl KvLockBroker for RedisLockBroker {
    #[instrument(skip(self, agent))]
    async fn lock_document(&self, document_id: DocumentId, agent: &AgentId, ttl: Duration) -> Result<DocumentLock> {
        let key = document_key(document_id);
        let value = self.acquire(&key, agent, ttl).await?;
        Ok(DocumentLock {
            document_id,
            holder: agent.clone(),
            token: value.token,
            acquired_at: Utc::now(),
            expires_at: value.expires_at(),
        })
    }

    async fn unlock_document(&self, document_id: DocumentId, agent: &AgentId) -> Result<()> {
        self.release(&document_key(document_id), agent).await
    }

    async fn extend_document_lock(&self, document_id: DocumentId, agent: &AgentId, ttl: Duration) -> Result<DocumentLock> {
        let value = self.extend(&document_key(document_id), agent, ttl).await?;
        Ok(DocumentLock {
            document_id,
            holder: agent.clone(),
            token: value.token,
            acquired_at: Utc::now(),
            expires_at: value.expires_at(),
        })
    }

    async fn is_document_locked(&self, document_id: DocumentId) -> Result<Option<DocumentLock>> {
        let value = self.read(&document_key(document_id)).await?;
        Ok(value.map(|v| DocumentLock {
            document_id,
            holder: AgentId::new(v.agent),
            token: v.token,
            acquired_at: Utc::now(),
            expires_at: v.expires_at(),
        }))
    }

    async fn lock_section(&self, document_id: DocumentId, section: &str, agent: &AgentId, ttl: Duration) -> Result<SectionLock> {
        let key = section_key(document_id, section);
        let value = self.acquire(&key, agent, ttl).await?;
        Ok(SectionLock {
            document_id,
            section: section.to_string(),
            holder: agent.clone(),
            token: value.token,
            acquired_at: Utc::now(),
            expires_at: value.expires_at(),
        })
    }

    async fn unlock_section(&self, document_id: DocumentId, section: &str, agent: &AgentId) -> Result<()> {
        self.release(&section_key(document_id, section), agent).await
    }

    async fn extend_section_lock(&self, document_id: DocumentId, section: &str, agent: &AgentId, ttl: Duration) -> Result<SectionLock> {
        let value = self.extend(&section_key(document_id, section), agent, ttl).await?;
        Ok(SectionLock {
            document_id,
            section: section.to_string(),
            holder: agent.clone(),
            token: value.token,
            acquired_at: Utc::now(),
            expires_at: value.expires_at(),
        })
    }

    async fn get_section_locks(&self, document_id: DocumentId) -> Result<Vec<SectionLock>> {
        let pattern = section_key(document_id, "*");
        let keys = self.scan_keys(&pattern).await?;
        let mut locks = Vec::new();
        for key in keys {
            if let Some(value) = self.read(&key).await? {
                let section = key
                    .rsplit(':')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                locks.push(SectionLock {
                    document_id,
                    section,
                    holder: AgentId::new(value.agent),
                    token: value.token,
                    acquired_at: Utc::now(),
                    expires_at: value.expires_at(),
                });
            }
        }
        Ok(locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_and_section_keys_stay_in_disjoint_namespaces() {
        let doc = DocumentId::new();
        let doc_key = document_key(doc);
        let sec_key = section_key(doc, "title");
        assert!(doc_key.starts_with("doc:"));
        assert!(sec_key.starts_with("doc:"));
        assert!(sec_key.contains(":section:"));
        assert_ne!(doc_key, sec_key);
    }

    #[test]
    fn lease_value_round_trips_through_json() {
        let value = LeaseValue {
            agent: "agent-1".into(),
            token: "tok-1".into(),
            expires_at_unix_ns: Utc::now().timestamp_nanos_opt().unwrap(),
        };
        let encoded = serde_json::to_string(&value).unwrap();
        let decoded: LeaseValue = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.agent, value.agent);
        assert_eq!(decoded.token, value.token);
    }
}
