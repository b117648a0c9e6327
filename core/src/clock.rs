//! Clock abstraction — injected so tests can control time instead of racing
//! `Utc::now()`. Mirrors the explicit dependency injection called for in the
//! design notes (`Store`, `KV`, `Clock`, `IDGen`, `Notifier` at construction).

use chrono::{DateTime, Utc};

/// Source of wall-clock time for the core services.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identifier generator — a second small seam so tests get deterministic IDs
/// without needing to parse UUIDs out of assertions.
pub trait IdGen: Send + Sync {
    fn new_uuid(&self) -> uuid::Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGen;

impl IdGen for UuidGen {
    fn new_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::new_v4()
    }
}
