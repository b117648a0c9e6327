//! Postgres implementation of the orchestrator core's [`Store`] trait.
//!
//! - Postgres backing with `sqlx`, JSONB columns for every open-ended field
//!   (parameters, results, steps, state trees, vector clocks)
//! - `sqlx::migrate!` schema management against `./migrations`
//! - Connection pooling via `PgPoolOptions`
//! - Compare-and-set writes backed by row-level `FOR UPDATE` locking
//!
//! # Usage
//!
//! ```rust,no_run
//! use store_postgres::{PostgresStore, Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/orchestrator").await?;
//!     store.migrate().await?;
//!     store.health_check().await?;
//!     Ok(())
//! }
//! ```

mod common;
mod postgres;

pub use postgres::PostgresStore;

pub use orchestrator_core::error::{CoreError, Result};
pub use orchestrator_core::models::{NewTask, Task, TaskFilter, TaskStatus};
pub use orchestrator_core::repository::Store;
