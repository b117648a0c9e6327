//! Orchestrator Core Library
//!
//! Foundational domain models, business logic, and trait interfaces for a
//! multi-tenant task/workflow/workspace orchestrator. Satellite crates
//! (`store-postgres`, `kv-lock`, `test-fakes`, `scenario-tests`) depend on
//! the types and trait contracts defined here; this crate itself has no
//! storage or transport dependency.
//!
//! # Architecture
//!
//! - [`ids`] - strongly-typed entity identifiers
//! - [`models`] - domain models (Task, WorkflowDefinition, Workspace, SharedDocument, ...)
//! - [`error`] - the stable `CoreError` taxonomy
//! - [`clock`] - `Clock`/`IdGen` injection seams
//! - [`vector_clock`] - causal ordering for document operations
//! - [`state_ops`] - JSON-path mutation engine for workspace state trees
//! - [`repository`] - the `Store` trait for persistence
//! - [`kv`] - the `KvLockBroker` trait for distributed document/section locks
//! - [`notify`] - the in-process `NotificationBus`
//! - [`validation`] - per-entity input validation
//! - [`config`] - `CoreConfig`, the tunables the services consult
//! - [`services`] - `TaskService`, `WorkflowService`, `WorkspaceService`, `DocumentService`

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod kv;
pub mod models;
pub mod notify;
pub mod repository;
pub mod services;
pub mod state_ops;
pub mod validation;
pub mod vector_clock;

pub use clock::{Clock, IdGen, SystemClock, UuidGen};
pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use kv::KvLockBroker;
pub use notify::{Event, EventType, NotificationBus};
pub use repository::Store;
pub use services::{CoreServices, DocumentService, TaskService, WorkflowService, WorkspaceService};
pub use validation::{TaskValidator, WorkflowValidator, WorkspaceValidator};
pub use vector_clock::VectorClock;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
