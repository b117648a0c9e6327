pub mod document_service;
pub mod task_service;
pub mod workflow_service;
pub mod workspace_service;

pub use document_service::DocumentService;
pub use task_service::TaskService;
pub use workflow_service::WorkflowService;
pub use workspace_service::WorkspaceService;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::notify::NotificationBus;
use crate::repository::Store;

/// Owns one instance of each service, wired to a shared `Store`, `Clock`,
/// and `NotificationBus`. Construct one per tenant-serving process; the
/// `KvLockBroker` is held separately since only document operations need
/// it, and callers acquire locks themselves before calling into
/// `WorkspaceService`.
///
/// `DocumentService` is intentionally not exposed directly: listing and
/// mutating a workspace's documents must go through `WorkspaceService`,
/// which checks membership and write role before delegating.
pub struct CoreServices {
    pub tasks: TaskService,
    pub workflows: WorkflowService,
    pub workspaces: WorkspaceService,
}

impl CoreServices {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: CoreConfig) -> Self {
        let bus = NotificationBus::new();
        let documents = Arc::new(DocumentService::new(store.clone(), clock.clone(), bus.clone()));
        Self {
            tasks: TaskService::new(store.clone(), clock.clone(), bus.clone(), config.clone()),
            workflows: WorkflowService::new(
                store.clone(),
                clock.clone(),
                bus.clone(),
                config.max_steps_per_workflow,
            ),
            workspaces: WorkspaceService::new(store, clock, bus, documents),
        }
    }
}
