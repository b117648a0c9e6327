pub mod document;
pub mod lock;
pub mod state;
pub mod task;
pub mod workflow;
pub mod workspace;

pub use document::{DocumentOpType, DocumentOperation, NewDocument, NewDocumentOperation, SharedDocument};
pub use lock::{DocumentLock, SectionLock};
pub use state::{StateOp, StateOpType, WorkspaceState};
pub use task::{
    CompletionMode, CoordinationMode, DelegationType, NewDelegation, NewTask, Task, TaskDelegation,
    TaskFilter, TaskStatus, TaskTree,
};
pub use workflow::{
    ExecutionStatus, StepConfig, StepDefinition, StepExecution, StepStatus, StepType,
    WorkflowDefinition, WorkflowExecution, WorkflowMetrics, WorkflowType,
};
pub use workspace::{MemberActivity, MemberRole, NewWorkspace, Workspace, WorkspaceFilter, WorkspaceMember, WorkspaceUpdate, WorkspaceStatus};
