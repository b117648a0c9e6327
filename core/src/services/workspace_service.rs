//! Workspace Service — workspace lifecycle, membership, and the read/write
//! front door to documents and state (which it delegates to
//! [`crate::services::document_service::DocumentService`] and
//! [`crate::state_ops`] respectively, after checking membership and role).

use std::sync::Arc;

use tracing::instrument;

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::ids::{AgentId, DocumentId, TenantId, WorkspaceId};
use crate::models::{
    DocumentOperation, MemberActivity, MemberRole, NewDocumentOperation, NewWorkspace, SharedDocument,
    StateOp, Workspace, WorkspaceFilter, WorkspaceMember, WorkspaceState, WorkspaceStatus, WorkspaceUpdate,
};
use crate::notify::{Event, NotificationBus};
use crate::repository::Store;
use crate::services::document_service::DocumentService;
use crate::validation::WorkspaceValidator;

pub struct WorkspaceService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    bus: NotificationBus,
    documents: Arc<DocumentService>,
}

impl WorkspaceService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, bus: NotificationBus, documents: Arc<DocumentService>) -> Self {
        Self { store, clock, bus, documents }
    }

    #[instrument(skip(self, workspace))]
    pub async fn create(&self, tenant_id: crate::ids::TenantId, workspace: NewWorkspace) -> Result<Workspace> {
        WorkspaceValidator::validate_new_workspace(&workspace)?;
        let owner = workspace.owner_id.clone();
        let created = self.store.create_workspace(tenant_id, workspace).await?;
        self.store
            .add_member(
                created.id,
                WorkspaceMember {
                    workspace_id: created.id,
                    agent_id: owner,
                    role: MemberRole::Owner,
                    joined_at: self.clock.now(),
                },
            )
            .await?;
        Ok(created)
    }

    pub async fn get(&self, tenant_id: crate::ids::TenantId, id: WorkspaceId) -> Result<Workspace> {
        self.store.get_workspace(tenant_id, id).await
    }

    pub async fn update(&self, tenant_id: crate::ids::TenantId, id: WorkspaceId, update: WorkspaceUpdate) -> Result<Workspace> {
        let workspace = self.store.get_workspace(tenant_id, id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(CoreError::Validation(format!(
                "workspace {id} is not active"
            )));
        }
        self.store.update_workspace(tenant_id, id, update).await
    }

    pub async fn archive(&self, tenant_id: crate::ids::TenantId, id: WorkspaceId) -> Result<Workspace> {
        let workspace = self.store.get_workspace(tenant_id, id).await?;
        if workspace.status != WorkspaceStatus::Active {
            return Err(CoreError::illegal_transition("Active", "Archived"));
        }
        self.store
            .update_workspace(
                tenant_id,
                id,
                WorkspaceUpdate {
                    status: Some(WorkspaceStatus::Archived),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn delete(&self, tenant_id: crate::ids::TenantId, id: WorkspaceId) -> Result<()> {
        self.store.delete_workspace(tenant_id, id).await
    }

    pub async fn search_workspaces(
        &self,
        tenant_id: crate::ids::TenantId,
        text: &str,
        filter: WorkspaceFilter,
    ) -> Result<Vec<Workspace>> {
        self.store.search_workspaces(tenant_id, text, filter).await
    }

    pub async fn add_member(&self, workspace_id: WorkspaceId, agent: AgentId, role: MemberRole) -> Result<WorkspaceMember> {
        self.store
            .add_member(
                workspace_id,
                WorkspaceMember {
                    workspace_id,
                    agent_id: agent,
                    role,
                    joined_at: self.clock.now(),
                },
            )
            .await
    }

    pub async fn remove_member(&self, tenant_id: crate::ids::TenantId, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()> {
        let workspace = self.store.get_workspace(tenant_id, workspace_id).await?;
        if &workspace.owner_id == agent {
            return Err(CoreError::Validation("cannot remove the workspace owner".to_string()));
        }
        self.store.remove_member(workspace_id, agent).await
    }

    pub async fn update_member_role(
        &self,
        workspace_id: WorkspaceId,
        agent: &AgentId,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        self.store.update_member_role(workspace_id, agent, role).await
    }

    pub async fn list_members(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceMember>> {
        self.store.list_members(workspace_id).await
    }

    pub async fn get_member_activity(&self, workspace_id: WorkspaceId) -> Result<Vec<MemberActivity>> {
        self.store.get_member_activity(workspace_id).await
    }

    /// Resolve `agent`'s role, failing with `CoreError::PermissionDenied` if
    /// they aren't a member at all.
    async fn role_of(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<MemberRole> {
        let members = self.store.list_members(workspace_id).await?;
        members
            .into_iter()
            .find(|m| &m.agent_id == agent)
            .map(|m| m.role)
            .ok_or_else(|| CoreError::PermissionDenied(format!("{agent} is not a member of workspace {workspace_id}")))
    }

    pub async fn require_write_access(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()> {
        let role = self.role_of(workspace_id, agent).await?;
        if !role.can_write() {
            return Err(CoreError::PermissionDenied(format!(
                "{agent} (role {role:?}) cannot write to workspace {workspace_id}"
            )));
        }
        Ok(())
    }

    pub async fn require_admin_access(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<()> {
        let role = self.role_of(workspace_id, agent).await?;
        if !role.can_administer() {
            return Err(CoreError::PermissionDenied(format!(
                "{agent} (role {role:?}) cannot administer workspace {workspace_id}"
            )));
        }
        Ok(())
    }

    /// Lists a workspace's documents after confirming `agent` is a member;
    /// any role, including `Viewer`, may read.
    pub async fn list_documents(&self, workspace_id: WorkspaceId, agent: &AgentId) -> Result<Vec<SharedDocument>> {
        self.role_of(workspace_id, agent).await?;
        self.documents.list(workspace_id).await
    }

    /// Applies a document operation after confirming `agent` has write
    /// access to the workspace, then delegates to the Document Service.
    #[instrument(skip(self, op))]
    pub async fn update_document(
        &self,
        workspace_id: WorkspaceId,
        tenant_id: TenantId,
        document_id: DocumentId,
        agent: &AgentId,
        op: NewDocumentOperation,
    ) -> Result<(SharedDocument, DocumentOperation)> {
        self.require_write_access(workspace_id, agent).await?;
        self.documents.apply_operation(tenant_id, document_id, op).await
    }

    pub async fn get_state(&self, workspace_id: WorkspaceId) -> Result<WorkspaceState> {
        self.store.get_state(workspace_id).await
    }

    #[instrument(skip(self, op))]
    pub async fn update_state(&self, workspace_id: WorkspaceId, agent: &AgentId, op: StateOp) -> Result<WorkspaceState> {
        self.require_write_access(workspace_id, agent).await?;
        let state = self.store.apply_state_op(workspace_id, op).await?;
        self.bus
            .publish(Event::WorkspaceStateUpdated {
                workspace_id,
                version: state.version,
            })
            .await;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_role_permission_gates_match_the_model() {
        assert!(MemberRole::Owner.can_write());
        assert!(MemberRole::Owner.can_administer());
        assert!(MemberRole::Member.can_write());
        assert!(!MemberRole::Member.can_administer());
        assert!(!MemberRole::Viewer.can_write());
    }
}
