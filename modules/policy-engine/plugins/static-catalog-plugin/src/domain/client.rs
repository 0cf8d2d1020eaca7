//! Port implementations for the static catalog plugin.
//!
//! Implements `PrincipalDirectory` and `PolicyStore` over the in-memory
//! service.

use async_trait::async_trait;
use policy_engine_sdk::dto::{AssignmentChange, AssignmentKind, AssignmentRef};
use policy_engine_sdk::models::{GroupSummary, Policy, Principal, ResourceKind, RoleSummary};
use policy_engine_sdk::ports::{PolicyStore, PrincipalDirectory};
use policy_engine_sdk::PolicyEngineError;
use uuid::Uuid;

use super::service::Service;

#[async_trait]
impl PrincipalDirectory for Service {
    async fn find_principal(&self, id: Uuid) -> Result<Principal, PolicyEngineError> {
        self.principals
            .read()
            .get(&id)
            .cloned()
            .ok_or(PolicyEngineError::SubjectNotFound { id })
    }

    async fn find_group(&self, id: Uuid) -> Result<GroupSummary, PolicyEngineError> {
        self.groups
            .get(&id)
            .cloned()
            .ok_or(PolicyEngineError::GroupNotFound { id })
    }

    async fn find_role(&self, id: Uuid) -> Result<RoleSummary, PolicyEngineError> {
        self.roles
            .get(&id)
            .cloned()
            .ok_or(PolicyEngineError::RoleNotFound { id })
    }

    async fn assignments_of(
        &self,
        subject_id: Uuid,
    ) -> Result<Vec<AssignmentRef>, PolicyEngineError> {
        let principals = self.principals.read();
        let principal = principals
            .get(&subject_id)
            .ok_or(PolicyEngineError::SubjectNotFound { id: subject_id })?;
        let mut assignments: Vec<AssignmentRef> = principal
            .group_ids
            .iter()
            .map(|id| AssignmentRef {
                id: *id,
                kind: AssignmentKind::Group,
            })
            .collect();
        assignments.extend(principal.role_ids.iter().map(|id| AssignmentRef {
            id: *id,
            kind: AssignmentKind::Role,
        }));
        Ok(assignments)
    }

    async fn apply_assignment_change(
        &self,
        subject_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        // Validate additions before touching anything.
        for added in &change.added {
            match added.kind {
                AssignmentKind::Group => {
                    if !self.groups.contains_key(&added.id) {
                        return Err(PolicyEngineError::GroupNotFound { id: added.id });
                    }
                }
                AssignmentKind::Role => {
                    if !self.roles.contains_key(&added.id) {
                        return Err(PolicyEngineError::RoleNotFound { id: added.id });
                    }
                }
            }
        }

        let mut principals = self.principals.write();
        let principal = principals
            .get_mut(&subject_id)
            .ok_or(PolicyEngineError::SubjectNotFound { id: subject_id })?;

        principal
            .group_ids
            .retain(|id| !change.removed_group_ids.contains(id));
        principal
            .role_ids
            .retain(|id| !change.removed_role_ids.contains(id));
        for added in &change.added {
            match added.kind {
                AssignmentKind::Group => {
                    if !principal.group_ids.contains(&added.id) {
                        principal.group_ids.push(added.id);
                    }
                }
                AssignmentKind::Role => {
                    if !principal.role_ids.contains(&added.id) {
                        principal.role_ids.push(added.id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for Service {
    async fn url_policies(&self) -> Result<Vec<Policy>, PolicyEngineError> {
        Ok(self
            .policies
            .read()
            .iter()
            .filter(|p| p.targets.iter().any(|t| t.kind == ResourceKind::Url))
            .cloned()
            .collect())
    }

    async fn method_policies(&self, identifier: &str) -> Result<Vec<Policy>, PolicyEngineError> {
        Ok(self
            .policies
            .read()
            .iter()
            .filter(|p| {
                p.targets
                    .iter()
                    .any(|t| t.kind == ResourceKind::Method && t.pattern == identifier)
            })
            .cloned()
            .collect())
    }

    async fn all_policies(&self) -> Result<Vec<Policy>, PolicyEngineError> {
        Ok(self.policies.read().clone())
    }
}
