//! Subject attribute resolvers.
//!
//! Each resolver owns the authority resolution of one subject kind. The
//! registry selects the first resolver whose `supports` predicate accepts
//! the kind; a kind nobody supports is a wiring fault, never a silent
//! fallback.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use policy_engine_sdk::{PolicyEngineError, SubjectKind};
use policy_engine_sdk::models::GroupSummary;
use policy_engine_sdk::ports::PrincipalDirectory;
use uuid::Uuid;

/// Strategy resolving the authority set for one subject kind.
///
/// Implementations must be side-effect-free and idempotent: the same id
/// yields the same set unless the catalog changed.
#[async_trait]
pub trait AuthorityResolver: Send + Sync {
    /// Capability predicate. Exactly one registered resolver should accept
    /// any given kind.
    fn supports(&self, kind: SubjectKind) -> bool;

    /// The full authority set of the subject, including authorities
    /// delegated through memberships.
    ///
    /// # Errors
    ///
    /// - the not-found family when the subject or a referenced membership
    ///   is unknown
    /// - `Internal` on catalog failure
    async fn resolve_authorities(
        &self,
        subject_id: Uuid,
    ) -> Result<BTreeSet<String>, PolicyEngineError>;
}

/// Authorities delegated by one group: its own permissions plus the
/// permissions of every role it carries.
async fn group_grants(
    directory: &dyn PrincipalDirectory,
    group: &GroupSummary,
) -> Result<BTreeSet<String>, PolicyEngineError> {
    let mut grants = group.permissions.clone();
    for role_id in &group.role_ids {
        let role = directory.find_role(*role_id).await?;
        grants.extend(role.permissions);
    }
    Ok(grants)
}

/// Resolver for USER subjects: direct authorities plus everything delegated
/// through the principal's groups and roles.
pub struct UserAuthorityResolver {
    directory: Arc<dyn PrincipalDirectory>,
}

impl UserAuthorityResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthorityResolver for UserAuthorityResolver {
    fn supports(&self, kind: SubjectKind) -> bool {
        kind == SubjectKind::User
    }

    async fn resolve_authorities(
        &self,
        subject_id: Uuid,
    ) -> Result<BTreeSet<String>, PolicyEngineError> {
        let principal = self.directory.find_principal(subject_id).await?;
        let mut authorities = principal.authorities;
        for group_id in &principal.group_ids {
            let group = self.directory.find_group(*group_id).await?;
            authorities.extend(group_grants(self.directory.as_ref(), &group).await?);
        }
        for role_id in &principal.role_ids {
            let role = self.directory.find_role(*role_id).await?;
            authorities.extend(role.permissions);
        }
        Ok(authorities)
    }
}

/// Resolver for GROUP subjects.
pub struct GroupAuthorityResolver {
    directory: Arc<dyn PrincipalDirectory>,
}

impl GroupAuthorityResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthorityResolver for GroupAuthorityResolver {
    fn supports(&self, kind: SubjectKind) -> bool {
        kind == SubjectKind::Group
    }

    async fn resolve_authorities(
        &self,
        subject_id: Uuid,
    ) -> Result<BTreeSet<String>, PolicyEngineError> {
        let group = self.directory.find_group(subject_id).await?;
        group_grants(self.directory.as_ref(), &group).await
    }
}

/// Resolver for ROLE subjects.
pub struct RoleAuthorityResolver {
    directory: Arc<dyn PrincipalDirectory>,
}

impl RoleAuthorityResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthorityResolver for RoleAuthorityResolver {
    fn supports(&self, kind: SubjectKind) -> bool {
        kind == SubjectKind::Role
    }

    async fn resolve_authorities(
        &self,
        subject_id: Uuid,
    ) -> Result<BTreeSet<String>, PolicyEngineError> {
        let role = self.directory.find_role(subject_id).await?;
        Ok(role.permissions)
    }
}

/// Ordered resolver registry with first-match selection.
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn AuthorityResolver>>,
}

impl ResolverRegistry {
    /// Registry with the three built-in resolvers, in USER, GROUP, ROLE
    /// order.
    #[must_use]
    pub fn with_defaults(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            resolvers: vec![
                Arc::new(UserAuthorityResolver::new(directory.clone())),
                Arc::new(GroupAuthorityResolver::new(directory.clone())),
                Arc::new(RoleAuthorityResolver::new(directory)),
            ],
        }
    }

    /// Registry over an explicit resolver list, consulted in order.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn AuthorityResolver>>) -> Self {
        Self { resolvers }
    }

    /// Resolve through the first resolver supporting `kind`.
    ///
    /// # Errors
    ///
    /// - `Configuration` when no registered resolver supports the kind
    /// - whatever the selected resolver returns
    pub async fn resolve(
        &self,
        kind: SubjectKind,
        subject_id: Uuid,
    ) -> Result<BTreeSet<String>, PolicyEngineError> {
        let resolver = self
            .resolvers
            .iter()
            .find(|r| r.supports(kind))
            .ok_or_else(|| {
                PolicyEngineError::Configuration(format!(
                    "no authority resolver supports subject kind {kind}"
                ))
            })?;
        resolver.resolve_authorities(subject_id).await
    }
}
