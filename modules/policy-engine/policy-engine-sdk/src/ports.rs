//! Outbound ports: the collaborators the engine consumes.
//!
//! Implementations live outside the engine (the host's catalog, its policy
//! persistence, an embeddable expression evaluator, the audit pipeline).
//! `static_catalog_plugin` provides config-seeded in-memory implementations
//! for tests and standalone use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::{AssignmentChange, AssignmentRef};
use crate::error::PolicyEngineError;
use crate::models::{AuthorizationContext, GroupSummary, Policy, Principal, RoleSummary};

/// Principal, group and role catalog.
///
/// Lookups must be idempotent: the same id yields the same result unless
/// the underlying store changed.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Load a principal with its direct authorities and memberships.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` for an unknown id
    /// - `Internal` on store failure
    async fn find_principal(&self, id: Uuid) -> Result<Principal, PolicyEngineError>;

    /// Load a group.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` for an unknown id
    /// - `Internal` on store failure
    async fn find_group(&self, id: Uuid) -> Result<GroupSummary, PolicyEngineError>;

    /// Load a role.
    ///
    /// # Errors
    ///
    /// - `RoleNotFound` for an unknown id
    /// - `Internal` on store failure
    async fn find_role(&self, id: Uuid) -> Result<RoleSummary, PolicyEngineError>;

    /// Current group/role assignments of a subject.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` for an unknown id
    /// - `Internal` on store failure
    async fn assignments_of(&self, subject_id: Uuid)
        -> Result<Vec<AssignmentRef>, PolicyEngineError>;

    /// Persist a committed membership delta for a subject.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` for an unknown subject
    /// - `GroupNotFound` / `RoleNotFound` when an added assignment does not
    ///   exist
    /// - `Internal` on store failure
    async fn apply_assignment_change(
        &self,
        subject_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<(), PolicyEngineError>;
}

/// Read side of the policy persistence boundary.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// All policies targeting URL resources.
    ///
    /// # Errors
    ///
    /// - `Internal` on store failure
    async fn url_policies(&self) -> Result<Vec<Policy>, PolicyEngineError>;

    /// Policies targeting the given method identifier.
    ///
    /// # Errors
    ///
    /// - `Internal` on store failure
    async fn method_policies(&self, identifier: &str) -> Result<Vec<Policy>, PolicyEngineError>;

    /// Every stored policy, for the duplicate/conflict diagnostics.
    ///
    /// # Errors
    ///
    /// - `Internal` on store failure
    async fn all_policies(&self) -> Result<Vec<Policy>, PolicyEngineError>;
}

/// Embeddable boolean-expression evaluator for rule conditions.
///
/// The engine ships a built-in implementation for the security-function
/// dialect; hosts may substitute their own.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate one rule expression against a context.
    ///
    /// # Errors
    ///
    /// - `Evaluation` when the expression cannot be parsed or references an
    ///   unknown function
    fn evaluate(
        &self,
        expression: &str,
        context: &AuthorizationContext,
    ) -> Result<bool, PolicyEngineError>;
}

/// One audit-trail entry emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    /// Acting subject's display name.
    pub actor: String,
    /// Operation label, e.g. `evaluate` or `commit_assignments`.
    pub operation: String,
    pub detail: String,
}

/// Sink for audit records. Recent-activity reporting is built on top of
/// this by the host; the engine only emits.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one entry.
    ///
    /// # Errors
    ///
    /// - `Internal` when the audit pipeline rejects the record
    async fn record(&self, record: AuditRecord) -> Result<(), PolicyEngineError>;
}
