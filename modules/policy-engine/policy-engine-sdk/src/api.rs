//! Public API trait for the policy engine.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{
    AssignmentChange, DuplicatePolicyReport, PolicyConflictReport, SimulationReport,
    WizardProgress,
};
use crate::error::PolicyEngineError;
use crate::expression::ExpressionNode;
use crate::models::{
    AuthorizationContext, Decision, InvocationFacts, Policy, RequestFacts, SubjectKind,
};

/// Public API trait for the policy decision and simulation engine.
///
/// The host application consumes the engine exclusively through this trait:
///
/// ```ignore
/// let ctx = engine.build_request_context(&facts).await?;
/// let decision = engine.evaluate(&ctx).await?;
/// if !decision.is_allowed() {
///     return Err(forbidden());
/// }
/// ```
#[async_trait]
pub trait PolicyEngineClient: Send + Sync {
    /// Assemble an authorization context from an inbound web request.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` when the subject cannot be resolved
    /// - `Configuration` when no resolver supports the subject kind
    async fn build_request_context(
        &self,
        facts: &RequestFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError>;

    /// Assemble an authorization context from a guarded method invocation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_request_context`].
    async fn build_invocation_context(
        &self,
        facts: &InvocationFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError>;

    /// Decide the effect for a context against the applicable policies.
    ///
    /// No matching policy resolves to DENY.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    async fn evaluate(
        &self,
        context: &AuthorizationContext,
    ) -> Result<Decision, PolicyEngineError>;

    /// Policies applicable to URL resources, served from the cache.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable on a cache miss
    async fn find_url_policies(&self) -> Result<Arc<[Policy]>, PolicyEngineError>;

    /// Policies applicable to one method identifier, served from the cache.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable on a cache miss
    async fn find_method_policies(
        &self,
        identifier: &str,
    ) -> Result<Arc<[Policy]>, PolicyEngineError>;

    /// Contextual risk score: the sum of every registered risk factor.
    ///
    /// # Errors
    ///
    /// - `Configuration` when a factor cannot produce a defined score
    async fn calculate_risk_score(
        &self,
        context: &AuthorizationContext,
    ) -> Result<u32, PolicyEngineError>;

    /// Translate a rule expression into its human-readable condition tree.
    ///
    /// # Errors
    ///
    /// - `Evaluation` when the expression cannot be parsed
    async fn describe_rule(&self, expression: &str) -> Result<ExpressionNode, PolicyEngineError>;

    /// Open a wizard session for a subject and snapshot its current
    /// assignments as the simulation baseline. Returns the session id.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` for an unknown subject
    async fn begin_session(
        &self,
        subject_id: Uuid,
        subject_kind: SubjectKind,
    ) -> Result<Uuid, PolicyEngineError>;

    /// Current state of a live wizard session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    async fn wizard_progress(&self, context_id: Uuid)
        -> Result<WizardProgress, PolicyEngineError>;

    /// Save a wizard step: store `change` as the session's pending delta,
    /// overwriting any previous one (last writer wins).
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    async fn update_wizard(
        &self,
        context_id: Uuid,
        change: AssignmentChange,
    ) -> Result<(), PolicyEngineError>;

    /// Discard a wizard session without persisting anything.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    async fn clear_session(&self, context_id: Uuid) -> Result<(), PolicyEngineError>;

    /// Compute the permission delta a proposed membership change would
    /// produce, without persisting anything.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session
    /// - `GroupNotFound` / `RoleNotFound` when the delta references unknown
    ///   assignments
    async fn simulate(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<SimulationReport, PolicyEngineError>;

    /// Persist a membership delta, publish the corresponding change events
    /// and close the wizard session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session
    /// - `GroupNotFound` / `RoleNotFound` for unknown assignments
    /// - `Internal` when persistence or event publication fails
    async fn commit_assignments(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<(), PolicyEngineError>;

    /// Diagnostic report of policies with colliding normalized signatures.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    async fn duplicate_policies(&self) -> Result<Vec<DuplicatePolicyReport>, PolicyEngineError>;

    /// Diagnostic report of policies whose targets intersect with differing
    /// effects.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    async fn policy_conflicts(&self) -> Result<Vec<PolicyConflictReport>, PolicyEngineError>;
}
