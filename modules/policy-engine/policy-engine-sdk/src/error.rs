//! Error types for the policy engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the policy engine API.
///
/// Access denial is never an error: it is expressed through
/// [`Decision::effect`](crate::models::Decision). The variants here cover
/// unknown references, fatal misconfiguration and collaborator failures.
#[derive(Debug, Error)]
pub enum PolicyEngineError {
    /// The subject id does not resolve to a known principal.
    #[error("subject not found: {id}")]
    SubjectNotFound { id: Uuid },

    /// The group id does not resolve to a known group.
    #[error("group not found: {id}")]
    GroupNotFound { id: Uuid },

    /// The role id does not resolve to a known role.
    #[error("role not found: {id}")]
    RoleNotFound { id: Uuid },

    /// The wizard session id is unknown, cleared or expired.
    #[error("wizard session not found: {context_id}")]
    SessionNotFound { context_id: Uuid },

    /// A rule expression could not be parsed or evaluated.
    ///
    /// During a decision this is recovered locally: the offending policy is
    /// excluded and logged, never fatal. It only reaches callers through
    /// the rule-description surface.
    #[error("rule evaluation failed: {reason}")]
    Evaluation { reason: String },

    /// The engine is wired in a way that cannot produce safe decisions,
    /// e.g. no authority resolver supports a subject kind. Always fatal
    /// for the current call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A collaborator (catalog, policy store, audit sink) failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PolicyEngineError {
    /// Whether the error belongs to the not-found family.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SubjectNotFound { .. }
                | Self::GroupNotFound { .. }
                | Self::RoleNotFound { .. }
                | Self::SessionNotFound { .. }
        )
    }
}
