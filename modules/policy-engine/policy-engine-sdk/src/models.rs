//! Domain models for the policy engine.
//!
//! The context model follows the subject / action / resource / environment
//! evaluation shape. A context is assembled once per decision by the engine's
//! context builder and is immutable afterwards.

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of subject a decision or authoring flow refers to.
///
/// Serialized as `"USER"` / `"GROUP"` / `"ROLE"` to match the catalog's
/// discriminator strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectKind {
    User,
    Group,
    Role,
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::User => "USER",
            Self::Group => "GROUP",
            Self::Role => "ROLE",
        };
        f.write_str(s)
    }
}

/// The subject of one authorization decision.
///
/// `authorities` is the fully resolved set, including authorities delegated
/// through group and role membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier in the principal catalog.
    pub id: Uuid,
    /// Subject kind (`"USER"` for request-driven decisions).
    pub kind: SubjectKind,
    /// Display/login name, carried for audit and impact reports.
    pub name: String,
    /// Whether the subject passed authentication (anonymous callers get
    /// a context too; policies decide what they may do).
    pub authenticated: bool,
    /// Resolved authority set.
    pub authorities: BTreeSet<String>,
}

impl Subject {
    /// Whether the resolved authority set contains `authority`.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Kind of protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Url,
    Method,
}

/// The resource one decision is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    /// Request path for URL resources, method identifier for method
    /// resources (e.g. `PolicyService.deletePolicy`).
    pub identifier: String,
}

/// The action being performed on the resource.
///
/// HTTP verb for URL resources; for method resources the identifier is the
/// action and this carries the invocation label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
}

/// Environmental facts captured at context-build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Caller network address, when the entry point knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<IpAddr>,
    /// Build timestamp; risk factors evaluate against this, not wall clock.
    pub timestamp: DateTime<Utc>,
    /// Opaque request correlation handle from the entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// One fully assembled authorization context.
///
/// Immutable once built; every decision gets its own instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationContext {
    pub subject: Subject,
    pub action: ActionDescriptor,
    pub resource: ResourceDescriptor,
    pub environment: EnvironmentDescriptor,
}

/// Policy effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    Allow,
    Deny,
}

/// Outcome of one decision.
///
/// `policy` names the winning policy when one matched; the default-deny
/// outcome carries no attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl Decision {
    /// The default-deny decision (no policy matched).
    #[must_use]
    pub fn default_deny() -> Self {
        Self {
            effect: Effect::Deny,
            policy: None,
        }
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

/// A resource binding of a policy.
///
/// URL patterns support an exact path, `*` as a single-segment wildcard and
/// a trailing `/**` suffix; method patterns are literal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTarget {
    pub kind: ResourceKind,
    pub pattern: String,
}

/// A boolean condition attached to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rule expression in the security-function dialect,
    /// e.g. `hasRole('POLICY_ADMIN') and isAuthenticated()`.
    pub expression: String,
    /// Author-supplied description shown in the UI next to the derived
    /// condition tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_description: Option<String>,
}

/// An access policy as loaded from the policy store.
///
/// A policy with no targets matches nothing. A policy with no rules matches
/// unconditionally for any context satisfying its targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    /// Unique policy name.
    pub name: String,
    pub effect: Effect,
    /// Higher priority wins; on a tie DENY outranks ALLOW.
    pub priority: i32,
    #[serde(default)]
    pub targets: Vec<PolicyTarget>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Raw facts of an inbound web request, as the host's web layer sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFacts {
    pub subject_id: Uuid,
    pub subject_kind: SubjectKind,
    /// HTTP method.
    pub method: String,
    /// Request path, used as the URL resource identifier.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Raw facts of a guarded method invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationFacts {
    pub subject_id: Uuid,
    pub subject_kind: SubjectKind,
    /// Method identifier, e.g. `PolicyService.deletePolicy`. Doubles as the
    /// cache key for method-policy retrieval.
    pub method_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Principal row from the catalog, with direct authorities and memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    /// Authorities granted directly to the principal.
    #[serde(default)]
    pub authorities: BTreeSet<String>,
    #[serde(default)]
    pub group_ids: Vec<Uuid>,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

/// Group row from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    /// Roles the group carries; their permissions are delegated to members.
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    /// Permissions granted by the group itself.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// Role row from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}
