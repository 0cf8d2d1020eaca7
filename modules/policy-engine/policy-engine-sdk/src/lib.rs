#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Policy Engine SDK
//!
//! This crate carries the public contract of the `policy_engine` module:
//!
//! - [`PolicyEngineClient`] - public API trait for consumers
//! - [`AuthorizationContext`], [`Policy`], [`Decision`] - decision models
//! - [`ExpressionNode`], [`parse_expression`] - rule expression surface
//! - [`AssignmentChange`], [`SimulationReport`] - what-if simulation DTOs
//! - [`PolicyEngineError`] - error taxonomy
//! - [`ports`] - outbound collaborator traits the engine consumes
//!
//! ## Usage
//!
//! ```ignore
//! use policy_engine_sdk::{PolicyEngineClient, RequestFacts};
//!
//! let ctx = engine.build_request_context(&facts).await?;
//! let decision = engine.evaluate(&ctx).await?;
//! ```

pub mod api;
pub mod dto;
pub mod error;
pub mod expression;
pub mod models;
pub mod ports;

// Re-export main types at crate root
pub use api::PolicyEngineClient;
pub use dto::{
    AddedAssignment, AssignmentChange, AssignmentKind, AssignmentRef, DuplicatePolicyReport,
    ImpactDetail, ImpactKind, PolicyConflictReport, SimulationReport, WizardContext,
    WizardProgress, WizardState,
};
pub use error::PolicyEngineError;
pub use expression::{
    ConditionExpr, ExpressionNode, ExpressionNodeKind, ExpressionParseError, FunctionCall,
    parse_expression,
};
pub use models::{
    ActionDescriptor, AuthorizationContext, Decision, Effect, EnvironmentDescriptor, GroupSummary,
    InvocationFacts, Policy, PolicyRule, PolicyTarget, Principal, RequestFacts,
    ResourceDescriptor, ResourceKind, RoleSummary, Subject, SubjectKind,
};
pub use ports::{AuditRecord, AuditSink, ConditionEvaluator, PolicyStore, PrincipalDirectory};
