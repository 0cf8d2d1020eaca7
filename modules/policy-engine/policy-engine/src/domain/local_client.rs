//! Local (in-process) client for the policy engine.

use std::sync::Arc;

use async_trait::async_trait;
use policy_engine_sdk::dto::{
    AssignmentChange, DuplicatePolicyReport, PolicyConflictReport, SimulationReport,
    WizardProgress,
};
use policy_engine_sdk::expression::ExpressionNode;
use policy_engine_sdk::models::{
    AuthorizationContext, Decision, InvocationFacts, Policy, RequestFacts, SubjectKind,
};
use policy_engine_sdk::{PolicyEngineClient, PolicyEngineError};
use uuid::Uuid;

use super::Service;

/// Local client wrapping the service.
pub struct PolicyEngineLocalClient {
    svc: Arc<Service>,
}

impl PolicyEngineLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_failure(op: &str, e: PolicyEngineError) -> PolicyEngineError {
    tracing::error!(operation = op, error = %e, "policy_engine call failed");
    e
}

#[async_trait]
impl PolicyEngineClient for PolicyEngineLocalClient {
    async fn build_request_context(
        &self,
        facts: &RequestFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        self.svc
            .build_request_context(facts)
            .await
            .map_err(|e| log_failure("build_request_context", e))
    }

    async fn build_invocation_context(
        &self,
        facts: &InvocationFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        self.svc
            .build_invocation_context(facts)
            .await
            .map_err(|e| log_failure("build_invocation_context", e))
    }

    async fn evaluate(
        &self,
        context: &AuthorizationContext,
    ) -> Result<Decision, PolicyEngineError> {
        self.svc
            .evaluate(context)
            .await
            .map_err(|e| log_failure("evaluate", e))
    }

    async fn find_url_policies(&self) -> Result<Arc<[Policy]>, PolicyEngineError> {
        self.svc
            .find_url_policies()
            .await
            .map_err(|e| log_failure("find_url_policies", e))
    }

    async fn find_method_policies(
        &self,
        identifier: &str,
    ) -> Result<Arc<[Policy]>, PolicyEngineError> {
        self.svc
            .find_method_policies(identifier)
            .await
            .map_err(|e| log_failure("find_method_policies", e))
    }

    async fn calculate_risk_score(
        &self,
        context: &AuthorizationContext,
    ) -> Result<u32, PolicyEngineError> {
        self.svc
            .calculate_risk_score(context)
            .map_err(|e| log_failure("calculate_risk_score", e))
    }

    async fn describe_rule(&self, expression: &str) -> Result<ExpressionNode, PolicyEngineError> {
        self.svc
            .describe_rule(expression)
            .map_err(|e| log_failure("describe_rule", e))
    }

    async fn begin_session(
        &self,
        subject_id: Uuid,
        subject_kind: SubjectKind,
    ) -> Result<Uuid, PolicyEngineError> {
        self.svc
            .begin_session(subject_id, subject_kind)
            .await
            .map_err(|e| log_failure("begin_session", e))
    }

    async fn wizard_progress(
        &self,
        context_id: Uuid,
    ) -> Result<WizardProgress, PolicyEngineError> {
        self.svc
            .wizard_progress(context_id)
            .map_err(|e| log_failure("wizard_progress", e))
    }

    async fn update_wizard(
        &self,
        context_id: Uuid,
        change: AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        self.svc
            .update_wizard(context_id, change)
            .map_err(|e| log_failure("update_wizard", e))
    }

    async fn clear_session(&self, context_id: Uuid) -> Result<(), PolicyEngineError> {
        self.svc
            .clear_session(context_id)
            .map_err(|e| log_failure("clear_session", e))
    }

    async fn simulate(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<SimulationReport, PolicyEngineError> {
        self.svc
            .simulate(context_id, change)
            .await
            .map_err(|e| log_failure("simulate", e))
    }

    async fn commit_assignments(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        self.svc
            .commit_assignments(context_id, change)
            .await
            .map_err(|e| log_failure("commit_assignments", e))
    }

    async fn duplicate_policies(&self) -> Result<Vec<DuplicatePolicyReport>, PolicyEngineError> {
        self.svc
            .duplicate_policies()
            .await
            .map_err(|e| log_failure("duplicate_policies", e))
    }

    async fn policy_conflicts(&self) -> Result<Vec<PolicyConflictReport>, PolicyEngineError> {
        self.svc
            .policy_conflicts()
            .await
            .map_err(|e| log_failure("policy_conflicts", e))
    }
}
