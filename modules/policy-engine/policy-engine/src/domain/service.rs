//! Domain service for the policy engine.
//!
//! Wires the context builder, risk engine, retrieval cache, translator
//! chain, decision evaluator, simulation engine, wizard store and event bus
//! behind one façade. The host hands in the collaborator ports once at
//! construction; everything else is internal.

use std::sync::Arc;

use policy_engine_sdk::dto::{
    AssignmentChange, DuplicatePolicyReport, PolicyConflictReport, SimulationReport,
    WizardContext, WizardProgress,
};
use policy_engine_sdk::expression::ExpressionNode;
use policy_engine_sdk::models::{
    AuthorizationContext, Decision, InvocationFacts, Policy, RequestFacts, ResourceKind,
    SubjectKind,
};
use policy_engine_sdk::ports::{
    AuditRecord, AuditSink, ConditionEvaluator, PolicyStore, PrincipalDirectory,
};
use policy_engine_sdk::{AssignmentKind, AssignmentRef, PolicyEngineError};
use tracing::info;
use uuid::Uuid;

use crate::config::PolicyEngineConfig;
use crate::domain::context::ContextBuilder;
use crate::domain::evaluator::PolicyDecisionEvaluator;
use crate::domain::events::{DomainEvent, DomainEventBus, PolicyCacheInvalidator};
use crate::domain::resolvers::ResolverRegistry;
use crate::domain::retrieval::PolicyRetrievalPoint;
use crate::domain::risk::RiskEngine;
use crate::domain::simulation::{self, SimulationEngine};
use crate::domain::translator::TranslatorChain;
use crate::domain::wizard::WizardSessionStore;

/// Policy engine service.
pub struct Service {
    directory: Arc<dyn PrincipalDirectory>,
    store: Arc<dyn PolicyStore>,
    audit: Arc<dyn AuditSink>,
    context_builder: ContextBuilder,
    risk: RiskEngine,
    retrieval: Arc<PolicyRetrievalPoint>,
    translator: TranslatorChain,
    evaluator: PolicyDecisionEvaluator,
    simulation: SimulationEngine,
    wizard: WizardSessionStore,
    events: Arc<DomainEventBus>,
}

impl Service {
    /// Wire a service from its collaborator ports.
    ///
    /// The retrieval cache's invalidator is subscribed to the event bus
    /// here, so any event published on [`Self::event_bus`] keeps the cache
    /// coherent.
    #[must_use]
    pub fn new(
        cfg: &PolicyEngineConfig,
        directory: Arc<dyn PrincipalDirectory>,
        store: Arc<dyn PolicyStore>,
        conditions: Arc<dyn ConditionEvaluator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let retrieval = Arc::new(PolicyRetrievalPoint::new(store.clone()));
        let events = Arc::new(DomainEventBus::new());
        events.subscribe(Arc::new(PolicyCacheInvalidator::new(retrieval.clone())));
        Self {
            context_builder: ContextBuilder::new(
                directory.clone(),
                ResolverRegistry::with_defaults(directory.clone()),
            ),
            risk: RiskEngine::with_defaults(&cfg.risk),
            translator: TranslatorChain::with_defaults(),
            evaluator: PolicyDecisionEvaluator::new(conditions),
            simulation: SimulationEngine::new(directory.clone()),
            wizard: WizardSessionStore::new(&cfg.wizard),
            retrieval,
            events,
            directory,
            store,
            audit,
        }
    }

    /// The bus driving cache invalidation. The host publishes its own
    /// policy-mutation events here and may subscribe further consumers.
    #[must_use]
    pub fn event_bus(&self) -> Arc<DomainEventBus> {
        self.events.clone()
    }

    /// # Errors
    ///
    /// - `SubjectNotFound` when the subject cannot be resolved
    /// - `Configuration` when no resolver supports the subject kind
    pub async fn build_request_context(
        &self,
        facts: &RequestFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        self.context_builder.build_from_request(facts).await
    }

    /// # Errors
    ///
    /// Same as [`Self::build_request_context`].
    pub async fn build_invocation_context(
        &self,
        facts: &InvocationFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        self.context_builder.build_from_invocation(facts).await
    }

    /// Decide the effect for one context.
    ///
    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    #[tracing::instrument(skip_all, fields(resource = %context.resource.identifier))]
    pub async fn evaluate(
        &self,
        context: &AuthorizationContext,
    ) -> Result<Decision, PolicyEngineError> {
        let policies = match context.resource.kind {
            ResourceKind::Url => self.retrieval.find_url_policies().await?,
            ResourceKind::Method => {
                self.retrieval
                    .find_method_policies(&context.resource.identifier)
                    .await?
            }
        };
        let decision = self.evaluator.decide(context, &policies);
        self.audit_best_effort(
            &context.subject.name,
            "evaluate",
            format!(
                "{:?} for {} {}",
                decision.effect, context.action.name, context.resource.identifier
            ),
        )
        .await;
        Ok(decision)
    }

    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable on a cache miss
    pub async fn find_url_policies(&self) -> Result<Arc<[Policy]>, PolicyEngineError> {
        self.retrieval.find_url_policies().await
    }

    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable on a cache miss
    pub async fn find_method_policies(
        &self,
        identifier: &str,
    ) -> Result<Arc<[Policy]>, PolicyEngineError> {
        self.retrieval.find_method_policies(identifier).await
    }

    /// # Errors
    ///
    /// - `Configuration` when a risk factor cannot produce a defined score
    pub fn calculate_risk_score(
        &self,
        context: &AuthorizationContext,
    ) -> Result<u32, PolicyEngineError> {
        self.risk.calculate_risk_score(context)
    }

    /// # Errors
    ///
    /// - `Evaluation` when the expression cannot be parsed
    pub fn describe_rule(&self, expression: &str) -> Result<ExpressionNode, PolicyEngineError> {
        self.translator.describe(expression)
    }

    /// Open a wizard session, snapshotting the subject's assignments as
    /// the simulation baseline.
    ///
    /// # Errors
    ///
    /// - the not-found family when the subject is unknown
    #[tracing::instrument(skip_all, fields(%subject_id, %subject_kind))]
    pub async fn begin_session(
        &self,
        subject_id: Uuid,
        subject_kind: SubjectKind,
    ) -> Result<Uuid, PolicyEngineError> {
        let (subject_name, initial_assignments) =
            self.subject_baseline(subject_id, subject_kind).await?;
        let context_id = Uuid::new_v4();
        self.wizard.insert(WizardContext {
            context_id,
            subject_id,
            subject_kind,
            subject_name,
            initial_assignments,
            pending_change: None,
        });
        info!(%context_id, "wizard session started");
        Ok(context_id)
    }

    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn wizard_progress(
        &self,
        context_id: Uuid,
    ) -> Result<WizardProgress, PolicyEngineError> {
        self.wizard.progress(context_id)
    }

    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn update_wizard(
        &self,
        context_id: Uuid,
        change: AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        self.wizard.save_step(context_id, change)
    }

    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn clear_session(&self, context_id: Uuid) -> Result<(), PolicyEngineError> {
        self.wizard.remove(context_id)?;
        info!(%context_id, "wizard session cleared");
        Ok(())
    }

    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session
    /// - the not-found family for unknown assignments in the delta
    pub async fn simulate(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<SimulationReport, PolicyEngineError> {
        let progress = self.wizard.progress(context_id)?;
        self.simulation.simulate(&progress.context, change).await
    }

    /// Persist a membership delta, publish the change events and close the
    /// session.
    ///
    /// Event publication is part of the commit: the first handler failure
    /// is propagated after the session is closed. The membership mutation
    /// itself is never rolled back here.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session
    /// - the not-found family for unknown assignments in the delta
    /// - `Internal` when persistence or event publication fails
    #[tracing::instrument(skip_all, fields(%context_id))]
    pub async fn commit_assignments(
        &self,
        context_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        let progress = self.wizard.progress(context_id)?;
        let subject = progress.context;

        self.directory
            .apply_assignment_change(subject.subject_id, change)
            .await?;

        let mut publish_error = None;
        for event in commit_events(change) {
            if let Err(e) = self.events.publish(&event) {
                publish_error.get_or_insert(e);
            }
        }

        self.audit_best_effort(
            &subject.subject_name,
            "commit_assignments",
            format!(
                "{} added, {} groups removed, {} roles removed",
                change.added.len(),
                change.removed_group_ids.len(),
                change.removed_role_ids.len()
            ),
        )
        .await;

        self.wizard.remove(context_id)?;
        info!(%context_id, "wizard session committed");

        match publish_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    pub async fn duplicate_policies(
        &self,
    ) -> Result<Vec<DuplicatePolicyReport>, PolicyEngineError> {
        let policies = self.store.all_policies().await?;
        Ok(simulation::duplicate_policies(&policies))
    }

    /// # Errors
    ///
    /// - `Internal` when the policy store is unreachable
    pub async fn policy_conflicts(
        &self,
    ) -> Result<Vec<PolicyConflictReport>, PolicyEngineError> {
        let policies = self.store.all_policies().await?;
        Ok(simulation::policy_conflicts(&policies))
    }

    /// Baseline name and assignment snapshot for a wizard subject.
    async fn subject_baseline(
        &self,
        subject_id: Uuid,
        subject_kind: SubjectKind,
    ) -> Result<(String, Vec<AssignmentRef>), PolicyEngineError> {
        match subject_kind {
            SubjectKind::User => {
                let principal = self.directory.find_principal(subject_id).await?;
                let assignments = self.directory.assignments_of(subject_id).await?;
                Ok((principal.name, assignments))
            }
            SubjectKind::Group => {
                let group = self.directory.find_group(subject_id).await?;
                let assignments = group
                    .role_ids
                    .iter()
                    .map(|id| AssignmentRef {
                        id: *id,
                        kind: AssignmentKind::Role,
                    })
                    .collect();
                Ok((group.name, assignments))
            }
            SubjectKind::Role => {
                let role = self.directory.find_role(subject_id).await?;
                Ok((role.name, Vec::new()))
            }
        }
    }

    /// Audit is a reporting feed, never a gate: failures are logged and
    /// swallowed.
    async fn audit_best_effort(&self, actor: &str, operation: &str, detail: String) {
        let record = AuditRecord {
            at: chrono::Utc::now(),
            actor: actor.to_owned(),
            operation: operation.to_owned(),
            detail,
        };
        if let Err(e) = self.audit.record(record).await {
            tracing::warn!(error = %e, operation, "audit record dropped");
        }
    }
}

/// Events a committed membership delta publishes: one per touched role,
/// or a blanket policy-changed event for role-less deltas so caches still
/// invalidate.
fn commit_events(change: &AssignmentChange) -> Vec<DomainEvent> {
    let mut role_ids: Vec<Uuid> = change
        .added
        .iter()
        .filter(|a| a.kind == AssignmentKind::Role)
        .map(|a| a.id)
        .chain(change.removed_role_ids.iter().copied())
        .collect();
    role_ids.sort();
    role_ids.dedup();

    if role_ids.is_empty() {
        vec![DomainEvent::PolicyChanged {
            policy_names: Vec::new(),
        }]
    } else {
        role_ids
            .into_iter()
            .map(|role_id| DomainEvent::RolePermissionsChanged { role_id })
            .collect()
    }
}
