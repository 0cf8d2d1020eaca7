//! Authorization context assembly.
//!
//! The builder turns raw entry-point facts (a web request or a guarded
//! method invocation) into one immutable [`AuthorizationContext`], pulling
//! the subject's resolved authority set from the resolver registry. It
//! performs read-only catalog lookups and nothing else.

use std::sync::Arc;

use chrono::Utc;
use policy_engine_sdk::models::{
    ActionDescriptor, AuthorizationContext, EnvironmentDescriptor, InvocationFacts, RequestFacts,
    ResourceDescriptor, ResourceKind, Subject, SubjectKind,
};
use policy_engine_sdk::ports::PrincipalDirectory;
use policy_engine_sdk::PolicyEngineError;
use uuid::Uuid;

use crate::domain::resolvers::ResolverRegistry;

/// Builds authorization contexts from entry-point facts.
pub struct ContextBuilder {
    directory: Arc<dyn PrincipalDirectory>,
    resolvers: ResolverRegistry,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(directory: Arc<dyn PrincipalDirectory>, resolvers: ResolverRegistry) -> Self {
        Self {
            directory,
            resolvers,
        }
    }

    /// Context for an inbound web request.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` when the subject cannot be resolved
    /// - `Configuration` when no resolver supports the subject kind
    #[tracing::instrument(skip_all, fields(subject_id = %facts.subject_id, path = %facts.path))]
    pub async fn build_from_request(
        &self,
        facts: &RequestFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        let subject = self.resolve_subject(facts.subject_id, facts.subject_kind).await?;
        Ok(AuthorizationContext {
            subject,
            action: ActionDescriptor {
                name: facts.method.clone(),
            },
            resource: ResourceDescriptor {
                kind: ResourceKind::Url,
                identifier: facts.path.clone(),
            },
            environment: EnvironmentDescriptor {
                source_address: facts.remote_addr,
                timestamp: Utc::now(),
                request_id: facts.request_id.clone(),
            },
        })
    }

    /// Context for a guarded method invocation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_from_request`].
    #[tracing::instrument(
        skip_all,
        fields(subject_id = %facts.subject_id, method = %facts.method_identifier)
    )]
    pub async fn build_from_invocation(
        &self,
        facts: &InvocationFacts,
    ) -> Result<AuthorizationContext, PolicyEngineError> {
        let subject = self.resolve_subject(facts.subject_id, facts.subject_kind).await?;
        Ok(AuthorizationContext {
            subject,
            action: ActionDescriptor {
                name: facts.method_identifier.clone(),
            },
            resource: ResourceDescriptor {
                kind: ResourceKind::Method,
                identifier: facts.method_identifier.clone(),
            },
            environment: EnvironmentDescriptor {
                source_address: facts.remote_addr,
                timestamp: Utc::now(),
                request_id: facts.request_id.clone(),
            },
        })
    }

    async fn resolve_subject(
        &self,
        subject_id: Uuid,
        kind: SubjectKind,
    ) -> Result<Subject, PolicyEngineError> {
        let name = self.subject_name(subject_id, kind).await?;
        let authorities = self.resolvers.resolve(kind, subject_id).await?;
        Ok(Subject {
            id: subject_id,
            kind,
            name,
            authenticated: true,
            authorities,
        })
    }

    async fn subject_name(
        &self,
        subject_id: Uuid,
        kind: SubjectKind,
    ) -> Result<String, PolicyEngineError> {
        match kind {
            SubjectKind::User => Ok(self.directory.find_principal(subject_id).await?.name),
            SubjectKind::Group => Ok(self.directory.find_group(subject_id).await?.name),
            SubjectKind::Role => Ok(self.directory.find_role(subject_id).await?.name),
        }
    }
}
