//! Policy decision evaluation: target matching, rule evaluation and
//! conflict resolution.

use std::cmp::Ordering;
use std::sync::Arc;

use policy_engine_sdk::models::{
    AuthorizationContext, Decision, Effect, Policy, PolicyTarget, ResourceDescriptor,
    ResourceKind,
};
use policy_engine_sdk::ports::ConditionEvaluator;
use policy_engine_sdk::PolicyEngineError;

/// Decides the effect for one context against a policy snapshot.
///
/// A pure function of its inputs: no caching, no store access, no
/// mutation.
pub struct PolicyDecisionEvaluator {
    conditions: Arc<dyn ConditionEvaluator>,
}

impl PolicyDecisionEvaluator {
    #[must_use]
    pub fn new(conditions: Arc<dyn ConditionEvaluator>) -> Self {
        Self { conditions }
    }

    /// Resolve the effect for `context` over `policies`.
    ///
    /// Among matching policies the highest priority wins; on a priority tie
    /// DENY outranks ALLOW; a full tie resolves by policy name. No match
    /// resolves to default-deny. A policy whose rules cannot be evaluated
    /// is excluded from the decision, never fatal.
    #[must_use]
    pub fn decide(&self, context: &AuthorizationContext, policies: &[Policy]) -> Decision {
        let mut matching: Vec<&Policy> = Vec::new();
        for policy in policies {
            if !policy
                .targets
                .iter()
                .any(|target| target_matches(target, &context.resource))
            {
                continue;
            }
            match self.rules_hold(policy, context) {
                Ok(true) => matching.push(policy),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        policy = %policy.name,
                        error = %e,
                        "rule evaluation failed, policy excluded from decision"
                    );
                }
            }
        }

        match matching.into_iter().min_by(|a, b| precedence(a, b)) {
            Some(winner) => Decision {
                effect: winner.effect,
                policy: Some(winner.name.clone()),
            },
            None => Decision::default_deny(),
        }
    }

    /// Whether every rule of the policy holds. The empty rule set holds
    /// unconditionally.
    fn rules_hold(
        &self,
        policy: &Policy,
        context: &AuthorizationContext,
    ) -> Result<bool, PolicyEngineError> {
        for rule in &policy.rules {
            if !self.conditions.evaluate(&rule.expression, context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Winner-first ordering: priority descending, then DENY before ALLOW,
/// then policy name ascending.
fn precedence(a: &Policy, b: &Policy) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| effect_rank(a.effect).cmp(&effect_rank(b.effect)))
        .then_with(|| a.name.cmp(&b.name))
}

fn effect_rank(effect: Effect) -> u8 {
    match effect {
        Effect::Deny => 0,
        Effect::Allow => 1,
    }
}

/// Whether one policy target binds the given resource.
pub(crate) fn target_matches(target: &PolicyTarget, resource: &ResourceDescriptor) -> bool {
    if target.kind != resource.kind {
        return false;
    }
    match target.kind {
        // Method identifiers bind literally.
        ResourceKind::Method => target.pattern == resource.identifier,
        ResourceKind::Url => pattern_matches(&target.pattern, &resource.identifier),
    }
}

/// URL pattern match: exact path, `*` as a single-segment wildcard, or a
/// trailing `/**` matching the prefix and everything below it.
pub(crate) fn pattern_matches(pattern: &str, identifier: &str) -> bool {
    if pattern == identifier {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/**") {
        if prefix.is_empty() {
            return true;
        }
        if identifier == prefix {
            return true;
        }
        return identifier.len() > prefix.len()
            && identifier.starts_with(prefix)
            && identifier[prefix.len()..].starts_with('/');
    }
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let identifier_segments: Vec<&str> = identifier.split('/').collect();
    pattern_segments.len() == identifier_segments.len()
        && pattern_segments
            .iter()
            .zip(&identifier_segments)
            .all(|(p, i)| *p == "*" || p == i)
}
