//! Contextual risk scoring.
//!
//! Independent factor evaluators each contribute a non-negative score;
//! the engine's total is their sum, so registration order never changes
//! the result. A factor that cannot compute a defined score fails the
//! whole call: a partial risk score is unsafe to base decisions on.

use std::sync::Arc;

use chrono::Timelike;
use policy_engine_sdk::models::AuthorizationContext;
use policy_engine_sdk::PolicyEngineError;

use crate::config::RiskConfig;
use crate::domain::conditions::ip_in_network;

/// One independent risk signal.
///
/// Evaluators must not share mutable state. A factor with nothing to say
/// returns `0`, never an error.
pub trait RiskFactorEvaluator: Send + Sync {
    /// Stable factor name, used in logs.
    fn name(&self) -> &'static str;

    /// Score contribution for one context.
    ///
    /// # Errors
    ///
    /// - `Configuration` when the factor cannot produce a defined score
    fn evaluate(&self, context: &AuthorizationContext) -> Result<u32, PolicyEngineError>;
}

/// Aggregates every registered factor into one score.
pub struct RiskEngine {
    evaluators: Vec<Arc<dyn RiskFactorEvaluator>>,
}

impl RiskEngine {
    /// Engine with the built-in factors configured from `cfg`.
    #[must_use]
    pub fn with_defaults(cfg: &RiskConfig) -> Self {
        Self {
            evaluators: vec![
                Arc::new(UntrustedNetworkFactor {
                    trusted_networks: cfg.trusted_networks.clone(),
                    weight: cfg.untrusted_network_weight,
                }),
                Arc::new(UnknownSourceFactor {
                    weight: cfg.unknown_source_weight,
                }),
                Arc::new(OffHoursFactor {
                    start_hour: cfg.off_hours_start,
                    end_hour: cfg.off_hours_end,
                    weight: cfg.off_hours_weight,
                }),
                Arc::new(PrivilegedSubjectFactor {
                    privileged_authorities: cfg.privileged_authorities.clone(),
                    weight: cfg.privileged_subject_weight,
                }),
            ],
        }
    }

    /// Engine over an explicit factor list.
    #[must_use]
    pub fn new(evaluators: Vec<Arc<dyn RiskFactorEvaluator>>) -> Self {
        Self { evaluators }
    }

    /// Sum of every factor's contribution for `context`.
    ///
    /// Every factor runs exactly once per call; the first factor error
    /// aborts the call.
    ///
    /// # Errors
    ///
    /// - `Configuration` when any factor cannot produce a defined score
    pub fn calculate_risk_score(
        &self,
        context: &AuthorizationContext,
    ) -> Result<u32, PolicyEngineError> {
        let mut total: u32 = 0;
        for evaluator in &self.evaluators {
            let score = evaluator.evaluate(context).map_err(|e| {
                tracing::error!(factor = evaluator.name(), error = %e, "risk factor failed");
                e
            })?;
            total = total.saturating_add(score);
        }
        Ok(total)
    }
}

/// Scores sources outside every trusted network.
pub struct UntrustedNetworkFactor {
    pub trusted_networks: Vec<String>,
    pub weight: u32,
}

impl RiskFactorEvaluator for UntrustedNetworkFactor {
    fn name(&self) -> &'static str {
        "untrusted_network"
    }

    fn evaluate(&self, context: &AuthorizationContext) -> Result<u32, PolicyEngineError> {
        let Some(addr) = context.environment.source_address else {
            // Missing sources are the unknown-source factor's concern.
            return Ok(0);
        };
        let trusted = self
            .trusted_networks
            .iter()
            .any(|network| ip_in_network(addr, network));
        Ok(if trusted { 0 } else { self.weight })
    }
}

/// Scores contexts with no source address at all.
pub struct UnknownSourceFactor {
    pub weight: u32,
}

impl RiskFactorEvaluator for UnknownSourceFactor {
    fn name(&self) -> &'static str {
        "unknown_source"
    }

    fn evaluate(&self, context: &AuthorizationContext) -> Result<u32, PolicyEngineError> {
        Ok(if context.environment.source_address.is_none() {
            self.weight
        } else {
            0
        })
    }
}

/// Scores access inside the configured off-hours window.
///
/// The window may wrap midnight (`start_hour` 20, `end_hour` 6). Equal
/// bounds disable the window.
pub struct OffHoursFactor {
    pub start_hour: u32,
    pub end_hour: u32,
    pub weight: u32,
}

impl RiskFactorEvaluator for OffHoursFactor {
    fn name(&self) -> &'static str {
        "off_hours"
    }

    fn evaluate(&self, context: &AuthorizationContext) -> Result<u32, PolicyEngineError> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(PolicyEngineError::Configuration(format!(
                "off-hours window {}-{} is not a valid hour range",
                self.start_hour, self.end_hour
            )));
        }
        let hour = context.environment.timestamp.hour();
        let in_window = if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        };
        Ok(if in_window { self.weight } else { 0 })
    }
}

/// Scores subjects holding any of the configured privileged authorities.
pub struct PrivilegedSubjectFactor {
    pub privileged_authorities: Vec<String>,
    pub weight: u32,
}

impl RiskFactorEvaluator for PrivilegedSubjectFactor {
    fn name(&self) -> &'static str {
        "privileged_subject"
    }

    fn evaluate(&self, context: &AuthorizationContext) -> Result<u32, PolicyEngineError> {
        let privileged = self
            .privileged_authorities
            .iter()
            .any(|authority| context.subject.has_authority(authority));
        Ok(if privileged { self.weight } else { 0 })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use policy_engine_sdk::models::{
        ActionDescriptor, EnvironmentDescriptor, ResourceDescriptor, ResourceKind, Subject,
        SubjectKind,
    };
    use uuid::Uuid;

    fn context_at_hour(hour: u32, source: Option<&str>, authorities: &[&str]) -> AuthorizationContext {
        AuthorizationContext {
            subject: Subject {
                id: Uuid::nil(),
                kind: SubjectKind::User,
                name: "jdoe".to_owned(),
                authenticated: true,
                authorities: authorities.iter().map(|a| (*a).to_owned()).collect(),
            },
            action: ActionDescriptor {
                name: "GET".to_owned(),
            },
            resource: ResourceDescriptor {
                kind: ResourceKind::Url,
                identifier: "/admin".to_owned(),
            },
            environment: EnvironmentDescriptor {
                source_address: source.map(|s| s.parse().unwrap()),
                timestamp: Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap(),
                request_id: None,
            },
        }
    }

    struct FixedFactor(u32);

    impl RiskFactorEvaluator for FixedFactor {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn evaluate(&self, _context: &AuthorizationContext) -> Result<u32, PolicyEngineError> {
            Ok(self.0)
        }
    }

    #[test]
    fn total_is_sum_of_contributions() {
        let ctx = context_at_hour(12, None, &[]);
        let forward = RiskEngine::new(vec![
            Arc::new(FixedFactor(5)),
            Arc::new(FixedFactor(7)),
            Arc::new(FixedFactor(11)),
        ]);
        let reverse = RiskEngine::new(vec![
            Arc::new(FixedFactor(11)),
            Arc::new(FixedFactor(7)),
            Arc::new(FixedFactor(5)),
        ]);
        assert_eq!(forward.calculate_risk_score(&ctx).unwrap(), 23);
        // Registration order never changes the total.
        assert_eq!(
            forward.calculate_risk_score(&ctx).unwrap(),
            reverse.calculate_risk_score(&ctx).unwrap()
        );
    }

    #[test]
    fn factor_error_fails_the_whole_call() {
        struct BrokenFactor;

        impl RiskFactorEvaluator for BrokenFactor {
            fn name(&self) -> &'static str {
                "broken"
            }

            fn evaluate(
                &self,
                _context: &AuthorizationContext,
            ) -> Result<u32, PolicyEngineError> {
                Err(PolicyEngineError::Configuration("undefined score".to_owned()))
            }
        }

        let engine = RiskEngine::new(vec![Arc::new(FixedFactor(5)), Arc::new(BrokenFactor)]);
        let result = engine.calculate_risk_score(&context_at_hour(12, None, &[]));
        match result.unwrap_err() {
            PolicyEngineError::Configuration(_) => {}
            other => panic!("expected Configuration, got: {other:?}"),
        }
    }

    #[test]
    fn untrusted_network_scores_outside_sources() {
        let factor = UntrustedNetworkFactor {
            trusted_networks: vec!["10.0.0.0/8".to_owned()],
            weight: 30,
        };
        let inside = context_at_hour(12, Some("10.2.3.4"), &[]);
        let outside = context_at_hour(12, Some("203.0.113.9"), &[]);
        let missing = context_at_hour(12, None, &[]);
        assert_eq!(factor.evaluate(&inside).unwrap(), 0);
        assert_eq!(factor.evaluate(&outside).unwrap(), 30);
        assert_eq!(factor.evaluate(&missing).unwrap(), 0);
    }

    #[test]
    fn off_hours_window_wraps_midnight() {
        let factor = OffHoursFactor {
            start_hour: 20,
            end_hour: 6,
            weight: 20,
        };
        assert_eq!(factor.evaluate(&context_at_hour(23, None, &[])).unwrap(), 20);
        assert_eq!(factor.evaluate(&context_at_hour(3, None, &[])).unwrap(), 20);
        assert_eq!(factor.evaluate(&context_at_hour(12, None, &[])).unwrap(), 0);
    }

    #[test]
    fn off_hours_rejects_invalid_hours() {
        let factor = OffHoursFactor {
            start_hour: 25,
            end_hour: 6,
            weight: 20,
        };
        assert!(factor.evaluate(&context_at_hour(12, None, &[])).is_err());
    }

    #[test]
    fn privileged_subject_scores_configured_authorities() {
        let factor = PrivilegedSubjectFactor {
            privileged_authorities: vec!["POLICY_ADMIN".to_owned()],
            weight: 25,
        };
        let admin = context_at_hour(12, None, &["POLICY_ADMIN"]);
        let user = context_at_hour(12, None, &["PERM_READ"]);
        assert_eq!(factor.evaluate(&admin).unwrap(), 25);
        assert_eq!(factor.evaluate(&user).unwrap(), 0);
    }

    #[test]
    fn default_factors_compose() {
        let engine = RiskEngine::with_defaults(&RiskConfig::default());
        // Untrusted source (30) + off-hours 23h (20) + privileged (25).
        let ctx = context_at_hour(23, Some("203.0.113.9"), &["POLICY_ADMIN"]);
        assert_eq!(engine.calculate_risk_score(&ctx).unwrap(), 75);
    }
}
