//! Configuration for the policy engine.

use serde::Deserialize;

/// Configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyEngineConfig {
    pub wizard: WizardConfig,
    pub risk: RiskConfig,
}

/// Bounds for the wizard session store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WizardConfig {
    /// Idle lifetime of a session before it expires.
    pub ttl_secs: u64,
    /// Upper bound on live sessions; the stalest session is evicted when
    /// the store is full.
    pub max_sessions: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            max_sessions: 1024,
        }
    }
}

/// Weights and calendars for the built-in risk factors.
///
/// A weight of `0` disables the factor's contribution without unregistering
/// it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// CIDR blocks considered trusted; sources outside every block score
    /// `untrusted_network_weight`.
    pub trusted_networks: Vec<String>,
    pub untrusted_network_weight: u32,
    /// Contribution of a context with no source address at all.
    pub unknown_source_weight: u32,
    /// Start hour (inclusive, 0-23) of the off-hours window.
    pub off_hours_start: u32,
    /// End hour (exclusive, 0-23) of the off-hours window.
    pub off_hours_end: u32,
    pub off_hours_weight: u32,
    /// Authorities that mark a subject as privileged.
    pub privileged_authorities: Vec<String>,
    pub privileged_subject_weight: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            trusted_networks: vec!["10.0.0.0/8".to_owned(), "192.168.0.0/16".to_owned()],
            untrusted_network_weight: 30,
            unknown_source_weight: 10,
            off_hours_start: 20,
            off_hours_end: 6,
            off_hours_weight: 20,
            privileged_authorities: vec!["POLICY_ADMIN".to_owned(), "SECURITY_ADMIN".to_owned()],
            privileged_subject_weight: 25,
        }
    }
}
