//! Service implementation for the static catalog plugin.
//!
//! Holds the principal/group/role catalog and the policy set in memory,
//! seeded from configuration. Groups and roles are immutable after init;
//! principal memberships mutate through committed assignment deltas, and
//! the policy set can be replaced wholesale to mimic an external policy
//! mutation.

use std::collections::HashMap;

use parking_lot::RwLock;
use policy_engine_sdk::models::{GroupSummary, Policy, Principal, RoleSummary};
use uuid::Uuid;

use crate::config::StaticCatalogConfig;

/// Static catalog service.
pub struct Service {
    pub(crate) principals: RwLock<HashMap<Uuid, Principal>>,
    pub(crate) groups: HashMap<Uuid, GroupSummary>,
    pub(crate) roles: HashMap<Uuid, RoleSummary>,
    pub(crate) policies: RwLock<Vec<Policy>>,
}

impl Service {
    #[must_use]
    pub fn from_config(cfg: &StaticCatalogConfig) -> Self {
        Self {
            principals: RwLock::new(
                cfg.principals
                    .iter()
                    .map(|p| (p.id, p.clone()))
                    .collect(),
            ),
            groups: cfg.groups.iter().map(|g| (g.id, g.clone())).collect(),
            roles: cfg.roles.iter().map(|r| (r.id, r.clone())).collect(),
            policies: RwLock::new(cfg.policies.clone()),
        }
    }

    /// Replace the stored policy set, as an external policy mutation would.
    ///
    /// Callers are responsible for publishing the matching change event so
    /// downstream caches invalidate.
    pub fn replace_policies(&self, policies: Vec<Policy>) {
        *self.policies.write() = policies;
    }
}
