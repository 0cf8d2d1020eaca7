//! Configuration for the static catalog plugin.

use policy_engine_sdk::models::{GroupSummary, Policy, Principal, RoleSummary};
use serde::Deserialize;

/// Configuration: the catalog and policy set, declared statically.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticCatalogConfig {
    pub principals: Vec<Principal>,
    pub groups: Vec<GroupSummary>,
    pub roles: Vec<RoleSummary>,
    pub policies: Vec<Policy>,
}
