//! What-if simulation over membership deltas, plus the duplicate and
//! conflict diagnostics over the policy set.

use std::collections::BTreeMap;
use std::sync::Arc;

use policy_engine_sdk::dto::{
    AssignmentChange, AssignmentKind, AssignmentRef, DuplicatePolicyReport, ImpactDetail,
    ImpactKind, PolicyConflictReport, SimulationReport, WizardContext,
};
use policy_engine_sdk::models::Policy;
use policy_engine_sdk::ports::PrincipalDirectory;
use policy_engine_sdk::PolicyEngineError;

use crate::domain::evaluator::pattern_matches;

/// Computes the permission delta a proposed membership change would
/// produce. Strictly read-only: the engine only ever reads the catalog.
pub struct SimulationEngine {
    directory: Arc<dyn PrincipalDirectory>,
}

impl SimulationEngine {
    #[must_use]
    pub fn new(directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { directory }
    }

    /// Diff the effective permissions of the wizard baseline against the
    /// baseline with `change` applied.
    ///
    /// Both sides resolve through the same catalog path production
    /// decisions use. Gains are attributed to the first added assignment
    /// granting the permission, losses to the first baseline assignment
    /// that granted it.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` / `RoleNotFound` when the delta references unknown
    ///   assignments
    /// - `Internal` on catalog failure
    #[tracing::instrument(skip_all, fields(subject = %wizard.subject_name))]
    pub async fn simulate(
        &self,
        wizard: &WizardContext,
        change: &AssignmentChange,
    ) -> Result<SimulationReport, PolicyEngineError> {
        let before = self.resolve_grants(&wizard.initial_assignments).await?;
        let after_assignments = apply_change(&wizard.initial_assignments, change);
        let after = self.resolve_grants(&after_assignments).await?;

        let mut impacts = Vec::new();
        for (permission, source) in &after {
            if !before.contains_key(permission) {
                impacts.push(ImpactDetail {
                    subject: wizard.subject_name.clone(),
                    permission: permission.clone(),
                    kind: ImpactKind::PermissionGained,
                    source: source.clone(),
                });
            }
        }
        for (permission, source) in &before {
            if !after.contains_key(permission) {
                impacts.push(ImpactDetail {
                    subject: wizard.subject_name.clone(),
                    permission: permission.clone(),
                    kind: ImpactKind::PermissionLost,
                    source: source.clone(),
                });
            }
        }

        let gained = impacts
            .iter()
            .filter(|i| i.kind == ImpactKind::PermissionGained)
            .count();
        let lost = impacts.len() - gained;
        let summary = format!(
            "{}: {gained} permission(s) gained, {lost} permission(s) lost",
            wizard.subject_name
        );
        Ok(SimulationReport { summary, impacts })
    }

    /// Effective permissions of an assignment set, keyed by permission
    /// name. The mapped value is the name of the first assignment (in set
    /// order) granting the permission.
    async fn resolve_grants(
        &self,
        assignments: &[AssignmentRef],
    ) -> Result<BTreeMap<String, String>, PolicyEngineError> {
        let mut grants: BTreeMap<String, String> = BTreeMap::new();
        for assignment in assignments {
            match assignment.kind {
                AssignmentKind::Group => {
                    let group = self.directory.find_group(assignment.id).await?;
                    for permission in &group.permissions {
                        grants
                            .entry(permission.clone())
                            .or_insert_with(|| group.name.clone());
                    }
                    for role_id in &group.role_ids {
                        let role = self.directory.find_role(*role_id).await?;
                        for permission in role.permissions {
                            grants.entry(permission).or_insert_with(|| group.name.clone());
                        }
                    }
                }
                AssignmentKind::Role => {
                    let role = self.directory.find_role(assignment.id).await?;
                    for permission in role.permissions {
                        grants.entry(permission).or_insert_with(|| role.name.clone());
                    }
                }
            }
        }
        Ok(grants)
    }
}

/// The hypothetical post-change assignment set: additions first (so gains
/// attribute to them), then the surviving baseline, deduplicated.
pub(crate) fn apply_change(
    baseline: &[AssignmentRef],
    change: &AssignmentChange,
) -> Vec<AssignmentRef> {
    let mut after: Vec<AssignmentRef> = Vec::new();
    for added in &change.added {
        let reference = added.to_ref();
        if !after.contains(&reference) {
            after.push(reference);
        }
    }
    for assignment in baseline {
        let removed = match assignment.kind {
            AssignmentKind::Group => change.removed_group_ids.contains(&assignment.id),
            AssignmentKind::Role => change.removed_role_ids.contains(&assignment.id),
        };
        if !removed && !after.contains(assignment) {
            after.push(*assignment);
        }
    }
    after
}

/// Normalized signature over (effect, targets, rules). Policies sharing a
/// signature are duplicates.
fn policy_signature(policy: &Policy) -> String {
    let mut targets: Vec<String> = policy
        .targets
        .iter()
        .map(|t| format!("{:?}:{}", t.kind, t.pattern))
        .collect();
    targets.sort();
    let mut rules: Vec<&str> = policy
        .rules
        .iter()
        .map(|r| r.expression.trim())
        .collect();
    rules.sort_unstable();
    format!(
        "effect={:?};targets={};rules={}",
        policy.effect,
        targets.join("|"),
        rules.join("|")
    )
}

/// Group policies by normalized signature and report every collision.
#[must_use]
pub fn duplicate_policies(policies: &[Policy]) -> Vec<DuplicatePolicyReport> {
    let mut by_signature: BTreeMap<String, Vec<&Policy>> = BTreeMap::new();
    for policy in policies {
        by_signature
            .entry(policy_signature(policy))
            .or_default()
            .push(policy);
    }
    by_signature
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(signature, mut group)| {
            group.sort_by(|a, b| a.name.cmp(&b.name));
            DuplicatePolicyReport {
                signature,
                policy_ids: group.iter().map(|p| p.id).collect(),
                policy_names: group.iter().map(|p| p.name.clone()).collect(),
            }
        })
        .collect()
}

/// Report every policy pair whose targets intersect with differing effects.
#[must_use]
pub fn policy_conflicts(policies: &[Policy]) -> Vec<PolicyConflictReport> {
    let mut reports = Vec::new();
    for (index, first) in policies.iter().enumerate() {
        for second in &policies[index + 1..] {
            if first.effect == second.effect {
                continue;
            }
            let Some((pattern_a, pattern_b)) = intersecting_targets(first, second) else {
                continue;
            };
            let (first, second) = if first.name <= second.name {
                (first, second)
            } else {
                (second, first)
            };
            reports.push(PolicyConflictReport {
                first_id: first.id,
                first_name: first.name.clone(),
                second_id: second.id,
                second_name: second.name.clone(),
                description: format!(
                    "targets {pattern_a:?} and {pattern_b:?} intersect with effects {:?} and {:?}",
                    first.effect, second.effect
                ),
            });
        }
    }
    reports.sort_by(|a, b| {
        a.first_name
            .cmp(&b.first_name)
            .then_with(|| a.second_name.cmp(&b.second_name))
    });
    reports
}

fn intersecting_targets(a: &Policy, b: &Policy) -> Option<(String, String)> {
    for target_a in &a.targets {
        for target_b in &b.targets {
            if target_a.kind != target_b.kind {
                continue;
            }
            if target_a.pattern == target_b.pattern
                || pattern_matches(&target_a.pattern, &target_b.pattern)
                || pattern_matches(&target_b.pattern, &target_a.pattern)
            {
                return Some((target_a.pattern.clone(), target_b.pattern.clone()));
            }
        }
    }
    None
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use policy_engine_sdk::dto::AddedAssignment;
    use policy_engine_sdk::models::{Effect, PolicyRule, PolicyTarget, ResourceKind};
    use uuid::Uuid;

    fn assignment(id: Uuid, kind: AssignmentKind) -> AssignmentRef {
        AssignmentRef { id, kind }
    }

    #[test]
    fn apply_change_removes_then_adds() {
        let g1 = Uuid::new_v4();
        let g2 = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        let baseline = vec![
            assignment(g1, AssignmentKind::Group),
            assignment(r1, AssignmentKind::Role),
        ];
        let change = AssignmentChange {
            added: vec![AddedAssignment {
                id: g2,
                kind: AssignmentKind::Group,
                valid_until: None,
            }],
            removed_group_ids: vec![g1],
            removed_role_ids: vec![],
        };

        let after = apply_change(&baseline, &change);
        assert_eq!(
            after,
            vec![
                assignment(g2, AssignmentKind::Group),
                assignment(r1, AssignmentKind::Role),
            ]
        );
    }

    #[test]
    fn apply_change_deduplicates_re_added_baseline() {
        let g1 = Uuid::new_v4();
        let baseline = vec![assignment(g1, AssignmentKind::Group)];
        let change = AssignmentChange {
            added: vec![AddedAssignment {
                id: g1,
                kind: AssignmentKind::Group,
                valid_until: None,
            }],
            ..Default::default()
        };
        assert_eq!(apply_change(&baseline, &change).len(), 1);
    }

    fn url_policy(name: &str, effect: Effect, pattern: &str, rules: &[&str]) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            effect,
            priority: 0,
            targets: vec![PolicyTarget {
                kind: ResourceKind::Url,
                pattern: pattern.to_owned(),
            }],
            rules: rules
                .iter()
                .map(|r| PolicyRule {
                    expression: (*r).to_owned(),
                    friendly_description: None,
                })
                .collect(),
        }
    }

    // ==================== duplicate detection tests ====================

    #[test]
    fn identical_normalized_policies_collide_once() {
        let a = url_policy("a", Effect::Allow, "/admin/**", &["isAuthenticated()"]);
        let b = url_policy("b", Effect::Allow, "/admin/**", &["isAuthenticated()"]);
        let c = url_policy("c", Effect::Allow, "/other", &[]);

        let reports = duplicate_policies(&[a.clone(), b.clone(), c]);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].policy_names, vec!["a", "b"]);
        assert_eq!(reports[0].policy_ids.len(), 2);
        assert!(reports[0].policy_ids.contains(&a.id));
        assert!(reports[0].policy_ids.contains(&b.id));
    }

    #[test]
    fn rule_order_does_not_defeat_normalization() {
        let a = url_policy("a", Effect::Deny, "/x", &["isAuthenticated()", "hasRole('A')"]);
        let b = url_policy("b", Effect::Deny, "/x", &["hasRole('A')", "isAuthenticated()"]);
        assert_eq!(duplicate_policies(&[a, b]).len(), 1);
    }

    #[test]
    fn different_effect_is_no_duplicate() {
        let a = url_policy("a", Effect::Allow, "/x", &[]);
        let b = url_policy("b", Effect::Deny, "/x", &[]);
        assert!(duplicate_policies(&[a, b]).is_empty());
    }

    // ==================== conflict detection tests ====================

    #[test]
    fn overlapping_targets_with_differing_effects_conflict() {
        let allow = url_policy("allow-broad", Effect::Allow, "/admin/**", &[]);
        let deny = url_policy("deny-narrow", Effect::Deny, "/admin/secrets", &[]);

        let reports = policy_conflicts(&[allow, deny]);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].first_name, "allow-broad");
        assert_eq!(reports[0].second_name, "deny-narrow");
        assert!(reports[0].description.contains("/admin/**"));
    }

    #[test]
    fn same_effect_never_conflicts() {
        let a = url_policy("a", Effect::Allow, "/admin/**", &[]);
        let b = url_policy("b", Effect::Allow, "/admin/secrets", &[]);
        assert!(policy_conflicts(&[a, b]).is_empty());
    }

    #[test]
    fn disjoint_targets_never_conflict() {
        let a = url_policy("a", Effect::Allow, "/reports/**", &[]);
        let b = url_policy("b", Effect::Deny, "/admin/**", &[]);
        assert!(policy_conflicts(&[a, b]).is_empty());
    }
}
