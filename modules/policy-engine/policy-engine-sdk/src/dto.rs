//! Transfer types for the authoring workflow: wizard sessions, proposed
//! assignment deltas, simulation reports and policy diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SubjectKind;

/// Kind of a grantable assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentKind {
    Group,
    Role,
}

/// Reference to one group or role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentRef {
    pub id: Uuid,
    pub kind: AssignmentKind,
}

/// One assignment proposed for addition, with an optional validity bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedAssignment {
    pub id: Uuid,
    pub kind: AssignmentKind,
    /// When set, the grant expires at this instant; `None` is open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AddedAssignment {
    /// The membership reference this addition produces.
    #[must_use]
    pub fn to_ref(&self) -> AssignmentRef {
        AssignmentRef {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// A proposed, not-yet-committed membership delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    #[serde(default)]
    pub added: Vec<AddedAssignment>,
    #[serde(default)]
    pub removed_group_ids: Vec<Uuid>,
    #[serde(default)]
    pub removed_role_ids: Vec<Uuid>,
}

impl AssignmentChange {
    /// Whether the delta proposes no mutation at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed_group_ids.is_empty()
            && self.removed_role_ids.is_empty()
    }
}

/// Direction of one simulated permission change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactKind {
    PermissionGained,
    PermissionLost,
}

/// One entry of a simulation report.
///
/// `source` names the group or role that is the proximate cause of the
/// change; an impact without an attributable cause is a defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactDetail {
    /// Display name of the affected subject.
    pub subject: String,
    pub permission: String,
    pub kind: ImpactKind,
    pub source: String,
}

/// Outcome of a what-if simulation. Computed, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub summary: String,
    /// Ordered impact list: gains first, then losses, each sorted by
    /// permission name.
    pub impacts: Vec<ImpactDetail>,
}

/// Policies whose normalized (targets, rules, effect) signature collides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePolicyReport {
    /// The shared normalized signature.
    pub signature: String,
    pub policy_ids: Vec<Uuid>,
    pub policy_names: Vec<String>,
}

/// Two policies with intersecting targets and differing effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConflictReport {
    pub first_id: Uuid,
    pub first_name: String,
    pub second_id: Uuid,
    pub second_name: String,
    pub description: String,
}

/// Lifecycle state of a wizard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardState {
    /// Session opened, baseline snapshotted, no step saved yet.
    Started,
    /// At least one step has been saved.
    InProgress,
}

/// Per-session authoring state for the grant/management workflow.
///
/// The `initial_assignments` snapshot is the diff baseline for every
/// simulation within the session; it is taken once when the session begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardContext {
    pub context_id: Uuid,
    pub subject_id: Uuid,
    pub subject_kind: SubjectKind,
    pub subject_name: String,
    pub initial_assignments: Vec<AssignmentRef>,
    /// The delta saved by the most recent wizard step, if any. Each save
    /// overwrites the previous one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_change: Option<AssignmentChange>,
}

/// Snapshot returned to the UI while a wizard session is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardProgress {
    pub state: WizardState,
    pub context: WizardContext,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_change_is_empty() {
        assert!(AssignmentChange::default().is_empty());
    }

    #[test]
    fn change_with_removal_is_not_empty() {
        let change = AssignmentChange {
            removed_role_ids: vec![Uuid::nil()],
            ..Default::default()
        };
        assert!(!change.is_empty());
    }

    #[test]
    fn impact_kind_serializes_upper_snake() {
        assert_eq!(
            serde_json::to_string(&ImpactKind::PermissionGained).unwrap(),
            r#""PERMISSION_GAINED""#
        );
        assert_eq!(
            serde_json::to_string(&ImpactKind::PermissionLost).unwrap(),
            r#""PERMISSION_LOST""#
        );
    }

    #[test]
    fn added_assignment_as_ref_drops_validity() {
        let added = AddedAssignment {
            id: Uuid::nil(),
            kind: AssignmentKind::Group,
            valid_until: Some(Utc::now()),
        };
        let reference = added.to_ref();
        assert_eq!(reference.id, Uuid::nil());
        assert_eq!(reference.kind, AssignmentKind::Group);
    }
}
