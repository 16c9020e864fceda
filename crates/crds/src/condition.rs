//! Status conditions
//!
//! Shared `Condition` type used by every MetalLB operator CRD status.
//! Follows the Kubernetes `metav1.Condition` layout so `kubectl wait
//! --for=condition=Available` and friends work against our resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Resource is fully reconciled and serving
pub const CONDITION_AVAILABLE: &str = "Available";

/// Reconciliation is in progress
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// Resource is in an error state the operator will not fix on its own
pub const CONDITION_DEGRADED: &str = "Degraded";

/// Resource can be safely upgraded
pub const CONDITION_UPGRADEABLE: &str = "Upgradeable";

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// Condition represents an observation of a resource's current state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (Available, Progressing, Degraded, Upgradeable)
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown
    pub status: ConditionStatus,

    /// Brief CamelCase reason for the condition's last transition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message indicating details about the transition
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned from one status to another (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        condition_type: &str,
        status: impl Into<ConditionStatus>,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: status.into(),
            reason: reason.to_string(),
            message: message.into(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// True when this condition's status is `True`
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    /// Compares everything except `lastTransitionTime`
    pub fn same_observation(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// True when the condition of the given type exists and is `True`
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(Condition::is_true)
}

/// Insert or update a condition in place.
///
/// Keeps the existing `lastTransitionTime` when the status did not change,
/// so re-applying the same observation is not a transition.
/// Returns true if anything other than the timestamp changed.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            if existing.same_observation(&new) {
                return false;
            }
            if existing.status == new.status {
                new.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = new;
            true
        }
        None => {
            conditions.push(new);
            true
        }
    }
}

/// Apply a whole set of conditions, returning the merged list if it differs
/// from `current`.
pub fn merge_conditions(current: &[Condition], desired: &[Condition]) -> Option<Vec<Condition>> {
    let mut merged = current.to_vec();
    let mut changed = false;
    for condition in desired {
        changed |= set_condition(&mut merged, condition.clone());
    }
    changed.then_some(merged)
}
