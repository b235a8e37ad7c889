use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// An observed-state condition reported on a user resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn true_(type_: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(type_, ConditionStatus::True, reason, "")
    }

    pub fn false_(
        type_: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(type_, ConditionStatus::False, reason, message)
    }
}

/// Conditions keyed by type; `set` replaces in place without reordering.
///
/// The transition time is only advanced when the status actually changes, so
/// repeated reconciles that re-derive the same condition are no-ops on the
/// wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct Conditions(Vec<Condition>);

// === impl Conditions ===

impl Conditions {
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn set(&mut self, mut condition: Condition) {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(slot) => {
                if slot.status == condition.status {
                    condition.last_transition_time = slot.last_transition_time;
                }
                *slot = condition;
            }
            None => self.0.push(condition),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }
}

/// Azure-side lifecycle marker propagated onto user resources.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ProvisioningState {
    Creating,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::str::FromStr for ProvisioningState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Creating" => Ok(Self::Creating),
            "Updating" => Ok(Self::Updating),
            "Deleting" => Ok(Self::Deleting),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Canceled" => Ok(Self::Canceled),
            s => Err(format!("unknown provisioning state {s:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_preserves_transition_time_for_unchanged_status() {
        let mut conditions = Conditions::default();
        conditions.set(Condition::false_("Ready", "Creating", "creating virtualmachines"));
        let first = conditions.get("Ready").unwrap().last_transition_time;

        conditions.set(Condition::false_("Ready", "Updating", "updating virtualmachines"));
        let second = conditions.get("Ready").unwrap();
        assert_eq!(second.reason, "Updating");
        assert_eq!(second.last_transition_time, first);

        conditions.set(Condition::true_("Ready", "Succeeded"));
        assert_eq!(conditions.get("Ready").unwrap().status, ConditionStatus::True);
        assert_eq!(conditions.iter().count(), 1);
    }
}
