use chrono::Utc;

use crate::crd::{
    AppDeploymentStatus, Condition, ConditionStatus, ConditionType,
};

pub const PHASE_COMPLETE: &str = "Complete";
pub const REASON_SUCCESS: &str = "Success";
pub const MESSAGE_SUCCESS: &str = "Success";

pub const PHASE_PENDING: &str = "Pending";
pub const REASON_NOT_EVALUATED: &str = "NotEvaluated";

/// Overall outcome folded from the per-kind conditions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub phase: String,
    pub reason: String,
    pub message: String,
    pub all_ready: bool,
}

/// Working copy of a record's status. Conditions are keyed by type (at most
/// one per type) and keep their insertion order, so the first not-ready
/// condition reported by [`ConditionTracker::aggregate`] is deterministic.
#[derive(Clone, Debug)]
pub struct ConditionTracker {
    status: AppDeploymentStatus,
}

impl ConditionTracker {
    pub fn new(status: AppDeploymentStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &AppDeploymentStatus {
        &self.status
    }

    pub fn into_status(self) -> AppDeploymentStatus {
        self.status
    }

    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.status.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Insert or update the condition for `type_`. Returns true when
    /// anything changed. The transition time moves only when the status
    /// flips (or the condition is new).
    pub fn upsert(
        &mut self,
        type_: ConditionType,
        ready: bool,
        reason: &str,
        message: &str,
    ) -> bool {
        let status = ConditionStatus::from_ready(ready);
        let now = Utc::now().to_rfc3339();
        let changed = match self
            .status
            .conditions
            .iter_mut()
            .find(|c| c.type_ == type_)
        {
            Some(c) => {
                let mut changed = false;
                if c.status != status {
                    c.status = status;
                    c.last_transition_time = Some(now);
                    changed = true;
                }
                if c.reason.as_deref() != Some(reason) {
                    c.reason = Some(reason.to_string());
                    changed = true;
                }
                if c.message.as_deref() != Some(message) {
                    c.message = Some(message.to_string());
                    changed = true;
                }
                changed
            }
            None => {
                self.status.conditions.push(Condition {
                    type_,
                    status,
                    reason: Some(reason.to_string()),
                    message: Some(message.to_string()),
                    last_transition_time: Some(now),
                });
                true
            }
        };
        if changed {
            self.bump_generation();
        }
        changed
    }

    /// Drop the condition for `type_`; absent is a no-op. Remaining
    /// conditions keep their relative order.
    pub fn remove(&mut self, type_: ConditionType) -> bool {
        let before = self.status.conditions.len();
        self.status.conditions.retain(|c| c.type_ != type_);
        let removed = self.status.conditions.len() != before;
        if removed {
            self.bump_generation();
        }
        removed
    }

    /// First not-ready condition wins; an empty set is never ready.
    pub fn aggregate(&self) -> Aggregate {
        if self.status.conditions.is_empty() {
            return Aggregate {
                phase: PHASE_PENDING.to_string(),
                reason: REASON_NOT_EVALUATED.to_string(),
                message: "no child resources evaluated yet".to_string(),
                all_ready: false,
            };
        }
        if let Some(c) = self
            .status
            .conditions
            .iter()
            .find(|c| !c.status.is_true())
        {
            return Aggregate {
                phase: c.type_.to_string(),
                reason: c.reason.clone().unwrap_or_default(),
                message: c.message.clone().unwrap_or_default(),
                all_ready: false,
            };
        }
        Aggregate {
            phase: PHASE_COMPLETE.to_string(),
            reason: REASON_SUCCESS.to_string(),
            message: MESSAGE_SUCCESS.to_string(),
            all_ready: true,
        }
    }

    /// Write the aggregate into the summary fields. Returns whether the
    /// summary changed.
    pub fn apply_aggregate(&mut self, agg: &Aggregate) -> bool {
        let s = &mut self.status;
        let changed = s.phase.as_deref() != Some(agg.phase.as_str())
            || s.reason.as_deref() != Some(agg.reason.as_str())
            || s.message.as_deref() != Some(agg.message.as_str());
        if changed {
            s.phase = Some(agg.phase.clone());
            s.reason = Some(agg.reason.clone());
            s.message = Some(agg.message.clone());
            self.bump_generation();
        }
        changed
    }

    fn bump_generation(&mut self) {
        let g = self.status.observed_generation.unwrap_or(0);
        self.status.observed_generation = Some(g + 1);
    }
}
