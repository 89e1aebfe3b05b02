// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for LMS resources.
//!
//! This module tracks the `LMSMoodle` status in memory during a reconcile and
//! writes it back in a single API call, only when something actually changed.
//!
//! # Condition Format
//!
//! Conditions follow the standard Kubernetes shape:
//! - `type`: `Ready`, or `<Kind>Ready` for a mirrored dependant condition
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp, stamped only on transition
//!
//! # Example
//!
//! ```rust
//! use lms_moodle_operator::reconcilers::status::{create_condition, set_condition};
//!
//! let mut conditions = Vec::new();
//! let ready = create_condition("Ready", "True", "Successful", "LMSMoodle is ready");
//!
//! assert!(set_condition(&mut conditions, ready.clone()));
//! // Same status, reason and message: nothing to write
//! assert!(!set_condition(&mut conditions, ready));
//! ```

use crate::constants::{USAGE_STORAGE_TOTAL, USAGE_USERS_TOTAL};
use crate::crd::{Condition, DependentStatus, LMSMoodle, LMSMoodleStatus};
use crate::reconcilers::spec_merge::DependentKind;
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY,
    MESSAGE_DEPENDANT_NOT_READY, MESSAGE_FINALIZER_ENDED, MESSAGE_FINALIZER_STARTED,
    MESSAGE_LMS_MOODLE_READY, MESSAGE_LMS_MOODLE_SUSPENDED, REASON_DEPENDANT_NOT_READY,
    REASON_PENDING, REASON_SUCCESSFUL, REASON_SUSPENDED, REASON_TERMINATED, REASON_TERMINATING,
    STATE_READY, STATE_SUSPENDED, STATE_TERMINATED, STATE_TERMINATING,
};
use anyhow::Result;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use tracing::debug;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Returns true when `new` differs from `old` in status, reason, or message.
///
/// `lastTransitionTime` is deliberately not compared.
#[must_use]
pub fn has_transitioned(old: &Condition, new: &Condition) -> bool {
    old.status != new.status || old.reason != new.reason || old.message != new.message
}

/// Update or append a condition (in-memory, no API call).
///
/// An existing condition of the same type is replaced only when it has transitioned,
/// so `lastTransitionTime` keeps pointing at the last real change. A condition
/// without a timestamp is stamped with the current time.
///
/// Returns whether the list changed.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    if condition.last_transition_time.is_none() {
        condition.last_transition_time = Some(Utc::now().to_rfc3339());
    }

    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) if has_transitioned(existing, &condition) => {
            *existing = condition;
            true
        }
        Some(_) => false,
        None => {
            conditions.push(condition);
            true
        }
    }
}

/// Reason of a dependant's `Ready` condition, `Pending` when it has none yet.
#[must_use]
pub fn ready_reason(status: Option<&DependentStatus>) -> String {
    status
        .and_then(|s| s.condition(CONDITION_TYPE_READY))
        .and_then(|c| c.reason.clone())
        .unwrap_or_else(|| REASON_PENDING.to_string())
}

/// Kind-qualified ready reason, e.g. `PostgresPending` or `MoodleSuccessful`.
#[must_use]
pub fn kind_ready_reason(kind: DependentKind, status: Option<&DependentStatus>) -> String {
    format!("{kind}{}", ready_reason(status))
}

/// Returns true when the dependant's `Ready` condition is `True`.
#[must_use]
pub fn is_ready(status: Option<&DependentStatus>) -> bool {
    status
        .and_then(|s| s.condition(CONDITION_TYPE_READY))
        .is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
}

/// Returns true when the dependant reports `status.state == Suspended`.
#[must_use]
pub fn is_suspended(status: Option<&DependentStatus>) -> bool {
    status
        .and_then(|s| s.state.as_deref())
        .is_some_and(|state| state == STATE_SUSPENDED)
}

/// Renders the `storage_total` usage value the way it is shown in `status.storageGb`.
///
/// Integers are printed as is, floats with one decimal.
#[must_use]
pub fn storage_gb(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => format!("{:.1}", n.as_f64().unwrap_or_default()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Centralized status updater for `LMSMoodle` resources.
///
/// Collects every status change during a reconcile and applies them in one
/// API call, skipping the call when nothing changed.
#[derive(Clone, Debug)]
pub struct LMSMoodleStatusUpdater {
    name: String,
    current_status: Option<LMSMoodleStatus>,
    new_status: LMSMoodleStatus,
}

impl LMSMoodleStatusUpdater {
    /// Create a status updater seeded with the resource's current status.
    #[must_use]
    pub fn new(lms_moodle: &LMSMoodle) -> Self {
        Self::from_status(lms_moodle.name_any(), lms_moodle.status.clone())
    }

    /// Create a status updater from a name and an optional current status.
    #[must_use]
    pub fn from_status(name: String, current_status: Option<LMSMoodleStatus>) -> Self {
        let new_status = current_status.clone().unwrap_or_default();
        Self {
            name,
            current_status,
            new_status,
        }
    }

    /// Set the encompassing `Ready` condition. Returns whether it changed.
    pub fn set_ready_condition(&mut self, status: &str, reason: &str, message: &str) -> bool {
        set_condition(
            &mut self.new_status.conditions,
            create_condition(CONDITION_TYPE_READY, status, reason, message),
        )
    }

    /// Mirror a dependant's `Ready` condition under the kind's condition type.
    ///
    /// If the dependant is not ready, the site's own `Ready` condition is forced to
    /// `False/DependantNotReady`. A dependant without a `Ready` condition leaves the
    /// status untouched.
    ///
    /// Returns `(changed, dependant_ready)`.
    pub fn set_condition_from_dependant(
        &mut self,
        kind: DependentKind,
        dependant: Option<&DependentStatus>,
    ) -> (bool, bool) {
        let Some(source) = dependant.and_then(|s| s.condition(CONDITION_TYPE_READY)) else {
            debug!(name = %self.name, kind = %kind, "dependant ready condition not found");
            return (false, false);
        };

        let mut mirrored = source.clone();
        mirrored.r#type = kind.condition_type().to_string();
        let mut changed = set_condition(&mut self.new_status.conditions, mirrored);

        let ready = source.status == CONDITION_STATUS_TRUE;
        if !ready {
            changed |= self.set_ready_condition(
                CONDITION_STATUS_FALSE,
                REASON_DEPENDANT_NOT_READY,
                MESSAGE_DEPENDANT_NOT_READY,
            );
        }
        (changed, ready)
    }

    /// Copy URL, release, storage and registered users from the Moodle workload.
    ///
    /// Each field is only overwritten when the workload publishes it and it differs.
    /// Returns whether anything changed.
    pub fn set_status_from_workload(&mut self, workload: Option<&DependentStatus>) -> bool {
        let Some(workload) = workload else {
            return false;
        };
        let mut changed = false;

        if let Some(url) = &workload.url {
            changed |= replace_if_different(&mut self.new_status.url, url.clone());
        }
        if let Some(release) = workload.version.as_ref().and_then(|v| v.release.clone()) {
            changed |= replace_if_different(&mut self.new_status.release, release);
        }
        if let Some(item) = workload.usage_item(USAGE_STORAGE_TOTAL) {
            changed |= replace_if_different(&mut self.new_status.storage_gb, storage_gb(&item.value));
        }
        if let Some(users) = workload
            .usage_item(USAGE_USERS_TOTAL)
            .and_then(|item| item.value.as_i64())
        {
            changed |= replace_if_different(&mut self.new_status.registered_users, users);
        }
        changed
    }

    /// Set `status.state`. Returns whether it changed.
    pub fn set_state(&mut self, state: &str) -> bool {
        replace_if_different(&mut self.new_status.state, state.to_string())
    }

    /// Align the `Ready` condition with a settled state.
    ///
    /// Transient states leave the condition as the dependant mirroring set it.
    pub fn set_ready_condition_for_state(&mut self, state: &str) -> bool {
        match state {
            STATE_READY => self.set_ready_condition(
                CONDITION_STATUS_TRUE,
                REASON_SUCCESSFUL,
                MESSAGE_LMS_MOODLE_READY,
            ),
            STATE_TERMINATING => self.set_ready_condition(
                CONDITION_STATUS_FALSE,
                REASON_TERMINATING,
                MESSAGE_FINALIZER_STARTED,
            ),
            STATE_SUSPENDED => self.set_ready_condition(
                CONDITION_STATUS_FALSE,
                REASON_SUSPENDED,
                MESSAGE_LMS_MOODLE_SUSPENDED,
            ),
            _ => false,
        }
    }

    /// Mark the site as terminated; the last status written before the finalizer goes.
    pub fn set_terminated(&mut self) -> bool {
        let condition = self.set_ready_condition(
            CONDITION_STATUS_FALSE,
            REASON_TERMINATED,
            MESSAGE_FINALIZER_ENDED,
        );
        self.set_state(STATE_TERMINATED) | condition
    }

    /// The status as it will be written.
    #[must_use]
    pub fn status(&self) -> &LMSMoodleStatus {
        &self.new_status
    }

    /// Check if the status has semantically changed compared to the current status.
    ///
    /// `lastTransitionTime` differences alone never count as a change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => self.new_status != LMSMoodleStatus::default(),
            Some(current) => {
                current.state != self.new_status.state
                    || current.url != self.new_status.url
                    || current.release != self.new_status.release
                    || current.storage_gb != self.new_status.storage_gb
                    || current.registered_users != self.new_status.registered_users
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// Apply the collected status changes to Kubernetes (single API call).
    ///
    /// Returns whether a write was issued.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails.
    pub async fn apply(&self, client: &Client) -> Result<bool> {
        if !self.has_changes() {
            debug!(name = %self.name, "LMSMoodle status unchanged, skipping update");
            return Ok(false);
        }

        let api: Api<LMSMoodle> = Api::all(client.clone());
        let patch = json!({ "status": self.new_status });
        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(
            name = %self.name,
            state = ?self.new_status.state,
            conditions = self.new_status.conditions.len(),
            "Updated LMSMoodle status"
        );
        Ok(true)
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|n| {
            find_condition(current, &n.r#type).is_some_and(|c| !has_transitioned(c, n))
        })
}

fn replace_if_different<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}
