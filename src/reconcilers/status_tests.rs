// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Condition, DependentStatus, LMSMoodleStatus};
    use crate::reconcilers::spec_merge::DependentKind;
    use crate::reconcilers::status::*;
    use serde_json::json;

    const CONDITION_TYPE_READY: &str = "Ready";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    fn dependant(value: serde_json::Value) -> DependentStatus {
        serde_json::from_value(value).unwrap()
    }

    fn condition_at(status: &str, reason: &str, message: &str, time: &str) -> Condition {
        Condition {
            r#type: CONDITION_TYPE_READY.to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            last_transition_time: Some(time.to_string()),
        }
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE_READY, STATUS_TRUE, "Successful", "ok");

        assert_eq!(condition.r#type, CONDITION_TYPE_READY);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some("Successful"));
        assert_eq!(condition.message.as_deref(), Some("ok"));

        let timestamp = condition.last_transition_time.unwrap();
        assert!(timestamp.contains('T'));
    }

    #[test]
    fn test_has_transitioned_ignores_timestamp() {
        let old = condition_at(STATUS_TRUE, "Successful", "ok", "2024-01-01T00:00:00Z");
        let new = condition_at(STATUS_TRUE, "Successful", "ok", "2025-01-01T00:00:00Z");

        assert!(!has_transitioned(&old, &new));
    }

    #[test]
    fn test_has_transitioned_detects_reason_change() {
        let old = condition_at(STATUS_FALSE, "Pending", "waiting", "t");
        let new = condition_at(STATUS_FALSE, "Failed", "waiting", "t");

        assert!(has_transitioned(&old, &new));
    }

    #[test]
    fn test_set_condition_twice_is_single_write() {
        let mut conditions = Vec::new();
        let first = condition_at(STATUS_TRUE, "Successful", "ok", "2024-01-01T00:00:00Z");
        let second = condition_at(STATUS_TRUE, "Successful", "ok", "2025-06-01T00:00:00Z");

        assert!(set_condition(&mut conditions, first));
        assert!(!set_condition(&mut conditions, second));

        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_condition_replaces_on_transition() {
        let mut conditions = vec![condition_at(STATUS_FALSE, "Pending", "waiting", "old")];

        let changed = set_condition(
            &mut conditions,
            condition_at(STATUS_TRUE, "Successful", "ok", "new"),
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, STATUS_TRUE);
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some("new"));
    }

    #[test]
    fn test_set_condition_stamps_missing_timestamp() {
        let mut conditions = Vec::new();
        let mut condition = condition_at(STATUS_TRUE, "Successful", "ok", "x");
        condition.last_transition_time = None;

        set_condition(&mut conditions, condition);

        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_ready_reason_defaults_to_pending() {
        assert_eq!(ready_reason(None), "Pending");
        assert_eq!(ready_reason(Some(&DependentStatus::default())), "Pending");
        assert_eq!(
            kind_ready_reason(DependentKind::Postgres, None),
            "PostgresPending"
        );
    }

    #[test]
    fn test_ready_reason_reads_condition() {
        let status = dependant(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "Failed"}]
        }));

        assert_eq!(ready_reason(Some(&status)), "Failed");
        assert_eq!(
            kind_ready_reason(DependentKind::Moodle, Some(&status)),
            "MoodleFailed"
        );
        assert!(!is_ready(Some(&status)));
    }

    #[test]
    fn test_is_suspended_reads_state() {
        assert!(is_suspended(Some(&dependant(json!({"state": "Suspended"})))));
        assert!(!is_suspended(Some(&dependant(json!({"state": "Successful"})))));
        assert!(!is_suspended(None));
    }

    #[test]
    fn test_storage_gb_formatting() {
        assert_eq!(storage_gb(&json!(3)), "3");
        assert_eq!(storage_gb(&json!(1.26)), "1.3");
        assert_eq!(storage_gb(&json!(2.0)), "2.0");
        assert_eq!(storage_gb(&json!("5G")), "5G");
    }

    #[test]
    fn test_mirror_ready_dependant() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);
        let postgres = dependant(json!({
            "conditions": [{"type": "Ready", "status": "True", "reason": "Successful", "message": "up"}]
        }));

        let (changed, ready) =
            updater.set_condition_from_dependant(DependentKind::Postgres, Some(&postgres));

        assert!(changed);
        assert!(ready);
        let mirrored = find_condition(&updater.status().conditions, "PostgresReady").unwrap();
        assert_eq!(mirrored.status, STATUS_TRUE);
        assert_eq!(mirrored.message.as_deref(), Some("up"));
        assert!(find_condition(&updater.status().conditions, "Ready").is_none());
    }

    #[test]
    fn test_mirror_not_ready_dependant_forces_parent_false() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);
        let keydb = dependant(json!({
            "conditions": [{"type": "Ready", "status": "False", "reason": "Pending"}]
        }));

        let (changed, ready) =
            updater.set_condition_from_dependant(DependentKind::Keydb, Some(&keydb));

        assert!(changed);
        assert!(!ready);
        let parent = find_condition(&updater.status().conditions, "Ready").unwrap();
        assert_eq!(parent.status, STATUS_FALSE);
        assert_eq!(parent.reason.as_deref(), Some("DependantNotReady"));
        assert_eq!(parent.message.as_deref(), Some("Dependant is not ready"));
    }

    #[test]
    fn test_mirror_without_condition_is_noop() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);

        let (changed, ready) = updater
            .set_condition_from_dependant(DependentKind::Nfs, Some(&DependentStatus::default()));

        assert!(!changed);
        assert!(!ready);
        assert!(!updater.has_changes());
    }

    #[test]
    fn test_status_from_workload() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);
        let moodle = dependant(json!({
            "url": "https://a.example.com",
            "version": {"release": "4.1"},
            "usage": [
                {"name": "storage_total", "value": 0.74},
                {"name": "users_total", "value": 12}
            ]
        }));

        assert!(updater.set_status_from_workload(Some(&moodle)));
        assert!(!updater.set_status_from_workload(Some(&moodle)));

        let status = updater.status();
        assert_eq!(status.url.as_deref(), Some("https://a.example.com"));
        assert_eq!(status.release.as_deref(), Some("4.1"));
        assert_eq!(status.storage_gb.as_deref(), Some("0.7"));
        assert_eq!(status.registered_users, Some(12));
    }

    #[test]
    fn test_status_from_workload_ignores_non_integer_users() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);
        let moodle = dependant(json!({"usage": [{"name": "users_total", "value": "many"}]}));

        assert!(!updater.set_status_from_workload(Some(&moodle)));
        assert!(updater.status().registered_users.is_none());
        assert!(!updater.set_status_from_workload(None));
    }

    #[test]
    fn test_ready_condition_for_settled_states() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);

        assert!(updater.set_ready_condition_for_state("Ready"));
        let ready = find_condition(&updater.status().conditions, "Ready").unwrap();
        assert_eq!(ready.status, STATUS_TRUE);
        assert_eq!(ready.message.as_deref(), Some("LMSMoodle is ready"));

        assert!(updater.set_ready_condition_for_state("Suspended"));
        let ready = find_condition(&updater.status().conditions, "Ready").unwrap();
        assert_eq!(ready.reason.as_deref(), Some("Suspended"));

        assert!(updater.set_ready_condition_for_state("Terminating"));
        let ready = find_condition(&updater.status().conditions, "Ready").unwrap();
        assert_eq!(ready.message.as_deref(), Some("Finalizer started"));

        assert!(!updater.set_ready_condition_for_state("PostgresPending"));
    }

    #[test]
    fn test_set_terminated() {
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), None);

        assert!(updater.set_terminated());

        let status = updater.status();
        assert_eq!(status.state.as_deref(), Some("Terminated"));
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.reason.as_deref(), Some("Terminated"));
        assert_eq!(ready.message.as_deref(), Some("Finalizer ended"));
    }

    #[test]
    fn test_has_changes_ignores_identical_status() {
        let current = LMSMoodleStatus {
            state: Some("Ready".to_string()),
            conditions: vec![condition_at(STATUS_TRUE, "Successful", "LMSMoodle is ready", "t0")],
            ..Default::default()
        };
        let mut updater = LMSMoodleStatusUpdater::from_status("a".to_string(), Some(current));

        assert!(!updater.set_state("Ready"));
        assert!(!updater.set_ready_condition_for_state("Ready"));
        assert!(!updater.has_changes());

        assert!(updater.set_state("MoodlePending"));
        assert!(updater.has_changes());
    }

    #[test]
    fn test_conditions_equal_ignores_order_and_time() {
        let a = vec![
            condition_at(STATUS_TRUE, "Successful", "ok", "t0"),
            Condition {
                r#type: "MoodleReady".to_string(),
                ..condition_at(STATUS_TRUE, "Successful", "ok", "t0")
            },
        ];
        let b = vec![a[1].clone(), condition_at(STATUS_TRUE, "Successful", "ok", "t9")];

        assert!(conditions_equal(&a, &b));
        assert!(!conditions_equal(&a, &b[..1]));
    }
}
