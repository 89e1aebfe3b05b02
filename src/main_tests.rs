// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - requeue policy and signal handling

#[cfg(test)]
mod tests {
    use super::super::*;
    use lms_moodle_operator::lms_errors::{MergeError, TemplateError};
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_settled_requeues_at_ready_interval() {
        let config = OperatorConfig::default();

        assert_eq!(
            requeue_action(Progress::Settled, &config),
            Action::requeue(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_converging_requeues_at_not_ready_interval() {
        let config = OperatorConfig {
            requeue_not_ready: Duration::from_secs(3),
            ..OperatorConfig::default()
        };

        assert_eq!(
            requeue_action(Progress::Requeue, &config),
            Action::requeue(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_reconcile_error_is_transparent() {
        let err = ReconcileError::from(LmsError::from(anyhow::Error::new(
            TemplateError::NotFound {
                name: "basic".to_string(),
            },
        )));

        assert_eq!(err.to_string(), "LMSMoodleTemplate 'basic' not found");
        assert_eq!(err.0.status_reason(), "TemplateNotFound");
    }

    #[test]
    fn test_transient_error_requeues_at_error_interval() {
        let config = OperatorConfig::default();
        let err = LmsError::from(anyhow::anyhow!("connection reset"));

        assert!(err.is_transient());
        assert_eq!(
            error_requeue_action(&err, &config),
            Action::requeue(config.error_requeue)
        );
    }

    #[test]
    fn test_permanent_error_requeues_at_ready_interval() {
        let config = OperatorConfig::default();
        let err = LmsError::from(MergeError::TypeMismatch {
            path: "moodleSpec.nginxSize".to_string(),
            template_type: "number",
            override_type: "string",
        });

        assert!(!err.is_transient());
        assert_eq!(
            error_requeue_action(&err, &config),
            Action::requeue(config.requeue_ready)
        );
    }

    /// The shutdown future must stay pending while no signal is delivered.
    #[tokio::test]
    async fn test_shutdown_signal_pending_without_signal() {
        let result = timeout(Duration::from_millis(100), shutdown_signal()).await;

        assert!(
            result.is_err(),
            "shutdown_signal() should time out when no signal is sent"
        );
    }
}
