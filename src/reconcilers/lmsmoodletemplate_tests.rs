// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `lmsmoodletemplate.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_desired_status_ready_with_sites() {
        let status = desired_template_status(vec!["a".to_string(), "b".to_string()], false);

        assert_eq!(status.state.as_deref(), Some("Ready"));
        assert_eq!(status.lms_moodles, vec!["a", "b"]);
        assert_eq!(status.lms_moodle_count, 2);
    }

    #[test]
    fn test_desired_status_terminating() {
        let status = desired_template_status(Vec::new(), true);

        assert_eq!(status.state.as_deref(), Some("Terminating"));
        assert!(status.lms_moodles.is_empty());
        assert_eq!(status.lms_moodle_count, 0);
    }

    #[test]
    fn test_status_write_only_on_change() {
        let current = desired_template_status(vec!["a".to_string()], false);

        assert!(template_status_changed(None, &current));
        assert!(!template_status_changed(Some(&current), &current));
        assert!(template_status_changed(
            Some(&current),
            &desired_template_status(vec!["a".to_string(), "b".to_string()], false)
        ));
        assert!(template_status_changed(
            Some(&current),
            &desired_template_status(vec!["a".to_string()], true)
        ));
    }

    fn sites(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("site-{i}")).collect()
    }

    #[test]
    fn test_unreferenced_template_is_deletable() {
        assert_eq!(check_deletable("basic", &[]), Ok(()));
    }

    #[test]
    fn test_single_reference_blocks_deletion() {
        assert_eq!(
            check_deletable("basic", &sites(1)),
            Err(TemplateError::InUse {
                name: "basic".to_string(),
                count: 1,
            })
        );
    }

    #[test]
    fn test_deletion_error_reports_reference_count() {
        let err = check_deletable("basic", &sites(3)).unwrap_err();

        assert!(matches!(err, TemplateError::InUse { count: 3, .. }));
        assert_eq!(
            err.to_string(),
            "LMSMoodleTemplate 'basic' is in used by 3 lms moodle"
        );
    }
}
