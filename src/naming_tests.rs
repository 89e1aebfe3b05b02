// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `naming.rs`

#[cfg(test)]
mod tests {
    use crate::lms_errors::LmsError;
    use crate::naming::*;

    #[test]
    fn test_short_name_gets_prefix() {
        let names = derive_names("a");

        assert_eq!(names.instance, "a");
        assert_eq!(names.namespace, "lms-a");
        assert_eq!(names.base_name, "lms-a");
    }

    #[test]
    fn test_prefix_not_duplicated() {
        let names = derive_names("lms-school");

        assert_eq!(names.namespace, "lms-school");
        assert_eq!(names.base_name, "lms-school");
    }

    #[test]
    fn test_base_name_truncated_namespace_kept() {
        let names = derive_names("abcdefghijklmnopqrstuvwxyz");

        assert_eq!(names.base_name, "lms-abcdefghijklm");
        assert_eq!(names.base_name.chars().count(), 17);
        assert_eq!(names.namespace, "lms-abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(derive_names("tenant-42"), derive_names("tenant-42"));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("ñandú", 3), "ñan");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_truncate_drops_dangling_dash() {
        // 17th character is a dash
        let names = derive_names("abcdefghijkl-mnop");

        assert_eq!(names.base_name, "lms-abcdefghijkl");
    }

    #[test]
    fn test_netpol_names() {
        let names = derive_names("a");

        assert_eq!(names.namespace_netpol(), "lms-a-ns");
        assert_eq!(names.nginx_netpol(), "lms-a-nginx");
    }

    #[test]
    fn test_namespace_at_limit_is_valid() {
        // 4 + 59 = 63 characters
        let names = derive_names(&"a".repeat(59));

        assert_eq!(names.namespace.len(), 63);
        assert!(validate_namespace(&names).is_ok());
    }

    #[test]
    fn test_namespace_over_limit_is_rejected() {
        let names = derive_names(&"a".repeat(60));

        let err = validate_namespace(&names).unwrap_err();
        assert!(matches!(err, LmsError::NameTooLong { max: 63, .. }));
        assert!(!err.is_transient());
        assert_eq!(err.status_reason(), "NameTooLong");
    }

    #[test]
    fn test_prefixed_name_uses_full_limit() {
        let names = derive_names(&format!("lms-{}", "a".repeat(59)));

        assert_eq!(names.namespace.len(), 63);
        assert!(validate_namespace(&names).is_ok());
    }
}
