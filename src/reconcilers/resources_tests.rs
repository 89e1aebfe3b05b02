// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{LMSMoodle, LMSMoodleSpec, LMSMoodleTemplateSpec};
    use crate::lms_errors::LmsError;
    use crate::reconcilers::resources::*;
    use crate::reconcilers::spec_merge::{DependentKind, DependentSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
    use serde_json::json;
    use std::collections::BTreeMap;

    const OWNER_UID: &str = "11111111-2222-3333-4444-555555555555";

    fn owner(uid: Option<&str>) -> LMSMoodle {
        let mut lms = LMSMoodle::new(
            "a",
            LMSMoodleSpec {
                lms_moodle_template_name: "basic".to_string(),
                desired_state: None,
                overrides: LMSMoodleTemplateSpec::default(),
            },
        );
        lms.metadata.uid = uid.map(str::to_string);
        lms
    }

    fn reference(uid: &str, controller: Option<bool>) -> OwnerReference {
        OwnerReference {
            api_version: "lms.krestomat.io/v1alpha1".to_string(),
            kind: "LMSMoodle".to_string(),
            name: "a".to_string(),
            uid: uid.to_string(),
            controller,
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn test_owner_reference_is_controller() {
        let owner_ref = owner_reference(&owner(Some(OWNER_UID))).unwrap();

        assert_eq!(owner_ref.uid, OWNER_UID);
        assert_eq!(owner_ref.kind, "LMSMoodle");
        assert_eq!(owner_ref.api_version, "lms.krestomat.io/v1alpha1");
        assert_eq!(owner_ref.controller, Some(true));
    }

    #[test]
    fn test_owner_reference_requires_uid() {
        let err = owner_reference(&owner(None)).unwrap_err();

        assert!(matches!(err, LmsError::MissingMetadata { field: "uid", .. }));
    }

    #[test]
    fn test_owned_by_matches_controller_uid() {
        let meta = ObjectMeta {
            owner_references: Some(vec![reference(OWNER_UID, Some(true))]),
            ..Default::default()
        };

        assert!(owned_by(&meta, OWNER_UID));
    }

    #[test]
    fn test_owned_by_rejects_foreign_owner_with_same_name() {
        let meta = ObjectMeta {
            owner_references: Some(vec![reference("other-uid", Some(true))]),
            ..Default::default()
        };

        assert!(!owned_by(&meta, OWNER_UID));
    }

    #[test]
    fn test_owned_by_ignores_non_controller_refs() {
        let meta = ObjectMeta {
            owner_references: Some(vec![reference(OWNER_UID, None)]),
            ..Default::default()
        };

        assert!(!owned_by(&meta, OWNER_UID));
        assert!(!owned_by(&ObjectMeta::default(), OWNER_UID));
    }

    #[test]
    fn test_precheck_allows_delete_of_owned_object() {
        let meta = ObjectMeta {
            owner_references: Some(vec![reference(OWNER_UID, Some(true))]),
            ..Default::default()
        };

        assert_eq!(delete_precheck(&meta, OWNER_UID), None);
    }

    #[test]
    fn test_precheck_refuses_foreign_owned_object() {
        let foreign = ObjectMeta {
            name: Some("lms-a".to_string()),
            owner_references: Some(vec![reference("other-uid", Some(true))]),
            ..Default::default()
        };
        let unowned = ObjectMeta {
            name: Some("lms-a".to_string()),
            ..Default::default()
        };

        assert_eq!(delete_precheck(&foreign, OWNER_UID), Some(DeleteOutcome::NotOwned));
        assert_eq!(delete_precheck(&unowned, OWNER_UID), Some(DeleteOutcome::NotOwned));
    }

    #[test]
    fn test_precheck_leaves_terminating_object() {
        let meta = ObjectMeta {
            deletion_timestamp: Some(Time(k8s_openapi::jiff::Timestamp::now())),
            owner_references: Some(vec![reference(OWNER_UID, Some(true))]),
            ..Default::default()
        };

        assert_eq!(
            delete_precheck(&meta, OWNER_UID),
            Some(DeleteOutcome::AlreadyDeleting)
        );
    }

    #[test]
    fn test_delete_outcome_pending() {
        assert!(DeleteOutcome::Deleted.is_pending());
        assert!(DeleteOutcome::AlreadyDeleting.is_pending());
        assert!(!DeleteOutcome::NotOwned.is_pending());
        assert!(!DeleteOutcome::NotFound.is_pending());
    }

    #[test]
    fn test_dependent_object_carries_spec_owner_and_labels() {
        let dependent = DependentSpec {
            kind: DependentKind::Postgres,
            name: "lms-a".to_string(),
            namespace: "lms-a".to_string(),
            spec: json!({"postgresImage": "postgres:15"})
                .as_object()
                .unwrap()
                .clone(),
        };
        let mut labels = BTreeMap::new();
        labels.insert("lms.krestomat.io/lms-name".to_string(), "a".to_string());

        let obj = dependent_object(&dependent, &reference(OWNER_UID, Some(true)), &labels);

        assert_eq!(obj.metadata.name.as_deref(), Some("lms-a"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("lms-a"));
        assert_eq!(obj.metadata.labels.as_ref(), Some(&labels));
        assert!(owned_by(&obj.metadata, OWNER_UID));

        let types = obj.types.as_ref().unwrap();
        assert_eq!(types.api_version, "postgres.krestomat.io/v1alpha1");
        assert_eq!(types.kind, "Postgres");
        assert_eq!(obj.data["spec"]["postgresImage"], json!("postgres:15"));
    }

    #[test]
    fn test_dependent_status_reads_data() {
        let dependent = DependentSpec {
            kind: DependentKind::Moodle,
            name: "lms-a".to_string(),
            namespace: "lms-a".to_string(),
            spec: serde_json::Map::new(),
        };
        let mut obj = dependent_object(
            &dependent,
            &reference(OWNER_UID, Some(true)),
            &BTreeMap::new(),
        );
        assert_eq!(dependent_status(&obj), Default::default());

        obj.data["status"] = json!({"state": "Suspended", "url": "https://a"});
        let status = dependent_status(&obj);
        assert_eq!(status.state.as_deref(), Some("Suspended"));
        assert_eq!(status.url.as_deref(), Some("https://a"));
    }
}
