// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the LMS Moodle operator
//!
//! These tests need a Kubernetes cluster with the CRDs from deploy/crds/ installed
//! and the operator running. They skip themselves when no cluster is reachable.
//!
//! Run with: cargo test --test simple_integration -- --ignored

#![allow(clippy::manual_let_else)]

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::client::Client;
use kube::ResourceExt;
use lms_moodle_operator::crd::{
    LMSMoodle, LMSMoodleSpec, LMSMoodleTemplate, LMSMoodleTemplateSpec,
};
use lms_moodle_operator::labels::{FINALIZER_LMS_MOODLE, LMS_NAME_LABEL};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_ATTEMPTS: u32 = 30;

// ============================================================================
// Helper Functions
// ============================================================================

/// Test helper to check if running in a Kubernetes cluster
async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => {
            println!("✓ Successfully connected to Kubernetes cluster");
            Some(client)
        }
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

fn template(name: &str) -> LMSMoodleTemplate {
    let moodle_spec = json!({ "moodleNewAdminEmail": "admin@example.com" });
    LMSMoodleTemplate::new(
        name,
        LMSMoodleTemplateSpec {
            moodle_spec: moodle_spec.as_object().cloned(),
            lms_moodle_netpol_omit: Some(true),
            ..LMSMoodleTemplateSpec::default()
        },
    )
}

fn site(name: &str, template_name: &str) -> LMSMoodle {
    LMSMoodle::new(
        name,
        LMSMoodleSpec {
            lms_moodle_template_name: template_name.to_string(),
            desired_state: None,
            overrides: LMSMoodleTemplateSpec::default(),
        },
    )
}

async fn create_or_keep<K>(api: &Api<K>, obj: &K)
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::Serialize + serde::de::DeserializeOwned,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => println!("✓ Created {}", obj.meta().name.clone().unwrap_or_default()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("  Already exists: {}", obj.meta().name.clone().unwrap_or_default());
        }
        Err(e) => panic!("Failed to create object: {e}"),
    }
}

async fn delete_ignoring_missing<K>(api: &Api<K>, name: &str)
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => println!("✓ Deleted {name}"),
        Err(kube::Error::Api(ae)) if ae.code == 404 => println!("  Already deleted: {name}"),
        Err(e) => eprintln!("⚠ Failed to delete {name}: {e}"),
    }
}

/// Poll `check` until it returns true or the attempts run out.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..POLL_ATTEMPTS {
        if check().await {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    false
}

// ============================================================================
// Basic Connectivity Tests
// ============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test --test simple_integration -- --ignored
async fn test_kubernetes_connectivity() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespaces: Api<Namespace> = Api::all(client);
    let ns_list = namespaces
        .list(&ListParams::default().limit(5))
        .await
        .unwrap_or_else(|e| panic!("Failed to list namespaces: {e}"));

    assert!(!ns_list.items.is_empty(), "Expected at least one namespace");
}

#[tokio::test]
#[ignore]
async fn test_crds_installed() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let crds: Api<CustomResourceDefinition> = Api::all(client);
    match crds.list(&ListParams::default()).await {
        Ok(crd_list) => {
            let kinds: Vec<_> = crd_list
                .items
                .iter()
                .filter(|crd| crd.spec.group.as_str() == "lms.krestomat.io")
                .map(|crd| crd.spec.names.kind.clone())
                .collect();
            println!("✓ Found LMS CRDs: {kinds:?}");

            if kinds.is_empty() {
                println!("⚠ Warning: No LMS CRDs found. Install with: kubectl apply -f deploy/crds/");
            } else {
                assert!(kinds.iter().any(|k| k == "LMSMoodle"));
                assert!(kinds.iter().any(|k| k == "LMSMoodleTemplate"));
            }
        }
        Err(e) => println!("⚠ Could not check CRDs: {e}"),
    }
}

// ============================================================================
// Site Lifecycle Tests (require the operator to be running)
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_site_gets_namespace_labels_and_finalizer() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let templates: Api<LMSMoodleTemplate> = Api::all(client.clone());
    let sites: Api<LMSMoodle> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client.clone());

    create_or_keep(&templates, &template("it-basic")).await;
    create_or_keep(&sites, &site("it-school", "it-basic")).await;

    let provisioned = eventually(|| async {
        let Ok(Some(lms)) = sites.get_opt("it-school").await else {
            return false;
        };
        let has_finalizer = lms.finalizers().iter().any(|f| f == FINALIZER_LMS_MOODLE);
        let labelled = lms.labels().get(LMS_NAME_LABEL).map(String::as_str) == Some("it-school");
        let ns_exists = matches!(namespaces.get_opt("lms-it-school").await, Ok(Some(_)));
        has_finalizer && labelled && ns_exists
    })
    .await;

    delete_ignoring_missing(&sites, "it-school").await;
    delete_ignoring_missing(&templates, "it-basic").await;

    assert!(
        provisioned,
        "site should get its finalizer, identity labels and namespace"
    );
}

#[tokio::test]
#[ignore]
async fn test_template_deletion_blocked_while_in_use() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let templates: Api<LMSMoodleTemplate> = Api::all(client.clone());
    let sites: Api<LMSMoodle> = Api::all(client.clone());

    create_or_keep(&templates, &template("it-shared")).await;
    create_or_keep(&sites, &site("it-user", "it-shared")).await;

    let counted = eventually(|| async {
        matches!(
            templates.get_opt("it-shared").await,
            Ok(Some(t)) if t.status.as_ref().is_some_and(|s| s.lms_moodle_count == 1)
        )
    })
    .await;
    assert!(counted, "template status should count the referencing site");

    delete_ignoring_missing(&templates, "it-shared").await;
    sleep(POLL_INTERVAL * 3).await;

    let still_there = templates
        .get_opt("it-shared")
        .await
        .ok()
        .flatten()
        .is_some_and(|t| t.metadata.deletion_timestamp.is_some());

    delete_ignoring_missing(&sites, "it-user").await;
    let released = eventually(|| async {
        matches!(templates.get_opt("it-shared").await, Ok(None))
    })
    .await;

    assert!(still_there, "template in use must be held by its finalizer");
    assert!(released, "template must be released once no site references it");
}
