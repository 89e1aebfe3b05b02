// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for the cluster-scoped LMS resources.
//!
//! Both `LMSMoodle` and `LMSMoodleTemplate` are cluster-scoped, so every patch
//! goes through `Api::all`. The finalizer list is computed in memory first and
//! the API is only called when it actually changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use lms_moodle_operator::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//! use lms_moodle_operator::crd::LMSMoodleTemplate;
//! use lms_moodle_operator::labels::FINALIZER_LMS_MOODLE_TEMPLATE;
//! use kube::Client;
//! use anyhow::Result;
//!
//! async fn reconcile(client: Client, template: LMSMoodleTemplate) -> Result<()> {
//!     if template.metadata.deletion_timestamp.is_some() {
//!         // cleanup...
//!         return remove_finalizer(&client, &template, FINALIZER_LMS_MOODLE_TEMPLATE).await;
//!     }
//!     ensure_finalizer(&client, &template, FINALIZER_LMS_MOODLE_TEMPLATE).await
//! }
//! ```

use anyhow::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::core::ClusterResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

/// Returns true when `finalizer` is set on the object.
#[must_use]
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Finalizer list with `finalizer` appended, or `None` if it is already there.
#[must_use]
pub fn finalizers_with(meta: &ObjectMeta, finalizer: &str) -> Option<Vec<String>> {
    if has_finalizer(meta, finalizer) {
        return None;
    }
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list without `finalizer`, or `None` if it was not set.
#[must_use]
pub fn finalizers_without(meta: &ObjectMeta, finalizer: &str) -> Option<Vec<String>> {
    if !has_finalizer(meta, finalizer) {
        return None;
    }
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);
    Some(finalizers)
}

/// Add a finalizer to a cluster-scoped resource if not already present.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let Some(finalizers) = finalizers_with(resource.meta(), finalizer) else {
        return Ok(());
    };
    let name = resource.name_any();

    patch_finalizers::<T>(client, &name, finalizers).await?;
    info!(kind = %T::kind(&()), name = %name, finalizer = %finalizer, "Added finalizer");
    Ok(())
}

/// Remove a finalizer from a cluster-scoped resource.
///
/// Idempotent: nothing is sent when the finalizer is already absent.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource.name_any();
    let Some(finalizers) = finalizers_without(resource.meta(), finalizer) else {
        debug!(kind = %T::kind(&()), name = %name, "Finalizer already absent");
        return Ok(());
    };

    patch_finalizers::<T>(client, &name, finalizers).await?;
    info!(kind = %T::kind(&()), name = %name, finalizer = %finalizer, "Removed finalizer");
    Ok(())
}

async fn patch_finalizers<T>(client: &Client, name: &str, finalizers: Vec<String>) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + std::fmt::Debug
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::all(client.clone());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
