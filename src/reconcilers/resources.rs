// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create, apply and ownership-checked delete helpers.
//!
//! Every object the operator manages carries a single controller owner reference
//! pointing at its `LMSMoodle`. Three strategies are used:
//!
//! - **Create**: get-or-create, never overwrites (namespace, network policies)
//! - **Apply**: forced server-side apply with the operator's field manager (dependents)
//! - **Delete**: only when the controller owner UID matches the parent
//!
//! # Example
//!
//! ```rust,no_run
//! use lms_moodle_operator::reconcilers::resources::{reconcile_delete_dependant, DeleteOutcome};
//! use kube::{api::DynamicObject, Api};
//! use anyhow::Result;
//!
//! async fn example(api: &Api<DynamicObject>, owner_uid: &str) -> Result<()> {
//!     match reconcile_delete_dependant(api, "Moodle", "lms-a", owner_uid).await? {
//!         DeleteOutcome::Deleted | DeleteOutcome::AlreadyDeleting => { /* wait */ }
//!         DeleteOutcome::NotFound | DeleteOutcome::NotOwned => { /* gone for us */ }
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, DynamicObject, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::constants::KIND_LMS_MOODLE;
use crate::crd::{DependentStatus, LMSMoodle};
use crate::lms_errors::LmsError;
use crate::reconcilers::spec_merge::DependentSpec;

/// Result of an ownership-checked delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Delete request issued
    Deleted,
    /// Object already carries a deletion timestamp
    AlreadyDeleting,
    /// Object exists but is controlled by someone else, left alone
    NotOwned,
    /// Object does not exist
    NotFound,
}

impl DeleteOutcome {
    /// Returns true while the object may still be around because of us.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Deleted | Self::AlreadyDeleting)
    }
}

/// Controller owner reference pointing at `owner`.
///
/// # Errors
///
/// Returns [`LmsError::MissingMetadata`] if the owner has no name or UID yet.
pub fn owner_reference(owner: &LMSMoodle) -> Result<OwnerReference, LmsError> {
    owner
        .controller_owner_ref(&())
        .ok_or_else(|| LmsError::MissingMetadata {
            kind: KIND_LMS_MOODLE.to_string(),
            field: "uid",
        })
}

/// Returns true when the object's controller owner reference has `owner_uid`.
#[must_use]
pub fn owned_by(meta: &ObjectMeta, owner_uid: &str) -> bool {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|r| r.controller == Some(true))
        .is_some_and(|r| r.uid == owner_uid)
}

/// Sets the single controller owner reference and the inherited labels.
pub fn set_owner_and_labels(
    meta: &mut ObjectMeta,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) {
    meta.owner_references = Some(vec![owner.clone()]);
    meta.labels = Some(labels.clone());
}

/// Dynamic object for a dependent, with owner reference and labels set.
#[must_use]
pub fn dependent_object(
    dependent: &DependentSpec,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) -> DynamicObject {
    let mut obj = DynamicObject::new(&dependent.name, &dependent.kind.api_resource())
        .within(&dependent.namespace)
        .data(serde_json::json!({ "spec": Value::Object(dependent.spec.clone()) }));
    set_owner_and_labels(&mut obj.metadata, owner, labels);
    obj
}

/// Reads the dependent status block of a dynamic object.
///
/// A missing or malformed status reads as the default, i.e. "nothing reported yet".
#[must_use]
pub fn dependent_status(obj: &DynamicObject) -> DependentStatus {
    obj.data
        .get("status")
        .cloned()
        .and_then(|status| serde_json::from_value(status).ok())
        .unwrap_or_default()
}

/// Creates `resource` if no object of that name exists. Never updates.
///
/// Returns whether the object was created.
///
/// # Errors
///
/// Returns an error if the resource has no name or an API call fails.
pub async fn reconcile_create<T>(api: &Api<T>, resource: &T) -> Result<bool>
where
    T: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    let name = resource
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Resource must have a name"))?;

    if api.get_opt(name).await?.is_some() {
        debug!(name = %name, "Resource already exists");
        return Ok(false);
    }

    api.create(&PostParams::default(), resource)
        .await
        .with_context(|| format!("failed to create {name}"))?;
    info!(name = %name, "Resource created");
    Ok(true)
}

/// Forced server-side apply of a dependent. Returns the object as stored.
///
/// # Errors
///
/// Returns an error if the apply patch is rejected.
pub async fn reconcile_apply(
    api: &Api<DynamicObject>,
    obj: &DynamicObject,
    field_manager: &str,
) -> Result<DynamicObject> {
    let name = obj.name_any();
    debug!(
        namespace = ?obj.namespace(),
        name = %name,
        kind = ?obj.types.as_ref().map(|t| t.kind.as_str()),
        "Applying dependant with server-side apply"
    );

    let applied = api
        .patch(&name, &PatchParams::apply(field_manager).force(), &Patch::Apply(obj))
        .await
        .with_context(|| format!("failed to apply {name}"))?;
    Ok(applied)
}

/// Outcome for an existing object that must not be deleted, `None` when the
/// delete request should be sent.
///
/// A terminating object is left to finish. An object whose controller owner
/// is not `owner_uid` is never touched.
#[must_use]
pub fn delete_precheck(meta: &ObjectMeta, owner_uid: &str) -> Option<DeleteOutcome> {
    if meta.deletion_timestamp.is_some() {
        Some(DeleteOutcome::AlreadyDeleting)
    } else if !owned_by(meta, owner_uid) {
        Some(DeleteOutcome::NotOwned)
    } else {
        None
    }
}

/// Deletes an object only if its controller owner UID is `owner_uid`.
///
/// Deletion uses background propagation and a zero grace period.
///
/// # Errors
///
/// Returns an error if an API call fails for a reason other than the object being gone.
pub async fn reconcile_delete_dependant<K>(
    api: &Api<K>,
    kind: &str,
    name: &str,
    owner_uid: &str,
) -> Result<DeleteOutcome>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    let Some(obj) = api.get_opt(name).await? else {
        debug!(kind = %kind, name = %name, "Dependant not found");
        return Ok(DeleteOutcome::NotFound);
    };

    match delete_precheck(obj.meta(), owner_uid) {
        Some(DeleteOutcome::AlreadyDeleting) => {
            debug!(kind = %kind, name = %name, "Dependant already marked to be deleted");
            return Ok(DeleteOutcome::AlreadyDeleting);
        }
        Some(DeleteOutcome::NotOwned) => {
            warn!(
                kind = %kind,
                name = %name,
                owner_uid = %owner_uid,
                "Dependant not deleted: its controller owner does not match the parent uid"
            );
            return Ok(DeleteOutcome::NotOwned);
        }
        Some(outcome) => return Ok(outcome),
        None => {}
    }

    let params = DeleteParams {
        propagation_policy: Some(PropagationPolicy::Background),
        grace_period_seconds: Some(0),
        ..DeleteParams::default()
    };
    match api.delete(name, &params).await {
        Ok(_) => {
            info!(kind = %kind, name = %name, "Dependant set to be deleted");
            Ok(DeleteOutcome::Deleted)
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(DeleteOutcome::NotFound),
        Err(e) => Err(e).with_context(|| format!("failed to delete {kind} {name}")),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
