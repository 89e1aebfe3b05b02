// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for LMS Moodle provisioning.
//!
//! This module defines the two resources owned by the operator, plus the read-side
//! view of the status published by the dependent controllers.
//!
//! # Resource Types
//!
//! - [`LMSMoodleTemplate`] - Shared baseline spec for every dependent kind
//! - [`LMSMoodle`] - One provisioned site, referencing a template and carrying overrides
//!
//! Both resources are cluster-scoped. Each site gets its own namespace, derived from
//! the site name, into which the dependents (`Moodle`, `Postgres`, `Keydb`, `Ganesha`)
//! are applied.
//!
//! # Example: Template and Site
//!
//! ```yaml
//! apiVersion: lms.krestomat.io/v1alpha1
//! kind: LMSMoodleTemplate
//! metadata:
//!   name: basic
//! spec:
//!   moodleSpec:
//!     moodleHost: example.com
//!   postgresSpec:
//!     postgresImage: postgres:15
//! ---
//! apiVersion: lms.krestomat.io/v1alpha1
//! kind: LMSMoodle
//! metadata:
//!   name: school-a
//! spec:
//!   lmsMoodleTemplateName: basic
//!   moodleSpec:
//!     moodleHost: school-a.example.com
//! ```

use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque spec block handed to a dependent controller.
///
/// The operator does not own the dependent CRD schemas, so each block is kept as a JSON
/// object and published with `x-kubernetes-preserve-unknown-fields`.
pub type SpecFields = Map<String, Value>;

fn preserve_unknown_object(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Condition represents an observation of a resource's current state.
///
/// The same shape is used for the operator's own conditions and for the conditions
/// read back from dependents.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `Ready` or one of the mirrored `<Kind>Ready` types.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Baseline spec shared by many sites.
///
/// A dependent kind is provisioned for a site when either the template or the site
/// provides its block.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "lms.krestomat.io",
    version = "v1alpha1",
    kind = "LMSMoodleTemplate",
    plural = "lmsmoodletemplates",
    shortname = "lmsmt",
    doc = "LMSMoodleTemplate holds the baseline Moodle, Postgres, Keydb and NFS specs shared by LMSMoodle sites. Deletion is refused while any LMSMoodle references it."
)]
#[kube(status = "LMSMoodleTemplateStatus")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"Sites","type":"integer","jsonPath":".status.lmsMoodleCount"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct LMSMoodleTemplateSpec {
    /// Moodle workload spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub moodle_spec: Option<SpecFields>,

    /// Postgres database spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub postgres_spec: Option<SpecFields>,

    /// Keydb cache spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub keydb_spec: Option<SpecFields>,

    /// NFS Ganesha filesystem spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub nfs_spec: Option<SpecFields>,

    /// Skip the default network policies in the site namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lms_moodle_netpol_omit: Option<bool>,
}

/// `LMSMoodleTemplate` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LMSMoodleTemplateStatus {
    /// `Ready` or `Terminating`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Names of the `LMSMoodle` resources referencing this template
    #[serde(default)]
    pub lms_moodles: Vec<String>,

    #[serde(default)]
    pub lms_moodle_count: i64,
}

/// Lifecycle requested for a site.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DesiredState {
    /// Dependents are running
    #[default]
    Ready,
    /// Dependents are scaled down, data is kept
    Suspended,
}

/// `LMSMoodle` provisions one Moodle site with its database, cache and shared filesystem.
///
/// The effective spec of each dependent is the referenced template's block merged with
/// the override block of the same name on this resource.
///
/// # Example
///
/// ```yaml
/// apiVersion: lms.krestomat.io/v1alpha1
/// kind: LMSMoodle
/// metadata:
///   name: school-a
/// spec:
///   lmsMoodleTemplateName: basic
///   desiredState: Suspended
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "lms.krestomat.io",
    version = "v1alpha1",
    kind = "LMSMoodle",
    plural = "lmsmoodles",
    shortname = "lmsm",
    doc = "LMSMoodle provisions a Moodle site from an LMSMoodleTemplate. The operator creates the site namespace and applies Moodle, Postgres, Keydb and NFS Ganesha resources, mirroring their readiness in status."
)]
#[kube(status = "LMSMoodleStatus")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#)]
#[kube(printcolumn = r#"{"name":"Release","type":"string","jsonPath":".status.release"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct LMSMoodleSpec {
    /// Name of the `LMSMoodleTemplate` providing the baseline specs.
    pub lms_moodle_template_name: String,

    /// Desired lifecycle state. Defaults to `Ready`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<DesiredState>,

    /// Per-site overrides, same layout as the template spec.
    #[serde(flatten)]
    pub overrides: LMSMoodleTemplateSpec,
}

impl LMSMoodleSpec {
    /// Returns true when the site should be suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.desired_state == Some(DesiredState::Suspended)
    }
}

/// `LMSMoodle` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LMSMoodleStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Aggregate state, e.g. `Ready`, `PostgresPending`, `SuspendingMoodleSuccessful`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Site URL mirrored from the Moodle workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Storage used in GB, mirrored from the workload `storage_total` usage item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_gb: Option<String>,

    /// Registered users, mirrored from the workload `users_total` usage item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_users: Option<i64>,

    /// Moodle release mirrored from the workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// Status published by a dependent controller, as read by the operator.
///
/// Only the fields the operator consumes are modelled; everything else is ignored.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DependentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Workload only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Workload only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<DependentVersion>,

    /// Workload only: named usage metrics
    #[serde(default)]
    pub usage: Vec<UsageItem>,
}

impl DependentStatus {
    /// Looks up a condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Looks up a usage item by name.
    #[must_use]
    pub fn usage_item(&self, name: &str) -> Option<&UsageItem> {
        self.usage.iter().find(|item| item.name == name)
    }
}

/// Version block of the workload status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DependentVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// One named usage metric published by the workload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageItem {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}
