// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LMSMoodle` reconciliation logic.
//!
//! One reconcile of a site:
//!
//! 1. Resolve the referenced `LMSMoodleTemplate` and compose the [`InstancePlan`]
//! 2. Merge the identity labels into the site's own metadata
//! 3. If the site is being deleted, run the finalize pass and drop the finalizer
//!    once every owned dependant is gone
//! 4. Otherwise ensure the finalizer, the site namespace and the default
//!    network policies, then run the suspend or present pass
//! 5. Write the collected status in a single patch
//!
//! Dependants are never awaited in place. A pass that is still waiting returns
//! [`Progress::Requeue`] and the controller comes back later, or sooner when an
//! owned dependant changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::crd::{DependentStatus, LMSMoodle, LMSMoodleTemplate, LMSMoodleTemplateSpec};
use crate::labels::{COMPONENT_NGINX, FINALIZER_LMS_MOODLE, K8S_COMPONENT};
use crate::lms_errors::TemplateError;
use crate::metrics::{record_dependant_applied, record_dependant_deleted};
use crate::naming::{validate_namespace, InstanceNames};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::resources::{
    dependent_object, dependent_status, owner_reference, reconcile_apply, reconcile_create,
    reconcile_delete_dependant, set_owner_and_labels, DeleteOutcome,
};
use crate::reconcilers::spec_merge::{compose_plan, DependentSpec, InstancePlan};
use crate::reconcilers::state_machine::{
    run_finalize, run_present, run_suspend, DependentOps, Progress,
};
use crate::reconcilers::status::LMSMoodleStatusUpdater;

const KIND_NETWORK_POLICY: &str = "NetworkPolicy";

/// [`DependentOps`] backed by the Kubernetes API.
pub struct ClusterDependentOps {
    client: Client,
    owner: OwnerReference,
    labels: BTreeMap<String, String>,
    field_manager: String,
}

impl ClusterDependentOps {
    #[must_use]
    pub fn new(
        client: Client,
        owner: OwnerReference,
        labels: BTreeMap<String, String>,
        field_manager: String,
    ) -> Self {
        Self {
            client,
            owner,
            labels,
            field_manager,
        }
    }

    fn api(&self, dependent: &DependentSpec) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &dependent.namespace,
            &dependent.kind.api_resource(),
        )
    }
}

#[async_trait]
impl DependentOps for ClusterDependentOps {
    async fn observe(&self, dependent: &DependentSpec) -> Result<Option<DependentStatus>> {
        let current = self.api(dependent).get_opt(&dependent.name).await?;
        Ok(current.as_ref().map(dependent_status))
    }

    async fn apply(&self, dependent: &DependentSpec) -> Result<DependentStatus> {
        let obj = dependent_object(dependent, &self.owner, &self.labels);
        let applied = reconcile_apply(&self.api(dependent), &obj, &self.field_manager).await?;
        record_dependant_applied(&dependent.kind.to_string());
        Ok(dependent_status(&applied))
    }

    async fn delete(&self, dependent: &DependentSpec) -> Result<DeleteOutcome> {
        let kind = dependent.kind.to_string();
        let outcome = reconcile_delete_dependant(
            &self.api(dependent),
            &kind,
            &dependent.name,
            &self.owner.uid,
        )
        .await?;
        if outcome == DeleteOutcome::Deleted {
            record_dependant_deleted(&kind);
        }
        Ok(outcome)
    }
}

/// Reconciles an `LMSMoodle` resource.
///
/// # Returns
///
/// * `Ok(Progress::Settled)` - the site reached `Ready`, `Suspended` or `Terminated`
/// * `Ok(Progress::Requeue)` - a dependant is still converging
///
/// # Errors
///
/// Returns an error if the template is missing, the specs cannot be merged, the
/// site name is too long for its namespace, or a Kubernetes API call fails.
pub async fn reconcile_lmsmoodle(ctx: Arc<Context>, lms: Arc<LMSMoodle>) -> Result<Progress> {
    let client = &ctx.client;
    let name = lms.name_any();
    let template_name = lms.spec.lms_moodle_template_name.as_str();
    let deleting = lms.metadata.deletion_timestamp.is_some();

    info!(name = %name, template = %template_name, deleting, "Reconciling LMSMoodle");

    let templates: Api<LMSMoodleTemplate> = Api::all(client.clone());
    let template = templates.get_opt(template_name).await?;
    let (template_labels, template_spec) = resolve_template(template, template_name, deleting)?;

    let plan = compose_plan(
        &name,
        template_labels.as_ref(),
        &template_spec,
        &lms.spec.overrides,
    )?;
    debug!(
        name = %name,
        namespace = %plan.names.namespace,
        base_name = %plan.names.base_name,
        dependants = plan.dependents.len(),
        netpol_omit = plan.netpol_omit,
        "Composed site plan"
    );

    patch_site_labels(client, &lms, &plan.composition.labels).await?;

    let owner = owner_reference(&lms)?;
    let ops = ClusterDependentOps::new(
        client.clone(),
        owner.clone(),
        plan.composition.labels.clone(),
        ctx.config.field_manager.clone(),
    );
    let mut status = LMSMoodleStatusUpdater::new(&lms);

    if deleting {
        if !has_finalizer(&lms.metadata, FINALIZER_LMS_MOODLE) {
            debug!(name = %name, "LMSMoodle deleting without finalizer, nothing to do");
            return Ok(Progress::Settled);
        }

        let progress = run_finalize(&ops, &plan, &mut status).await?;
        status.apply(client).await?;
        if progress == Progress::Settled {
            remove_finalizer(client, lms.as_ref(), FINALIZER_LMS_MOODLE).await?;
            info!(name = %name, "LMSMoodle finalized");
        }
        return Ok(progress);
    }

    validate_namespace(&plan.names)?;
    ensure_finalizer(client, lms.as_ref(), FINALIZER_LMS_MOODLE).await?;
    reconcile_site_namespace(client, &plan, &owner).await?;

    let progress = if lms.spec.is_suspended() {
        run_suspend(&ops, &plan, &mut status).await?
    } else {
        run_present(&ops, &plan, &mut status).await?
    };
    status.apply(client).await?;

    info!(
        name = %name,
        state = ?status.status().state,
        progress = ?progress,
        "Reconciled LMSMoodle"
    );
    Ok(progress)
}

/// Labels and spec of the referenced template.
///
/// A deleting site whose template is already gone is finalized against an empty
/// template, so its own overrides still drive the deletes.
///
/// # Errors
///
/// Returns [`TemplateError::NotFound`] if the template is missing and the site
/// is not being deleted.
pub fn resolve_template(
    template: Option<LMSMoodleTemplate>,
    template_name: &str,
    deleting: bool,
) -> Result<(Option<BTreeMap<String, String>>, LMSMoodleTemplateSpec), TemplateError> {
    match template {
        Some(template) => Ok((template.metadata.labels, template.spec)),
        None if deleting => {
            warn!(
                template = %template_name,
                "LMSMoodleTemplate not found, finalizing with an empty template"
            );
            Ok((None, LMSMoodleTemplateSpec::default()))
        }
        None => Err(TemplateError::NotFound {
            name: template_name.to_string(),
        }),
    }
}

/// Returns true when any desired label is missing or differs in `current`.
#[must_use]
pub fn labels_need_patch(
    current: Option<&BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> bool {
    let empty = BTreeMap::new();
    let current = current.unwrap_or(&empty);
    desired.iter().any(|(k, v)| current.get(k) != Some(v))
}

async fn patch_site_labels(
    client: &Client,
    lms: &LMSMoodle,
    labels: &BTreeMap<String, String>,
) -> Result<()> {
    if !labels_need_patch(lms.metadata.labels.as_ref(), labels) {
        return Ok(());
    }

    let name = lms.name_any();
    let api: Api<LMSMoodle> = Api::all(client.clone());
    let patch = json!({ "metadata": { "labels": labels } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!(name = %name, "Patched LMSMoodle labels");
    Ok(())
}

/// Namespace and default network policies of the site.
async fn reconcile_site_namespace(
    client: &Client,
    plan: &InstancePlan,
    owner: &OwnerReference,
) -> Result<()> {
    let labels = &plan.composition.labels;
    let namespaces: Api<Namespace> = Api::all(client.clone());
    reconcile_create(&namespaces, &build_namespace(&plan.names, owner, labels)).await?;

    let netpols: Api<NetworkPolicy> = Api::namespaced(client.clone(), &plan.names.namespace);
    if plan.netpol_omit {
        for name in [plan.names.namespace_netpol(), plan.names.nginx_netpol()] {
            reconcile_delete_dependant(&netpols, KIND_NETWORK_POLICY, &name, &owner.uid).await?;
        }
        return Ok(());
    }

    reconcile_create(&netpols, &build_namespace_netpol(&plan.names, owner, labels)?).await?;
    reconcile_create(&netpols, &build_nginx_netpol(&plan.names, owner, labels)?).await?;
    Ok(())
}

fn owned_meta(
    name: String,
    namespace: Option<&str>,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) -> ObjectMeta {
    let mut meta = ObjectMeta {
        name: Some(name),
        namespace: namespace.map(str::to_string),
        ..ObjectMeta::default()
    };
    set_owner_and_labels(&mut meta, owner, labels);
    meta
}

/// The site namespace, owned by the site and carrying its labels.
#[must_use]
pub fn build_namespace(
    names: &InstanceNames,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) -> Namespace {
    Namespace {
        metadata: owned_meta(names.namespace.clone(), None, owner, labels),
        ..Namespace::default()
    }
}

/// Network policy admitting ingress to every pod from pods of the same namespace.
///
/// # Errors
///
/// Returns an error if the policy spec cannot be built.
pub fn build_namespace_netpol(
    names: &InstanceNames,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) -> Result<NetworkPolicy> {
    let spec: NetworkPolicySpec = serde_json::from_value(json!({
        "policyTypes": ["Ingress"],
        "podSelector": {},
        "ingress": [{ "from": [{ "podSelector": {} }] }],
    }))?;

    Ok(NetworkPolicy {
        metadata: owned_meta(
            names.namespace_netpol(),
            Some(&names.namespace),
            owner,
            labels,
        ),
        spec: Some(spec),
        ..NetworkPolicy::default()
    })
}

/// Network policy admitting ingress to nginx pods from anywhere.
///
/// # Errors
///
/// Returns an error if the policy spec cannot be built.
pub fn build_nginx_netpol(
    names: &InstanceNames,
    owner: &OwnerReference,
    labels: &BTreeMap<String, String>,
) -> Result<NetworkPolicy> {
    let spec: NetworkPolicySpec = serde_json::from_value(json!({
        "policyTypes": ["Ingress"],
        "podSelector": { "matchLabels": { K8S_COMPONENT: COMPONENT_NGINX } },
        "ingress": [{}],
    }))?;

    Ok(NetworkPolicy {
        metadata: owned_meta(names.nginx_netpol(), Some(&names.namespace), owner, labels),
        spec: Some(spec),
        ..NetworkPolicy::default()
    })
}

#[cfg(test)]
#[path = "lmsmoodle_tests.rs"]
mod lmsmoodle_tests;
