// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LMSMoodleTemplate` reconciliation logic.
//!
//! A template owns nothing. The reconciler keeps its finalizer, publishes which
//! sites reference it, and refuses to release a template that is still in use.

use std::sync::Arc;

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::crd::{LMSMoodleTemplate, LMSMoodleTemplateStatus};
use crate::labels::FINALIZER_LMS_MOODLE_TEMPLATE;
use crate::lms_errors::TemplateError;
use crate::metrics::record_template_references;
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::state_machine::Progress;
use crate::status_reasons::{STATE_READY, STATE_TERMINATING};

/// Reconciles an `LMSMoodleTemplate` resource.
///
/// Returns [`Progress::Requeue`] without touching the template until the site
/// store has finished its initial list.
///
/// # Errors
///
/// Returns [`TemplateError::InUse`] when a deleting template is still referenced,
/// or an error if a Kubernetes API call fails.
pub async fn reconcile_lmsmoodletemplate(
    ctx: Arc<Context>,
    template: Arc<LMSMoodleTemplate>,
) -> Result<Progress> {
    let client = &ctx.client;
    let name = template.name_any();
    let deleting = template.metadata.deletion_timestamp.is_some();

    info!(name = %name, deleting, "Reconciling LMSMoodleTemplate");

    if !ctx.stores.is_synced() {
        warn!(name = %name, "LMSMoodle store not synced yet, requeueing");
        return Ok(Progress::Requeue);
    }

    let lms_moodles = ctx.stores.lms_moodles_using_template(&name);
    record_template_references(&name, lms_moodles.len());

    let desired = desired_template_status(lms_moodles, deleting);
    update_template_status(client, &template, desired.clone()).await?;

    if !deleting {
        ensure_finalizer(client, template.as_ref(), FINALIZER_LMS_MOODLE_TEMPLATE).await?;
        return Ok(Progress::Settled);
    }

    if !has_finalizer(&template.metadata, FINALIZER_LMS_MOODLE_TEMPLATE) {
        return Ok(Progress::Settled);
    }

    if let Err(err) = check_deletable(&name, &desired.lms_moodles) {
        error!(name = %name, lms_moodles = ?desired.lms_moodles, "Cannot delete LMSMoodleTemplate: {err}");
        return Err(err.into());
    }

    remove_finalizer(client, template.as_ref(), FINALIZER_LMS_MOODLE_TEMPLATE).await?;
    info!(name = %name, "Successfully finalized LMSMoodleTemplate");
    Ok(Progress::Settled)
}

/// Refuses deletion of `name` while any site references it.
///
/// # Errors
///
/// Returns [`TemplateError::InUse`] carrying the number of referencing sites.
pub fn check_deletable(name: &str, lms_moodles: &[String]) -> Result<(), TemplateError> {
    if lms_moodles.is_empty() {
        return Ok(());
    }
    Err(TemplateError::InUse {
        name: name.to_string(),
        count: lms_moodles.len(),
    })
}

/// Template status for the given referencing sites.
#[must_use]
pub fn desired_template_status(lms_moodles: Vec<String>, deleting: bool) -> LMSMoodleTemplateStatus {
    let state = if deleting {
        STATE_TERMINATING
    } else {
        STATE_READY
    };
    LMSMoodleTemplateStatus {
        state: Some(state.to_string()),
        lms_moodle_count: i64::try_from(lms_moodles.len()).unwrap_or(i64::MAX),
        lms_moodles,
    }
}

/// Returns true when `desired` differs from the stored status.
#[must_use]
pub fn template_status_changed(
    current: Option<&LMSMoodleTemplateStatus>,
    desired: &LMSMoodleTemplateStatus,
) -> bool {
    current != Some(desired)
}

async fn update_template_status(
    client: &Client,
    template: &LMSMoodleTemplate,
    desired: LMSMoodleTemplateStatus,
) -> Result<()> {
    let name = template.name_any();
    if !template_status_changed(template.status.as_ref(), &desired) {
        debug!(name = %name, "LMSMoodleTemplate status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<LMSMoodleTemplate> = Api::all(client.clone());
    let patch = json!({ "status": desired });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!(
        name = %name,
        state = ?desired.state,
        lms_moodle_count = desired.lms_moodle_count,
        "Updated LMSMoodleTemplate status"
    );
    Ok(())
}

#[cfg(test)]
#[path = "lmsmoodletemplate_tests.rs"]
mod lmsmoodletemplate_tests;
