// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordered present, suspend and finalize passes over an [`InstancePlan`].
//!
//! Each pass walks a fixed kind order, talks to the cluster only through
//! [`DependentOps`], records everything in an [`LMSMoodleStatusUpdater`] and
//! returns whether the site has settled or must be requeued. Nothing here
//! blocks waiting for a dependant: a dependant that is not there yet ends the
//! pass with [`Progress::Requeue`].
//!
//! | Pass     | Order                                         | Gate                   |
//! |----------|-----------------------------------------------|------------------------|
//! | Present  | Postgres, Keydb, Nfs, then Moodle             | supporting `Ready=True`|
//! | Suspend  | Moodle, Keydb, Nfs, Postgres                  | `state == Suspended`   |
//! | Finalize | Moodle, then Keydb, Postgres, Nfs             | deleted and gone       |

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::crd::DependentStatus;
use crate::reconcilers::resources::DeleteOutcome;
use crate::reconcilers::spec_merge::{DependentKind, DependentSpec, InstancePlan};
use crate::reconcilers::status::{
    is_ready, is_suspended, kind_ready_reason, ready_reason, LMSMoodleStatusUpdater,
};
use crate::status_reasons::{
    is_settled_state, REASON_SUCCESSFUL, REASON_SUSPENDED, STATE_PREFIX_SUSPENDING, STATE_READY,
    STATE_SUSPENDED, STATE_TERMINATING,
};

/// Supporting dependants applied before the workload.
pub const PRESENT_ORDER: [DependentKind; 3] = [
    DependentKind::Postgres,
    DependentKind::Keydb,
    DependentKind::Nfs,
];

pub const SUSPEND_ORDER: [DependentKind; 4] = [
    DependentKind::Moodle,
    DependentKind::Keydb,
    DependentKind::Nfs,
    DependentKind::Postgres,
];

/// Supporting dependants deleted once the workload is gone.
pub const FINALIZE_ORDER: [DependentKind; 3] = [
    DependentKind::Keydb,
    DependentKind::Postgres,
    DependentKind::Nfs,
];

/// Order in which dependant reasons are folded into `status.state`.
pub const STATUS_ORDER: [DependentKind; 4] = [
    DependentKind::Postgres,
    DependentKind::Keydb,
    DependentKind::Nfs,
    DependentKind::Moodle,
];

/// Latest known status per dependant kind.
pub type Observed = BTreeMap<DependentKind, DependentStatus>;

/// Cluster operations the passes need on dependants.
#[async_trait]
pub trait DependentOps: Send + Sync {
    /// Current status of the dependant, `None` when it does not exist.
    async fn observe(&self, dependent: &DependentSpec) -> Result<Option<DependentStatus>>;

    /// Apply the dependant and return its status as stored.
    async fn apply(&self, dependent: &DependentSpec) -> Result<DependentStatus>;

    /// Ownership-checked delete of the dependant.
    async fn delete(&self, dependent: &DependentSpec) -> Result<DeleteOutcome>;
}

/// What the controller should do after a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Nothing left to wait for. After a finalize pass the finalizer may go.
    Settled,
    /// A dependant is still converging.
    Requeue,
}

impl Progress {
    fn for_state(state: &str) -> Self {
        if is_settled_state(state) {
            Self::Settled
        } else {
            Self::Requeue
        }
    }
}

/// Aggregate `status.state` of a site.
///
/// The first configured dependant whose ready reason is not the expected one
/// yields `<Kind><Reason>`. Outside a suspend the kinds are checked in
/// [`STATUS_ORDER`]; while suspending they are checked in [`SUSPEND_ORDER`] and
/// the value is prefixed with `Suspending`, so the state names the dependant
/// the suspend pass is waiting on.
#[must_use]
pub fn compute_status_state(
    plan: &InstancePlan,
    observed: &Observed,
    deleting: bool,
    suspending: bool,
) -> String {
    if deleting {
        return STATE_TERMINATING.to_string();
    }

    let (order, expected, settled) = if suspending {
        (SUSPEND_ORDER, REASON_SUSPENDED, STATE_SUSPENDED)
    } else {
        (STATUS_ORDER, REASON_SUCCESSFUL, STATE_READY)
    };

    let Some(kind) = order
        .into_iter()
        .filter(|k| plan.has(*k))
        .find(|k| ready_reason(observed.get(k)) != expected)
    else {
        return settled.to_string();
    };

    let sub_state = kind_ready_reason(kind, observed.get(&kind));
    if suspending {
        format!("{STATE_PREFIX_SUSPENDING}{sub_state}")
    } else {
        sub_state
    }
}

/// Records the computed state, workload fields and matching `Ready` condition.
///
/// Returns the computed state.
pub fn finish_status(
    plan: &InstancePlan,
    observed: &Observed,
    deleting: bool,
    suspending: bool,
    status: &mut LMSMoodleStatusUpdater,
) -> String {
    let state = compute_status_state(plan, observed, deleting, suspending);
    status.set_state(&state);
    status.set_status_from_workload(observed.get(&DependentKind::Moodle));
    status.set_ready_condition_for_state(&state);
    state
}

async fn observe_all(ops: &dyn DependentOps, plan: &InstancePlan) -> Result<Observed> {
    let mut observed = Observed::new();
    for dependent in plan.dependents.values() {
        if let Some(current) = ops.observe(dependent).await? {
            observed.insert(dependent.kind, current);
        }
    }
    Ok(observed)
}

async fn apply_and_mirror(
    ops: &dyn DependentOps,
    dependent: &DependentSpec,
    observed: &mut Observed,
    status: &mut LMSMoodleStatusUpdater,
) -> Result<()> {
    let applied = ops.apply(dependent).await?;
    status.set_condition_from_dependant(dependent.kind, Some(&applied));
    observed.insert(dependent.kind, applied);
    Ok(())
}

/// Present pass: supporting dependants first, the workload once they are all ready.
///
/// # Errors
///
/// Returns an error if observing or applying a dependant fails.
pub async fn run_present(
    ops: &dyn DependentOps,
    plan: &InstancePlan,
    status: &mut LMSMoodleStatusUpdater,
) -> Result<Progress> {
    let mut observed = observe_all(ops, plan).await?;

    for dependent in PRESENT_ORDER.iter().filter_map(|k| plan.dependent(*k)) {
        apply_and_mirror(ops, dependent, &mut observed, status).await?;
    }

    for dependent in PRESENT_ORDER.iter().filter_map(|k| plan.dependent(*k)) {
        if !is_ready(observed.get(&dependent.kind)) {
            info!(
                kind = %dependent.kind,
                name = %dependent.name,
                "Dependant is not ready, requeueing"
            );
            let state = finish_status(plan, &observed, false, false, status);
            debug!(state = %state, "Present pass waiting");
            return Ok(Progress::Requeue);
        }
    }

    if let Some(moodle) = plan.dependent(DependentKind::Moodle) {
        apply_and_mirror(ops, moodle, &mut observed, status).await?;
        if !is_ready(observed.get(&DependentKind::Moodle)) {
            info!(name = %moodle.name, "Moodle is not ready, requeueing");
        }
    }

    let state = finish_status(plan, &observed, false, false, status);
    Ok(Progress::for_state(&state))
}

/// Suspend pass: each configured dependant in [`SUSPEND_ORDER`] must report
/// `Suspended` before the next one is touched.
///
/// # Errors
///
/// Returns an error if observing or applying a dependant fails.
pub async fn run_suspend(
    ops: &dyn DependentOps,
    plan: &InstancePlan,
    status: &mut LMSMoodleStatusUpdater,
) -> Result<Progress> {
    let mut observed = observe_all(ops, plan).await?;

    for dependent in SUSPEND_ORDER.iter().filter_map(|k| plan.dependent(*k)) {
        apply_and_mirror(ops, &dependent.suspended(), &mut observed, status).await?;
        if !is_suspended(observed.get(&dependent.kind)) {
            info!(
                kind = %dependent.kind,
                name = %dependent.name,
                "Dependant is being suspended"
            );
            finish_status(plan, &observed, false, true, status);
            return Ok(Progress::Requeue);
        }
    }

    let state = finish_status(plan, &observed, false, true, status);
    Ok(Progress::for_state(&state))
}

/// Finalize pass: delete the workload, then the supporting dependants.
///
/// Returns [`Progress::Settled`] once nothing owned remains. The status then
/// carries the terminal `Terminated` state and the finalizer may be removed.
///
/// # Errors
///
/// Returns an error if a delete fails for a reason other than the object being gone.
pub async fn run_finalize(
    ops: &dyn DependentOps,
    plan: &InstancePlan,
    status: &mut LMSMoodleStatusUpdater,
) -> Result<Progress> {
    finish_status(plan, &Observed::new(), true, false, status);

    if let Some(moodle) = plan.dependent(DependentKind::Moodle) {
        if ops.delete(moodle).await?.is_pending() {
            info!(name = %moodle.name, "Waiting for Moodle to be deleted");
            return Ok(Progress::Requeue);
        }
    }

    let mut pending = false;
    for dependent in FINALIZE_ORDER.iter().filter_map(|k| plan.dependent(*k)) {
        pending |= ops.delete(dependent).await?.is_pending();
    }
    if pending {
        info!(name = %plan.names.base_name, "Waiting for dependants to be deleted");
        return Ok(Progress::Requeue);
    }

    status.set_terminated();
    Ok(Progress::Settled)
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod state_machine_tests;
