// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for LMS Moodle resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `LMSMoodle`, its owned dependants and the referenced templates
//! 2. **Compose** - merge template and override specs into an [`InstancePlan`]
//! 3. **Apply** - server-side apply each dependant in its fixed order
//! 4. **Status** - fold dependant readiness into a single `status.state`
//!
//! # Available Reconcilers
//!
//! - [`reconcile_lmsmoodle`] - Provisions, suspends and finalizes a site
//! - [`reconcile_lmsmoodletemplate`] - Tracks template usage and guards deletion
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use lms_moodle_operator::reconcilers::{reconcile_lmsmoodle, Progress};
//! use lms_moodle_operator::crd::LMSMoodle;
//! use lms_moodle_operator::context::Context;
//! use std::sync::Arc;
//!
//! async fn reconcile_site(ctx: Arc<Context>, lms: Arc<LMSMoodle>) -> anyhow::Result<bool> {
//!     let progress = reconcile_lmsmoodle(ctx, lms).await?;
//!     Ok(progress == Progress::Settled)
//! }
//! ```

pub mod finalizers;
pub mod lmsmoodle;
pub mod lmsmoodletemplate;
pub mod resources;
pub mod spec_merge;
pub mod state_machine;
pub mod status;

#[cfg(test)]
mod status_tests;

pub use lmsmoodle::reconcile_lmsmoodle;
pub use lmsmoodletemplate::reconcile_lmsmoodletemplate;
pub use spec_merge::{compose_plan, DependentKind, InstancePlan};
pub use state_machine::Progress;
