// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # LMS Moodle Operator for Kubernetes
//!
//! A Kubernetes operator that provisions Moodle sites from reusable templates.
//!
//! ## Overview
//!
//! An `LMSMoodleTemplate` carries baseline specs for the four dependants of a site:
//! the Moodle workload, its Postgres database, its Keydb cache and its NFS Ganesha
//! shared filesystem. An `LMSMoodle` references one template and may override any
//! part of it. The operator merges both, creates the site namespace and default
//! network policies, and applies the dependants in order, mirroring their readiness
//! into a single `status.state`.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`composer`] - Labels, affinity and other operator-injected spec fields
//! - [`naming`] - Namespace and dependant names derived from a site name
//! - [`context`] - Shared context and reflector stores for controllers
//! - [`config`] - Command line and environment configuration
//! - [`health`] - Probe and metrics HTTP server
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use lms_moodle_operator::crd::{LMSMoodle, LMSMoodleSpec, LMSMoodleTemplateSpec};
//!
//! let site = LMSMoodle::new(
//!     "school-a",
//!     LMSMoodleSpec {
//!         lms_moodle_template_name: "basic".to_string(),
//!         desired_state: None,
//!         overrides: LMSMoodleTemplateSpec::default(),
//!     },
//! );
//! ```

pub mod composer;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod health;
pub mod labels;
pub mod lms_errors;
pub mod metrics;
pub mod naming;
pub mod reconcilers;
pub mod status_reasons;

#[cfg(test)]
mod naming_tests;
