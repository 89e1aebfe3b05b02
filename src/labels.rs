// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and finalizer constants used across all reconcilers.
//!
//! Every object the operator creates carries the identity labels below, so
//! pods of one site can be co-scheduled and traced back to their owner.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Component value set on nginx pods by the Moodle controller
pub const COMPONENT_NGINX: &str = "nginx";

// ============================================================================
// LMS-Specific Labels
// ============================================================================

/// Label carrying the owning `LMSMoodle` name
pub const LMS_NAME_LABEL: &str = "lms.krestomat.io/lms-name";

/// Label carrying the managing operator name
pub const META_OPERATOR_NAME_LABEL: &str = "lms.krestomat.io/meta-operator-name";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `LMSMoodle` resources
pub const FINALIZER_LMS_MOODLE: &str = "lms.krestomat.io/finalizer";

/// Finalizer for `LMSMoodleTemplate` resources
pub const FINALIZER_LMS_MOODLE_TEMPLATE: &str = "lms.krestomat.io/finalizer";
