// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain error types for the LMS Moodle operator.
//!
//! This module provides specialized error types for:
//! - Template reference failures (missing template, template still in use)
//! - Spec merge failures between a template and an instance override
//! - Objects missing metadata the reconcilers rely on
//! - Site names too long to derive a namespace from
//! - Kubernetes API failures
//!
//! Not-ready dependants are NOT errors: they are reported through
//! `status.state` and a requeue.

use thiserror::Error;

/// Errors related to `LMSMoodleTemplate` references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template referenced by an `LMSMoodle` does not exist
    #[error("LMSMoodleTemplate '{name}' not found")]
    NotFound {
        /// The template name referenced by the instance
        name: String,
    },

    /// Template deletion refused while instances still reference it
    #[error("LMSMoodleTemplate '{name}' is in used by {count} lms moodle")]
    InUse {
        /// The template being deleted
        name: String,
        /// Number of `LMSMoodle` resources referencing it
        count: usize,
    },
}

impl TemplateError {
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "TemplateNotFound",
            Self::InUse { .. } => "TemplateInUse",
        }
    }
}

/// Errors raised while merging a template spec with an instance override.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The same key holds values of different JSON types in template and override
    #[error("cannot merge '{path}': template value is {template_type}, override value is {override_type}")]
    TypeMismatch {
        /// Dotted path of the conflicting key (e.g. `moodleSpec.nginxSize`)
        path: String,
        /// JSON type found in the template
        template_type: &'static str,
        /// JSON type found in the override
        override_type: &'static str,
    },

    /// A structured value the operator injects could not be rendered
    #[error("failed to render '{field}': {reason}")]
    Render {
        /// Spec field being rendered
        field: String,
        /// Serializer error text
        reason: String,
    },
}

impl MergeError {
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "SpecTypeMismatch",
            Self::Render { .. } => "SpecRenderFailed",
        }
    }
}

/// Composite error type for reconciliation failures.
#[derive(Error, Debug)]
pub enum LmsError {
    /// Template reference error
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Spec merge error
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// An object lacks metadata required to act on it
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        /// Kind of the offending object
        kind: String,
        /// Missing field (`name`, `uid`)
        field: &'static str,
    },

    /// The derived site namespace exceeds the Kubernetes name limit
    #[error("namespace '{namespace}' derived from the site name exceeds {max} characters")]
    NameTooLong {
        /// Derived namespace
        namespace: String,
        /// Character limit
        max: usize,
    },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Generic error for operations that don't fit other categories
    #[error("LMS operation failed: {0}")]
    Generic(String),
}

impl LmsError {
    /// Returns true if retrying without user intervention may succeed.
    ///
    /// Merge errors are permanent until the user fixes the conflicting spec.
    /// A missing template may appear later, so it is treated as transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Template(TemplateError::NotFound { .. } | TemplateError::InUse { .. })
            | Self::Kube(_)
            | Self::Generic(_) => true,
            Self::Merge(_) | Self::MissingMetadata { .. } | Self::NameTooLong { .. } => false,
        }
    }

    /// Returns a `CamelCase` reason code for logs and metrics.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Template(e) => e.status_reason(),
            Self::Merge(e) => e.status_reason(),
            Self::MissingMetadata { .. } => "MissingMetadata",
            Self::NameTooLong { .. } => "NameTooLong",
            Self::Kube(_) => "KubeApiError",
            Self::Generic(_) => "OperationFailed",
        }
    }
}

impl From<anyhow::Error> for LmsError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<LmsError>() {
            Ok(lms) => return lms,
            Err(err) => err,
        };
        let err = match err.downcast::<TemplateError>() {
            Ok(template) => return Self::Template(template),
            Err(err) => err,
        };
        let err = match err.downcast::<MergeError>() {
            Ok(merge) => return Self::Merge(merge),
            Err(err) => err,
        };
        match err.downcast::<kube::Error>() {
            Ok(kube) => Self::Kube(kube),
            Err(err) => Self::Generic(format!("{err:#}")),
        }
    }
}
