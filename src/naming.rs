// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic names for everything derived from an `LMSMoodle`.
//!
//! Dependents are adopted by name across reconciles, so the same site name must
//! always produce the same namespace and dependent names.
//!
//! # Example
//!
//! ```rust
//! use lms_moodle_operator::naming::derive_names;
//!
//! let names = derive_names("school-with-a-long-name");
//! assert_eq!(names.namespace, "lms-school-with-a-long-name");
//! assert_eq!(names.base_name, "lms-school-with-a");
//!
//! // The prefix is never doubled
//! assert_eq!(derive_names("lms-a").namespace, "lms-a");
//! ```

use crate::constants::{
    NAMESPACE_MAX_CHARS, NAME_PREFIX, NAME_TRUNCATE_CHARS, NETPOL_NAMESPACE_SUFFIX,
    NETPOL_NGINX_SUFFIX,
};
use crate::lms_errors::LmsError;

/// Names derived from one `LMSMoodle` name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceNames {
    /// The `LMSMoodle` name itself
    pub instance: String,
    /// Namespace holding every dependent, never truncated
    pub namespace: String,
    /// Shared name of the Moodle, Postgres, Keydb and Ganesha resources
    pub base_name: String,
}

impl InstanceNames {
    /// Name of the network policy admitting same-namespace traffic.
    #[must_use]
    pub fn namespace_netpol(&self) -> String {
        format!("{}{NETPOL_NAMESPACE_SUFFIX}", self.base_name)
    }

    /// Name of the network policy admitting ingress to nginx pods.
    #[must_use]
    pub fn nginx_netpol(&self) -> String {
        format!("{}{NETPOL_NGINX_SUFFIX}", self.base_name)
    }
}

/// Derives the namespace and dependent base name for a site.
#[must_use]
pub fn derive_names(instance: &str) -> InstanceNames {
    let prefixed = if instance.starts_with(NAME_PREFIX) {
        instance.to_string()
    } else {
        format!("{NAME_PREFIX}{instance}")
    };

    InstanceNames {
        instance: instance.to_string(),
        base_name: truncate(&prefixed, NAME_TRUNCATE_CHARS),
        namespace: prefixed,
    }
}

/// Rejects names whose namespace would exceed [`NAMESPACE_MAX_CHARS`].
///
/// The namespace is the site's identity and is never truncated.
///
/// # Errors
///
/// Returns [`LmsError::NameTooLong`] for an over-long namespace.
pub fn validate_namespace(names: &InstanceNames) -> Result<(), LmsError> {
    if names.namespace.chars().count() > NAMESPACE_MAX_CHARS {
        return Err(LmsError::NameTooLong {
            namespace: names.namespace.clone(),
            max: NAMESPACE_MAX_CHARS,
        });
    }
    Ok(())
}

/// Keeps the first `max_chars` characters of `value`.
///
/// A `-` left dangling by the cut is dropped so the result stays a valid DNS label.
#[must_use]
pub fn truncate(value: &str, max_chars: usize) -> String {
    let cut: String = value.chars().take(max_chars).collect();
    if cut.len() < value.len() {
        cut.trim_end_matches('-').to_string()
    } else {
        cut
    }
}
