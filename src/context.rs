// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers with reflector stores.
//!
//! Every reconcile receives an `Arc<Context>` holding:
//! - the Kubernetes client
//! - the reflector store of `LMSMoodle` resources
//! - the operator configuration
//!
//! The store is the template index: a template change maps to the sites that
//! reference it, and template deletion counts them, without any API query.
//! Until the first list completes the store is empty, so callers that act on
//! an absence of references must check [`Stores::is_synced`] first.

use crate::config::OperatorConfig;
use crate::crd::LMSMoodle;
use futures::FutureExt;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Client, ResourceExt};

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores
    pub stores: Stores,

    /// Runtime settings
    pub config: OperatorConfig,
}

/// Reflector stores for cross-controller queries.
#[derive(Clone)]
pub struct Stores {
    pub lms_moodles: Store<LMSMoodle>,
}

impl Stores {
    /// True once the reflector has delivered its initial list.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self.lms_moodles.wait_until_ready().now_or_never(), Some(Ok(())))
    }

    /// Names of the sites referencing `template_name`, sorted.
    #[must_use]
    pub fn lms_moodles_using_template(&self, template_name: &str) -> Vec<String> {
        instances_using_template(self.lms_moodles.state().iter().map(|lms| &**lms), template_name)
    }

    /// Object refs of the sites to requeue when `template_name` changes.
    #[must_use]
    pub fn lms_moodle_refs_for_template(&self, template_name: &str) -> Vec<ObjectRef<LMSMoodle>> {
        self.lms_moodles_using_template(template_name)
            .into_iter()
            .map(|name| ObjectRef::new(&name))
            .collect()
    }
}

/// Names of the sites in `lms_moodles` whose `lmsMoodleTemplateName` is `template_name`.
#[must_use]
pub fn instances_using_template<'a>(
    lms_moodles: impl Iterator<Item = &'a LMSMoodle>,
    template_name: &str,
) -> Vec<String> {
    let mut names: Vec<String> = lms_moodles
        .filter(|lms| lms.spec.lms_moodle_template_name == template_name)
        .map(ResourceExt::name_any)
        .collect();
    names.sort();
    names
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
