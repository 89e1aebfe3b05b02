// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common labels and default pod affinity for one site.
//!
//! Labels and affinity are built as typed values and only rendered to YAML text when
//! they are written into a dependent spec. Dependent controllers expect both as
//! newline-joined YAML strings (`commonLabels`, `*Affinity` fields), so an existing
//! user value is kept and the operator's block is placed in front of it.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, PodAffinity, PodAffinityTerm, WeightedPodAffinityTerm};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use serde::Serialize;
use serde_json::Value;

use crate::constants::{
    DEFAULT_AFFINITY_TOPOLOGY_KEY, DEFAULT_AFFINITY_WEIGHT, FIELD_COMMON_LABELS,
    FIELD_NOTIFY_UUID, FIELD_ROUTINE_STATUS_CR_NOTIFY, OPERATOR_NAME,
};
use crate::crd::SpecFields;
use crate::labels::{LMS_NAME_LABEL, META_OPERATOR_NAME_LABEL};
use crate::lms_errors::MergeError;

/// Labels and affinity shared by every object belonging to one site.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteComposition {
    /// Labels set on the site, its namespace, and in every dependent's `commonLabels`
    pub labels: BTreeMap<String, String>,
    /// Affinity prepended to every dependent affinity field
    pub affinity: Affinity,
}

impl SiteComposition {
    /// Builds the composition for `instance`, inheriting the template's labels.
    #[must_use]
    pub fn new(instance: &str, template_labels: Option<&BTreeMap<String, String>>) -> Self {
        Self {
            labels: instance_labels(instance, template_labels),
            affinity: default_affinity(instance),
        }
    }

    /// Prepends the rendered labels to the spec's `commonLabels`.
    ///
    /// # Errors
    ///
    /// Returns an error if the labels cannot be rendered or the existing value is not a string.
    pub fn inject_common_labels(&self, spec: &mut SpecFields) -> Result<(), MergeError> {
        let block = render_yaml(FIELD_COMMON_LABELS, &self.labels)?;
        prepend_block(spec, FIELD_COMMON_LABELS, &block)
    }

    /// Prepends the rendered default affinity to each named affinity field.
    ///
    /// # Errors
    ///
    /// Returns an error if the affinity cannot be rendered or an existing value is not a string.
    pub fn inject_affinity(&self, spec: &mut SpecFields, fields: &[&str]) -> Result<(), MergeError> {
        for field in fields {
            let block = render_yaml(field, &self.affinity)?;
            prepend_block(spec, field, &block)?;
        }
        Ok(())
    }
}

/// Template labels plus the site identity labels. Identity keys always win.
#[must_use]
pub fn instance_labels(
    instance: &str,
    template_labels: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut labels = template_labels.cloned().unwrap_or_default();
    labels.insert(LMS_NAME_LABEL.to_string(), instance.to_string());
    labels.insert(
        META_OPERATOR_NAME_LABEL.to_string(),
        OPERATOR_NAME.to_string(),
    );
    labels
}

/// Preferred pod affinity co-locating every pod labelled with this site's name.
#[must_use]
pub fn default_affinity(instance: &str) -> Affinity {
    Affinity {
        pod_affinity: Some(PodAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: DEFAULT_AFFINITY_WEIGHT,
                    pod_affinity_term: PodAffinityTerm {
                        topology_key: DEFAULT_AFFINITY_TOPOLOGY_KEY.to_string(),
                        label_selector: Some(LabelSelector {
                            match_expressions: Some(vec![LabelSelectorRequirement {
                                key: LMS_NAME_LABEL.to_string(),
                                operator: "In".to_string(),
                                values: Some(vec![instance.to_string()]),
                            }]),
                            match_labels: None,
                        }),
                        ..Default::default()
                    },
                },
            ]),
            required_during_scheduling_ignored_during_execution: None,
        }),
        ..Default::default()
    }
}

/// Joins two values of a string field, `first` on top.
///
/// Either side may be absent; the separator only appears when both are present.
#[must_use]
pub fn join_lines(first: Option<&str>, second: Option<&str>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}

/// Sets `routineStatusCrNotify.uuid` to the site name when the block exists without one.
pub fn set_notify_uuid(spec: &mut SpecFields, instance: &str) {
    if let Some(Value::Object(notify)) = spec.get_mut(FIELD_ROUTINE_STATUS_CR_NOTIFY) {
        notify
            .entry(FIELD_NOTIFY_UUID)
            .or_insert_with(|| Value::String(instance.to_string()));
    }
}

fn render_yaml<T: Serialize>(field: &str, value: &T) -> Result<String, MergeError> {
    serde_yaml::to_string(value).map_err(|e| MergeError::Render {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn prepend_block(spec: &mut SpecFields, field: &str, block: &str) -> Result<(), MergeError> {
    let existing = match spec.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            return Err(MergeError::Render {
                field: field.to_string(),
                reason: format!("expected a string, found {}", json_type(other)),
            })
        }
    };

    if let Some(joined) = join_lines(Some(block), existing) {
        spec.insert(field.to_string(), Value::String(joined));
    }
    Ok(())
}

/// JSON type name used in merge error messages.
#[must_use]
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
