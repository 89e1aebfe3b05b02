// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Effective dependent specs for one `LMSMoodle`.
//!
//! Each dependent kind gets `merge(template[kind], override[kind])`, with the
//! operator's own fields injected:
//!
//! 1. Cross-links (`moodlePostgresMetaName`, ...) go into the template's Moodle block,
//!    so a site override of the same key still wins.
//! 2. Template and override blocks are merged. Objects merge recursively, scalars and
//!    arrays in the override replace the template value, a `null` override is ignored.
//!    Allow-listed string fields are joined as `override + "\n" + template`.
//! 3. `commonLabels` and the default affinity fields are prepended with the site's
//!    labels and affinity.
//!
//! The whole plan is built before anything is written to the cluster, so a merge
//! failure aborts the reconcile with no partial writes.

use std::collections::BTreeMap;
use std::fmt;

use kube::api::{ApiResource, GroupVersionKind};
use serde_json::{Map, Value};

use crate::composer::{join_lines, json_type, set_notify_uuid, SiteComposition};
use crate::constants::{
    CR_STATE_SUSPENDED, FIELD_COMMON_LABELS, FIELD_CR_STATE, FIELD_GANESHA_AFFINITY,
    FIELD_KEYDB_AFFINITY, FIELD_MOODLE_CRONJOB_AFFINITY, FIELD_MOODLE_KEYDB_META_NAME,
    FIELD_MOODLE_NEW_INSTANCE_JOB_AFFINITY, FIELD_MOODLE_NFS_META_NAME,
    FIELD_MOODLE_POSTGRES_META_NAME, FIELD_MOODLE_UPDATE_JOB_AFFINITY, FIELD_NGINX_AFFINITY,
    FIELD_NGINX_INGRESS_ANNOTATIONS, FIELD_PHP_FPM_AFFINITY, FIELD_POSTGRES_AFFINITY,
    KEYDB_GROUP, KEYDB_KIND, KEYDB_PLURAL, KEYDB_VERSION, MOODLE_GROUP, MOODLE_KIND,
    MOODLE_PLURAL, MOODLE_VERSION, NFS_GROUP, NFS_KIND, NFS_PLURAL, NFS_VERSION, POSTGRES_GROUP,
    POSTGRES_KIND, POSTGRES_PLURAL, POSTGRES_VERSION, SPEC_KEY_KEYDB, SPEC_KEY_MOODLE,
    SPEC_KEY_NFS, SPEC_KEY_POSTGRES,
};
use crate::crd::{LMSMoodleTemplateSpec, SpecFields};
use crate::lms_errors::MergeError;
use crate::naming::{derive_names, InstanceNames};
use crate::status_reasons::{
    CONDITION_TYPE_KEYDB_READY, CONDITION_TYPE_MOODLE_READY, CONDITION_TYPE_NFS_READY,
    CONDITION_TYPE_POSTGRES_READY,
};

/// The dependent resources an `LMSMoodle` can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependentKind {
    /// Moodle workload, always present
    Moodle,
    /// Postgres database
    Postgres,
    /// Keydb cache
    Keydb,
    /// NFS Ganesha shared filesystem
    Nfs,
}

impl DependentKind {
    /// Kinds whose block is optional, in the order they are composed.
    pub const SUPPORTING: [Self; 3] = [Self::Postgres, Self::Keydb, Self::Nfs];

    pub const ALL: [Self; 4] = [Self::Moodle, Self::Postgres, Self::Keydb, Self::Nfs];

    /// API group/version/kind/plural of the dependent CRD.
    #[must_use]
    pub fn gvk_plural(self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            Self::Moodle => (MOODLE_GROUP, MOODLE_VERSION, MOODLE_KIND, MOODLE_PLURAL),
            Self::Postgres => (POSTGRES_GROUP, POSTGRES_VERSION, POSTGRES_KIND, POSTGRES_PLURAL),
            Self::Keydb => (KEYDB_GROUP, KEYDB_VERSION, KEYDB_KIND, KEYDB_PLURAL),
            Self::Nfs => (NFS_GROUP, NFS_VERSION, NFS_KIND, NFS_PLURAL),
        }
    }

    /// Dynamic API resource used to address the dependent.
    #[must_use]
    pub fn api_resource(self) -> ApiResource {
        let (group, version, kind, plural) = self.gvk_plural();
        ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
    }

    /// Key of this kind's block in the template and site specs.
    #[must_use]
    pub fn spec_key(self) -> &'static str {
        match self {
            Self::Moodle => SPEC_KEY_MOODLE,
            Self::Postgres => SPEC_KEY_POSTGRES,
            Self::Keydb => SPEC_KEY_KEYDB,
            Self::Nfs => SPEC_KEY_NFS,
        }
    }

    /// Condition type under which this kind's `Ready` condition is mirrored on the site.
    #[must_use]
    pub fn condition_type(self) -> &'static str {
        match self {
            Self::Moodle => CONDITION_TYPE_MOODLE_READY,
            Self::Postgres => CONDITION_TYPE_POSTGRES_READY,
            Self::Keydb => CONDITION_TYPE_KEYDB_READY,
            Self::Nfs => CONDITION_TYPE_NFS_READY,
        }
    }

    /// Spec fields receiving the default affinity.
    #[must_use]
    pub fn affinity_fields(self) -> &'static [&'static str] {
        match self {
            Self::Moodle => &[
                FIELD_MOODLE_CRONJOB_AFFINITY,
                FIELD_MOODLE_UPDATE_JOB_AFFINITY,
                FIELD_MOODLE_NEW_INSTANCE_JOB_AFFINITY,
                FIELD_PHP_FPM_AFFINITY,
                FIELD_NGINX_AFFINITY,
            ],
            Self::Postgres => &[FIELD_POSTGRES_AFFINITY],
            Self::Keydb => &[FIELD_KEYDB_AFFINITY],
            Self::Nfs => &[FIELD_GANESHA_AFFINITY],
        }
    }

    /// String fields joined instead of replaced when both layers set them.
    #[must_use]
    pub fn concat_fields(self) -> &'static [&'static str] {
        match self {
            Self::Moodle => &[FIELD_NGINX_INGRESS_ANNOTATIONS, FIELD_COMMON_LABELS],
            Self::Postgres | Self::Keydb | Self::Nfs => &[FIELD_COMMON_LABELS],
        }
    }

    /// Moodle spec field pointing at this dependent.
    #[must_use]
    pub fn cross_link_field(self) -> Option<&'static str> {
        match self {
            Self::Moodle => None,
            Self::Postgres => Some(FIELD_MOODLE_POSTGRES_META_NAME),
            Self::Keydb => Some(FIELD_MOODLE_KEYDB_META_NAME),
            Self::Nfs => Some(FIELD_MOODLE_NFS_META_NAME),
        }
    }

    fn block(self, spec: &LMSMoodleTemplateSpec) -> Option<&SpecFields> {
        match self {
            Self::Moodle => spec.moodle_spec.as_ref(),
            Self::Postgres => spec.postgres_spec.as_ref(),
            Self::Keydb => spec.keydb_spec.as_ref(),
            Self::Nfs => spec.nfs_spec.as_ref(),
        }
    }
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Moodle => "Moodle",
            Self::Postgres => "Postgres",
            Self::Keydb => "Keydb",
            Self::Nfs => "Nfs",
        };
        f.write_str(tag)
    }
}

/// Effective spec of one dependent, ready to apply.
#[derive(Clone, Debug, PartialEq)]
pub struct DependentSpec {
    pub kind: DependentKind,
    pub name: String,
    pub namespace: String,
    pub spec: SpecFields,
}

impl DependentSpec {
    /// Returns a copy asking the dependent controller to suspend.
    #[must_use]
    pub fn suspended(&self) -> Self {
        let mut out = self.clone();
        out.spec.insert(
            FIELD_CR_STATE.to_string(),
            Value::String(CR_STATE_SUSPENDED.to_string()),
        );
        out
    }
}

/// Everything one reconcile of an `LMSMoodle` acts on, built up front.
#[derive(Clone, Debug, PartialEq)]
pub struct InstancePlan {
    pub names: InstanceNames,
    pub composition: SiteComposition,
    pub dependents: BTreeMap<DependentKind, DependentSpec>,
    pub netpol_omit: bool,
}

impl InstancePlan {
    #[must_use]
    pub fn dependent(&self, kind: DependentKind) -> Option<&DependentSpec> {
        self.dependents.get(&kind)
    }

    /// Returns true when `kind` is configured for this site.
    #[must_use]
    pub fn has(&self, kind: DependentKind) -> bool {
        self.dependents.contains_key(&kind)
    }
}

/// Builds the effective specs of every configured dependent.
///
/// # Errors
///
/// Returns a [`MergeError`] when template and override disagree on a value's type, or
/// when an operator-managed field cannot be rendered.
pub fn compose_plan(
    instance: &str,
    template_labels: Option<&BTreeMap<String, String>>,
    template: &LMSMoodleTemplateSpec,
    overrides: &LMSMoodleTemplateSpec,
) -> Result<InstancePlan, MergeError> {
    let names = derive_names(instance);
    let composition = SiteComposition::new(instance, template_labels);
    let mut dependents = BTreeMap::new();

    let mut moodle_template = DependentKind::Moodle
        .block(template)
        .cloned()
        .unwrap_or_default();

    for kind in DependentKind::SUPPORTING {
        let template_block = kind.block(template);
        let override_block = kind.block(overrides);
        if template_block.is_none() && override_block.is_none() {
            continue;
        }

        if let Some(field) = kind.cross_link_field() {
            moodle_template.insert(field.to_string(), Value::String(names.base_name.clone()));
        }

        let spec = effective_spec(
            kind,
            &composition,
            template_block.cloned().unwrap_or_default(),
            override_block,
        )?;
        dependents.insert(kind, dependent(kind, &names, spec));
    }

    let mut moodle = effective_spec(
        DependentKind::Moodle,
        &composition,
        moodle_template,
        DependentKind::Moodle.block(overrides),
    )?;
    set_notify_uuid(&mut moodle, instance);
    dependents.insert(
        DependentKind::Moodle,
        dependent(DependentKind::Moodle, &names, moodle),
    );

    Ok(InstancePlan {
        names,
        composition,
        dependents,
        netpol_omit: overrides
            .lms_moodle_netpol_omit
            .or(template.lms_moodle_netpol_omit)
            .unwrap_or(false),
    })
}

fn dependent(kind: DependentKind, names: &InstanceNames, spec: SpecFields) -> DependentSpec {
    DependentSpec {
        kind,
        name: names.base_name.clone(),
        namespace: names.namespace.clone(),
        spec,
    }
}

fn effective_spec(
    kind: DependentKind,
    composition: &SiteComposition,
    template: SpecFields,
    overrides: Option<&SpecFields>,
) -> Result<SpecFields, MergeError> {
    let mut spec = match overrides {
        Some(overrides) => merge_specs(kind.spec_key(), template, overrides, kind.concat_fields())?,
        None => template,
    };
    composition.inject_common_labels(&mut spec)?;
    composition.inject_affinity(&mut spec, kind.affinity_fields())?;
    Ok(spec)
}

/// Merges an override block onto a template block.
///
/// `root` prefixes error paths. Fields named in `concat_fields` are joined as
/// `override + "\n" + template` when both sides are strings.
///
/// # Errors
///
/// Returns [`MergeError::TypeMismatch`] naming the first conflicting path.
///
/// # Example
///
/// ```rust
/// use lms_moodle_operator::reconcilers::spec_merge::merge_specs;
/// use serde_json::json;
///
/// let template = json!({"a": {"b": 1, "c": 2}, "notes": "t"});
/// let overrides = json!({"a": {"b": 10}, "notes": "o"});
///
/// let merged = merge_specs(
///     "spec",
///     template.as_object().unwrap().clone(),
///     overrides.as_object().unwrap(),
///     &["notes"],
/// )
/// .unwrap();
///
/// assert_eq!(merged["a"], json!({"b": 10, "c": 2}));
/// assert_eq!(merged["notes"], json!("o\nt"));
/// ```
pub fn merge_specs(
    root: &str,
    mut template: SpecFields,
    overrides: &SpecFields,
    concat_fields: &[&str],
) -> Result<SpecFields, MergeError> {
    for (key, value) in overrides {
        if concat_fields.contains(&key.as_str()) {
            if let (Some(Value::String(base)), Value::String(top)) = (template.get(key), value) {
                let joined = join_lines(Some(top), Some(base)).unwrap_or_default();
                template.insert(key.clone(), Value::String(joined));
                continue;
            }
        }
        merge_entry(&format!("{root}.{key}"), &mut template, key, value)?;
    }
    Ok(template)
}

fn merge_entry(
    path: &str,
    target: &mut Map<String, Value>,
    key: &str,
    value: &Value,
) -> Result<(), MergeError> {
    if value.is_null() {
        return Ok(());
    }

    match target.get_mut(key) {
        None | Some(Value::Null) => {
            target.insert(key.to_string(), value.clone());
        }
        Some(Value::Object(base)) => {
            let Value::Object(top) = value else {
                return Err(mismatch(path, "object", value));
            };
            for (child, child_value) in top {
                merge_entry(&format!("{path}.{child}"), base, child, child_value)?;
            }
        }
        Some(existing) => {
            let template_type = json_type(existing);
            if template_type != json_type(value) {
                return Err(mismatch(path, template_type, value));
            }
            *existing = value.clone();
        }
    }
    Ok(())
}

fn mismatch(path: &str, template_type: &'static str, value: &Value) -> MergeError {
    MergeError::TypeMismatch {
        path: path.to_string(),
        template_type,
        override_type: json_type(value),
    }
}
