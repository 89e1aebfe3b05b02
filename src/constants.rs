// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the LMS Moodle operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "lms.krestomat.io/v1alpha1";

/// Kind name for `LMSMoodle` resource
pub const KIND_LMS_MOODLE: &str = "LMSMoodle";

/// Operator identity, used as label value and server-side apply field manager
pub const OPERATOR_NAME: &str = "lms-moodle-operator";

// ============================================================================
// Dependent Resource Kinds
// ============================================================================

/// Moodle workload CRD (group, version, kind, plural)
pub const MOODLE_GROUP: &str = "m4e.krestomat.io";
pub const MOODLE_VERSION: &str = "v1alpha1";
pub const MOODLE_KIND: &str = "Moodle";
pub const MOODLE_PLURAL: &str = "moodles";

/// Postgres database CRD
pub const POSTGRES_GROUP: &str = "postgres.krestomat.io";
pub const POSTGRES_VERSION: &str = "v1alpha1";
pub const POSTGRES_KIND: &str = "Postgres";
pub const POSTGRES_PLURAL: &str = "postgres";

/// Keydb cache CRD
pub const KEYDB_GROUP: &str = "keydb.krestomat.io";
pub const KEYDB_VERSION: &str = "v1alpha1";
pub const KEYDB_KIND: &str = "Keydb";
pub const KEYDB_PLURAL: &str = "keydbs";

/// NFS Ganesha filesystem CRD
pub const NFS_GROUP: &str = "nfs.krestomat.io";
pub const NFS_VERSION: &str = "v1alpha1";
pub const NFS_KIND: &str = "Ganesha";
pub const NFS_PLURAL: &str = "ganeshas";

// ============================================================================
// Naming Constants
// ============================================================================

/// Prefix for every derived namespace and dependent name
pub const NAME_PREFIX: &str = "lms-";

/// Character budget for dependent resource names
pub const NAME_TRUNCATE_CHARS: usize = 17;

/// Longest namespace name Kubernetes accepts (RFC 1123 label)
pub const NAMESPACE_MAX_CHARS: usize = 63;

/// Suffix for the namespace-isolation network policy
pub const NETPOL_NAMESPACE_SUFFIX: &str = "-ns";

/// Suffix for the nginx ingress network policy
pub const NETPOL_NGINX_SUFFIX: &str = "-nginx";

// ============================================================================
// Dependent Spec Field Names
// ============================================================================

/// Instance/template spec keys holding each dependent's spec block
pub const SPEC_KEY_MOODLE: &str = "moodleSpec";
pub const SPEC_KEY_POSTGRES: &str = "postgresSpec";
pub const SPEC_KEY_KEYDB: &str = "keydbSpec";
pub const SPEC_KEY_NFS: &str = "nfsSpec";

/// Cross-link fields injected into the Moodle spec
pub const FIELD_MOODLE_POSTGRES_META_NAME: &str = "moodlePostgresMetaName";
pub const FIELD_MOODLE_KEYDB_META_NAME: &str = "moodleKeydbMetaName";
pub const FIELD_MOODLE_NFS_META_NAME: &str = "moodleNfsMetaName";

/// Newline-joined YAML label block understood by every dependent controller
pub const FIELD_COMMON_LABELS: &str = "commonLabels";

/// Ingress annotations, accumulated across template and instance
pub const FIELD_NGINX_INGRESS_ANNOTATIONS: &str = "nginxIngressAnnotations";

/// Lifecycle switch understood by every dependent controller
pub const FIELD_CR_STATE: &str = "cr_state";

/// Value of `cr_state` requesting suspension
pub const CR_STATE_SUSPENDED: &str = "suspended";

/// Status notification block and its uuid key
pub const FIELD_ROUTINE_STATUS_CR_NOTIFY: &str = "routineStatusCrNotify";
pub const FIELD_NOTIFY_UUID: &str = "uuid";

/// Affinity fields per dependent
pub const FIELD_POSTGRES_AFFINITY: &str = "postgresAffinity";
pub const FIELD_KEYDB_AFFINITY: &str = "keydbAffinity";
pub const FIELD_GANESHA_AFFINITY: &str = "ganeshaAffinity";
pub const FIELD_MOODLE_CRONJOB_AFFINITY: &str = "moodleCronjobAffinity";
pub const FIELD_MOODLE_UPDATE_JOB_AFFINITY: &str = "moodleUpdateJobAffinity";
pub const FIELD_MOODLE_NEW_INSTANCE_JOB_AFFINITY: &str = "moodleNewInstanceJobAffinity";
pub const FIELD_PHP_FPM_AFFINITY: &str = "phpFpmAffinity";
pub const FIELD_NGINX_AFFINITY: &str = "nginxAffinity";

// ============================================================================
// Workload Usage Items
// ============================================================================

/// Usage item carrying total storage consumption
pub const USAGE_STORAGE_TOTAL: &str = "storage_total";

/// Usage item carrying registered users count
pub const USAGE_USERS_TOTAL: &str = "users_total";

// ============================================================================
// Scheduling Constants
// ============================================================================

/// Preference weight of the default co-location affinity
pub const DEFAULT_AFFINITY_WEIGHT: i32 = 100;

/// Topology key of the default co-location affinity
pub const DEFAULT_AFFINITY_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Requeue interval once an instance has converged (5 minutes)
pub const REQUEUE_READY_SECS: u64 = 300;

/// Requeue interval while dependants are progressing
pub const REQUEUE_NOT_READY_SECS: u64 = 10;

/// Requeue interval after a reconcile error
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Default bind address of the health and metrics server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
