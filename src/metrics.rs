// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the LMS Moodle operator.
//!
//! Every metric is prefixed with `lms_krestomat_io_` (prometheus-safe version of
//! "lms.krestomat.io") and registered in [`METRICS_REGISTRY`], which the health
//! server exposes on `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use lms_moodle_operator::metrics::{record_dependant_applied, record_reconciliation_success};
//!
//! record_dependant_applied("Postgres");
//! record_reconciliation_success("LMSMoodle", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "lms_krestomat_io";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: `LMSMoodle` or `LMSMoodleTemplate`
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Requeue reason: a dependant has not reached the awaited state yet
pub const REQUEUE_REASON_DEPENDANT_WAIT: &str = "dependant_wait";

/// Requeue reason: the `LMSMoodle` store has not finished its initial list
pub const REQUEUE_REASON_STORE_SYNC: &str = "store_sync";

/// Total number of requeues
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: [`REQUEUE_REASON_DEPENDANT_WAIT`] or [`REQUEUE_REASON_STORE_SYNC`]
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "requeues_total",
        "Total number of requeue operations by resource type and reason",
        &["resource_type", "reason"],
    )
});

// ============================================================================
// Dependant Metrics
// ============================================================================

/// Server-side applies issued per dependant kind
pub static DEPENDANTS_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dependants_applied_total",
        "Total number of dependant applies by kind",
        &["kind"],
    )
});

/// Deletes issued per dependant kind
pub static DEPENDANTS_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dependants_deleted_total",
        "Total number of dependant deletions by kind",
        &["kind"],
    )
});

/// Number of `LMSMoodle` resources referencing each template
pub static TEMPLATE_REFERENCES: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_template_references"),
        "Number of LMSMoodle resources referencing a template",
    );
    let gauge = GaugeVec::new(opts, &["template"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error reason
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "errors_total",
        "Total number of errors by resource type and error category",
        &["resource_type", "error_type"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a requeue
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

pub fn record_dependant_applied(kind: &str) {
    DEPENDANTS_APPLIED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_dependant_deleted(kind: &str) {
    DEPENDANTS_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record the number of instances referencing `template`
#[allow(clippy::cast_precision_loss)]
pub fn record_template_references(template: &str, count: usize) {
    TEMPLATE_REFERENCES
        .with_label_values(&[template])
        .set(count as f64);
}

/// Record an error
///
/// # Arguments
/// * `resource_type` - The kind of resource where error occurred
/// * `error_type` - Reason code, see `LmsError::status_reason`
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
