// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the cfgate operator.
//!
//! Metrics use the namespace prefix `cfgate_io_` (prometheus-safe version of
//! `cfgate.io`) and are exposed via the `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Operations and their outcomes per kind
//! - **External API Metrics** - Cloudflare write calls per object type
//! - **Error Metrics** - Error conditions and types

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all cfgate metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "cfgate_io";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the
/// `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `CloudflareTunnel`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of external Cloudflare write calls
///
/// Labels:
/// - `object_type`: External object (`tunnel`, `dns_record`, `access_app`, ...)
/// - `operation`: `create`, `update`, or `delete`
pub static CLOUDFLARE_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cloudflare_writes_total"),
        "Total number of Cloudflare write calls by object type and operation",
    );
    let counter = CounterVec::new(opts, &["object_type", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of errors by resource type and error kind
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `error_kind`: Error class (`credentials`, `rate_limited`, `conflict`, ...)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error kind",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a successful reconciliation with its duration.
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation with its duration.
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record an error occurrence.
pub fn record_error(resource_type: &str, error_kind: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_kind])
        .inc();
}

/// Record an external write call.
pub fn record_cloudflare_write(object_type: &str, operation: &str) {
    CLOUDFLARE_WRITES_TOTAL
        .with_label_values(&[object_type, operation])
        .inc();
}

/// Render the registry in the Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails or the buffer is not valid UTF-8.
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
