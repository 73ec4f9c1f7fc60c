//! Prometheus metrics for the storefront server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Cache-aside metrics (hits, misses, store outages)
//! - Invalidation sweep metrics (sweeps, swept keys)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_UNAVAILABLE_TOTAL: &str = "cache_unavailable_total";

    // Invalidation metrics
    pub const CACHE_SWEEPS_TOTAL: &str = "cache_sweeps_total";
    pub const CACHE_SWEPT_KEYS_TOTAL: &str = "cache_swept_keys_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders the handle itself.
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Record an HTTP request. `route` is the matched route template, which keeps
/// label cardinality bounded.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_class" => status_class
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Cache Metrics
// =============================================================================

pub fn record_cache_hit(store: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "store" => store).increment(1);
}

pub fn record_cache_miss(store: &'static str) {
    counter!(names::CACHE_MISSES_TOTAL, "store" => store).increment(1);
}

/// A cache round trip failed and the request fell through to the datastore.
pub fn record_cache_unavailable(store: &'static str, operation: &'static str) {
    counter!(
        names::CACHE_UNAVAILABLE_TOTAL,
        "store" => store,
        "operation" => operation
    )
    .increment(1);
}

// =============================================================================
// Invalidation Metrics
// =============================================================================

pub fn record_sweep(topic: &str, deleted: u64) {
    counter!(names::CACHE_SWEEPS_TOTAL, "topic" => topic.to_string()).increment(1);
    counter!(names::CACHE_SWEPT_KEYS_TOTAL, "topic" => topic.to_string()).increment(deleted);
}
