//! Prometheus metrics for monitoring the gateway.
//!
//! This module provides a centralized metrics registry tracking requests,
//! upstream attempts per endpoint and outcome, cache effectiveness, and
//! live streaming sessions.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, path, and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds by path
    pub request_duration: HistogramVec,

    /// Number of currently in-flight requests by path
    pub active_requests: IntGaugeVec,

    /// Upstream attempts by endpoint, mode (unary|stream), and outcome
    pub upstream_attempts: IntCounterVec,

    /// Response cache events: hit, miss, store
    pub cache_events: IntCounterVec,

    /// Number of live streaming sessions
    pub active_sessions: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// This should be called once at application startup. Subsequent calls
/// return the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "gateway_requests_total",
            "Total number of requests",
            &["method", "path", "status"]
        )
        .expect("register gateway_requests_total");

        let request_duration = register_histogram_vec!(
            "gateway_request_duration_seconds",
            "Request duration in seconds",
            &["path"]
        )
        .expect("register gateway_request_duration_seconds");

        let active_requests = register_int_gauge_vec!(
            "gateway_active_requests",
            "Number of in-flight requests",
            &["path"]
        )
        .expect("register gateway_active_requests");

        let upstream_attempts = register_int_counter_vec!(
            "gateway_upstream_attempts_total",
            "Upstream attempts by endpoint, mode, and outcome",
            &["endpoint", "mode", "outcome"]
        )
        .expect("register gateway_upstream_attempts_total");

        let cache_events = register_int_counter_vec!(
            "gateway_cache_events_total",
            "Response cache events",
            &["event"]
        )
        .expect("register gateway_cache_events_total");

        let active_sessions = register_int_gauge!(
            "gateway_active_sessions",
            "Number of live streaming sessions"
        )
        .expect("register gateway_active_sessions");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            upstream_attempts,
            cache_events,
            active_sessions,
        }
    })
}

/// Get the metrics registry, initializing it if needed.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
