//! Prometheus metrics for the reconciliation engine.
//!
//! This module provides metrics for:
//! - Log tailing (polls, applied and discarded chunks)
//! - Push channel (messages, reconnects, connection state)
//! - Task reconciliation (history refetches)
//! - Config sync (saves by domain and result)
//! - Backend requests

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Log Tail Metrics
// =============================================================================

/// Log polls total by outcome.
pub static LOG_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedash_log_polls_total", "Total log tail polls"),
        &["result"], // "applied", "discarded", "missing", "error"
    )
    .unwrap()
});

/// Log lines recognized by the progress grammar.
pub static LOG_LINES_RECOGNIZED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedash_log_lines_recognized_total",
        "Total log lines recognized by the progress grammar",
    )
    .unwrap()
});

/// Jobs currently being tailed.
pub static JOBS_TAILED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("livedash_jobs_tailed", "Number of jobs whose log is being tailed").unwrap()
});

// =============================================================================
// Push Channel Metrics
// =============================================================================

/// Push messages received by kind.
pub static PUSH_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedash_push_messages_total", "Total push messages received"),
        &["kind"], // "update", "ignored", "malformed"
    )
    .unwrap()
});

/// Push reconnect attempts.
pub static PUSH_RECONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "livedash_push_reconnects_total",
        "Total push channel reconnect attempts",
    )
    .unwrap()
});

/// 1 while the push channel is connected.
pub static PUSH_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("livedash_push_connected", "Whether the push channel is connected").unwrap()
});

// =============================================================================
// Reconciler Metrics
// =============================================================================

/// History fetches by trigger.
pub static HISTORY_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedash_history_fetches_total", "Total history fetches"),
        &["trigger"], // "timer", "transition"
    )
    .unwrap()
});

// =============================================================================
// Config Sync Metrics
// =============================================================================

/// Config saves by domain and result.
pub static CONFIG_SAVES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("livedash_config_saves_total", "Total config save attempts"),
        &["domain", "result"], // result: "success", "failed", "in_flight_skip"
    )
    .unwrap()
});

// =============================================================================
// Backend Metrics
// =============================================================================

/// Backend request duration.
pub static BACKEND_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "livedash_backend_request_duration_seconds",
            "Duration of dashboard backend requests",
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Log tail
        Box::new(LOG_POLLS.clone()),
        Box::new(LOG_LINES_RECOGNIZED.clone()),
        Box::new(JOBS_TAILED.clone()),
        // Push
        Box::new(PUSH_MESSAGES.clone()),
        Box::new(PUSH_RECONNECTS.clone()),
        Box::new(PUSH_CONNECTED.clone()),
        // Reconciler
        Box::new(HISTORY_FETCHES.clone()),
        // Config sync
        Box::new(CONFIG_SAVES.clone()),
        // Backend
        Box::new(BACKEND_REQUEST_DURATION.clone()),
    ]
}
