//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Sweep executions and durations
//! - Swap lifecycle transitions
//! - Adapter error rates

use crate::error::OrchestratorResult;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Sweep metrics
    pub static ref SWEEP_RUNS: CounterVec = register_counter_vec!(
        "passage_sweep_runs_total",
        "Total sweep executions",
        &["sweep"]
    ).unwrap();

    pub static ref SWEEP_ERRORS: CounterVec = register_counter_vec!(
        "passage_sweep_errors_total",
        "Total per-row sweep errors",
        &["sweep"]
    ).unwrap();

    pub static ref SWEEP_DURATION: HistogramVec = register_histogram_vec!(
        "passage_sweep_duration_seconds",
        "Sweep execution duration",
        &["sweep"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // Swap lifecycle metrics
    pub static ref SWAPS_CREATED: CounterVec = register_counter_vec!(
        "passage_swaps_created_total",
        "Total swap rows created",
        &["direction"]
    ).unwrap();

    pub static ref SWAP_TRANSITIONS: CounterVec = register_counter_vec!(
        "passage_swap_transitions_total",
        "Total status transitions applied",
        &["direction", "to_status"]
    ).unwrap();

    pub static ref SWAPS_FAILED: CounterVec = register_counter_vec!(
        "passage_swaps_failed_total",
        "Total swaps marked failed",
        &["direction"]
    ).unwrap();

    // Adapter metrics
    pub static ref ADAPTER_ERRORS: CounterVec = register_counter_vec!(
        "passage_adapter_errors_total",
        "Total adapter call failures",
        &["system"]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "passage_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: CounterVec = register_counter_vec!(
        "passage_health_check_failure_total",
        "Total failed health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> OrchestratorResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::OrchestratorError::Internal(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::OrchestratorError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_sweep_run(sweep: &str) {
    SWEEP_RUNS.with_label_values(&[sweep]).inc();
}

pub fn record_sweep_error(sweep: &str) {
    SWEEP_ERRORS.with_label_values(&[sweep]).inc();
}

pub fn record_sweep_duration(sweep: &str, secs: f64) {
    SWEEP_DURATION.with_label_values(&[sweep]).observe(secs);
}

pub fn record_swap_created(direction: &str) {
    SWAPS_CREATED.with_label_values(&[direction]).inc();
}

pub fn record_transition(direction: &str, to_status: &str) {
    SWAP_TRANSITIONS
        .with_label_values(&[direction, to_status])
        .inc();
}

pub fn record_swap_failed(direction: &str) {
    SWAPS_FAILED.with_label_values(&[direction]).inc();
}

pub fn record_adapter_error(system: &str) {
    ADAPTER_ERRORS.with_label_values(&[system]).inc();
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.with_label_values(&[]).inc();
}
