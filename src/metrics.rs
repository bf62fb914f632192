//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Replication Metrics
    pub static ref REPLICATION_TASKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("ctrack_replication_tasks_total", "Replica writes by entity and outcome"),
        &["entity", "outcome"]
    ).expect("metric can be created");
    pub static ref REPLICATION_IN_FLIGHT: IntGauge = IntGauge::new(
        "ctrack_replication_in_flight",
        "Replica writes spawned and not yet finished"
    ).expect("metric can be created");
    pub static ref REPLICATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ctrack_replication_duration_seconds",
            "Time from dispatch to the final replica write outcome"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["entity"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("ctrack_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(REPLICATION_TASKS_TOTAL.clone()))
        .expect("REPLICATION_TASKS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(REPLICATION_IN_FLIGHT.clone()))
        .expect("REPLICATION_IN_FLIGHT can be registered");
    REGISTRY
        .register(Box::new(REPLICATION_DURATION_SECONDS.clone()))
        .expect("REPLICATION_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the final outcome of one replica write.
pub fn observe_replication(entity: &str, outcome: &str, elapsed: Duration) {
    REPLICATION_TASKS_TOTAL
        .with_label_values(&[entity, outcome])
        .inc();
    REPLICATION_DURATION_SECONDS
        .with_label_values(&[entity])
        .observe(elapsed.as_secs_f64());
}
