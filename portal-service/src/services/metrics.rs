//! Prometheus metrics for portal-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for reconcile runs by phase and status.
pub static RECONCILE_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_reconcile_runs_total",
        "Total number of reconcile runs",
        &["phase", "status"]
    )
    .expect("Failed to register RECONCILE_RUNS")
});

/// Histogram for reconcile duration by phase.
pub static RECONCILE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "portal_reconcile_duration_seconds",
        "Reconcile run duration in seconds",
        &["phase"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register RECONCILE_DURATION")
});

/// Counter for reconcile warnings by kind.
pub static RECONCILE_WARNINGS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_reconcile_warnings_total",
        "Total number of reconcile warnings",
        &["kind"]
    )
    .expect("Failed to register RECONCILE_WARNINGS")
});

/// Counter for directory lookups by status.
pub static DIRECTORY_LOOKUPS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_directory_lookups_total",
        "Total number of directory lookups",
        &["status"]
    )
    .expect("Failed to register DIRECTORY_LOOKUPS")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "portal_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RECONCILE_RUNS);
    Lazy::force(&RECONCILE_DURATION);
    Lazy::force(&RECONCILE_WARNINGS);
    Lazy::force(&DIRECTORY_LOOKUPS);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a reconcile run.
pub fn record_reconcile_run(phase: &str, status: &str) {
    RECONCILE_RUNS.with_label_values(&[phase, status]).inc();
}

/// Record a reconcile warning.
pub fn record_reconcile_warning(kind: &str) {
    RECONCILE_WARNINGS.with_label_values(&[kind]).inc();
}

/// Record a directory lookup.
pub fn record_directory_lookup(status: &str) {
    DIRECTORY_LOOKUPS.with_label_values(&[status]).inc();
}
