//! Prometheus metrics for the reconciliation engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Applied payment counter by method.
pub static PAYMENTS_APPLIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_payments_applied_total",
        "Total number of payments applied",
        &["method"]
    )
    .expect("Failed to register payments_applied_total")
});

/// Reversed payment counter by method.
pub static PAYMENTS_REVERSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_payments_reversed_total",
        "Total number of payments reversed",
        &["method"]
    )
    .expect("Failed to register payments_reversed_total")
});

/// Monetary amount moved through the engine, by operation.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_payment_amount_total",
        "Total payment amount in minor units by operation",
        &["operation"] // apply, reverse
    )
    .expect("Failed to register payment_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Commit conflict retries by operation.
pub static TXN_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_txn_retries_total",
        "Total number of transaction conflict retries by operation",
        &["operation"]
    )
    .expect("Failed to register txn_retries_total")
});

/// Store commit duration histogram.
pub static COMMIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "reconciliation_commit_duration_seconds",
        "Ledger store commit duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register commit_duration")
});

/// Aggregate rebuilds run by the repair path.
pub static AGGREGATE_REPAIRS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_aggregate_repairs_total",
        "Total number of client aggregate rebuilds",
        &["outcome"] // clean, drifted
    )
    .expect("Failed to register aggregate_repairs_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&PAYMENTS_APPLIED_TOTAL);
    Lazy::force(&PAYMENTS_REVERSED_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&TXN_RETRIES_TOTAL);
    Lazy::force(&COMMIT_DURATION);
    Lazy::force(&AGGREGATE_REPAIRS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
