//! Prometheus metrics for salesdocs-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Document counter by kind and status transition.
pub static DOCUMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_documents_total",
        "Total number of document writes by kind and resulting status",
        &["kind", "status"]
    )
    .expect("Failed to register documents_total")
});

/// Payment amount counter by currency.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_payment_amount_total",
        "Total payment amount by currency",
        &["currency"]
    )
    .expect("Failed to register payment_amount_total")
});

/// Quotation conversion counter.
pub static CONVERSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_conversions_total",
        "Total quotation-to-invoice conversions by outcome",
        &["outcome"]
    )
    .expect("Failed to register conversions_total")
});

/// Outbox event counter by terminal outcome.
pub static OUTBOX_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_outbox_events_total",
        "Total outbox deliveries by outcome",
        &["outcome"] // published, retried, failed
    )
    .expect("Failed to register outbox_events_total")
});

/// Scheduled job run counter.
pub static CRON_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_cron_runs_total",
        "Total scheduled job runs by job and outcome",
        &["job", "outcome"]
    )
    .expect("Failed to register cron_runs_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salesdocs_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "salesdocs_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DOCUMENTS_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
    Lazy::force(&CONVERSIONS_TOTAL);
    Lazy::force(&OUTBOX_EVENTS_TOTAL);
    Lazy::force(&CRON_RUNS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
