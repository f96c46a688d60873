//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help texts for the metrics emitted by the checkout path.
pub fn describe() {
    describe_counter!("checkout_attempts_total", "Checkouts started");
    describe_counter!("checkout_committed_total", "Checkouts that created an order");
    describe_counter!(
        "checkout_aborted_total",
        "Checkouts that ended without an order, by reason"
    );
    describe_histogram!(
        "checkout_duration_seconds",
        Unit::Seconds,
        "Wall time of a checkout from cart read to outcome"
    );
    describe_counter!(
        "inventory_insufficient_stock_total",
        "Stock decrements refused by the stock policy"
    );
    describe_counter!("inventory_decrements_total", "Stock decrements applied");
    describe_counter!("store_commits_total", "Store sessions committed");
    describe_counter!("store_rollbacks_total", "Store sessions rolled back");
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
