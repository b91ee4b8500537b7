//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder (call once at startup)
pub fn init_metrics() -> anyhow::Result<()> {
    PROMETHEUS_HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder())?;
    register_metrics();
    Ok(())
}

fn register_metrics() {
    metrics::describe_counter!(
        "roster_cache_operations_total",
        "User cache operations by operation and result"
    );
    metrics::describe_counter!(
        "roster_rate_limit_decisions_total",
        "Rate limiter decisions by strategy and outcome"
    );
}

/// Returns metrics in Prometheus text format; empty before [`init_metrics`]
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a user cache operation (`hit`, `miss`, `ok` or `error`)
pub fn record_cache_operation(operation: &'static str, result: &'static str) {
    metrics::counter!(
        "roster_cache_operations_total",
        "operation" => operation,
        "result" => result
    )
    .increment(1);
}

/// Record a rate limit decision (`allowed`, `denied` or `fail_open`)
pub fn record_rate_limit_decision(strategy: &'static str, decision: &'static str) {
    metrics::counter!(
        "roster_rate_limit_decisions_total",
        "strategy" => strategy,
        "decision" => decision
    )
    .increment(1);
}
