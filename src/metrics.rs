//! Ingestion gateway metrics.
//!
//! Counters for the three terminal request outcomes plus a publish-latency
//! histogram, exported in Prometheus text format at `/metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder. Idempotent within a process.
pub fn init_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PROMETHEUS.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .map_err(anyhow::Error::from)
    })?;
    Ok(handle.clone())
}

pub fn transaction_accepted() {
    counter!("ingest_transactions_accepted_total").increment(1);
}

pub fn transaction_rejected() {
    counter!("ingest_transactions_rejected_total").increment(1);
}

pub fn publish_failed() {
    counter!("ingest_publish_failures_total").increment(1);
}

pub fn publish_duration_seconds(secs: f64) {
    histogram!("ingest_publish_duration_seconds").record(secs);
}
