use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

fn describe() {
    metrics::describe_counter!("http_requests_total", "HTTP responses by status code");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("mistake_reviews_total", "Mistake reviews by outcome");
    metrics::describe_counter!("exam_submissions_total", "Submitted exams by grade");
    metrics::describe_counter!("sync_imports_total", "Sync documents imported on the server");
    metrics::describe_counter!("sync_runs_total", "Client sync rounds by status");
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
