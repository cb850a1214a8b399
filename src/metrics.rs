use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call once, from the binary.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("feedback_submissions_total", "Submissions received.");
        describe_counter!("feedback_created_total", "Feedback items stored, by label.");
        describe_counter!(
            "feedback_pipeline_failures_total",
            "Submissions that failed, by pipeline stage."
        );
        describe_counter!(
            "feedback_broadcast_failures_total",
            "Live-channel deliveries that failed after the item was stored."
        );
        describe_histogram!(
            "feedback_classify_ms",
            Unit::Milliseconds,
            "Sentiment provider latency in milliseconds."
        );
        describe_gauge!("feedback_live_subscribers", "Connected live subscribers.");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
