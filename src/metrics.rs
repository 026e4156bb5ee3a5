use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("nowplaying_polls_total", "Reconciler polls started.");
        describe_counter!("nowplaying_posts_total", "New announcements posted.");
        describe_counter!("nowplaying_edits_total", "Announcements edited in place.");
        describe_counter!(
            "nowplaying_publish_errors_total",
            "Failed post/edit calls to the messaging platform."
        );
        describe_counter!(
            "nowplaying_provider_misses_total",
            "Metadata lookups that found no match, by provider."
        );
        describe_counter!(
            "nowplaying_provider_errors_total",
            "Metadata lookups that failed, by provider."
        );
        describe_counter!(
            "nowplaying_ticks_skipped_total",
            "Timer ticks skipped because a poll was still running."
        );
        describe_histogram!(
            "nowplaying_status_fetch_ms",
            "Last.fm now-playing fetch time in milliseconds."
        );
        describe_gauge!("nowplaying_last_poll_ts", "Unix ts of the last poll.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install exporter")?;
    ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
