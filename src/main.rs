//! Now-playing announcer — binary entrypoint.
//! Loads configuration, wires the Last.fm / metadata / Telegram adapters and
//! polls until the process is asked to stop.

use std::time::Duration;

use nowplaying_announcer::{build_reconciler, config::AppConfig, metrics, runner};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins; otherwise info for this crate and warn for dependencies.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nowplaying_announcer=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    tracing::info!(
        user = %cfg.lastfm_user,
        channel = %cfg.telegram_channel_id,
        spotify = cfg.spotify.is_some(),
        state = %cfg.state_path.display(),
        "config loaded"
    );

    match cfg.metrics_addr {
        Some(addr) => metrics::install_exporter(addr)?,
        None => metrics::ensure_metrics_described(),
    }

    let reconciler = runner::shared(build_reconciler(&cfg).await);
    runner::run(
        reconciler,
        Duration::from_secs(cfg.poll_interval_secs),
        shutdown_signal(),
    )
    .await;
    Ok(())
}
