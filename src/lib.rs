// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod format;
pub mod metadata;
pub mod metrics;
pub mod notify;
pub mod reconciler;
pub mod runner;
pub mod scrobble;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::format::clean_artist_name;
pub use crate::reconciler::{NowPlayingReconciler, PollError, PollOutcome};

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::metadata::{deezer::DeezerProvider, spotify::SpotifyProvider, DetailsProvider};
use crate::notify::telegram::TelegramPublisher;
use crate::scrobble::lastfm::LastFmSource;
use crate::state::HandleStore;

/// Wire the production adapters from `cfg` and seed state from the handle file.
pub async fn build_reconciler(cfg: &AppConfig) -> NowPlayingReconciler {
    let timeout = Duration::from_secs(cfg.http_timeout_secs);

    let source = LastFmSource::new(cfg.lastfm_user.clone(), cfg.lastfm_api_key.clone(), timeout);

    let mut providers: Vec<Box<dyn DetailsProvider>> = Vec::with_capacity(2);
    match &cfg.spotify {
        Some(creds) => providers.push(Box::new(SpotifyProvider::new(
            creds.client_id.clone(),
            creds.client_secret.clone(),
            timeout,
        ))),
        None => tracing::warn!("Spotify credentials not set; using Deezer lookups only"),
    }
    providers.push(Box::new(DeezerProvider::new(timeout)));

    let publisher = TelegramPublisher::new(
        cfg.telegram_bot_token.clone(),
        cfg.telegram_channel_id.clone(),
    )
    .with_timeout(cfg.http_timeout_secs)
    .with_retries(cfg.publish_attempts);

    NowPlayingReconciler::new(
        Box::new(source),
        providers,
        Arc::new(publisher),
        cfg.template(),
        HandleStore::new(cfg.state_path.clone()),
    )
    .with_options(cfg.reconciler_options())
    .restore()
    .await
}
