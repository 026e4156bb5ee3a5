// src/metadata/mod.rs
//! Track-details lookup: provider abstraction + ordered fallback chain.

pub mod deezer;
pub mod spotify;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;

use crate::state::TrackIdentity;

/// Resolved metadata for a `TrackIdentity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDetails {
    pub album_name: String,
    pub release_date: String,
    pub cover_url: String,
    /// Cross-platform listen link (song.link).
    pub listen_url: String,
    /// Which provider produced this record.
    pub provider: &'static str,
}

#[async_trait]
pub trait DetailsProvider: Send + Sync {
    /// `Ok(None)` for "no match"; `Err` only for transport/parse failures.
    async fn lookup(&self, artist: &str, track: &str) -> Result<Option<TrackDetails>>;
    fn name(&self) -> &'static str;
}

/// Query `providers` in order and return the first match with cover art.
/// A provider error, or a record without a cover, is logged and treated like a miss.
pub async fn resolve_details(
    providers: &[Box<dyn DetailsProvider>],
    track: &TrackIdentity,
) -> Option<TrackDetails> {
    for p in providers {
        match p.lookup(&track.artist, &track.track).await {
            Ok(Some(details)) if !details.cover_url.is_empty() => {
                tracing::debug!(provider = p.name(), "details resolved");
                return Some(details);
            }
            Ok(_) => {
                tracing::debug!(provider = p.name(), artist = %track.artist, track = %track.track, "no match");
                counter!("nowplaying_provider_misses_total", "provider" => p.name()).increment(1);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "details provider error");
                counter!("nowplaying_provider_errors_total", "provider" => p.name()).increment(1);
            }
        }
    }
    None
}

/// Shared reqwest client setup for the lookup adapters.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("nowplaying-announcer/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("reqwest builder failed ({e}); using default client");
            reqwest::Client::new()
        })
}

// --- Test helper ---
/// Provider with a fixed answer; `None` simulates "no match", `fail` a transport error.
pub struct StaticProvider {
    name: &'static str,
    answer: Option<TrackDetails>,
    fail: bool,
    pub lookups: std::sync::Mutex<Vec<(String, String)>>,
}

impl StaticProvider {
    pub fn hit(name: &'static str, details: TrackDetails) -> Self {
        Self {
            name,
            answer: Some(details),
            fail: false,
            lookups: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn miss(name: &'static str) -> Self {
        Self {
            name,
            answer: None,
            fail: false,
            lookups: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            answer: None,
            fail: true,
            lookups: std::sync::Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl DetailsProvider for StaticProvider {
    async fn lookup(&self, artist: &str, track: &str) -> Result<Option<TrackDetails>> {
        self.lookups
            .lock()
            .unwrap()
            .push((artist.to_string(), track.to_string()));
        if self.fail {
            anyhow::bail!("{}: simulated transport failure", self.name);
        }
        Ok(self.answer.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(album: &str, provider: &'static str) -> TrackDetails {
        TrackDetails {
            album_name: album.into(),
            release_date: "2001".into(),
            cover_url: "c".into(),
            listen_url: "l".into(),
            provider,
        }
    }

    #[tokio::test]
    async fn first_hit_wins() {
        let providers: Vec<Box<dyn DetailsProvider>> = vec![
            Box::new(StaticProvider::hit("a", details("A", "a"))),
            Box::new(StaticProvider::hit("b", details("B", "b"))),
        ];
        let id = TrackIdentity::from_raw("x", "y");
        let got = resolve_details(&providers, &id).await.unwrap();
        assert_eq!(got.album_name, "A");
    }

    #[tokio::test]
    async fn error_falls_through_to_next_provider() {
        let providers: Vec<Box<dyn DetailsProvider>> = vec![
            Box::new(StaticProvider::failing("a")),
            Box::new(StaticProvider::hit("b", details("B", "b"))),
        ];
        let id = TrackIdentity::from_raw("x", "y");
        let got = resolve_details(&providers, &id).await.unwrap();
        assert_eq!(got.provider, "b");
    }

    #[tokio::test]
    async fn record_without_cover_falls_through_to_next_provider() {
        let mut bare = details("A", "a");
        bare.cover_url.clear();
        let secondary = details("B", "b");
        let providers: Vec<Box<dyn DetailsProvider>> = vec![
            Box::new(StaticProvider::hit("a", bare)),
            Box::new(StaticProvider::hit("b", secondary.clone())),
        ];
        let id = TrackIdentity::from_raw("x", "y");
        let got = resolve_details(&providers, &id).await.unwrap();
        assert_eq!(got, secondary);
    }

    #[tokio::test]
    async fn all_miss_is_none() {
        let providers: Vec<Box<dyn DetailsProvider>> = vec![
            Box::new(StaticProvider::miss("a")),
            Box::new(StaticProvider::failing("b")),
        ];
        let id = TrackIdentity::from_raw("x", "y");
        assert!(resolve_details(&providers, &id).await.is_none());
        assert!(resolve_details(&[], &id).await.is_none());
    }
}
