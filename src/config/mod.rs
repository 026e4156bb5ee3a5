// src/config/mod.rs
//! Process configuration, read once from the environment at startup.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::format::{profile_url, AnnouncementTemplate};
use crate::reconciler::{ReconcilerOptions, StoppedPolicy, TrackChangePolicy};
use crate::state::DEFAULT_STATE_PATH;

fn default_poll_interval_secs() -> u64 {
    5
}
fn default_http_timeout_secs() -> u64 {
    10
}
fn default_publish_attempts() -> u8 {
    3
}

#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub lastfm_user: String,
    pub lastfm_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    /// `None` disables the Spotify lookup; Deezer is always consulted.
    pub spotify: Option<SpotifyCredentials>,
    pub listener_name: String,
    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    /// Attempts per Telegram call, first try included.
    pub publish_attempts: u8,
    pub state_path: PathBuf,
    pub track_change: TrackChangePolicy,
    pub stopped: StoppedPolicy,
    pub attribution_label: String,
    pub attribution_url: String,
    pub metrics_addr: Option<SocketAddr>,
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(anyhow!("Missing required env var {name}")),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid {name}={raw:?}: {e}")),
    }
}

impl FromStr for TrackChangePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "edit" => Ok(TrackChangePolicy::EditInPlace),
            "post" => Ok(TrackChangePolicy::PostNew),
            other => Err(anyhow!("expected `edit` or `post`, got `{other}`")),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let lastfm_user = required("LASTFM_USER")?;
        let lastfm_api_key = required("LASTFM_API_KEY")?;
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_channel_id = required("TELEGRAM_CHANNEL_ID")?;

        let spotify = match (optional("SPOTIFY_CLIENT_ID"), optional("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together"
                ))
            }
        };

        let poll_interval_secs = parsed("POLL_INTERVAL_SECS", default_poll_interval_secs())?;
        if poll_interval_secs == 0 {
            return Err(anyhow!("POLL_INTERVAL_SECS must be at least 1"));
        }
        let http_timeout_secs = parsed("HTTP_TIMEOUT_SECS", default_http_timeout_secs())?.max(1);
        let publish_attempts = parsed("TELEGRAM_MAX_RETRIES", default_publish_attempts())?.max(1);

        let track_change = parsed("TRACK_CHANGE_POLICY", TrackChangePolicy::EditInPlace)?;
        let stopped = match parsed::<u32>("STOPPED_AFTER_EMPTY_POLLS", 0)? {
            0 => StoppedPolicy::LeaveInPlace,
            n => StoppedPolicy::MarkAfter(n),
        };

        let metrics_addr = optional("METRICS_ADDR")
            .map(|raw| {
                raw.parse::<SocketAddr>()
                    .with_context(|| format!("Invalid METRICS_ADDR={raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            listener_name: optional("LISTENER_NAME").unwrap_or_else(|| lastfm_user.clone()),
            attribution_label: optional("ATTRIBUTION_LABEL")
                .unwrap_or_else(|| "Last.fm profile".to_string()),
            attribution_url: optional("ATTRIBUTION_URL")
                .unwrap_or_else(|| profile_url(&lastfm_user)),
            state_path: optional("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            lastfm_user,
            lastfm_api_key,
            telegram_bot_token,
            telegram_channel_id,
            spotify,
            poll_interval_secs,
            http_timeout_secs,
            publish_attempts,
            track_change,
            stopped,
            metrics_addr,
        })
    }

    pub fn template(&self) -> AnnouncementTemplate {
        AnnouncementTemplate::new(&self.lastfm_user)
            .with_listener_name(&self.listener_name)
            .with_attribution(&self.attribution_label, &self.attribution_url)
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            track_change: self.track_change,
            stopped: self.stopped,
        }
    }
}
