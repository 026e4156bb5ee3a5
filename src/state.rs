// src/state.rs
//! Reconciler-owned announcement state and the persisted message-handle file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::format::clean_artist_name;
use crate::notify::{Announcement, MessageHandle};

pub const DEFAULT_STATE_PATH: &str = "state/last_message_id.txt";

/// Normalized key used to tell "same track still playing" from "track changed".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub artist: String,
    pub track: String,
}

impl TrackIdentity {
    /// Builds the identity from the raw scrobble credit, collapsing
    /// multi-artist credits to the primary artist.
    pub fn from_raw(raw_artist: &str, track: &str) -> Self {
        Self {
            artist: clean_artist_name(raw_artist),
            track: track.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementState {
    /// Last posted (or edited) message. `Some` implies a successful post happened.
    pub announced: Option<MessageHandle>,
    pub last_listened_at: Option<DateTime<Utc>>,
    pub announced_track: Option<TrackIdentity>,
    /// What the channel currently shows; used to re-render the stopped marker.
    pub last_announcement: Option<Announcement>,
    pub empty_polls: u32,
    pub marked_stopped: bool,
}

impl AnnouncementState {
    pub fn with_handle(handle: Option<MessageHandle>) -> Self {
        Self {
            announced: handle,
            ..Self::default()
        }
    }

    /// Record a successful post/edit of `announcement` for `track` at `now`.
    pub fn record_published(
        &mut self,
        handle: MessageHandle,
        track: TrackIdentity,
        announcement: Announcement,
        now: DateTime<Utc>,
    ) {
        self.announced = Some(handle);
        self.announced_track = Some(track);
        self.last_announcement = Some(announcement);
        self.last_listened_at = Some(now);
        self.empty_polls = 0;
        self.marked_stopped = false;
    }
}

/// Parse the persisted file body. Empty or non-numeric content means "no handle".
pub fn parse_handle(s: &str) -> Option<MessageHandle> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<i64>().ok().map(MessageHandle)
}

/// Read the persisted handle. Any read/parse problem is logged and yields `None`.
pub async fn load_handle(path: &Path) -> Option<MessageHandle> {
    match fs::read_to_string(path).await {
        Ok(s) => {
            let handle = parse_handle(&s);
            if handle.is_none() && !s.trim().is_empty() {
                tracing::warn!(path = %path.display(), "persisted message id is corrupt; ignoring");
            }
            handle
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "read persisted message id: {e:#}");
            None
        }
    }
}

/// Write the handle as a decimal string, creating the parent directory if needed.
pub async fn save_handle(path: &Path, handle: MessageHandle) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating state dir {}", dir.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, handle.0.to_string())
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Location of the persisted handle, owned by the reconciler.
#[derive(Debug, Clone)]
pub struct HandleStore {
    path: PathBuf,
}

impl HandleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Option<MessageHandle> {
        load_handle(&self.path).await
    }

    pub async fn save(&self, handle: MessageHandle) -> Result<()> {
        save_handle(&self.path, handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handle_accepts_decimal_and_rejects_garbage() {
        assert_eq!(parse_handle("42"), Some(MessageHandle(42)));
        assert_eq!(parse_handle("  1337\n"), Some(MessageHandle(1337)));
        assert_eq!(parse_handle(""), None);
        assert_eq!(parse_handle("   "), None);
        assert_eq!(parse_handle("abc"), None);
    }

    #[test]
    fn identity_collapses_multi_artist_credits() {
        let id = TrackIdentity::from_raw("Daft Punk, Thomas Bangalter", "One More Time ");
        assert_eq!(id.artist, "Daft Punk");
        assert_eq!(id.track, "One More Time");
    }
}
