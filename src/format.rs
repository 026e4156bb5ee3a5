// src/format.rs
//! Caption and keyboard rendering for channel announcements.
//!
//! Captions use Telegram's HTML parse mode, so every interpolated value is
//! escaped. Timestamps are always shown in Indian Standard Time (UTC+05:30)
//! regardless of where the process runs.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::metadata::TrackDetails;
use crate::notify::{Announcement, LinkButton};
use crate::state::TrackIdentity;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Primary artist of a credit: text before the first `,` or `&`, trimmed.
pub fn clean_artist_name(raw: &str) -> String {
    raw.split([',', '&'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `dd/mm/yyyy, h:mm:ss am` in IST.
pub fn format_ist(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&ist())
        .format("%d/%m/%Y, %-I:%M:%S %P")
        .to_string()
}

pub fn profile_url(lastfm_user: &str) -> String {
    format!(
        "https://www.last.fm/user/{}",
        urlencoding::encode(lastfm_user)
    )
}

pub fn artist_bio_search_url(artist: &str) -> String {
    let q = format!("{artist} artist bio");
    format!("https://www.google.com/search?q={}", urlencoding::encode(&q))
}

fn esc(s: &str) -> String {
    html_escape::encode_text(s).to_string()
}

/// Static parts of every announcement, fixed at startup.
#[derive(Debug, Clone)]
pub struct AnnouncementTemplate {
    pub listener_name: String,
    pub lastfm_user: String,
    pub attribution_label: String,
    pub attribution_url: String,
}

impl AnnouncementTemplate {
    pub fn new(lastfm_user: impl Into<String>) -> Self {
        let lastfm_user = lastfm_user.into();
        Self {
            listener_name: lastfm_user.clone(),
            attribution_label: "Last.fm profile".to_string(),
            attribution_url: profile_url(&lastfm_user),
            lastfm_user,
        }
    }

    pub fn with_listener_name(mut self, name: impl Into<String>) -> Self {
        self.listener_name = name.into();
        self
    }

    pub fn with_attribution(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.attribution_label = label.into();
        self.attribution_url = url.into();
        self
    }

    pub fn render_caption(
        &self,
        track: &TrackIdentity,
        details: &TrackDetails,
        last_listened: DateTime<Utc>,
    ) -> String {
        let profile = profile_url(&self.lastfm_user);
        format!(
            "🎵 <b>{listener} is listening to:</b>\n\n\
             <b>Song:</b> {song}\n\
             <b>Artist:</b> {artist}\n\
             <b>Album:</b> {album}\n\
             <b>Release Date:</b> {released}\n\n\
             <b>Last Listened:</b> {when}\n\
             <b>Last.fm Profile:</b> <a href=\"{href}\">{user}</a>",
            listener = esc(&self.listener_name),
            song = esc(&track.track),
            artist = esc(&track.artist),
            album = esc(&details.album_name),
            released = esc(&details.release_date),
            when = format_ist(last_listened),
            href = html_escape::encode_double_quoted_attribute(&profile),
            user = esc(&self.lastfm_user),
        )
    }

    /// Two rows: `[Listen Now, About <artist>]` and `[attribution]`.
    pub fn keyboard(&self, track: &TrackIdentity, details: &TrackDetails) -> Vec<Vec<LinkButton>> {
        vec![
            vec![
                LinkButton::new("Listen Now", &details.listen_url),
                LinkButton::new(
                    format!("About {}", track.artist),
                    artist_bio_search_url(&track.artist),
                ),
            ],
            vec![LinkButton::new(
                &self.attribution_label,
                &self.attribution_url,
            )],
        ]
    }

    pub fn render(
        &self,
        track: &TrackIdentity,
        details: &TrackDetails,
        last_listened: DateTime<Utc>,
    ) -> Announcement {
        Announcement {
            photo_url: details.cover_url.clone(),
            caption_html: self.render_caption(track, details, last_listened),
            buttons: self.keyboard(track, details),
        }
    }
}

/// Same announcement with a trailing "stopped listening" line.
pub fn mark_stopped(announcement: &Announcement, at: DateTime<Utc>) -> Announcement {
    let mut out = announcement.clone();
    out.caption_html
        .push_str(&format!("\n⏹ <b>Stopped listening</b> at {}", format_ist(at)));
    out
}
