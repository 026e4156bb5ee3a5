use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;

use super::{NowPlaying, StatusSource};

const API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

// --- tolerant shapes of user.getrecenttracks ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Body {
    Ok { recenttracks: RecentTracks },
    Err { error: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany,
}

/// Accounts with a single scrobble get a bare object instead of a list.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Track>),
    One(Box<Track>),
    #[default]
    Empty,
}

#[derive(Debug, Deserialize)]
struct Track {
    artist: Text,
    name: String,
    album: Option<Text>,
    url: Option<String>,
    #[serde(rename = "@attr")]
    attr: Option<Attr>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Attr {
    nowplaying: Option<String>,
}

/// Extract the now-playing track from a `user.getrecenttracks` JSON body.
/// Only the most recent entry is considered, and only when it carries
/// `@attr.nowplaying == "true"`.
pub fn parse_recent_tracks(body: &str) -> Result<Option<NowPlaying>> {
    let parsed: Body = serde_json::from_str(body).context("parsing last.fm recenttracks json")?;
    let tracks = match parsed {
        Body::Ok { recenttracks } => recenttracks.track,
        Body::Err { error, message } => return Err(anyhow!("last.fm error {error}: {message}")),
    };
    let first = match tracks {
        OneOrMany::Many(v) => v.into_iter().next(),
        OneOrMany::One(t) => Some(*t),
        OneOrMany::Empty => None,
    };
    let Some(t) = first else {
        return Ok(None);
    };
    let playing = t
        .attr
        .as_ref()
        .and_then(|a| a.nowplaying.as_deref())
        .is_some_and(|v| v == "true");
    if !playing {
        return Ok(None);
    }
    Ok(Some(NowPlaying {
        artist: t.artist.text,
        track: t.name,
        album: t.album.map(|a| a.text).filter(|a| !a.is_empty()),
        url: t.url,
    }))
}

pub struct LastFmSource {
    user: String,
    api_key: String,
    http: reqwest::Client,
}

impl LastFmSource {
    pub fn new(user: String, api_key: String, timeout: Duration) -> Self {
        Self {
            user,
            api_key,
            http: crate::metadata::http_client(timeout),
        }
    }
}

#[async_trait]
impl StatusSource for LastFmSource {
    async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let t0 = std::time::Instant::now();
        let body = self
            .http
            .get(API_URL)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("user", self.user.as_str()),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("last.fm request")?
            .text()
            .await
            .context("last.fm body")?;
        histogram!("nowplaying_status_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        parse_recent_tracks(&body)
    }

    fn name(&self) -> &'static str {
        "lastfm"
    }
}
