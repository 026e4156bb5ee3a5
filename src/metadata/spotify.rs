use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{http_client, DetailsProvider, TrackDetails};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
/// Refresh the app token this long before Spotify says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResp {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    tracks: Option<Paging>,
}
#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<Track>,
}
#[derive(Debug, Deserialize)]
struct Track {
    id: Option<String>,
    album: Album,
}
#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}
#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

struct CachedToken {
    value: String,
    valid_until: Instant,
}

/// Primary lookup: Spotify Web API search with a client-credentials token.
pub struct SpotifyProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyProvider {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_id,
            client_secret,
            http: http_client(timeout),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(t) = guard.as_ref() {
            if Instant::now() < t.valid_until {
                return Ok(t.value.clone());
            }
        }

        let resp: TokenResp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("spotify token request")?
            .error_for_status()
            .context("spotify token non-2xx")?
            .json()
            .await
            .context("spotify token body")?;

        let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(TOKEN_SLACK);
        *guard = Some(CachedToken {
            value: resp.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = resp.expires_in, "spotify token refreshed");
        Ok(resp.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

/// Parse a `/v1/search?type=track` body into details. No items, or an
/// item without album art, means no match.
pub fn parse_search(body: &str) -> Result<Option<TrackDetails>> {
    let resp: SearchResp = serde_json::from_str(body).context("parsing spotify search json")?;
    let Some(track) = resp.tracks.and_then(|p| p.items.into_iter().next()) else {
        return Ok(None);
    };
    let Some(id) = track.id else {
        return Ok(None);
    };
    // The announcement is a photo message; a hit without art cannot be posted.
    let Some(cover_url) = track
        .album
        .images
        .into_iter()
        .map(|i| i.url)
        .find(|u| !u.is_empty())
    else {
        return Ok(None);
    };
    Ok(Some(TrackDetails {
        album_name: track.album.name,
        release_date: track
            .album
            .release_date
            .unwrap_or_else(|| "Unknown".to_string()),
        cover_url,
        listen_url: format!("https://song.link/s/{id}"),
        provider: "spotify",
    }))
}

#[async_trait]
impl DetailsProvider for SpotifyProvider {
    async fn lookup(&self, artist: &str, track: &str) -> Result<Option<TrackDetails>> {
        let q = format!("track:{track} artist:{artist}");
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&token)
            .query(&[("q", q.as_str()), ("type", "track"), ("limit", "1")])
            .send()
            .await
            .context("spotify search request")?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked early; fetch a fresh one on the next lookup.
            self.invalidate_token().await;
            anyhow::bail!("spotify search unauthorized");
        }
        let body = resp
            .error_for_status()
            .context("spotify search non-2xx")?
            .text()
            .await
            .context("spotify search body")?;

        parse_search(&body)
    }

    fn name(&self) -> &'static str {
        "spotify"
    }
}
