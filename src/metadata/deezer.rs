use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{http_client, DetailsProvider, TrackDetails};

const API_BASE: &str = "https://api.deezer.com";

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    data: Vec<Hit>,
}
#[derive(Debug, Deserialize)]
pub struct Hit {
    pub link: String,
    pub album: HitAlbum,
}
#[derive(Debug, Deserialize)]
pub struct HitAlbum {
    pub id: u64,
    pub title: String,
    pub cover_xl: Option<String>,
    pub cover_big: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumResp {
    release_date: Option<String>,
}

/// Secondary lookup: Deezer's public search API (no credentials).
pub struct DeezerProvider {
    api_base: String,
    http: reqwest::Client,
}

impl DeezerProvider {
    pub fn new(timeout: Duration) -> Self {
        Self {
            api_base: API_BASE.to_string(),
            http: http_client(timeout),
        }
    }

    async fn release_date(&self, album_id: u64) -> Option<String> {
        let url = format!("{}/album/{album_id}", self.api_base);
        let rsp = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(album_id, "deezer album request failed: {e}");
                return None;
            }
        };
        let body = rsp.text().await.ok()?;
        parse_release_date(&body)
    }
}

/// First search hit, or `None` when the result list is empty or Deezer
/// returned an error object.
pub fn parse_search(body: &str) -> Result<Option<Hit>> {
    let resp: SearchResp = serde_json::from_str(body).context("parsing deezer search json")?;
    Ok(resp.data.into_iter().next())
}

pub fn parse_release_date(body: &str) -> Option<String> {
    serde_json::from_str::<AlbumResp>(body)
        .ok()
        .and_then(|a| a.release_date)
        .filter(|d| !d.is_empty() && d != "0000-00-00")
}

/// `None` when the album has no cover art.
pub fn details_from_hit(hit: Hit, release_date: Option<String>) -> Option<TrackDetails> {
    let cover_url = [hit.album.cover_xl, hit.album.cover_big]
        .into_iter()
        .flatten()
        .find(|u| !u.is_empty())?;
    Some(TrackDetails {
        album_name: hit.album.title,
        release_date: release_date.unwrap_or_else(|| "Unknown".to_string()),
        cover_url,
        listen_url: format!("https://song.link/{}", urlencoding::encode(&hit.link)),
        provider: "deezer",
    })
}

#[async_trait]
impl DetailsProvider for DeezerProvider {
    async fn lookup(&self, artist: &str, track: &str) -> Result<Option<TrackDetails>> {
        let q = format!("artist:\"{artist}\" track:\"{track}\"");
        let body = self
            .http
            .get(format!("{}/search", self.api_base))
            .query(&[("q", q.as_str()), ("limit", "1")])
            .send()
            .await
            .context("deezer search request")?
            .error_for_status()
            .context("deezer search non-2xx")?
            .text()
            .await
            .context("deezer search body")?;

        let Some(hit) = parse_search(&body)? else {
            return Ok(None);
        };
        if hit.album.cover_xl.is_none() && hit.album.cover_big.is_none() {
            return Ok(None);
        }
        let released = self.release_date(hit.album.id).await;
        Ok(details_from_hit(hit, released))
    }

    fn name(&self) -> &'static str {
        "deezer"
    }
}
