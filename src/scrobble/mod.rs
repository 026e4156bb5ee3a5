// src/scrobble/mod.rs
pub mod lastfm;

use anyhow::Result;
use std::sync::Mutex;

/// The record a status source reports when something is playing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Artist credit as reported (may name several artists).
    pub artist: String,
    pub track: String,
    pub album: Option<String>,
    pub url: Option<String>,
}

#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// `Ok(None)` when nothing is flagged as playing now.
    async fn now_playing(&self) -> Result<Option<NowPlaying>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Playing(NowPlaying),
    Idle,
    Fail,
}

// --- Test helper ---
/// Replays a script of answers; the last entry repeats once the script runs out.
pub struct StaticStatusSource {
    script: Mutex<Vec<Scripted>>,
    last: Mutex<Scripted>,
}

impl StaticStatusSource {
    pub fn new(script: Vec<Scripted>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            last: Mutex::new(Scripted::Idle),
        }
    }

    pub fn playing(artist: &str, track: &str) -> Self {
        Self::new(vec![Scripted::Playing(NowPlaying {
            artist: artist.into(),
            track: track.into(),
            album: None,
            url: None,
        })])
    }

    pub fn idle() -> Self {
        Self::new(vec![Scripted::Idle])
    }

    pub fn failing() -> Self {
        Self::new(vec![Scripted::Fail])
    }
}

#[async_trait::async_trait]
impl StatusSource for StaticStatusSource {
    async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let step = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop() {
                *last = next;
            }
            last.clone()
        };
        match step {
            Scripted::Playing(np) => Ok(Some(np)),
            Scripted::Idle => Ok(None),
            Scripted::Fail => anyhow::bail!("static status source: simulated failure"),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
