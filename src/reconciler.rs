// src/reconciler.rs
//! Now-playing reconciliation: one poll = at most one outbound publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::format::{mark_stopped, AnnouncementTemplate};
use crate::metadata::{resolve_details, DetailsProvider};
use crate::notify::{Announcement, MessageHandle, PublishError, Publisher};
use crate::scrobble::StatusSource;
use crate::state::{AnnouncementState, HandleStore, TrackIdentity};

/// What to do when a handle exists but a different track is now playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackChangePolicy {
    /// Keep one rolling announcement: always edit the existing message.
    #[default]
    EditInPlace,
    /// Post a fresh message for every new track.
    PostNew,
}

/// What to do with the last announcement once playback stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoppedPolicy {
    #[default]
    LeaveInPlace,
    /// After this many consecutive idle polls, edit once to mark it stopped.
    MarkAfter(u32),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilerOptions {
    pub track_change: TrackChangePolicy,
    pub stopped: StoppedPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing is playing now.
    Idle,
    /// Playing, but no provider knew the track.
    NoDetails { track: TrackIdentity },
    Posted {
        handle: MessageHandle,
        track: TrackIdentity,
        /// False when the handle could not be written to the state file.
        persisted: bool,
    },
    Edited {
        handle: MessageHandle,
        track: TrackIdentity,
    },
    MarkedStopped { handle: MessageHandle },
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("status source failed: {0:#}")]
    Status(anyhow::Error),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

enum Action {
    Post,
    Edit(MessageHandle),
}

pub struct NowPlayingReconciler {
    source: Box<dyn StatusSource>,
    providers: Vec<Box<dyn DetailsProvider>>,
    publisher: Arc<dyn Publisher>,
    template: AnnouncementTemplate,
    store: HandleStore,
    options: ReconcilerOptions,
    state: AnnouncementState,
}

impl NowPlayingReconciler {
    pub fn new(
        source: Box<dyn StatusSource>,
        providers: Vec<Box<dyn DetailsProvider>>,
        publisher: Arc<dyn Publisher>,
        template: AnnouncementTemplate,
        store: HandleStore,
    ) -> Self {
        Self {
            source,
            providers,
            publisher,
            template,
            store,
            options: ReconcilerOptions::default(),
            state: AnnouncementState::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_state(mut self, state: AnnouncementState) -> Self {
        self.state = state;
        self
    }

    /// Seed state from the persisted handle (missing/corrupt file: no handle).
    pub async fn restore(mut self) -> Self {
        let handle = self.store.load().await;
        match handle {
            Some(h) => tracing::info!(handle = %h, "resuming announcement from persisted message id"),
            None => tracing::info!("no previous message id found; a new message will be posted"),
        }
        self.state = AnnouncementState::with_handle(handle);
        self
    }

    pub fn state(&self) -> &AnnouncementState {
        &self.state
    }

    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    pub async fn poll(&mut self, now: DateTime<Utc>) -> Result<PollOutcome, PollError> {
        counter!("nowplaying_polls_total").increment(1);
        gauge!("nowplaying_last_poll_ts").set(now.timestamp() as f64);

        let playing = self
            .source
            .now_playing()
            .await
            .map_err(PollError::Status)?;

        let Some(np) = playing else {
            return self.on_idle(now).await;
        };
        self.state.empty_polls = 0;

        let track = TrackIdentity::from_raw(&np.artist, &np.track);
        let Some(details) = resolve_details(&self.providers, &track).await else {
            return Ok(PollOutcome::NoDetails { track });
        };

        match self.decide(&track) {
            Action::Edit(handle) => {
                let last = self.state.last_listened_at.unwrap_or(now);
                let announcement = self.template.render(&track, &details, last);
                self.publish_edit(handle, &announcement).await?;
                counter!("nowplaying_edits_total").increment(1);
                self.state
                    .record_published(handle, track.clone(), announcement, now);
                Ok(PollOutcome::Edited { handle, track })
            }
            Action::Post => {
                let announcement = self.template.render(&track, &details, now);
                let handle = self.publisher.post(&announcement).await.inspect_err(|_| {
                    counter!("nowplaying_publish_errors_total").increment(1);
                })?;
                counter!("nowplaying_posts_total").increment(1);

                let persisted = match self.store.save(handle).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(handle = %handle, "persist message id: {e:#}");
                        false
                    }
                };
                self.state
                    .record_published(handle, track.clone(), announcement, now);
                Ok(PollOutcome::Posted {
                    handle,
                    track,
                    persisted,
                })
            }
        }
    }

    fn decide(&self, track: &TrackIdentity) -> Action {
        let Some(handle) = self.state.announced else {
            return Action::Post;
        };
        match self.options.track_change {
            TrackChangePolicy::EditInPlace => Action::Edit(handle),
            TrackChangePolicy::PostNew => {
                // Unknown previous track (fresh restart) counts as "same".
                let changed = self
                    .state
                    .announced_track
                    .as_ref()
                    .is_some_and(|t| t != track);
                if changed {
                    Action::Post
                } else {
                    Action::Edit(handle)
                }
            }
        }
    }

    async fn on_idle(&mut self, now: DateTime<Utc>) -> Result<PollOutcome, PollError> {
        let StoppedPolicy::MarkAfter(after) = self.options.stopped else {
            return Ok(PollOutcome::Idle);
        };
        self.state.empty_polls = self.state.empty_polls.saturating_add(1);
        if self.state.marked_stopped || self.state.empty_polls < after.max(1) {
            return Ok(PollOutcome::Idle);
        }
        let (Some(handle), Some(last)) = (self.state.announced, self.state.last_announcement.as_ref())
        else {
            return Ok(PollOutcome::Idle);
        };

        let stopped = mark_stopped(last, now);
        self.publish_edit(handle, &stopped).await?;
        self.state.marked_stopped = true;
        tracing::info!(handle = %handle, "marked announcement as stopped");
        Ok(PollOutcome::MarkedStopped { handle })
    }

    /// Edit `handle`; a vanished message drops the handle so the next poll posts.
    async fn publish_edit(
        &mut self,
        handle: MessageHandle,
        announcement: &Announcement,
    ) -> Result<(), PollError> {
        match self.publisher.edit(handle, announcement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                counter!("nowplaying_publish_errors_total").increment(1);
                if let PublishError::MessageGone(gone) = &e {
                    tracing::warn!(handle = %gone, "announced message is gone; will post a new one");
                    self.state.announced = None;
                    self.state.announced_track = None;
                    self.state.last_announcement = None;
                }
                Err(e.into())
            }
        }
    }
}
