// src/runner.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::reconciler::{NowPlayingReconciler, PollError, PollOutcome};

pub type SharedReconciler = Arc<Mutex<NowPlayingReconciler>>;

#[derive(Debug)]
pub enum TickOutcome {
    Polled(Result<PollOutcome, PollError>),
    /// A previous poll still held the reconciler; this tick did nothing.
    Skipped,
}

pub fn shared(reconciler: NowPlayingReconciler) -> SharedReconciler {
    Arc::new(Mutex::new(reconciler))
}

/// Run one poll unless another is already in flight.
pub async fn tick(reconciler: &SharedReconciler) -> TickOutcome {
    let Ok(mut guard) = reconciler.try_lock() else {
        tracing::debug!("previous poll still running; skipping tick");
        counter!("nowplaying_ticks_skipped_total").increment(1);
        return TickOutcome::Skipped;
    };
    let res = guard.poll(Utc::now()).await;
    log_poll(&res);
    TickOutcome::Polled(res)
}

fn log_poll(res: &Result<PollOutcome, PollError>) {
    match res {
        Ok(PollOutcome::Idle) => tracing::trace!("nothing playing"),
        Ok(PollOutcome::NoDetails { track }) => tracing::warn!(
            artist = %track.artist,
            track = %track.track,
            "could not fetch details from any provider"
        ),
        Ok(PollOutcome::Posted {
            handle,
            track,
            persisted,
        }) => tracing::info!(
            handle = %handle,
            artist = %track.artist,
            track = %track.track,
            persisted,
            "posted new announcement"
        ),
        Ok(PollOutcome::Edited { handle, track }) => tracing::debug!(
            handle = %handle,
            artist = %track.artist,
            track = %track.track,
            "updated announcement"
        ),
        Ok(PollOutcome::MarkedStopped { handle }) => {
            tracing::debug!(handle = %handle, "stopped marker published")
        }
        Err(PollError::Status(e)) => tracing::warn!("fetch now playing failed: {e:#}"),
        Err(PollError::Publish(e)) => tracing::warn!("posting or updating announcement failed: {e}"),
    }
}

/// Fire a poll every `period` until `shutdown` resolves, then wait for the
/// in-flight poll to finish.
pub async fn run<F>(reconciler: SharedReconciler, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut inflight: JoinSet<TickOutcome> = JoinSet::new();
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = period.as_secs_f64(), "polling started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let r = reconciler.clone();
                inflight.spawn(async move { tick(&r).await });
                while let Some(done) = inflight.try_join_next() {
                    if let Err(e) = done {
                        tracing::error!("poll task panicked: {e}");
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown requested; waiting for in-flight poll");
                break;
            }
        }
    }
    while inflight.join_next().await.is_some() {}
    tracing::info!("polling stopped");
}
