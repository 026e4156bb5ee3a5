pub mod telegram;

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

/// Opaque id of a posted channel message (Telegram `message_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i64);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Photo + HTML caption + rows of link buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub photo_url: String,
    pub caption_html: String,
    pub buttons: Vec<Vec<LinkButton>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("message {0} no longer exists in the channel")]
    MessageGone(MessageHandle),
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("messaging api error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("messaging transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Post a new announcement and return its handle.
    async fn post(&self, announcement: &Announcement) -> Result<MessageHandle, PublishError>;

    /// Replace photo, caption and keyboard of an existing message.
    async fn edit(
        &self,
        handle: MessageHandle,
        announcement: &Announcement,
    ) -> Result<(), PublishError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishCall {
    Post(Announcement),
    Edit(MessageHandle, Announcement),
}

/// Which calls a `RecordingPublisher` should reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    #[default]
    Never,
    /// Every call fails with `PublishError::Transport`.
    Always,
    /// Edits fail with `PublishError::MessageGone`.
    EditGone,
}

// --- Test helper ---
/// In-memory publisher that records every attempted call.
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<PublishCall>>,
    next_id: Mutex<i64>,
    fail: Mutex<FailMode>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::starting_at(100)
    }

    /// Posted handles count up from `first_id`.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            calls: Mutex::new(vec![]),
            next_id: Mutex::new(first_id),
            fail: Mutex::new(FailMode::Never),
        }
    }

    pub fn set_fail_mode(&self, mode: FailMode) {
        *self.fail.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PublishCall::Post(_)))
            .count()
    }

    pub fn edits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PublishCall::Edit(..)))
            .count()
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn post(&self, announcement: &Announcement) -> Result<MessageHandle, PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push(PublishCall::Post(announcement.clone()));
        if *self.fail.lock().unwrap() == FailMode::Always {
            return Err(PublishError::Transport("recording publisher: forced failure".into()));
        }
        let mut id = self.next_id.lock().unwrap();
        let handle = MessageHandle(*id);
        *id += 1;
        Ok(handle)
    }

    async fn edit(
        &self,
        handle: MessageHandle,
        announcement: &Announcement,
    ) -> Result<(), PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push(PublishCall::Edit(handle, announcement.clone()));
        match *self.fail.lock().unwrap() {
            FailMode::Never => Ok(()),
            FailMode::Always => Err(PublishError::Transport(
                "recording publisher: forced failure".into(),
            )),
            FailMode::EditGone => Err(PublishError::MessageGone(handle)),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
