use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Announcement, LinkButton, MessageHandle, PublishError, Publisher};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Longest `retry_after` waited out inside one call; longer limits go back to the caller.
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 5;

/// Telegram Bot API publisher for a single channel.
#[derive(Clone)]
pub struct TelegramPublisher {
    api_base: String,
    token: String,
    channel_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramPublisher {
    pub fn new(token: String, channel_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            channel_id,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// POST `body` to `method`, retrying transport errors and 5xx with backoff.
    /// A short 429 is waited out and retried within the same attempt budget.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<ApiResponse<T>, PublishError> {
        let url = self.method_url(method);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(body)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_server_error() && attempt < self.max_retries {
                        tracing::debug!(method, %status, attempt, "telegram 5xx; retrying");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    let text = rsp
                        .text()
                        .await
                        .map_err(|e| PublishError::Transport(format!("{method} body: {e}")))?;
                    let parsed = serde_json::from_str::<ApiResponse<T>>(&text).map_err(|_| {
                        if status == StatusCode::TOO_MANY_REQUESTS {
                            return PublishError::RateLimited { retry_after: None };
                        }
                        PublishError::Api {
                            code: i64::from(status.as_u16()),
                            description: snippet(&text),
                        }
                    })?;
                    if parsed.error_code == Some(429) && attempt < self.max_retries {
                        if let Some(wait) = parsed
                            .retry_after()
                            .filter(|s| *s <= MAX_RATE_LIMIT_WAIT_SECS)
                        {
                            tracing::info!(
                                method,
                                wait_secs = wait,
                                attempt,
                                "telegram rate limited; waiting"
                            );
                            tokio::time::sleep(Duration::from_secs(wait)).await;
                            continue;
                        }
                    }
                    return Ok(parsed);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::debug!(method, attempt, "telegram request failed: {e}; retrying");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(PublishError::Transport(format!("{method}: {e}")));
                }
            }
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

fn snippet(s: &str) -> String {
    s.chars().take(200).collect()
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

impl<T> ApiResponse<T> {
    pub fn retry_after(&self) -> Option<u64> {
        self.parameters.as_ref().and_then(|p| p.retry_after)
    }

    /// Map a failed response to the matching `PublishError`. `target` is the
    /// edited message, if any.
    pub fn into_error(self, target: Option<MessageHandle>) -> PublishError {
        let code = self.error_code.unwrap_or_default();
        let description = self.description.unwrap_or_default();
        if code == 429 {
            return PublishError::RateLimited {
                retry_after: self.parameters.and_then(|p| p.retry_after),
            };
        }
        let lower = description.to_ascii_lowercase();
        if let Some(handle) = target {
            if lower.contains("message to edit not found") || lower.contains("message_id_invalid")
            {
                return PublishError::MessageGone(handle);
            }
        }
        PublishError::Api { code, description }
    }
}

pub fn is_not_modified(description: Option<&str>) -> bool {
    description
        .map(|d| d.to_ascii_lowercase().contains("message is not modified"))
        .unwrap_or(false)
}

fn keyboard_json(rows: &[Vec<LinkButton>]) -> Value {
    json!({ "inline_keyboard": rows })
}

pub fn send_photo_body(channel_id: &str, a: &Announcement) -> Value {
    json!({
        "chat_id": channel_id,
        "photo": a.photo_url,
        "caption": a.caption_html,
        "parse_mode": "HTML",
        "reply_markup": keyboard_json(&a.buttons),
    })
}

pub fn edit_media_body(channel_id: &str, handle: MessageHandle, a: &Announcement) -> Value {
    json!({
        "chat_id": channel_id,
        "message_id": handle.0,
        "media": {
            "type": "photo",
            "media": a.photo_url,
            "caption": a.caption_html,
            "parse_mode": "HTML",
        },
        "reply_markup": keyboard_json(&a.buttons),
    })
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn post(&self, announcement: &Announcement) -> Result<MessageHandle, PublishError> {
        let body = send_photo_body(&self.channel_id, announcement);
        let rsp: ApiResponse<SentMessage> = self.call("sendPhoto", &body).await?;
        if !rsp.ok {
            return Err(rsp.into_error(None));
        }
        match rsp.result {
            Some(m) => Ok(MessageHandle(m.message_id)),
            None => Err(PublishError::Api {
                code: 0,
                description: "sendPhoto returned ok without a message".into(),
            }),
        }
    }

    async fn edit(
        &self,
        handle: MessageHandle,
        announcement: &Announcement,
    ) -> Result<(), PublishError> {
        let body = edit_media_body(&self.channel_id, handle, announcement);
        let rsp: ApiResponse<Value> = self.call("editMessageMedia", &body).await?;
        if rsp.ok || is_not_modified(rsp.description.as_deref()) {
            return Ok(());
        }
        Err(rsp.into_error(Some(handle)))
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement() -> Announcement {
        Announcement {
            photo_url: "https://img.example/c.jpg".into(),
            caption_html: "<b>Song:</b> x".into(),
            buttons: vec![
                vec![LinkButton::new("Listen Now", "https://song.link/s/1")],
                vec![LinkButton::new("About", "https://example.com")],
            ],
        }
    }

    #[test]
    fn send_photo_body_shape() {
        let v = send_photo_body("@chan", &announcement());
        assert_eq!(v["chat_id"], "@chan");
        assert_eq!(v["parse_mode"], "HTML");
        assert_eq!(v["photo"], "https://img.example/c.jpg");
        assert_eq!(
            v["reply_markup"]["inline_keyboard"][0][0]["url"],
            "https://song.link/s/1"
        );
        assert_eq!(v["reply_markup"]["inline_keyboard"][1][0]["text"], "About");
    }

    #[test]
    fn edit_body_targets_message_and_wraps_media() {
        let v = edit_media_body("-1001", MessageHandle(77), &announcement());
        assert_eq!(v["message_id"], 77);
        assert_eq!(v["media"]["type"], "photo");
        assert_eq!(v["media"]["caption"], "<b>Song:</b> x");
        assert_eq!(v["media"]["parse_mode"], "HTML");
    }

    #[test]
    fn error_mapping() {
        let gone: ApiResponse<Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message to edit not found"}"#,
        )
        .unwrap();
        assert!(matches!(
            gone.into_error(Some(MessageHandle(5))),
            PublishError::MessageGone(MessageHandle(5))
        ));

        let limited: ApiResponse<Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":17}}"#,
        )
        .unwrap();
        assert!(matches!(
            limited.into_error(None),
            PublishError::RateLimited {
                retry_after: Some(17)
            }
        ));

        let other: ApiResponse<Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot is not a member"}"#,
        )
        .unwrap();
        assert!(matches!(
            other.into_error(Some(MessageHandle(1))),
            PublishError::Api { code: 403, .. }
        ));
    }

    #[test]
    fn not_modified_is_recognised() {
        assert!(is_not_modified(Some(
            "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
        )));
        assert!(!is_not_modified(Some("Bad Request: chat not found")));
        assert!(!is_not_modified(None));
    }

    #[test]
    fn sent_message_parses() {
        let rsp: ApiResponse<SentMessage> = serde_json::from_str(
            r#"{"ok":true,"result":{"message_id":4321,"chat":{"id":-100},"date":0}}"#,
        )
        .unwrap();
        assert!(rsp.ok);
        assert_eq!(rsp.result.unwrap().message_id, 4321);
    }
}
