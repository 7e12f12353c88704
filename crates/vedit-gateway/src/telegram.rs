//! Telegram Bot API gateway.
//!
//! Talks to `https://api.telegram.org/bot<token>/<method>` with JSON bodies
//! (multipart for uploads) and long-polls `getUpdates` for inbound events.
//! Handles 429 rate limits by respecting the `parameters.retry_after` field
//! returned in the JSON response body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use vedit_models::{ChatId, SourceRef};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::MessagingGateway;
use crate::types::{Button, InboundEvent, MessageRef};

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Telegram gateway configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// API base URL, overridable for a local Bot API server.
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
    video: Option<TgVideo>,
    reply_to_message: Option<Box<TgMessage>>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgVideo {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    message: Option<TgMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    file_path: Option<String>,
}

impl TgMessage {
    fn message_ref(&self) -> MessageRef {
        MessageRef::new(ChatId(self.chat.id), self.message_id)
    }

    fn video_source(&self) -> Option<SourceRef> {
        self.video.as_ref().map(|v| SourceRef::new(&v.file_id))
    }
}

/// Map a raw update to an inbound event; updates the bot does not act on
/// yield `None`.
fn into_event(update: TgUpdate) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message.as_ref();
        return Some(InboundEvent::Callback {
            callback_id: query.id,
            user_id: query.from.id,
            data: query.data.unwrap_or_default(),
            message: message.map(TgMessage::message_ref),
            replied_video: message
                .and_then(|m| m.reply_to_message.as_deref())
                .and_then(TgMessage::video_source),
        });
    }

    let message = update.message?;
    let user_id = message.from.as_ref()?.id;
    let message_ref = message.message_ref();

    if let Some(source) = message.video_source() {
        return Some(InboundEvent::Video {
            user_id,
            message: message_ref,
            source,
        });
    }

    let text = message.text?;
    if let Some(command) = text.strip_prefix('/') {
        // "/start@my_bot args" -> "start"
        let command = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        return Some(InboundEvent::Command {
            user_id,
            message: message_ref,
            command,
        });
    }

    Some(InboundEvent::Text {
        user_id,
        message: message_ref,
        text,
        is_reply: message.reply_to_message.is_some(),
    })
}

/// `reply_markup` value for a button grid.
fn keyboard_json(buttons: &[Vec<Button>]) -> Option<Value> {
    if buttons.is_empty() {
        return None;
    }
    let rows: Vec<Vec<Value>> = buttons
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| match b {
                    Button::Callback { text, data } => {
                        json!({ "text": text, "callback_data": data })
                    }
                    Button::Url { text, url } => json!({ "text": text, "url": url }),
                })
                .collect()
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

/// Telegram gateway.
pub struct TelegramGateway {
    config: TelegramConfig,
    client: Client,
    /// Next `getUpdates` offset
    offset: Mutex<i64>,
}

impl TelegramGateway {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            offset: Mutex::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base, self.config.bot_token, file_path
        )
    }

    /// Call a JSON method.
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> GatewayResult<T> {
        let url = self.method_url(method);
        self.send_with_retry(method, || Ok(self.client.post(&url).json(payload)))
            .await
    }

    /// Send request with rate limit handling.
    ///
    /// `build` is invoked once per attempt since request bodies are consumed.
    async fn send_with_retry<T, F>(&self, method: &str, build: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> GatewayResult<RequestBuilder>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = build()?.send().await?;
            let status = response.status();
            let body: ApiResponse<T> = response.json().await?;

            if body.ok {
                return body
                    .result
                    .ok_or_else(|| GatewayError::MissingResult(method.to_string()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Rate limited on {}: gave up after {} retries (retry_after {:?})",
                        method, MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(GatewayError::RateLimited {
                        method: method.to_string(),
                        attempts,
                    });
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Telegram rate limited (429) on {}, waiting {:?} before retry (attempt {}/{})",
                    method, wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(GatewayError::api(method, description));
        }
    }

    async fn send_message(
        &self,
        mut payload: Value,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef> {
        if let Some(markup) = keyboard_json(buttons) {
            payload["reply_markup"] = markup;
        }
        let message: TgMessage = self.call("sendMessage", &payload).await?;
        Ok(message.message_ref())
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef> {
        self.send_message(json!({ "chat_id": chat.0, "text": text }), buttons)
            .await
    }

    async fn reply_text(
        &self,
        to: MessageRef,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef> {
        self.send_message(
            json!({
                "chat_id": to.chat.0,
                "text": text,
                "reply_parameters": { "message_id": to.message_id },
            }),
            buttons,
        )
        .await
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> GatewayResult<()> {
        let _: Value = self
            .call(
                "editMessageText",
                &json!({
                    "chat_id": message.chat.0,
                    "message_id": message.message_id,
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> GatewayResult<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": message.chat.0, "message_id": message.message_id }),
            )
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat: ChatId, path: &Path) -> GatewayResult<()> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());
        let url = self.method_url("sendVideo");

        debug!("Uploading {} ({} bytes) to chat {}", path.display(), bytes.len(), chat);

        let _: Value = self
            .send_with_retry("sendVideo", || {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str("video/mp4")?;
                let form = Form::new()
                    .text("chat_id", chat.0.to_string())
                    .text("supports_streaming", "true")
                    .part("video", part);
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        Ok(())
    }

    async fn download(&self, source: &SourceRef, dest: &Path) -> GatewayResult<()> {
        let file: TgFile = self
            .call("getFile", &json!({ "file_id": source.as_str() }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| GatewayError::api("getFile", "file is not available for download"))?;

        let response = self.client.get(self.file_url(&file_path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::api("download", format!("HTTP {}", status)));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            out.write_all(&chunk?).await?;
        }
        out.flush().await?;

        debug!("Downloaded {} to {}", source, dest.display());
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> GatewayResult<()> {
        let mut payload = json!({ "callback_query_id": callback_id, "show_alert": alert });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    async fn next_events(&self) -> GatewayResult<Vec<InboundEvent>> {
        let mut offset = self.offset.lock().await;

        let updates: Vec<TgUpdate> = self
            .call(
                "getUpdates",
                &json!({
                    "offset": *offset,
                    "timeout": self.config.poll_timeout.as_secs(),
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            *offset = last + 1;
        }

        Ok(updates.into_iter().filter_map(into_event).collect())
    }
}
