//! The gateway seam between the worker and the chat platform.

use std::path::Path;

use async_trait::async_trait;
use vedit_models::{ChatId, SourceRef};

use crate::error::GatewayResult;
use crate::types::{Button, InboundEvent, MessageRef};

/// Outbound and inbound operations of a chat platform.
///
/// `buttons` is a list of rows; an empty slice sends no keyboard.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a text message to a chat.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef>;

    /// Send a text message as a reply to `to`.
    async fn reply_text(
        &self,
        to: MessageRef,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> GatewayResult<MessageRef>;

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, message: MessageRef, text: &str) -> GatewayResult<()>;

    /// Delete a previously sent message.
    async fn delete_message(&self, message: MessageRef) -> GatewayResult<()>;

    /// Upload a video file to a chat.
    async fn send_video(&self, chat: ChatId, path: &Path) -> GatewayResult<()>;

    /// Fetch the media behind `source` into `dest`.
    async fn download(&self, source: &SourceRef, dest: &Path) -> GatewayResult<()>;

    /// Acknowledge a button press, optionally showing `text`.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> GatewayResult<()>;

    /// Wait for the next batch of inbound events.
    async fn next_events(&self) -> GatewayResult<Vec<InboundEvent>>;
}
