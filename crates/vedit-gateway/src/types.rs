//! Gateway-neutral message and event types.

use serde::{Deserialize, Serialize};
use vedit_models::{ChatId, SourceRef};

/// A message previously sent or received, addressable for edits and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat: ChatId,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat: ChatId, message_id: i64) -> Self {
        Self { chat, message_id }
    }
}

/// Inline button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Button {
    /// Press is delivered back as [`InboundEvent::Callback`] with `data`.
    Callback { text: String, data: String },
    /// Opens a link.
    Url { text: String, url: String },
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Callback {
            text: text.into(),
            data: data.into(),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Something a user did in the chat.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A `/command` message.
    Command {
        user_id: i64,
        message: MessageRef,
        command: String,
    },
    /// A message carrying a video.
    Video {
        user_id: i64,
        message: MessageRef,
        source: SourceRef,
    },
    /// A button press on one of the bot's messages.
    Callback {
        callback_id: String,
        user_id: i64,
        data: String,
        /// The message holding the button; `None` once it is too old to access
        message: Option<MessageRef>,
        /// Video of the message the button message replies to, if any
        replied_video: Option<SourceRef>,
    },
    /// Plain text.
    Text {
        user_id: i64,
        message: MessageRef,
        text: String,
        is_reply: bool,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> i64 {
        match self {
            InboundEvent::Command { user_id, .. }
            | InboundEvent::Video { user_id, .. }
            | InboundEvent::Callback { user_id, .. }
            | InboundEvent::Text { user_id, .. } => *user_id,
        }
    }
}
