//! Messaging gateway for the VEdit bot.
//!
//! This crate provides:
//! - The [`MessagingGateway`] trait the worker talks to
//! - Inbound event and outbound message types
//! - A Telegram Bot API implementation over HTTP

pub mod error;
pub mod gateway;
pub mod telegram;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::MessagingGateway;
pub use telegram::{TelegramConfig, TelegramGateway};
pub use types::{Button, InboundEvent, MessageRef};
