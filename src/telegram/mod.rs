//! Telegram Bot API channel.
//!
//! Uses long polling via `getUpdates`; messages and files go out through
//! [`BotTransport`], which is what the dispatcher depends on.
//! Docs: <https://core.telegram.org/bots/api>

mod bot;
mod client;
mod commands;
mod rate_limiter;
pub mod types;

use async_trait::async_trait;

use crate::models::{Artifact, ChatId, DeliveryResult, MessagePayload};

pub use bot::run_updates;
pub use client::{TelegramClient, TelegramError};
pub use commands::{BotEvent, Command, CommandHandler};
pub use rate_limiter::RateLimiter;

/// Outgoing side of the bot.
///
/// Failures are classified so the caller can tell a dead chat from a
/// temporary outage.
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, message: &MessagePayload) -> DeliveryResult;

    async fn send_file(&self, chat_id: ChatId, artifact: &Artifact) -> DeliveryResult;
}
