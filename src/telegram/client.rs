//! Telegram Bot API client over reqwest.
//!
//! Every outgoing call goes through the rate limiter and the shared retry
//! policy. Flood waits are honoured up to `max_flood_wait_secs`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use super::BotTransport;
use super::rate_limiter::RateLimiter;
use super::types::{ApiResponse, BotCommand, InlineKeyboardMarkup, Update};
use crate::error::{AppError, Result};
use crate::models::{Artifact, ChatId, DeliveryError, DeliveryResult, MessagePayload, TelegramConfig};
use crate::utils::http::{RetryPolicy, with_retry};

/// Error descriptions meaning the chat will never accept messages again.
const GONE_MARKERS: &[&str] = &[
    "chat not found",
    "user is deactivated",
    "bot was blocked",
    "bot was kicked",
];

/// A failed Bot API call.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("flood wait of {0:?}")]
    FloodWait(Duration),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },
}

impl TelegramError {
    /// Whether the chat is permanently unreachable.
    pub fn is_gone(&self) -> bool {
        match self {
            TelegramError::Api { code, description } => {
                let description = description.to_lowercase();
                *code == 403 || GONE_MARKERS.iter().any(|m| description.contains(m))
            }
            _ => false,
        }
    }

    /// Delay before retrying, or `None` when retrying cannot help.
    fn retry_hint(&self, max_flood_wait: Duration) -> Option<Duration> {
        match self {
            TelegramError::Network(_) => Some(Duration::ZERO),
            TelegramError::FloodWait(wait) if *wait <= max_flood_wait => Some(*wait),
            TelegramError::FloodWait(_) => None,
            TelegramError::Api { code, .. } if *code >= 500 => Some(Duration::ZERO),
            TelegramError::Api { .. } => None,
        }
    }
}

impl From<TelegramError> for DeliveryError {
    fn from(e: TelegramError) -> Self {
        if e.is_gone() {
            DeliveryError::gone(e.to_string())
        } else {
            DeliveryError::transient(e.to_string())
        }
    }
}

/// Bot API client.
pub struct TelegramClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
    max_flood_wait: Duration,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, token: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            limiter: RateLimiter::new(Duration::from_millis(config.min_send_interval_ms)),
            retry,
            max_flood_wait: Duration::from_secs(config.max_flood_wait_secs),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let response = self
            .client
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(self.poll_timeout_secs + 10))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::telegram("getUpdates", e))?;

        Self::parse_response(response)
            .await
            .map_err(|e| AppError::telegram("getUpdates", e))
    }

    /// Acknowledge a button press so the client stops its spinner.
    pub async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let body = json!({ "callback_query_id": callback_id });
        self.call::<serde_json::Value>("answerCallbackQuery", &body)
            .await
            .map(|_| ())
            .map_err(|e| AppError::telegram("answerCallbackQuery", e))
    }

    /// Register the command menu.
    pub async fn set_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let body = json!({ "commands": commands });
        self.call::<serde_json::Value>("setMyCommands", &body)
            .await
            .map(|_| ())
            .map_err(|e| AppError::telegram("setMyCommands", e))
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// JSON call with rate limiting and retries.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, TelegramError> {
        with_retry(
            &self.retry,
            method,
            || self.post_json(method, body),
            |e: &TelegramError| e.retry_hint(self.max_flood_wait),
        )
        .await
    }

    /// Multipart upload with rate limiting and retries.
    async fn upload(&self, chat_id: ChatId, artifact: &Artifact) -> std::result::Result<(), TelegramError> {
        with_retry(
            &self.retry,
            "sendDocument",
            || self.post_document(chat_id, artifact),
            |e: &TelegramError| e.retry_hint(self.max_flood_wait),
        )
        .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, TelegramError> {
        self.limiter.wait_and_acquire().await;
        let response = self.client.post(self.url(method)).json(body).send().await?;
        self.observe(Self::parse_response(response).await).await
    }

    async fn post_document(
        &self,
        chat_id: ChatId,
        artifact: &Artifact,
    ) -> std::result::Result<(), TelegramError> {
        self.limiter.wait_and_acquire().await;
        let part = Part::bytes(artifact.bytes.clone())
            .file_name(artifact.file_name.clone())
            .mime_str(&artifact.mime_type)?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        let response = self
            .client
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        self.observe(Self::parse_response::<serde_json::Value>(response).await)
            .await
            .map(|_| ())
    }

    /// Propagate flood waits to the limiter so other callers back off too.
    async fn observe<T>(
        &self,
        result: std::result::Result<T, TelegramError>,
    ) -> std::result::Result<T, TelegramError> {
        if let Err(TelegramError::FloodWait(wait)) = &result {
            self.limiter.handle_flood_wait(*wait).await;
        }
        result
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> std::result::Result<T, TelegramError> {
        let status = response.status();
        let text = response.text().await?;

        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|_| TelegramError::Api {
            code: i64::from(status.as_u16()),
            description: text.chars().take(200).collect(),
        })?;

        if let Some(wait) = parsed.parameters.as_ref().and_then(|p| p.retry_after) {
            return Err(TelegramError::FloodWait(Duration::from_secs(wait)));
        }

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                code: parsed.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: parsed.description.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl BotTransport for TelegramClient {
    async fn send_message(&self, chat_id: ChatId, message: &MessagePayload) -> DeliveryResult {
        let mut body = json!({
            "chat_id": chat_id,
            "text": message.text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !message.buttons.is_empty() {
            body["reply_markup"] = json!(InlineKeyboardMarkup::from_rows(&message.buttons));
        }

        self.call::<serde_json::Value>("sendMessage", &body)
            .await
            .map(|_| ())
            .map_err(DeliveryError::from)
    }

    async fn send_file(&self, chat_id: ChatId, artifact: &Artifact) -> DeliveryResult {
        self.upload(chat_id, artifact)
            .await
            .map_err(DeliveryError::from)
    }
}
