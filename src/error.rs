// src/error.rs

//! Unified error handling for the notifier.

use std::fmt;

use thiserror::Error;

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The listing page could not be fetched or parsed.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// A posting could not be rendered into a notification.
    #[error("Render failed for posting {posting_id}: {message}")]
    RenderFailed { posting_id: String, message: String },

    /// Telegram Bot API call failed outside of a delivery.
    #[error("Telegram error in {method}: {message}")]
    Telegram { method: String, message: String },

    /// Another cycle holds the cycle guard.
    #[error("A cycle is already in progress")]
    CycleInProgress,
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error.
    pub fn fetch_failed(message: impl fmt::Display) -> Self {
        Self::FetchFailed(message.to_string())
    }

    /// Create a render error for a posting.
    pub fn render_failed(posting_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::RenderFailed {
            posting_id: posting_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a Telegram API error.
    pub fn telegram(method: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Telegram {
            method: method.into(),
            message: message.to_string(),
        }
    }
}
