//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::http::RetryPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Listing page and HTTP settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Fan-out behavior
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Bounded retries for network calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Polling interval
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.source.url).is_err() {
            return Err(AppError::validation("source.url is not a valid URL"));
        }
        if self.source.table_id.trim().is_empty() {
            return Err(AppError::validation("source.table_id is empty"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.dispatch.max_concurrent == 0 {
            return Err(AppError::validation("dispatch.max_concurrent must be > 0"));
        }
        if self.dispatch.gone_threshold == 0 {
            return Err(AppError::validation("dispatch.gone_threshold must be > 0"));
        }
        if self.dispatch.delivery_timeout_secs == 0 {
            return Err(AppError::validation(
                "dispatch.delivery_timeout_secs must be > 0",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::validation("telegram.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Listing page and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the goods and services listing
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// `id` attribute of the listing table
    #[serde(default = "defaults::table_id")]
    pub table_id: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Only postings whose status contains this text are notified.
    /// An empty string disables the filter.
    #[serde(default = "defaults::status_filter")]
    pub status_filter: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            table_id: defaults::table_id(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            status_filter: defaults::status_filter(),
        }
    }
}

/// Notification fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum deliveries in flight per posting
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Consecutive permanent failures before a subscriber is deactivated
    #[serde(default = "defaults::gone_threshold")]
    pub gone_threshold: u32,

    /// Upper bound for one subscriber's delivery, retries included
    #[serde(default = "defaults::delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Attach the generated PDF summary to pushed notifications
    #[serde(default)]
    pub attach_summary: bool,

    /// Attach the calendar file to pushed notifications
    #[serde(default)]
    pub attach_calendar: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            gone_threshold: defaults::gone_threshold(),
            delivery_timeout_secs: defaults::delivery_timeout(),
            attach_summary: false,
            attach_calendar: false,
        }
    }
}

impl DispatchConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

/// Retry settings shared by the fetcher, downloads and the bot client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay, doubled after each failed attempt
    #[serde(default = "defaults::backoff")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            backoff_ms: defaults::backoff(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Polling schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Telegram Bot API settings. The token comes from `TELEGRAM_BOT_TOKEN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Request timeout for regular calls
    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,

    /// Long-poll timeout passed to getUpdates
    #[serde(default = "defaults::poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Minimum gap between outgoing calls
    #[serde(default = "defaults::min_send_interval")]
    pub min_send_interval_ms: u64,

    /// Longest flood wait honoured before giving up on a call
    #[serde(default = "defaults::max_flood_wait")]
    pub max_flood_wait_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            timeout_secs: defaults::telegram_timeout(),
            poll_timeout_secs: defaults::poll_timeout(),
            min_send_interval_ms: defaults::min_send_interval(),
            max_flood_wait_secs: defaults::max_flood_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn source_url() -> String {
        "https://sistemas.undc.edu.pe/bienesyservicios/".into()
    }
    pub fn table_id() -> String {
        "datatable_publicaciones".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; bienes-notifier/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn status_filter() -> String {
        "Vigente".into()
    }

    // Dispatch defaults
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn gone_threshold() -> u32 {
        3
    }
    pub fn delivery_timeout() -> u64 {
        120
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff() -> u64 {
        500
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        300
    }

    // Telegram defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        30
    }
    pub fn poll_timeout() -> u64 {
        30
    }
    pub fn min_send_interval() -> u64 {
        50
    }
    pub fn max_flood_wait() -> u64 {
        60
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
