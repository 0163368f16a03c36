//! Subscriber records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram chat identifier.
pub type ChatId = i64;

/// Subscription state. Records are never deleted, only moved between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Receives notifications
    Active,
    /// Temporarily muted by the user
    Paused,
    /// Left via /unsubscribe
    Unsubscribed,
    /// Deactivated after repeated permanent delivery failures
    Gone,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unsubscribed => "unsubscribed",
            SubscriptionStatus::Gone => "gone",
        }
    }
}

/// A chat subscribed to new-posting notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    pub chat_id: ChatId,
    pub status: SubscriptionStatus,
    pub subscribed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Consecutive permanent-looking delivery failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl Subscriber {
    pub fn new(chat_id: ChatId) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            status: SubscriptionStatus::Active,
            subscribed_at: now,
            updated_at: now,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}
