//! Storage abstractions for notifier state.
//!
//! The store is the only stateful component: it owns the seen set, the
//! subscriber records, the delivery audit log and the latest listing snapshot.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Notifier configuration
//! ├── locale.toml           # Bot strings
//! ├── seen.json             # Posting ids already notified (grows only)
//! ├── subscribers.json      # Subscriber records (never deleted)
//! ├── deliveries.jsonl      # Append-only delivery audit log
//! ├── current.json          # Latest fetched listing (for button callbacks)
//! └── offset.json           # Next Telegram update id
//! ```

pub mod local;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ChatId, DeliveryRecord, Posting, Subscriber, SubscriptionStatus};

// Re-export for convenience
pub use local::LocalStorage;

/// Contents of seen.json.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeenData {
    pub updated_at: Option<DateTime<Utc>>,
    pub count: usize,
    pub ids: BTreeSet<String>,
}

/// Contents of current.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentData {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Total posting count
    pub count: usize,
    /// The postings array
    pub postings: Vec<Posting>,
}

impl CurrentData {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: postings.len(),
            postings,
        }
    }
}

/// Persistent state shared by the cycle, the dispatcher and the bot.
///
/// Implementations must make `mark_seen`/`commit_seen` atomic per id and make
/// subscriber changes visible to the next `active_subscribers` call.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Snapshot of the seen set.
    async fn seen_ids(&self) -> Result<BTreeSet<String>>;

    async fn is_seen(&self, id: &str) -> Result<bool>;

    /// Insert `id` into the seen set. Returns `false` if it was already there.
    async fn mark_seen(&self, id: &str) -> Result<bool>;

    /// Insert several ids at once. Returns the ids that were newly inserted.
    async fn commit_seen(&self, ids: &[String]) -> Result<Vec<String>>;

    /// Create a subscriber or reactivate an existing one.
    /// Returns the record and whether it was already active.
    async fn subscribe(&self, chat_id: ChatId) -> Result<(Subscriber, bool)>;

    /// Change a subscriber's status. Returns `None` for unknown chats.
    async fn set_status(
        &self,
        chat_id: ChatId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscriber>>;

    /// Move a subscriber to `to` only if its status is one of `from`, as one
    /// step. Returns the status before the call, `None` for unknown chats.
    async fn set_status_if(
        &self,
        chat_id: ChatId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<SubscriptionStatus>>;

    async fn subscriber(&self, chat_id: ChatId) -> Result<Option<Subscriber>>;

    /// All subscriber records ordered by chat id.
    async fn subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Subscribers currently eligible for notifications.
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        Ok(self
            .subscribers()
            .await?
            .into_iter()
            .filter(Subscriber::is_active)
            .collect())
    }

    /// Count a failed delivery. `counts_toward_gone` failures increment the
    /// consecutive counter; the new counter value is returned.
    async fn record_failure(
        &self,
        chat_id: ChatId,
        reason: &str,
        counts_toward_gone: bool,
    ) -> Result<u32>;

    /// Clear the failure counter after a successful delivery.
    async fn reset_failures(&self, chat_id: ChatId) -> Result<()>;

    /// Append delivery outcomes to the audit log.
    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()>;

    /// Audit log entries for one posting.
    async fn deliveries_for(&self, posting_id: &str) -> Result<Vec<DeliveryRecord>>;

    /// Replace the latest listing snapshot.
    async fn save_snapshot(&self, postings: &[Posting]) -> Result<()>;

    async fn load_snapshot(&self) -> Result<Option<CurrentData>>;

    /// Look a posting up in the latest snapshot.
    async fn find_posting(&self, id: &str) -> Result<Option<Posting>> {
        Ok(self
            .load_snapshot()
            .await?
            .and_then(|data| data.postings.into_iter().find(|p| p.id == id)))
    }

    /// Next Telegram update id to request.
    async fn load_offset(&self) -> Result<Option<i64>>;

    async fn save_offset(&self, offset: i64) -> Result<()>;
}
