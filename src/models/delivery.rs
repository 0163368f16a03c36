//! Delivery outcomes and cycle reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ChatId;

/// How a failed delivery should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailureKind {
    /// Network trouble, rate limits, server errors
    Transient,
    /// Blocked bot, deactivated user, missing chat
    Gone,
}

/// A single failed send to one chat.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct DeliveryError {
    pub kind: DeliveryFailureKind,
    pub reason: String,
}

impl DeliveryError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: DeliveryFailureKind::Transient,
            reason: reason.into(),
        }
    }

    pub fn gone(reason: impl Into<String>) -> Self {
        Self {
            kind: DeliveryFailureKind::Gone,
            reason: reason.into(),
        }
    }
}

/// Outcome of one send through the bot transport.
pub type DeliveryResult = std::result::Result<(), DeliveryError>;

/// Audit status of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    Gone,
}

/// Audit log entry: one posting sent (or not) to one chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub posting_id: String,
    pub chat_id: ChatId,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A subscriber the posting could not be delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub chat_id: ChatId,
    pub kind: DeliveryFailureKind,
    pub reason: String,
}

/// Result of dispatching one posting to all active subscribers.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub posting_id: String,
    pub delivered: usize,
    pub failed: Vec<FailedDelivery>,
    /// Subscribers deactivated during this pass
    pub deactivated: Vec<ChatId>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Summary of one fetch, diff, dispatch and commit pass.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Postings returned by the source
    pub fetched: usize,
    /// Postings left after the status filter
    pub considered: usize,
    /// Postings not yet in the seen set
    pub new: usize,
    pub reports: Vec<DeliveryReport>,
    /// Postings whose notification could not be rendered
    pub render_failed: Vec<String>,
    /// Postings skipped because of a storage or dispatch error
    pub errored: Vec<(String, String)>,
    /// Identifiers added to the seen set
    pub committed: Vec<String>,
    /// Stopped early on shutdown
    pub cancelled: bool,
}

impl CycleReport {
    pub fn delivered(&self) -> usize {
        self.reports.iter().map(|r| r.delivered).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }

    pub fn deactivated(&self) -> Vec<super::ChatId> {
        self.reports
            .iter()
            .flat_map(|r| r.deactivated.iter().copied())
            .collect()
    }
}
