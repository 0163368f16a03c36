// src/models/mod.rs

//! Domain models for the notifier.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod delivery;
mod locale;
mod notification;
mod posting;
mod subscriber;

// Re-export all public types
pub use config::{
    Config, DispatchConfig, LoggingConfig, RetryConfig, SchedulerConfig, SourceConfig,
    TelegramConfig,
};
pub use delivery::{
    CycleReport, DeliveryError, DeliveryFailureKind, DeliveryRecord, DeliveryReport,
    DeliveryResult, DeliveryStatus, FailedDelivery,
};
pub use locale::{CommandLocale, LocaleConfig, MessageLocale, NotificationLocale};
pub use notification::{Artifact, Button, ButtonAction, FileReference, MessagePayload, Notification};
pub use posting::{EventWindow, Posting, compare_ids, format_remaining, parse_datetime};
pub use subscriber::{ChatId, Subscriber, SubscriptionStatus};
