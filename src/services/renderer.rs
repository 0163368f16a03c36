//! Posting renderers.
//!
//! The dispatcher and the bot only see the [`Renderer`] trait; the concrete
//! formats live in the sibling modules.

use chrono::NaiveDateTime;

use super::{calendar, message, original, summary};
use crate::error::Result;
use crate::models::{Artifact, FileReference, MessagePayload, NotificationLocale, Posting};

/// Turns a posting into messages and files.
pub trait Renderer: Send + Sync {
    /// Message shown for a posting, as of `now`.
    fn render_message(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload;

    /// Message pushed to subscribers when a posting is new.
    fn render_announcement(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload;

    /// Generated PDF summary.
    fn render_summary(&self, posting: &Posting, now: NaiveDateTime) -> Result<Artifact>;

    /// Calendar file, `None` when the posting has no usable dates.
    fn render_calendar(&self, posting: &Posting) -> Result<Option<Artifact>>;

    /// Original document location, `None` when the posting links none.
    fn resolve_original(&self, posting: &Posting) -> Option<FileReference>;
}

/// Renders postings with the configured labels.
#[derive(Debug, Clone, Default)]
pub struct PostingRenderer {
    labels: NotificationLocale,
}

impl PostingRenderer {
    pub fn new(labels: NotificationLocale) -> Self {
        Self { labels }
    }
}

impl Renderer for PostingRenderer {
    fn render_message(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload {
        message::format_posting(posting, &self.labels, now)
    }

    fn render_announcement(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload {
        message::format_new_posting(posting, &self.labels, now)
    }

    fn render_summary(&self, posting: &Posting, now: NaiveDateTime) -> Result<Artifact> {
        summary::build_summary(posting, &self.labels, now)
    }

    fn render_calendar(&self, posting: &Posting) -> Result<Option<Artifact>> {
        Ok(calendar::build_calendar(posting))
    }

    fn resolve_original(&self, posting: &Posting) -> Option<FileReference> {
        original::resolve_original(posting)
    }
}
