//! Posting data structure.

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::{normalize_whitespace, truncate_graphemes};

/// Maximum title length in graphemes.
const TITLE_MAX_LEN: usize = 80;

/// Date-time formats used on the listing page, day-first where ambiguous.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

/// Date-only formats; these resolve to midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// A posting listed on the goods and services page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Posting {
    /// Publication number assigned by the page (or a content fingerprint)
    pub id: String,

    /// Short title derived from the description
    pub title: String,

    /// Full description text
    pub description: String,

    /// Publication date as shown on the page
    pub published_raw: String,

    /// Parsed publication timestamp
    pub published_at: Option<NaiveDateTime>,

    /// Expiry date as shown on the page
    pub expires_raw: String,

    /// Parsed expiry timestamp
    pub expires_at: Option<NaiveDateTime>,

    /// Status text (e.g. "Vigente")
    pub status: String,

    /// Absolute URL of the original document, if the page links one
    pub attachment: Option<String>,
}

/// Start and end of a posting's availability window, used for calendar export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Posting {
    /// Build a posting from the raw cells of a listing row.
    ///
    /// A blank `id` is replaced by a fingerprint of the remaining fields so
    /// the posting still has a stable identity across fetches.
    pub fn from_row(
        id: &str,
        description: &str,
        published: &str,
        expires: &str,
        status: &str,
        attachment: Option<String>,
    ) -> Self {
        let description = normalize_whitespace(description);
        let published_raw = normalize_whitespace(published);
        let expires_raw = normalize_whitespace(expires);

        let id = match id.trim() {
            "" => fingerprint(&description, &published_raw, &expires_raw, attachment.as_deref()),
            trimmed => trimmed.to_string(),
        };

        Self {
            title: make_title(&description),
            published_at: parse_datetime(&published_raw),
            expires_at: parse_datetime(&expires_raw),
            status: normalize_whitespace(status),
            id,
            description,
            published_raw,
            expires_raw,
            attachment,
        }
    }

    /// Whether the status column matches the filter (empty filter matches all).
    pub fn matches_status(&self, filter: &str) -> bool {
        filter.is_empty() || self.status.contains(filter)
    }

    /// Time left until expiry, clamped at zero.
    pub fn remaining(&self, now: NaiveDateTime) -> Option<Duration> {
        self.expires_at
            .map(|expires| (expires - now).max(Duration::zero()))
    }

    /// Calendar window, available when both dates parse.
    pub fn event(&self) -> Option<EventWindow> {
        let start = self.published_at?;
        let end = self.expires_at?;
        Some(EventWindow {
            start,
            end: end.max(start),
        })
    }

    /// Deterministic ordering: publication time, then identifier.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.published_at
            .cmp(&other.published_at)
            .then_with(|| compare_ids(&self.id, &other.id))
    }
}

/// Total order on identifiers: numeric ids first, by value, then every other
/// id lexically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Parse a date or date-time as shown on the listing page.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Format a duration as "N días, H horas, M minutos".
pub fn format_remaining(remaining: Duration) -> String {
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    format!("{days} días, {hours} horas, {minutes} minutos")
}

fn make_title(description: &str) -> String {
    let first_line = description.lines().next().unwrap_or_default();
    truncate_graphemes(first_line, TITLE_MAX_LEN)
}

fn fingerprint(description: &str, published: &str, expires: &str, link: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [description, published, expires, link.unwrap_or_default()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..8])
}
