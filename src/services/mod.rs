//! Service layer for the notifier.
//!
//! This module contains the collaborators around the core pipeline:
//! - Listing fetching (`ListingFetcher`)
//! - Posting rendering (`PostingRenderer`): messages, PDF summaries, calendar files
//! - Original document resolution and download (`HttpDownloader`)

pub mod calendar;
mod fetcher;
pub mod message;
mod original;
mod renderer;
pub mod summary;

pub use fetcher::{ListingFetcher, PostingSource};
pub use original::{HttpDownloader, OriginalSource, resolve_original};
pub use renderer::{PostingRenderer, Renderer};
