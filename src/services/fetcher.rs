// src/services/fetcher.rs

//! Listing fetcher.
//!
//! Downloads the goods and services page and extracts postings from the
//! publications table using CSS selectors.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Posting, SourceConfig};
use crate::utils::http::{RetryPolicy, fetch_text, with_retry};
use crate::utils::resolve_url;

/// Minimum number of cells in a listing row.
const MIN_CELLS: usize = 6;

/// Source of the current listing.
#[async_trait]
pub trait PostingSource: Send + Sync {
    /// Fetch the current postings in page order.
    ///
    /// Fails with [`AppError::FetchFailed`] on network or parse errors.
    async fn fetch(&self) -> Result<Vec<Posting>>;
}

/// Fetches postings from the public listing page.
pub struct ListingFetcher {
    config: SourceConfig,
    client: Client,
    retry: RetryPolicy,
}

impl ListingFetcher {
    pub fn new(config: SourceConfig, client: Client, retry: RetryPolicy) -> Self {
        Self {
            config,
            client,
            retry,
        }
    }

    /// Extract postings from the listing HTML.
    ///
    /// Rows with fewer than six cells are skipped. A missing table means the
    /// page layout changed and is reported as a fetch failure.
    pub fn parse_listing(html: &str, page_url: &str, table_id: &str) -> Result<Vec<Posting>> {
        let document = Html::parse_document(html);
        let base_url = url::Url::parse(page_url)?;

        let table_sel = Self::parse_selector(&format!("table#{table_id}"))?;
        let tbody_sel = Self::parse_selector("tbody")?;
        let link_sel = Self::parse_selector("a[href]")?;

        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| AppError::fetch_failed(format!("table #{table_id} not found")))?;
        let tbody = table
            .select(&tbody_sel)
            .next()
            .ok_or_else(|| AppError::fetch_failed(format!("table #{table_id} has no body")))?;

        let mut postings = Vec::new();
        for row in child_elements(tbody, "tr") {
            let cells: Vec<ElementRef> = child_elements(row, "td").collect();
            if cells.len() < MIN_CELLS {
                continue;
            }

            let text: Vec<String> = cells
                .iter()
                .map(|cell| cell.text().collect::<String>())
                .collect();

            let attachment = cells[2]
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty() && !href.starts_with('#'))
                .map(|href| resolve_url(&base_url, href));

            postings.push(Posting::from_row(
                &text[0], &text[1], &text[3], &text[4], &text[5], attachment,
            ));
        }

        Ok(postings)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[async_trait]
impl PostingSource for ListingFetcher {
    async fn fetch(&self) -> Result<Vec<Posting>> {
        let html = with_retry(
            &self.retry,
            "Listing fetch",
            || fetch_text(&self.client, &self.config.url),
            |_| Some(std::time::Duration::ZERO),
        )
        .await
        .map_err(AppError::fetch_failed)?;

        let postings = Self::parse_listing(&html, &self.config.url, &self.config.table_id)
            .map_err(|e| match e {
                AppError::FetchFailed(_) => e,
                other => AppError::fetch_failed(other),
            })?;

        log::debug!("Fetched {} postings from {}", postings.len(), self.config.url);
        Ok(postings)
    }
}

/// Direct element children of `parent` with the given tag name.
fn child_elements<'a>(parent: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}
