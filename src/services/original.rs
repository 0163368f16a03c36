//! Original document lookup and download.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{Artifact, FileReference, Posting};
use crate::utils::http::{RetryPolicy, fetch_bytes, with_retry};
use crate::utils::url::convert_drive_url;

/// Where to download a posting's original PDF, if it links one.
///
/// Drive sharing links are rewritten into direct downloads.
pub fn resolve_original(posting: &Posting) -> Option<FileReference> {
    posting.attachment.as_deref().map(|url| FileReference {
        url: convert_drive_url(url),
        file_name: format!("{}.pdf", posting.id),
    })
}

/// Downloads referenced files.
#[async_trait]
pub trait OriginalSource: Send + Sync {
    async fn download(&self, file: &FileReference) -> Result<Artifact>;
}

/// Downloads files over HTTP with bounded retries.
pub struct HttpDownloader {
    client: Client,
    retry: RetryPolicy,
}

impl HttpDownloader {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl OriginalSource for HttpDownloader {
    async fn download(&self, file: &FileReference) -> Result<Artifact> {
        let bytes = with_retry(
            &self.retry,
            "Document download",
            || fetch_bytes(&self.client, &file.url),
            |_| Some(std::time::Duration::ZERO),
        )
        .await?;

        log::debug!("Downloaded {} ({} bytes)", file.url, bytes.len());
        Ok(Artifact::pdf(file.file_name.clone(), bytes))
    }
}
