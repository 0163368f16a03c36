//! In-memory collaborators for unit tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tempfile::TempDir;

use crate::error::{AppError, Result};
use crate::models::{
    Artifact, ChatId, DeliveryError, DeliveryRecord, DeliveryResult, FileReference,
    MessagePayload, Posting, Subscriber, SubscriptionStatus,
};
use crate::services::{OriginalSource, PostingRenderer, PostingSource, Renderer};
use crate::storage::{CurrentData, LocalStorage, PostingStore};
use crate::telegram::BotTransport;

/// A current posting with both dates set.
pub fn posting(id: &str, published: &str) -> Posting {
    Posting::from_row(
        id,
        &format!("Publicación de prueba {id}"),
        published,
        "2026-12-31 17:00:00",
        "Vigente",
        None,
    )
}

pub async fn temp_store() -> (TempDir, LocalStorage) {
    let dir = TempDir::new().unwrap();
    let store = LocalStorage::open(dir.path()).await.unwrap();
    (dir, store)
}

/// Records what was sent; chats listed in `failures` always fail.
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<(ChatId, String)>>,
    files: Mutex<Vec<(ChatId, String)>>,
    failures: Mutex<HashMap<ChatId, DeliveryError>>,
}

impl RecordingTransport {
    pub fn fail_for(&self, chat_id: ChatId, error: DeliveryError) {
        self.failures.lock().unwrap().insert(chat_id, error);
    }

    pub fn recover(&self, chat_id: ChatId) {
        self.failures.lock().unwrap().remove(&chat_id);
    }

    pub fn texts_for(&self, chat_id: ChatId) -> Vec<String> {
        Self::for_chat(&self.messages, chat_id)
    }

    pub fn files_for(&self, chat_id: ChatId) -> Vec<String> {
        Self::for_chat(&self.files, chat_id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn for_chat(log: &Mutex<Vec<(ChatId, String)>>, chat_id: ChatId) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn check(&self, chat_id: ChatId) -> DeliveryResult {
        match self.failures.lock().unwrap().get(&chat_id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BotTransport for RecordingTransport {
    async fn send_message(&self, chat_id: ChatId, message: &MessagePayload) -> DeliveryResult {
        self.check(chat_id)?;
        self.messages
            .lock()
            .unwrap()
            .push((chat_id, message.text.clone()));
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, artifact: &Artifact) -> DeliveryResult {
        self.check(chat_id)?;
        self.files
            .lock()
            .unwrap()
            .push((chat_id, artifact.file_name.clone()));
        Ok(())
    }
}

/// Serves a fixed listing, or a fetch failure.
pub struct StaticSource {
    listing: Mutex<std::result::Result<Vec<Posting>, String>>,
}

impl StaticSource {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            listing: Mutex::new(Ok(postings)),
        }
    }

    pub fn set(&self, postings: Vec<Posting>) {
        *self.listing.lock().unwrap() = Ok(postings);
    }

    pub fn fail(&self, reason: &str) {
        *self.listing.lock().unwrap() = Err(reason.to_string());
    }
}

#[async_trait]
impl PostingSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<Posting>> {
        self.listing
            .lock()
            .unwrap()
            .clone()
            .map_err(AppError::fetch_failed)
    }
}

/// Returns a stub PDF for every reference.
pub struct StaticDownloader;

#[async_trait]
impl OriginalSource for StaticDownloader {
    async fn download(&self, file: &FileReference) -> Result<Artifact> {
        Ok(Artifact::pdf(file.file_name.clone(), b"%PDF-1.4".to_vec()))
    }
}

/// Posting renderer whose summaries fail for the listed ids.
pub struct FailingRenderer {
    inner: PostingRenderer,
    failing: HashSet<String>,
}

impl FailingRenderer {
    pub fn new(failing: &[&str]) -> Self {
        Self {
            inner: PostingRenderer::default(),
            failing: failing.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl Renderer for FailingRenderer {
    fn render_message(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload {
        self.inner.render_message(posting, now)
    }

    fn render_announcement(&self, posting: &Posting, now: NaiveDateTime) -> MessagePayload {
        self.inner.render_announcement(posting, now)
    }

    fn render_summary(&self, posting: &Posting, now: NaiveDateTime) -> Result<Artifact> {
        if self.failing.contains(&posting.id) {
            return Err(AppError::render_failed(&posting.id, "font missing"));
        }
        self.inner.render_summary(posting, now)
    }

    fn render_calendar(&self, posting: &Posting) -> Result<Option<Artifact>> {
        self.inner.render_calendar(posting)
    }

    fn resolve_original(&self, posting: &Posting) -> Option<FileReference> {
        self.inner.resolve_original(posting)
    }
}

/// Local store whose audit log and offset writes can be made to fail.
pub struct FlakyStore {
    inner: LocalStorage,
    fail_deliveries: AtomicBool,
    fail_offset: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_deliveries: AtomicBool::new(false),
            fail_offset: AtomicBool::new(false),
        }
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail_deliveries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_offset(&self, fail: bool) {
        self.fail_offset.store(fail, Ordering::SeqCst);
    }

    fn disk_full() -> AppError {
        AppError::Io(std::io::Error::other("no space left on device"))
    }
}

#[async_trait]
impl PostingStore for FlakyStore {
    async fn seen_ids(&self) -> Result<BTreeSet<String>> {
        self.inner.seen_ids().await
    }

    async fn is_seen(&self, id: &str) -> Result<bool> {
        self.inner.is_seen(id).await
    }

    async fn mark_seen(&self, id: &str) -> Result<bool> {
        self.inner.mark_seen(id).await
    }

    async fn commit_seen(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.commit_seen(ids).await
    }

    async fn subscribe(&self, chat_id: ChatId) -> Result<(Subscriber, bool)> {
        self.inner.subscribe(chat_id).await
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscriber>> {
        self.inner.set_status(chat_id, status).await
    }

    async fn set_status_if(
        &self,
        chat_id: ChatId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<SubscriptionStatus>> {
        self.inner.set_status_if(chat_id, from, to).await
    }

    async fn subscriber(&self, chat_id: ChatId) -> Result<Option<Subscriber>> {
        self.inner.subscriber(chat_id).await
    }

    async fn subscribers(&self) -> Result<Vec<Subscriber>> {
        self.inner.subscribers().await
    }

    async fn record_failure(
        &self,
        chat_id: ChatId,
        reason: &str,
        counts_toward_gone: bool,
    ) -> Result<u32> {
        self.inner
            .record_failure(chat_id, reason, counts_toward_gone)
            .await
    }

    async fn reset_failures(&self, chat_id: ChatId) -> Result<()> {
        self.inner.reset_failures(chat_id).await
    }

    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()> {
        if self.fail_deliveries.load(Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.record_deliveries(records).await
    }

    async fn deliveries_for(&self, posting_id: &str) -> Result<Vec<DeliveryRecord>> {
        self.inner.deliveries_for(posting_id).await
    }

    async fn save_snapshot(&self, postings: &[Posting]) -> Result<()> {
        self.inner.save_snapshot(postings).await
    }

    async fn load_snapshot(&self) -> Result<Option<CurrentData>> {
        self.inner.load_snapshot().await
    }

    async fn load_offset(&self) -> Result<Option<i64>> {
        self.inner.load_offset().await
    }

    async fn save_offset(&self, offset: i64) -> Result<()> {
        if self.fail_offset.load(Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.save_offset(offset).await
    }
}
