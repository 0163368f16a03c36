//! Local filesystem storage implementation.
//!
//! All state lives in memory behind a single async mutex and is written
//! through to JSON files on every change. Files are replaced atomically
//! (write to a temp file, then rename), so a crash leaves either the old or
//! the new version on disk. A change only becomes visible in memory after its
//! write succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{ChatId, DeliveryRecord, Posting, Subscriber, SubscriptionStatus};
use crate::storage::{CurrentData, PostingStore, SeenData};

const SEEN_KEY: &str = "seen.json";
const SUBSCRIBERS_KEY: &str = "subscribers.json";
const DELIVERIES_KEY: &str = "deliveries.jsonl";
const CURRENT_KEY: &str = "current.json";
const OFFSET_KEY: &str = "offset.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OffsetData {
    offset: i64,
}

#[derive(Debug, Default)]
struct StoreState {
    seen: BTreeSet<String>,
    subscribers: BTreeMap<ChatId, Subscriber>,
    snapshot: Option<CurrentData>,
    offset: Option<i64>,
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    state: Arc<Mutex<StoreState>>,
}

impl LocalStorage {
    /// Open (or initialize) a store rooted at the given directory.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = Self {
            root_dir: root_dir.into(),
            state: Arc::new(Mutex::new(StoreState::default())),
        };
        tokio::fs::create_dir_all(&storage.root_dir).await?;

        let seen: SeenData = storage.read_json(SEEN_KEY).await?.unwrap_or_default();
        let subscribers: Vec<Subscriber> =
            storage.read_json(SUBSCRIBERS_KEY).await?.unwrap_or_default();
        let snapshot: Option<CurrentData> = storage.read_json(CURRENT_KEY).await?;
        let offset: Option<OffsetData> = storage.read_json(OFFSET_KEY).await?;

        log::debug!(
            "Opened store at {}: {} seen, {} subscribers",
            storage.root_dir.display(),
            seen.ids.len(),
            subscribers.len()
        );

        {
            let mut state = storage.state.lock().await;
            state.seen = seen.ids;
            state.subscribers = subscribers.into_iter().map(|s| (s.chat_id, s)).collect();
            state.snapshot = snapshot;
            state.offset = offset.map(|o| o.offset);
        }

        Ok(storage)
    }

    /// Directory holding the state files.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_seen(&self, ids: &BTreeSet<String>) -> Result<()> {
        let data = SeenData {
            updated_at: Some(Utc::now()),
            count: ids.len(),
            ids: ids.clone(),
        };
        self.write_json(SEEN_KEY, &data).await
    }

    /// Apply `f` to a copy of the subscriber map; persist and publish the
    /// copy when `f` reports a change.
    async fn update_subscribers<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<ChatId, Subscriber>) -> (T, bool) + Send,
        T: Send,
    {
        let mut state = self.state.lock().await;
        let mut next = state.subscribers.clone();
        let (out, changed) = f(&mut next);

        if changed {
            let records: Vec<&Subscriber> = next.values().collect();
            self.write_json(SUBSCRIBERS_KEY, &records).await?;
            state.subscribers = next;
        }
        Ok(out)
    }
}

/// Set `status`; returns whether anything changed. Reactivation clears the
/// failure counter.
fn transition(subscriber: &mut Subscriber, status: SubscriptionStatus) -> bool {
    if subscriber.status == status {
        return false;
    }
    subscriber.status = status;
    subscriber.updated_at = Utc::now();
    if status == SubscriptionStatus::Active {
        subscriber.consecutive_failures = 0;
        subscriber.last_error = None;
    }
    true
}

#[async_trait]
impl PostingStore for LocalStorage {
    async fn seen_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.state.lock().await.seen.clone())
    }

    async fn is_seen(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().await.seen.contains(id))
    }

    async fn mark_seen(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.seen.contains(id) {
            return Ok(false);
        }

        let mut next = state.seen.clone();
        next.insert(id.to_string());
        self.write_seen(&next).await?;
        state.seen = next;
        Ok(true)
    }

    async fn commit_seen(&self, ids: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        let mut next = state.seen.clone();
        let inserted: Vec<String> = ids
            .iter()
            .filter(|id| next.insert((*id).clone()))
            .cloned()
            .collect();

        if !inserted.is_empty() {
            self.write_seen(&next).await?;
            state.seen = next;
        }
        Ok(inserted)
    }

    async fn subscribe(&self, chat_id: ChatId) -> Result<(Subscriber, bool)> {
        self.update_subscribers(|subscribers| {
            let now = Utc::now();
            match subscribers.get_mut(&chat_id) {
                Some(existing) if existing.is_active() => ((existing.clone(), true), false),
                Some(existing) => {
                    existing.status = SubscriptionStatus::Active;
                    existing.consecutive_failures = 0;
                    existing.last_error = None;
                    existing.updated_at = now;
                    ((existing.clone(), false), true)
                }
                None => {
                    let subscriber = Subscriber::new(chat_id);
                    subscribers.insert(chat_id, subscriber.clone());
                    ((subscriber, false), true)
                }
            }
        })
        .await
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscriber>> {
        self.update_subscribers(|subscribers| match subscribers.get_mut(&chat_id) {
            Some(existing) => {
                let changed = transition(existing, status);
                (Some(existing.clone()), changed)
            }
            None => (None, false),
        })
        .await
    }

    async fn set_status_if(
        &self,
        chat_id: ChatId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> Result<Option<SubscriptionStatus>> {
        self.update_subscribers(|subscribers| match subscribers.get_mut(&chat_id) {
            Some(existing) => {
                let before = existing.status;
                let changed = from.contains(&before) && transition(existing, to);
                (Some(before), changed)
            }
            None => (None, false),
        })
        .await
    }

    async fn subscriber(&self, chat_id: ChatId) -> Result<Option<Subscriber>> {
        Ok(self.state.lock().await.subscribers.get(&chat_id).cloned())
    }

    async fn subscribers(&self) -> Result<Vec<Subscriber>> {
        Ok(self
            .state
            .lock()
            .await
            .subscribers
            .values()
            .cloned()
            .collect())
    }

    async fn record_failure(
        &self,
        chat_id: ChatId,
        reason: &str,
        counts_toward_gone: bool,
    ) -> Result<u32> {
        self.update_subscribers(|subscribers| match subscribers.get_mut(&chat_id) {
            Some(existing) => {
                if counts_toward_gone {
                    existing.consecutive_failures += 1;
                }
                existing.last_error = Some(reason.to_string());
                existing.updated_at = Utc::now();
                (existing.consecutive_failures, true)
            }
            None => (0, false),
        })
        .await
    }

    async fn reset_failures(&self, chat_id: ChatId) -> Result<()> {
        self.update_subscribers(|subscribers| match subscribers.get_mut(&chat_id) {
            Some(existing) if existing.consecutive_failures > 0 || existing.last_error.is_some() => {
                existing.consecutive_failures = 0;
                existing.last_error = None;
                existing.updated_at = Utc::now();
                ((), true)
            }
            _ => ((), false),
        })
        .await
    }

    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        // Serialize appenders with the rest of the state.
        let _state = self.state.lock().await;
        let path = self.path(DELIVERIES_KEY);
        self.ensure_dir(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }

    async fn deliveries_for(&self, posting_id: &str) -> Result<Vec<DeliveryRecord>> {
        let _state = self.state.lock().await;
        let Some(bytes) = self.read_bytes(DELIVERIES_KEY).await? else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for line in String::from_utf8_lossy(&bytes).lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DeliveryRecord>(line) {
                Ok(record) if record.posting_id == posting_id => records.push(record),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping malformed delivery record: {}", e),
            }
        }
        Ok(records)
    }

    async fn save_snapshot(&self, postings: &[Posting]) -> Result<()> {
        let mut state = self.state.lock().await;
        let data = CurrentData::new(postings.to_vec());
        self.write_json(CURRENT_KEY, &data).await?;
        log::debug!("Snapshot: {} postings written to {}", data.count, CURRENT_KEY);
        state.snapshot = Some(data);
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<CurrentData>> {
        Ok(self.state.lock().await.snapshot.clone())
    }

    async fn load_offset(&self) -> Result<Option<i64>> {
        Ok(self.state.lock().await.offset)
    }

    async fn save_offset(&self, offset: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.offset == Some(offset) {
            return Ok(());
        }
        self.write_json(OFFSET_KEY, &OffsetData { offset }).await?;
        state.offset = Some(offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryStatus;
    use tempfile::TempDir;

    fn posting(id: &str) -> Posting {
        Posting::from_row(id, "Servicio de limpieza", "2026-03-01", "2026-03-10", "Vigente", None)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_mark_seen_is_check_and_insert() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        assert!(storage.mark_seen("p1").await.unwrap());
        assert!(!storage.mark_seen("p1").await.unwrap());
        assert!(storage.is_seen("p1").await.unwrap());
        assert!(!storage.is_seen("p2").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_status_if_only_from_listed_states() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();
        storage.subscribe(100).await.unwrap();
        storage
            .set_status(100, SubscriptionStatus::Unsubscribed)
            .await
            .unwrap();

        let before = storage
            .set_status_if(100, &[SubscriptionStatus::Active], SubscriptionStatus::Gone)
            .await
            .unwrap();
        assert_eq!(before, Some(SubscriptionStatus::Unsubscribed));
        assert_eq!(
            storage.subscriber(100).await.unwrap().unwrap().status,
            SubscriptionStatus::Unsubscribed
        );

        let before = storage
            .set_status_if(
                100,
                &[SubscriptionStatus::Unsubscribed],
                SubscriptionStatus::Paused,
            )
            .await
            .unwrap();
        assert_eq!(before, Some(SubscriptionStatus::Unsubscribed));
        assert_eq!(
            storage.subscriber(100).await.unwrap().unwrap().status,
            SubscriptionStatus::Paused
        );

        assert!(
            storage
                .set_status_if(999, &[SubscriptionStatus::Active], SubscriptionStatus::Paused)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_mark_seen_inserts_once() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move { storage.mark_seen("p1").await.unwrap() }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn test_commit_seen_returns_new_ids_and_persists() {
        let tmp = TempDir::new().unwrap();
        {
            let storage = LocalStorage::open(tmp.path()).await.unwrap();
            storage.mark_seen("p1").await.unwrap();
            let inserted = storage
                .commit_seen(&["p1".to_string(), "p2".to_string(), "p3".to_string()])
                .await
                .unwrap();
            assert_eq!(inserted, vec!["p2".to_string(), "p3".to_string()]);
        }

        let reopened = LocalStorage::open(tmp.path()).await.unwrap();
        let seen = reopened.seen_ids().await.unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains("p2"));
    }

    #[tokio::test]
    async fn test_subscriber_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        let (sub, was_active) = storage.subscribe(100).await.unwrap();
        assert!(!was_active);
        assert!(sub.is_active());

        let (_, was_active) = storage.subscribe(100).await.unwrap();
        assert!(was_active);

        storage.subscribe(200).await.unwrap();
        storage
            .set_status(100, SubscriptionStatus::Paused)
            .await
            .unwrap();

        let active: Vec<ChatId> = storage
            .active_subscribers()
            .await
            .unwrap()
            .iter()
            .map(|s| s.chat_id)
            .collect();
        assert_eq!(active, vec![200]);

        // Unknown chats are not created by status changes.
        assert!(
            storage
                .set_status(999, SubscriptionStatus::Paused)
                .await
                .unwrap()
                .is_none()
        );

        // Records survive a restart.
        let reopened = LocalStorage::open(tmp.path()).await.unwrap();
        let paused = reopened.subscriber(100).await.unwrap().unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
        assert_eq!(reopened.subscribers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_counter() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();
        storage.subscribe(7).await.unwrap();

        assert_eq!(storage.record_failure(7, "blocked", true).await.unwrap(), 1);
        assert_eq!(storage.record_failure(7, "timeout", false).await.unwrap(), 1);
        assert_eq!(storage.record_failure(7, "blocked", true).await.unwrap(), 2);

        storage.reset_failures(7).await.unwrap();
        let sub = storage.subscriber(7).await.unwrap().unwrap();
        assert_eq!(sub.consecutive_failures, 0);
        assert!(sub.last_error.is_none());

        // Resubscribing a gone subscriber clears its counter.
        storage.record_failure(7, "blocked", true).await.unwrap();
        storage.set_status(7, SubscriptionStatus::Gone).await.unwrap();
        let (sub, was_active) = storage.subscribe(7).await.unwrap();
        assert!(!was_active);
        assert_eq!(sub.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_delivery_log() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();

        let record = |posting_id: &str, chat_id, status| DeliveryRecord {
            posting_id: posting_id.to_string(),
            chat_id,
            status,
            reason: None,
            timestamp: Utc::now(),
        };

        storage
            .record_deliveries(&[
                record("1", 10, DeliveryStatus::Delivered),
                record("1", 11, DeliveryStatus::Failed),
            ])
            .await
            .unwrap();
        storage
            .record_deliveries(&[record("2", 10, DeliveryStatus::Delivered)])
            .await
            .unwrap();

        let first = storage.deliveries_for("1").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].status, DeliveryStatus::Failed);
        assert_eq!(storage.deliveries_for("2").await.unwrap().len(), 1);
        assert!(storage.deliveries_for("3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_and_find_posting() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();
        assert!(storage.find_posting("1").await.unwrap().is_none());

        storage
            .save_snapshot(&[posting("1"), posting("2")])
            .await
            .unwrap();

        let reopened = LocalStorage::open(tmp.path()).await.unwrap();
        let found = reopened.find_posting("2").await.unwrap().unwrap();
        assert_eq!(found.id, "2");
        assert_eq!(reopened.load_snapshot().await.unwrap().unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_offset_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path()).await.unwrap();
        assert_eq!(storage.load_offset().await.unwrap(), None);

        storage.save_offset(42).await.unwrap();
        let reopened = LocalStorage::open(tmp.path()).await.unwrap();
        assert_eq!(reopened.load_offset().await.unwrap(), Some(42));
    }
}
