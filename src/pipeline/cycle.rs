//! Fetch, diff, dispatch and commit.
//!
//! One cycle at a time: the runner holds a guard for the whole pass and a
//! second caller gets [`AppError::CycleInProgress`]. A posting's id enters
//! the seen set only after its dispatch pass completes, so a crash mid-pass
//! means the posting is sent again next cycle rather than lost.

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::{Mutex, watch};

use super::diff::new_postings;
use super::dispatch::Dispatcher;
use crate::error::{AppError, Result};
use crate::models::{CycleReport, DeliveryReport, Notification, Posting};
use crate::services::PostingSource;
use crate::storage::PostingStore;

/// Runs notification cycles.
pub struct CycleRunner {
    source: Arc<dyn PostingSource>,
    store: Arc<dyn PostingStore>,
    dispatcher: Dispatcher,
    status_filter: String,
    guard: Mutex<()>,
}

impl CycleRunner {
    pub fn new(
        source: Arc<dyn PostingSource>,
        store: Arc<dyn PostingStore>,
        dispatcher: Dispatcher,
        status_filter: String,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            status_filter,
            guard: Mutex::new(()),
        }
    }

    /// Run one pass.
    ///
    /// A fetch failure aborts the cycle with no state change. Render and
    /// per-posting storage failures skip that posting, which stays unseen.
    /// `cancel` is checked between postings, never during one.
    pub async fn run_once(&self, cancel: &watch::Receiver<bool>) -> Result<CycleReport> {
        let _guard = self
            .guard
            .try_lock()
            .map_err(|_| AppError::CycleInProgress)?;

        let mut report = CycleReport {
            started_at: Some(Utc::now()),
            ..CycleReport::default()
        };

        let fresh = self.detect(&mut report).await?;
        let now = Local::now().naive_local();

        for posting in fresh {
            if *cancel.borrow() {
                log::info!("Cycle cancelled before posting {}", posting.id);
                report.cancelled = true;
                break;
            }

            let notification = match self.dispatcher.render(&posting, now) {
                Ok(notification) => notification,
                Err(e) => {
                    log::error!("{}", e);
                    report.render_failed.push(posting.id.clone());
                    continue;
                }
            };

            match self.dispatch_and_commit(&posting, &notification).await {
                Ok((delivery, committed)) => {
                    report.reports.push(delivery);
                    report.committed.extend(committed);
                }
                Err(e) => {
                    log::error!("Dispatch of posting {} failed: {}", posting.id, e);
                    report.errored.push((posting.id.clone(), e.to_string()));
                }
            }
        }

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    /// Fetch, filter and diff. Updates the listing snapshot.
    async fn detect(&self, report: &mut CycleReport) -> Result<Vec<Posting>> {
        let fetched = self.source.fetch().await?;
        report.fetched = fetched.len();
        self.store.save_snapshot(&fetched).await?;

        let considered = self.considered(fetched);
        report.considered = considered.len();

        let seen = self.store.seen_ids().await?;
        let fresh = new_postings(&considered, &seen);
        report.new = fresh.len();

        log::info!(
            "Fetched {} postings, {} considered, {} new",
            report.fetched,
            report.considered,
            report.new
        );
        Ok(fresh)
    }

    fn considered(&self, postings: Vec<Posting>) -> Vec<Posting> {
        postings
            .into_iter()
            .filter(|p| p.matches_status(&self.status_filter))
            .collect()
    }

    async fn dispatch_and_commit(
        &self,
        posting: &Posting,
        notification: &Notification,
    ) -> Result<(DeliveryReport, Vec<String>)> {
        // Re-read per posting so subscription changes apply from the next one
        let subscribers = self.store.active_subscribers().await?;
        let delivery = self.dispatcher.dispatch(notification, &subscribers).await?;
        let committed = self.store.commit_seen(&[posting.id.clone()]).await?;
        Ok((delivery, committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryError, DispatchConfig};
    use crate::services::{PostingRenderer, Renderer};
    use crate::storage::LocalStorage;
    use crate::telegram::BotTransport;
    use crate::testing::{
        FailingRenderer, FlakyStore, RecordingTransport, StaticSource, posting, temp_store,
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<LocalStorage>,
        source: Arc<StaticSource>,
        transport: Arc<RecordingTransport>,
        runner: CycleRunner,
        cancel_tx: watch::Sender<bool>,
        cancel: watch::Receiver<bool>,
    }

    async fn fixture_with(renderer: Arc<dyn Renderer>, config: DispatchConfig, postings: Vec<Posting>) -> Fixture {
        let (dir, store) = temp_store().await;
        let store = Arc::new(store);
        store.subscribe(1).await.unwrap();
        store.subscribe(2).await.unwrap();

        let source = Arc::new(StaticSource::new(postings));
        let transport = Arc::new(RecordingTransport::default());
        let transport_dyn: Arc<dyn BotTransport> = transport.clone();
        let dispatcher = Dispatcher::new(renderer, transport_dyn, store.clone(), config);
        let runner = CycleRunner::new(source.clone(), store.clone(), dispatcher, "Vigente".to_string());
        let (cancel_tx, cancel) = watch::channel(false);

        Fixture {
            _dir: dir,
            store,
            source,
            transport,
            runner,
            cancel_tx,
            cancel,
        }
    }

    async fn fixture(postings: Vec<Posting>) -> Fixture {
        fixture_with(
            Arc::new(PostingRenderer::default()),
            DispatchConfig::default(),
            postings,
        )
        .await
    }

    #[tokio::test]
    async fn test_first_cycle_notifies_and_commits() {
        let f = fixture(vec![
            posting("p3", "2026-03-02 08:00:00"),
            posting("p1", "2026-03-01 08:00:00"),
            posting("p2", "2026-03-02 08:00:00"),
        ])
        .await;

        let report = f.runner.run_once(&f.cancel).await.unwrap();

        assert_eq!(report.new, 3);
        assert_eq!(report.committed, vec!["p1", "p2", "p3"]);
        assert_eq!(report.delivered(), 6);
        let order: Vec<&str> = report.reports.iter().map(|r| r.posting_id.as_str()).collect();
        assert_eq!(order, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_second_cycle_is_quiet() {
        let f = fixture(vec![posting("1", "2026-03-01 08:00:00")]).await;

        f.runner.run_once(&f.cancel).await.unwrap();
        let report = f.runner.run_once(&f.cancel).await.unwrap();

        assert_eq!(report.new, 0);
        assert!(report.reports.is_empty());
        assert_eq!(f.transport.texts_for(1).len(), 1);
    }

    #[tokio::test]
    async fn test_new_posting_in_later_cycle() {
        let f = fixture(vec![posting("p1", "2026-03-01 08:00:00")]).await;
        f.runner.run_once(&f.cancel).await.unwrap();

        f.source.set(vec![
            posting("p1", "2026-03-01 08:00:00"),
            posting("p2", "2026-03-02 08:00:00"),
            posting("p3", "2026-03-02 08:00:00"),
        ]);
        let report = f.runner.run_once(&f.cancel).await.unwrap();
        assert_eq!(report.committed, vec!["p2", "p3"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_changes_nothing() {
        let f = fixture(vec![posting("1", "2026-03-01 08:00:00")]).await;
        f.source.fail("connection reset");

        let result = f.runner.run_once(&f.cancel).await;

        assert!(matches!(result, Err(AppError::FetchFailed(_))));
        assert!(f.store.seen_ids().await.unwrap().is_empty());
        assert_eq!(f.transport.message_count(), 0);
    }

    #[tokio::test]
    async fn test_render_failure_retried_next_cycle() {
        let config = DispatchConfig {
            attach_summary: true,
            ..DispatchConfig::default()
        };
        let f = fixture_with(
            Arc::new(FailingRenderer::new(&["bad"])),
            config,
            vec![
                posting("bad", "2026-03-01 08:00:00"),
                posting("ok", "2026-03-02 08:00:00"),
            ],
        )
        .await;

        let report = f.runner.run_once(&f.cancel).await.unwrap();
        assert_eq!(report.render_failed, vec!["bad"]);
        assert_eq!(report.committed, vec!["ok"]);
        assert!(report.reports.iter().all(|r| r.posting_id != "bad"));
        assert!(!f.store.is_seen("bad").await.unwrap());

        let again = f.runner.run_once(&f.cancel).await.unwrap();
        assert_eq!(again.new, 1);
        assert_eq!(again.render_failed, vec!["bad"]);
    }

    #[tokio::test]
    async fn test_failed_deliveries_still_commit() {
        let f = fixture(vec![posting("1", "2026-03-01 08:00:00")]).await;
        f.transport
            .fail_for(2, DeliveryError::gone("Forbidden: user is deactivated"));

        let report = f.runner.run_once(&f.cancel).await.unwrap();

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        assert!(f.store.is_seen("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_interrupted_pass_is_redelivered() {
        let (_dir, store) = temp_store().await;
        let store = Arc::new(FlakyStore::new(store));
        store.subscribe(1).await.unwrap();
        store.subscribe(2).await.unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(
            Arc::new(PostingRenderer::default()),
            transport.clone(),
            store.clone(),
            DispatchConfig::default(),
        );
        let runner = CycleRunner::new(
            Arc::new(StaticSource::new(vec![posting("7", "2026-03-01 08:00:00")])),
            store.clone(),
            dispatcher,
            "Vigente".to_string(),
        );
        let (_tx, cancel) = watch::channel(false);

        // Messages go out, then the audit write fails before the commit.
        store.fail_deliveries(true);
        let report = runner.run_once(&cancel).await.unwrap();
        assert_eq!(transport.message_count(), 2);
        assert_eq!(report.errored.len(), 1);
        assert_eq!(report.errored[0].0, "7");
        assert!(report.committed.is_empty());
        assert!(!store.is_seen("7").await.unwrap());

        store.fail_deliveries(false);
        let again = runner.run_once(&cancel).await.unwrap();
        assert_eq!(again.new, 1);
        assert_eq!(again.committed, vec!["7"]);
        assert_eq!(transport.texts_for(1).len(), 2);
    }

    #[tokio::test]
    async fn test_status_filter_applies() {
        let mut closed = posting("2", "2026-03-02 08:00:00");
        closed.status = "Culminado".to_string();
        let f = fixture(vec![posting("1", "2026-03-01 08:00:00"), closed]).await;

        let report = f.runner.run_once(&f.cancel).await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.considered, 1);
        assert_eq!(report.committed, vec!["1"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_postings() {
        let f = fixture(vec![
            posting("1", "2026-03-01 08:00:00"),
            posting("2", "2026-03-02 08:00:00"),
        ])
        .await;
        f.cancel_tx.send(true).unwrap();

        let report = f.runner.run_once(&f.cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.new, 2);
        assert!(report.committed.is_empty());
        assert_eq!(f.transport.message_count(), 0);
    }

    #[tokio::test]
    async fn test_cycles_are_serialized() {
        let f = fixture(vec![posting("1", "2026-03-01 08:00:00")]).await;
        let _held = f.runner.guard.lock().await;

        let result = f.runner.run_once(&f.cancel).await;
        assert!(matches!(result, Err(AppError::CycleInProgress)));
    }
}
