//! Application wiring.
//!
//! Builds the store, the listing fetcher, the renderer and the bot client
//! from configuration and runs the scheduler next to the update loop.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;
use crate::models::{Config, CycleReport, LocaleConfig, Posting};
use crate::pipeline::{CycleRunner, Dispatcher, Scheduler, new_postings};
use crate::services::{HttpDownloader, ListingFetcher, PostingRenderer, PostingSource};
use crate::storage::{LocalStorage, PostingStore};
use crate::telegram::{self, Command, CommandHandler, TelegramClient};
use crate::utils::http::create_async_client;

/// Long-lived collaborators shared by every command.
pub struct App {
    config: Config,
    locale: LocaleConfig,
    store: Arc<LocalStorage>,
    source: Arc<dyn PostingSource>,
    client: reqwest::Client,
}

impl App {
    /// Open the store and build the listing fetcher.
    pub async fn open(storage_dir: &Path, config: Config, locale: LocaleConfig) -> Result<Self> {
        let store = Arc::new(LocalStorage::open(storage_dir).await?);
        let client = create_async_client(&config.source)?;
        let source = Arc::new(ListingFetcher::new(
            config.source.clone(),
            client.clone(),
            config.retry.policy(),
        ));
        Ok(Self::from_parts(config, locale, store, source, client))
    }

    fn from_parts(
        config: Config,
        locale: LocaleConfig,
        store: Arc<LocalStorage>,
        source: Arc<dyn PostingSource>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            locale,
            store,
            source,
            client,
        }
    }

    pub fn store(&self) -> &Arc<LocalStorage> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current postings, filtered by status.
    pub async fn current(&self) -> Result<Vec<Posting>> {
        let postings = self.source.fetch().await?;
        Ok(postings
            .into_iter()
            .filter(|p| p.matches_status(&self.config.source.status_filter))
            .collect())
    }

    /// Postings the next cycle would notify. Changes no state.
    pub async fn pending(&self) -> Result<Vec<Posting>> {
        let current = self.current().await?;
        let seen = self.store.seen_ids().await?;
        Ok(new_postings(&current, &seen))
    }

    /// Mark every current posting as seen without notifying anyone.
    /// Returns the ids that were not seen before.
    pub async fn seed(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = self.current().await?.into_iter().map(|p| p.id).collect();
        self.store.commit_seen(&ids).await
    }

    /// Run a single cycle against Telegram.
    pub async fn run_cycle(&self, token: &str) -> Result<CycleReport> {
        let client = self.telegram_client(token)?;
        let runner = self.cycle_runner(client);
        let (_tx, rx) = watch::channel(false);
        runner.run_once(&rx).await
    }

    /// Run the scheduler and the bot until shutdown.
    pub async fn run(&self, token: &str, shutdown: watch::Receiver<bool>) -> Result<()> {
        let client = self.telegram_client(token)?;

        if let Err(e) = client
            .set_commands(&Command::menu(&self.locale.commands))
            .await
        {
            log::warn!("Registering bot commands failed: {}", e);
        }

        let runner = Arc::new(self.cycle_runner(Arc::clone(&client)));
        let scheduler = Scheduler::new(runner, self.config.scheduler.interval());
        let scheduler_shutdown = shutdown.clone();
        let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

        let handler = Arc::new(CommandHandler::new(
            self.store.clone(),
            Arc::clone(&self.source),
            Arc::new(PostingRenderer::new(self.locale.notification.clone())),
            client.clone(),
            Arc::new(HttpDownloader::new(self.client.clone(), self.config.retry.policy())),
            self.locale.messages.clone(),
            self.config.source.status_filter.clone(),
        ));

        let updates = telegram::run_updates(client, handler, self.store.clone(), shutdown).await;

        if updates.is_err() {
            scheduler_task.abort();
        } else if let Err(e) = scheduler_task.await {
            log::error!("Scheduler task failed: {}", e);
        }
        updates
    }

    fn telegram_client(&self, token: &str) -> Result<Arc<TelegramClient>> {
        Ok(Arc::new(TelegramClient::new(
            &self.config.telegram,
            token,
            self.config.retry.policy(),
        )?))
    }

    fn cycle_runner(&self, client: Arc<TelegramClient>) -> CycleRunner {
        let dispatcher = Dispatcher::new(
            Arc::new(PostingRenderer::new(self.locale.notification.clone())),
            client,
            self.store.clone(),
            self.config.dispatch.clone(),
        );
        CycleRunner::new(
            Arc::clone(&self.source),
            self.store.clone(),
            dispatcher,
            self.config.source.status_filter.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticSource, posting, temp_store};

    async fn app(postings: Vec<Posting>) -> (tempfile::TempDir, App) {
        let (dir, store) = temp_store().await;
        let app = App::from_parts(
            Config::default(),
            LocaleConfig::default(),
            Arc::new(store),
            Arc::new(StaticSource::new(postings)),
            reqwest::Client::new(),
        );
        (dir, app)
    }

    #[tokio::test]
    async fn test_seed_then_nothing_pending() {
        let (_dir, app) = app(vec![
            posting("1", "2026-03-01 08:00:00"),
            posting("2", "2026-03-02 08:00:00"),
        ])
        .await;

        assert_eq!(app.pending().await.unwrap().len(), 2);
        assert_eq!(app.seed().await.unwrap(), vec!["1", "2"]);
        assert!(app.pending().await.unwrap().is_empty());
        assert!(app.seed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_current_applies_status_filter() {
        let mut closed = posting("2", "2026-03-02 08:00:00");
        closed.status = "Culminado".to_string();
        let (_dir, app) = app(vec![posting("1", "2026-03-01 08:00:00"), closed]).await;

        let current = app.current().await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, "1");
    }
}
