//! Long-polling update loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::client::TelegramClient;
use super::commands::{BotEvent, CommandHandler};
use crate::error::Result;
use crate::storage::PostingStore;

/// Pause after a failed `getUpdates` call.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Poll for updates and hand each event to the handler until shutdown.
///
/// The update offset is persisted after every batch so a restart does not
/// replay handled updates.
pub async fn run_updates(
    client: Arc<TelegramClient>,
    handler: Arc<CommandHandler>,
    store: Arc<dyn PostingStore>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut offset = store.load_offset().await?;
    log::info!("Update loop started (offset: {:?})", offset);

    while !*shutdown.borrow() {
        let updates = tokio::select! {
            _ = shutdown.changed() => break,
            updates = client.get_updates(offset) => updates,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("Polling failed: {}", e);
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => continue,
                }
            }
        };

        if updates.is_empty() {
            continue;
        }

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(event) = BotEvent::from_update(update) else {
                continue;
            };

            if let BotEvent::Button { callback_id, .. } = &event {
                if let Err(e) = client.answer_callback(callback_id).await {
                    log::debug!("Callback answer failed: {}", e);
                }
            }

            route(&handler, event).await;
        }

        if let Some(next) = offset {
            save_offset(store.as_ref(), next).await;
        }
    }

    log::info!("Update loop stopped");
    Ok(())
}

/// Persist the next offset. Failures are logged, never fatal.
async fn save_offset(store: &dyn PostingStore, offset: i64) {
    if let Err(e) = store.save_offset(offset).await {
        log::warn!("Saving update offset {} failed: {}", offset, e);
    }
}

/// Handle subscription changes inline, in arrival order; hand slow events
/// (listing fetches, file uploads) to their own task.
async fn route(handler: &Arc<CommandHandler>, event: BotEvent) {
    if event.is_slow() {
        let handler = Arc::clone(handler);
        tokio::spawn(async move { handle_logged(&handler, event).await });
    } else {
        handle_logged(handler, event).await;
    }
}

async fn handle_logged(handler: &CommandHandler, event: BotEvent) {
    let chat_id = event.chat_id();
    if let Err(e) = handler.handle(event).await {
        log::error!("Handling event from chat {} failed: {}", chat_id, e);
    }
}
