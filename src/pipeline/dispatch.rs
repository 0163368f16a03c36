//! Notification fan-out.
//!
//! A posting is rendered once, then delivered to every active subscriber
//! through a bounded pool. Each delivery is isolated: a failure only affects
//! that subscriber's record. Bookkeeping (failure counters, deactivation and
//! the audit log) runs after the pool drains.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{
    ChatId, DeliveryError, DeliveryFailureKind, DeliveryRecord, DeliveryReport, DeliveryResult,
    DeliveryStatus, DispatchConfig, FailedDelivery, Notification, Posting, Subscriber,
    SubscriptionStatus,
};
use crate::services::Renderer;
use crate::storage::PostingStore;
use crate::telegram::BotTransport;

/// Renders postings and delivers them to subscribers.
pub struct Dispatcher {
    renderer: Arc<dyn Renderer>,
    transport: Arc<dyn BotTransport>,
    store: Arc<dyn PostingStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        transport: Arc<dyn BotTransport>,
        store: Arc<dyn PostingStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            renderer,
            transport,
            store,
            config,
        }
    }

    /// Render the notification for a posting.
    ///
    /// Fails with [`AppError::RenderFailed`] when a configured attachment
    /// cannot be produced.
    pub fn render(&self, posting: &Posting, now: NaiveDateTime) -> Result<Notification> {
        let message = self.renderer.render_announcement(posting, now);
        let mut attachments = Vec::new();

        if self.config.attach_summary {
            let summary = self
                .renderer
                .render_summary(posting, now)
                .map_err(|e| as_render_failure(posting, e))?;
            attachments.push(summary);
        }

        if self.config.attach_calendar {
            let calendar = self
                .renderer
                .render_calendar(posting)
                .map_err(|e| as_render_failure(posting, e))?;
            attachments.extend(calendar);
        }

        Ok(Notification {
            posting_id: posting.id.clone(),
            message,
            attachments,
        })
    }

    /// Deliver a notification to each subscriber and record the outcomes.
    ///
    /// Delivery failures never fail the pass; only storage errors do.
    pub async fn dispatch(
        &self,
        notification: &Notification,
        subscribers: &[Subscriber],
    ) -> Result<DeliveryReport> {
        let timeout = self.config.delivery_timeout();
        let shared = Arc::new(notification.clone());

        // Futures own their handles and borrow nothing from `self`.
        let deliveries: Vec<_> = subscribers
            .iter()
            .map(|subscriber| {
                let chat_id = subscriber.chat_id;
                let transport = Arc::clone(&self.transport);
                let notification = Arc::clone(&shared);
                async move {
                    let result =
                        tokio::time::timeout(timeout, deliver(transport, chat_id, notification))
                            .await
                            .unwrap_or_else(|_| {
                                Err(DeliveryError::transient(format!(
                                    "timed out after {timeout:?}"
                                )))
                            });
                    (chat_id, result)
                }
            })
            .collect();

        let mut outcomes: Vec<(ChatId, DeliveryResult)> = stream::iter(deliveries)
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(chat_id, _)| *chat_id);

        let mut report = DeliveryReport {
            posting_id: notification.posting_id.clone(),
            ..DeliveryReport::default()
        };
        let mut records = Vec::with_capacity(outcomes.len());

        for (chat_id, result) in outcomes {
            let (status, reason) = match result {
                Ok(()) => {
                    self.store.reset_failures(chat_id).await?;
                    report.delivered += 1;
                    (DeliveryStatus::Delivered, None)
                }
                Err(e) => {
                    let status = self.record_failure(chat_id, &e, &mut report).await?;
                    report.failed.push(FailedDelivery {
                        chat_id,
                        kind: e.kind,
                        reason: e.reason.clone(),
                    });
                    (status, Some(e.reason))
                }
            };
            records.push(DeliveryRecord {
                posting_id: notification.posting_id.clone(),
                chat_id,
                status,
                reason,
                timestamp: Utc::now(),
            });
        }

        self.store.record_deliveries(&records).await?;

        log::info!(
            "Posting {}: delivered {}/{}, {} failed, {} deactivated",
            report.posting_id,
            report.delivered,
            report.attempted(),
            report.failed.len(),
            report.deactivated.len()
        );
        Ok(report)
    }

    /// Count a failure and deactivate the subscriber once the chat has been
    /// gone `gone_threshold` times in a row.
    async fn record_failure(
        &self,
        chat_id: ChatId,
        error: &DeliveryError,
        report: &mut DeliveryReport,
    ) -> Result<DeliveryStatus> {
        let gone = error.kind == DeliveryFailureKind::Gone;
        let failures = self
            .store
            .record_failure(chat_id, &error.reason, gone)
            .await?;

        log::warn!(
            "Delivery of {} to {} failed ({:?}, {} in a row): {}",
            report.posting_id,
            chat_id,
            error.kind,
            failures,
            error.reason
        );

        if !gone || failures < self.config.gone_threshold {
            return Ok(DeliveryStatus::Failed);
        }

        // Only active subscribers are deactivated; a concurrent /unsubscribe wins.
        let before = self
            .store
            .set_status_if(chat_id, &[SubscriptionStatus::Active], SubscriptionStatus::Gone)
            .await?;
        if before == Some(SubscriptionStatus::Active) {
            report.deactivated.push(chat_id);
            log::warn!("Subscriber {} deactivated after {} failures", chat_id, failures);
        }
        Ok(DeliveryStatus::Gone)
    }
}

fn as_render_failure(posting: &Posting, error: AppError) -> AppError {
    match error {
        AppError::RenderFailed { .. } => error,
        other => AppError::render_failed(&posting.id, other),
    }
}

/// Send the message, then each attachment, stopping at the first failure.
async fn deliver(
    transport: Arc<dyn BotTransport>,
    chat_id: ChatId,
    notification: Arc<Notification>,
) -> DeliveryResult {
    transport.send_message(chat_id, &notification.message).await?;
    for artifact in &notification.attachments {
        transport.send_file(chat_id, artifact).await?;
    }
    Ok(())
}
