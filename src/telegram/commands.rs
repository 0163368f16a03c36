//! Bot commands and button handling.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

use super::BotTransport;
use super::types::{BotCommand, Update};
use crate::error::Result;
use crate::models::{
    Artifact, ButtonAction, ChatId, CommandLocale, MessageLocale, MessagePayload, Posting,
    SubscriptionStatus,
};
use crate::services::{OriginalSource, PostingSource, Renderer};
use crate::storage::PostingStore;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Welcome message.
    Start,
    /// List the available commands.
    Help,
    /// Show current postings.
    Current,
    /// Start receiving notifications.
    Subscribe,
    /// Stop receiving notifications.
    Unsubscribe,
    /// Mute notifications without leaving.
    Pause,
    /// Unmute notifications.
    Resume,
    /// Show the subscription state.
    Status,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Start,
        Command::Help,
        Command::Current,
        Command::Subscribe,
        Command::Unsubscribe,
        Command::Pause,
        Command::Resume,
        Command::Status,
    ];

    /// Command name as typed after the slash.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Current => "vigentes",
            Command::Subscribe => "subscribe",
            Command::Unsubscribe => "unsubscribe",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Status => "estado",
        }
    }

    /// Parses a command from a message text.
    ///
    /// Accepts a `@botname` suffix. Returns `None` for plain text and
    /// unknown commands.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|cmd| cmd.name() == name)
    }

    /// Menu entries for `setMyCommands`.
    pub fn menu(locale: &CommandLocale) -> Vec<BotCommand> {
        Self::ALL
            .iter()
            .map(|cmd| BotCommand {
                command: cmd.name().to_string(),
                description: cmd.description(locale).to_string(),
            })
            .collect()
    }

    fn description<'a>(&self, locale: &'a CommandLocale) -> &'a str {
        match self {
            Command::Start => &locale.start,
            Command::Help => &locale.help,
            Command::Current => &locale.current,
            Command::Subscribe => &locale.subscribe,
            Command::Unsubscribe => &locale.unsubscribe,
            Command::Pause => &locale.pause,
            Command::Resume => &locale.resume,
            Command::Status => &locale.status,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Something a user did that the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Command {
        chat_id: ChatId,
        command: Command,
    },
    /// Plain text, echoed back.
    Text { chat_id: ChatId, text: String },
    /// Inline button press.
    Button {
        chat_id: ChatId,
        callback_id: String,
        action: ButtonAction,
        posting_id: String,
    },
}

impl BotEvent {
    /// Interpret an update. Unknown commands and buttons yield `None`.
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(query) = update.callback_query {
            let chat_id = query.message.map_or(query.from.id, |m| m.chat.id);
            let (action, posting_id) = ButtonAction::parse(query.data.as_deref()?)?;
            return Some(BotEvent::Button {
                chat_id,
                callback_id: query.id,
                action,
                posting_id,
            });
        }

        let message = update.message?;
        let text = message.text?;
        if text.trim_start().starts_with('/') {
            return Command::parse(&text).map(|command| BotEvent::Command {
                chat_id: message.chat.id,
                command,
            });
        }
        Some(BotEvent::Text {
            chat_id: message.chat.id,
            text,
        })
    }

    /// Events that fetch the listing or upload files. Everything else only
    /// touches subscriber records and must be applied in arrival order.
    pub fn is_slow(&self) -> bool {
        matches!(
            self,
            BotEvent::Button { .. }
                | BotEvent::Command {
                    command: Command::Current,
                    ..
                }
        )
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            BotEvent::Command { chat_id, .. }
            | BotEvent::Text { chat_id, .. }
            | BotEvent::Button { chat_id, .. } => *chat_id,
        }
    }
}

/// Handles bot events against the store and the listing.
pub struct CommandHandler {
    store: Arc<dyn PostingStore>,
    source: Arc<dyn PostingSource>,
    renderer: Arc<dyn Renderer>,
    transport: Arc<dyn BotTransport>,
    downloader: Arc<dyn OriginalSource>,
    messages: MessageLocale,
    status_filter: String,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn PostingStore>,
        source: Arc<dyn PostingSource>,
        renderer: Arc<dyn Renderer>,
        transport: Arc<dyn BotTransport>,
        downloader: Arc<dyn OriginalSource>,
        messages: MessageLocale,
        status_filter: String,
    ) -> Self {
        Self {
            store,
            source,
            renderer,
            transport,
            downloader,
            messages,
            status_filter,
        }
    }

    /// Handle one event. Reply failures are logged, storage errors returned.
    pub async fn handle(&self, event: BotEvent) -> Result<()> {
        log::debug!("Handling event: {:?}", event);
        match event {
            BotEvent::Command { chat_id, command } => self.execute(chat_id, command).await,
            BotEvent::Text { chat_id, text } => {
                self.reply(chat_id, MessagePayload::text(html_escape::encode_text(&text)))
                    .await;
                Ok(())
            }
            BotEvent::Button {
                chat_id,
                action,
                posting_id,
                ..
            } => self.handle_button(chat_id, action, &posting_id).await,
        }
    }

    async fn execute(&self, chat_id: ChatId, command: Command) -> Result<()> {
        log::info!("{} from chat {}", command, chat_id);
        match command {
            Command::Start => self.reply_text(chat_id, &self.messages.welcome).await,
            Command::Help => self.reply_text(chat_id, &self.messages.help).await,
            Command::Current => self.handle_current(chat_id).await?,
            Command::Subscribe => {
                let (_, was_active) = self.store.subscribe(chat_id).await?;
                let text = if was_active {
                    &self.messages.already_subscribed
                } else {
                    &self.messages.subscribed
                };
                self.reply_text(chat_id, text).await;
            }
            Command::Unsubscribe => {
                let before = self
                    .store
                    .set_status_if(
                        chat_id,
                        &[
                            SubscriptionStatus::Active,
                            SubscriptionStatus::Paused,
                            SubscriptionStatus::Gone,
                        ],
                        SubscriptionStatus::Unsubscribed,
                    )
                    .await?;
                let text = match before {
                    Some(SubscriptionStatus::Unsubscribed) | None => &self.messages.not_subscribed,
                    Some(_) => &self.messages.unsubscribed,
                };
                self.reply_text(chat_id, text).await;
            }
            Command::Pause => {
                let before = self
                    .store
                    .set_status_if(
                        chat_id,
                        &[SubscriptionStatus::Active],
                        SubscriptionStatus::Paused,
                    )
                    .await?;
                let text = match before {
                    Some(SubscriptionStatus::Active | SubscriptionStatus::Paused) => {
                        &self.messages.paused
                    }
                    _ => &self.messages.not_subscribed,
                };
                self.reply_text(chat_id, text).await;
            }
            Command::Resume => {
                let before = self
                    .store
                    .set_status_if(
                        chat_id,
                        &[SubscriptionStatus::Paused, SubscriptionStatus::Gone],
                        SubscriptionStatus::Active,
                    )
                    .await?;
                let text = match before {
                    Some(SubscriptionStatus::Active) => &self.messages.already_subscribed,
                    Some(SubscriptionStatus::Paused | SubscriptionStatus::Gone) => {
                        &self.messages.resumed
                    }
                    _ => &self.messages.not_subscribed,
                };
                self.reply_text(chat_id, text).await;
            }
            Command::Status => {
                let status = self.store.subscriber(chat_id).await?.map(|s| s.status);
                let text = match status {
                    Some(status) => self.messages.status.replace("{status}", status.as_str()),
                    None => self.messages.not_subscribed.clone(),
                };
                self.reply_text(chat_id, &text).await;
            }
        }
        Ok(())
    }

    async fn handle_current(&self, chat_id: ChatId) -> Result<()> {
        let postings = match self.refresh().await {
            Ok(postings) => postings,
            Err(e) => {
                log::warn!("Listing fetch for /vigentes failed: {}", e);
                self.reply_text(chat_id, &self.messages.fetch_failed).await;
                return Ok(());
            }
        };

        let current: Vec<&Posting> = postings
            .iter()
            .filter(|p| p.matches_status(&self.status_filter))
            .collect();
        if current.is_empty() {
            self.reply_text(chat_id, &self.messages.no_current).await;
            return Ok(());
        }

        let now = now();
        for posting in current {
            self.reply(chat_id, self.renderer.render_message(posting, now))
                .await;
        }
        Ok(())
    }

    async fn handle_button(&self, chat_id: ChatId, action: ButtonAction, posting_id: &str) -> Result<()> {
        log::info!("Button {} for posting {} from chat {}", action, posting_id, chat_id);

        let Some(posting) = self.lookup(posting_id).await? else {
            self.reply_text(chat_id, &self.messages.posting_not_found).await;
            return Ok(());
        };

        match action {
            ButtonAction::Download => match self.renderer.resolve_original(&posting) {
                None => self.reply_text(chat_id, &self.messages.pdf_unavailable).await,
                Some(file) => match self.downloader.download(&file).await {
                    Ok(artifact) => self.reply_file(chat_id, &artifact).await,
                    Err(e) => {
                        log::warn!("Download of {} failed: {}", file.url, e);
                        self.reply_text(chat_id, &self.messages.download_failed).await;
                    }
                },
            },
            ButtonAction::SharePdf => match self.renderer.render_summary(&posting, now()) {
                Ok(artifact) => self.reply_file(chat_id, &artifact).await,
                Err(e) => {
                    log::warn!("Summary for posting {} failed: {}", posting.id, e);
                    self.reply_text(chat_id, &self.messages.summary_failed).await;
                }
            },
            ButtonAction::Calendar => match self.renderer.render_calendar(&posting) {
                Ok(Some(artifact)) => self.reply_file(chat_id, &artifact).await,
                Ok(None) => self.reply_text(chat_id, &self.messages.calendar_failed).await,
                Err(e) => {
                    log::warn!("Calendar for posting {} failed: {}", posting.id, e);
                    self.reply_text(chat_id, &self.messages.calendar_failed).await;
                }
            },
        }
        Ok(())
    }

    /// Find a posting in the last snapshot, refetching the listing on a miss.
    async fn lookup(&self, posting_id: &str) -> Result<Option<Posting>> {
        if let Some(posting) = self.store.find_posting(posting_id).await? {
            return Ok(Some(posting));
        }
        match self.refresh().await {
            Ok(postings) => Ok(postings.into_iter().find(|p| p.id == posting_id)),
            Err(e) => {
                log::warn!("Listing refresh for posting {} failed: {}", posting_id, e);
                Ok(None)
            }
        }
    }

    /// Fetch the listing and store it as the latest snapshot.
    async fn refresh(&self) -> Result<Vec<Posting>> {
        let postings = self.source.fetch().await?;
        self.store.save_snapshot(&postings).await?;
        Ok(postings)
    }

    async fn reply_text(&self, chat_id: ChatId, text: &str) {
        self.reply(chat_id, MessagePayload::text(html_escape::encode_text(text)))
            .await;
    }

    async fn reply(&self, chat_id: ChatId, message: MessagePayload) {
        if let Err(e) = self.transport.send_message(chat_id, &message).await {
            log::warn!("Reply to chat {} failed: {}", chat_id, e);
        }
    }

    async fn reply_file(&self, chat_id: ChatId, artifact: &Artifact) {
        if let Err(e) = self.transport.send_file(chat_id, artifact).await {
            log::warn!("Sending {} to chat {} failed: {}", artifact.file_name, chat_id, e);
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
