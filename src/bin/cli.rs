//! Goods and services notifier CLI
//!
//! Runs the Telegram bot with its polling scheduler, or single maintenance
//! commands against the storage directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notifier::{
    app::App,
    config,
    error::Result,
    storage::PostingStore,
    utils::log as console,
};
use tokio::sync::watch;

/// UNDC goods and services notifier
#[derive(Parser, Debug)]
#[command(
    name = "notifier",
    version,
    about = "Telegram notifications for new UNDC goods and services postings"
)]

struct Cli {
    /// Path to storage directory containing config files and state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bot and the polling scheduler until Ctrl-C
    Run,

    /// Run a single notification cycle
    Check {
        /// Only list the postings that would be sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Mark all current postings as seen without notifying
    Seed,

    /// Show the current listing
    List,

    /// Show subscriber records
    Subscribers,

    /// Validate configuration files
    Validate,

    /// Show storage info
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, locale) = config::load_all(&cli.storage_dir);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Notifier starting...");

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config::load_strict(&cli.storage_dir) {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ config.toml and locale.toml OK");
        return Ok(());
    }

    let app = App::open(&cli.storage_dir, config, locale).await?;

    match cli.command {
        Command::Run => {
            let token = config::bot_token()?;
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });

            console::header("Bot running");
            app.run(&token, shutdown_rx).await?;
        }

        Command::Check { dry_run: true } => {
            let pending = app.pending().await?;
            console::header("Dry run");
            console::summary("Pending", &[("New postings", pending.len().to_string())]);
            console::postings(&pending);
        }

        Command::Check { dry_run: false } => {
            let token = config::bot_token()?;
            let report = app.run_cycle(&token).await?;
            console::cycle_summary(&report);
        }

        Command::Seed => {
            let marked = app.seed().await?;
            log::info!("Marked {} postings as seen", marked.len());
        }

        Command::List => {
            let current = app.current().await?;
            console::header("Current postings");
            console::postings(&current);
            log::info!("{} postings", current.len());
        }

        Command::Subscribers => {
            let subscribers = app.store().subscribers().await?;
            console::header("Subscribers");
            for s in &subscribers {
                console::sub_item(&format!(
                    "{} [{}] failures: {}{}",
                    s.chat_id,
                    s.status.as_str(),
                    s.consecutive_failures,
                    s.last_error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                ));
            }
            let active = subscribers.iter().filter(|s| s.is_active()).count();
            console::summary(
                "Subscribers",
                &[
                    ("Total", subscribers.len().to_string()),
                    ("Active", active.to_string()),
                ],
            );
        }

        Command::Info => {
            let store = app.store();
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Listing URL: {}", app.config().source.url);
            log::info!("Seen postings: {}", store.seen_ids().await?.len());

            match store.load_snapshot().await? {
                Some(snapshot) => {
                    log::info!("Last listing: {} postings", snapshot.count);
                    log::info!("Last updated: {}", snapshot.updated_at);
                }
                None => log::info!("No listing snapshot yet."),
            }
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}
