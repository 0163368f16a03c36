// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from `config.toml` and `locale.toml` in the storage
//! directory; the bot token comes from the environment (a `.env` file is
//! honoured).

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, LocaleConfig};

/// Environment variable holding the Bot API token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Load `config.toml` and `locale.toml` from the storage directory.
///
/// Missing or unreadable files fall back to defaults.
pub fn load_all(storage_dir: &Path) -> (Config, LocaleConfig) {
    let config = Config::load_or_default(storage_dir.join("config.toml"));
    let locale = LocaleConfig::load_or_default(storage_dir.join("locale.toml"));
    (config, locale)
}

/// Load and validate configuration strictly, failing on any problem.
pub fn load_strict(storage_dir: &Path) -> Result<(Config, LocaleConfig)> {
    let config_path = storage_dir.join("config.toml");
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };
    config.validate()?;

    let locale_path = storage_dir.join("locale.toml");
    let locale = if locale_path.exists() {
        LocaleConfig::load(&locale_path)?
    } else {
        LocaleConfig::default()
    };

    Ok((config, locale))
}

/// Read the bot token from the environment.
pub fn bot_token() -> Result<String> {
    // A missing .env file is fine; the variable may be set directly
    let _ = dotenvy::dotenv();

    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::config(format!("{TOKEN_ENV} is not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_all_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, locale) = load_all(dir.path());
        assert_eq!(config.dispatch.gone_threshold, 3);
        assert_eq!(locale.notification.button_original, "PDF Original");
    }

    #[test]
    fn test_load_strict_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[dispatch]\nmax_concurrent = 0\n",
        )
        .unwrap();
        assert!(load_strict(dir.path()).is_err());
    }

    #[test]
    fn test_load_strict_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[scheduler]\ninterval_secs = 60\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("locale.toml"),
            "[messages]\nwelcome = \"Hola\"\n",
        )
        .unwrap();

        let (config, locale) = load_strict(dir.path()).unwrap();
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(locale.messages.welcome, "Hola");
    }
}
