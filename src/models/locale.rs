//! User-facing bot strings, loaded from `locale.toml`.
//!
//! Placeholders are written as `{name}` and substituted with `str::replace`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocaleConfig {
    #[serde(default)]
    pub messages: MessageLocale,

    #[serde(default)]
    pub notification: NotificationLocale,

    #[serde(default)]
    pub commands: CommandLocale,
}

impl LocaleConfig {
    /// Load locale strings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load locale strings, falling back to the built-in Spanish defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::debug!(
                "Locale load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }
}

/// Replies to commands and button presses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageLocale {
    pub welcome: String,
    pub help: String,
    pub subscribed: String,
    pub already_subscribed: String,
    pub unsubscribed: String,
    pub not_subscribed: String,
    pub paused: String,
    pub resumed: String,
    /// `{status}` is replaced by the subscription state
    pub status: String,
    pub no_current: String,
    pub fetch_failed: String,
    pub posting_not_found: String,
    pub pdf_unavailable: String,
    pub download_failed: String,
    pub summary_failed: String,
    pub calendar_failed: String,
}

impl Default for MessageLocale {
    fn default() -> Self {
        Self {
            welcome: "¡Hola! Soy tu bot de notificaciones. \
                Usa /vigentes para ver los elementos vigentes.\n\
                Usa /subscribe para suscribirte a notificaciones automáticas.\n\
                Usa /unsubscribe para darte de baja de las notificaciones."
                .to_string(),
            help: "Comandos disponibles:\n\
                /start - Mensaje de bienvenida\n\
                /vigentes - Mostrar elementos vigentes\n\
                /subscribe - Suscribirse a notificaciones automáticas\n\
                /unsubscribe - Darse de baja de las notificaciones\n\
                /pause - Pausar las notificaciones\n\
                /resume - Reanudar las notificaciones\n\
                /estado - Ver el estado de tu suscripción\n\
                /help - Mostrar este mensaje de ayuda"
                .to_string(),
            subscribed: "Te has suscrito a las notificaciones de nuevas publicaciones.".to_string(),
            already_subscribed: "Ya estás suscrito a las notificaciones.".to_string(),
            unsubscribed: "Te has dado de baja de las notificaciones.".to_string(),
            not_subscribed: "No estás suscrito. Usa /subscribe para suscribirte.".to_string(),
            paused: "Notificaciones pausadas. Usa /resume para reanudarlas.".to_string(),
            resumed: "Notificaciones reanudadas.".to_string(),
            status: "Estado de tu suscripción: {status}".to_string(),
            no_current: "No hay elementos vigentes en este momento.".to_string(),
            fetch_failed: "No se pudo consultar la página de publicaciones. Inténtalo más tarde."
                .to_string(),
            posting_not_found: "No se pudo encontrar los datos de la publicación.".to_string(),
            pdf_unavailable: "El PDF no está disponible.".to_string(),
            download_failed: "Ocurrió un error al descargar el PDF.".to_string(),
            summary_failed: "No se pudo generar el PDF de la publicación.".to_string(),
            calendar_failed: "Error al procesar las fechas de la publicación.".to_string(),
        }
    }
}

/// Labels used when rendering a posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationLocale {
    pub new_posting_header: String,
    /// `{id}` is replaced by the posting id
    pub posting_title: String,
    pub description: String,
    pub pdf: String,
    pub pdf_available: String,
    pub pdf_unavailable: String,
    pub published: String,
    pub expires: String,
    pub remaining: String,
    pub remaining_unknown: String,
    pub status: String,
    pub button_original: String,
    pub button_summary: String,
    pub button_calendar: String,
}

impl Default for NotificationLocale {
    fn default() -> Self {
        Self {
            new_posting_header: "¡Nueva publicación disponible!".to_string(),
            posting_title: "Publicación #{id}".to_string(),
            description: "Descripción".to_string(),
            pdf: "PDF".to_string(),
            pdf_available: "Disponible para descargar".to_string(),
            pdf_unavailable: "No disponible".to_string(),
            published: "Publicado".to_string(),
            expires: "Vence".to_string(),
            remaining: "Tiempo disponible".to_string(),
            remaining_unknown: "Desconocido".to_string(),
            status: "Estado".to_string(),
            button_original: "PDF Original".to_string(),
            button_summary: "PDF de la Publicación".to_string(),
            button_calendar: "Agregar al Calendario".to_string(),
        }
    }
}

/// Descriptions registered with `setMyCommands`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandLocale {
    pub start: String,
    pub help: String,
    pub current: String,
    pub subscribe: String,
    pub unsubscribe: String,
    pub pause: String,
    pub resume: String,
    pub status: String,
}

impl Default for CommandLocale {
    fn default() -> Self {
        Self {
            start: "Iniciar el bot".to_string(),
            help: "Mostrar ayuda".to_string(),
            current: "Mostrar elementos vigentes".to_string(),
            subscribe: "Suscribirse a notificaciones automáticas".to_string(),
            unsubscribe: "Darse de baja de las notificaciones".to_string(),
            pause: "Pausar las notificaciones".to_string(),
            resume: "Reanudar las notificaciones".to_string(),
            status: "Ver el estado de la suscripción".to_string(),
        }
    }
}
