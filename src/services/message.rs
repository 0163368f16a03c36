//! Telegram message formatting for postings.

use chrono::NaiveDateTime;
use html_escape::encode_text;

use crate::models::{Button, ButtonAction, MessagePayload, NotificationLocale, Posting, format_remaining};

/// Format a posting as an HTML message with its action buttons.
pub fn format_posting(posting: &Posting, labels: &NotificationLocale, now: NaiveDateTime) -> MessagePayload {
    let remaining = posting
        .remaining(now)
        .map(format_remaining)
        .unwrap_or_else(|| labels.remaining_unknown.clone());

    let pdf_state = if posting.attachment.is_some() {
        &labels.pdf_available
    } else {
        &labels.pdf_unavailable
    };

    let text = format!(
        "📢 <b>{title}</b>\n\
         📝 <b>{description_label}:</b>\n{description}\n\n\
         📄 <b>{pdf_label}:</b> {pdf_state}\n\
         📅 <b>{published_label}:</b> {published}\n\
         ⏳ <b>{expires_label}:</b> {expires}\n\
         ⏱ <b>{remaining_label}:</b> {remaining}\n\
         🗑 <b>{status_label}:</b> {status}\n",
        title = encode_text(&labels.posting_title.replace("{id}", &posting.id)),
        description_label = encode_text(&labels.description),
        description = encode_text(&posting.description),
        pdf_label = encode_text(&labels.pdf),
        pdf_state = encode_text(pdf_state),
        published_label = encode_text(&labels.published),
        published = encode_text(&posting.published_raw),
        expires_label = encode_text(&labels.expires),
        expires = encode_text(&posting.expires_raw),
        remaining_label = encode_text(&labels.remaining),
        remaining = encode_text(&remaining),
        status_label = encode_text(&labels.status),
        status = encode_text(&posting.status),
    );

    MessagePayload {
        text,
        buttons: vec![buttons(posting, labels)],
    }
}

/// Format a posting for a push notification, prefixed with the header line.
pub fn format_new_posting(posting: &Posting, labels: &NotificationLocale, now: NaiveDateTime) -> MessagePayload {
    let mut payload = format_posting(posting, labels, now);
    payload.text = format!(
        "<b>{}</b>\n\n{}",
        encode_text(&labels.new_posting_header),
        payload.text
    );
    payload
}

fn buttons(posting: &Posting, labels: &NotificationLocale) -> Vec<Button> {
    let mut row = Vec::with_capacity(3);
    if posting.attachment.is_some() {
        row.push(Button {
            label: labels.button_original.clone(),
            callback_data: ButtonAction::Download.callback_data(&posting.id),
        });
    }
    row.push(Button {
        label: labels.button_summary.clone(),
        callback_data: ButtonAction::SharePdf.callback_data(&posting.id),
    });
    row.push(Button {
        label: labels.button_calendar.clone(),
        callback_data: ButtonAction::Calendar.callback_data(&posting.id),
    });
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-03-02 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_format_posting_with_attachment() {
        let posting = Posting::from_row(
            "15",
            "Compra de <tóner> & papel",
            "2026-03-01 08:00:00",
            "2026-03-03 10:30:00",
            "Vigente",
            Some("https://example.com/15.pdf".to_string()),
        );
        let payload = format_posting(&posting, &NotificationLocale::default(), now());

        assert!(payload.text.contains("Publicación #15"));
        assert!(payload.text.contains("Compra de &lt;tóner&gt; &amp; papel"));
        assert!(payload.text.contains("Disponible para descargar"));
        assert!(payload.text.contains("1 días, 2 horas, 30 minutos"));

        let callbacks: Vec<&str> = payload.buttons[0]
            .iter()
            .map(|b| b.callback_data.as_str())
            .collect();
        assert_eq!(callbacks, vec!["download_15", "sharepdf_15", "calendar_15"]);
    }

    #[test]
    fn test_format_posting_without_attachment() {
        let posting = Posting::from_row("16", "Servicio", "", "sin fecha", "Vigente", None);
        let payload = format_posting(&posting, &NotificationLocale::default(), now());

        assert!(payload.text.contains("No disponible"));
        assert!(payload.text.contains("Desconocido"));
        assert_eq!(payload.buttons[0].len(), 2);
    }

    #[test]
    fn test_new_posting_header() {
        let posting = Posting::from_row("17", "Servicio", "", "", "Vigente", None);
        let payload = format_new_posting(&posting, &NotificationLocale::default(), now());
        assert!(payload.text.starts_with("<b>¡Nueva publicación disponible!</b>"));
    }
}
