//! PDF summary of a posting.

use chrono::NaiveDateTime;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::error::{AppError, Result};
use crate::models::{Artifact, NotificationLocale, Posting, format_remaining};
use crate::utils::wrap_text;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 6.0;
const BODY_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 16.0;
/// Characters per line at the body font size.
const WRAP_WIDTH: usize = 85;

/// File name of a posting's generated summary.
pub fn summary_file_name(posting: &Posting) -> String {
    format!("Publicacion_{}.pdf", posting.id)
}

/// Render a one-document PDF with the posting's fields.
pub fn build_summary(posting: &Posting, labels: &NotificationLocale, now: NaiveDateTime) -> Result<Artifact> {
    let title = labels.posting_title.replace("{id}", &posting.id);
    let (doc, page, layer) = PdfDocument::new(title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::render_failed(&posting.id, e))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::render_failed(&posting.id, e))?;

    let mut writer = PageWriter {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        y: PAGE_HEIGHT - MARGIN,
        pages: 1,
    };

    writer.line(&title, TITLE_SIZE, &bold);
    writer.gap();

    for (label, value) in summary_fields(posting, labels, now) {
        writer.line(&format!("{label}:"), BODY_SIZE, &bold);
        for line in wrap_text(&value, WRAP_WIDTH) {
            writer.line(&line, BODY_SIZE, &regular);
        }
        writer.gap();
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| AppError::render_failed(&posting.id, e))?;
    Ok(Artifact::pdf(summary_file_name(posting), bytes))
}

fn summary_fields(posting: &Posting, labels: &NotificationLocale, now: NaiveDateTime) -> Vec<(String, String)> {
    let remaining = posting
        .remaining(now)
        .map(format_remaining)
        .unwrap_or_else(|| labels.remaining_unknown.clone());
    let pdf = posting
        .attachment
        .clone()
        .unwrap_or_else(|| labels.pdf_unavailable.clone());

    vec![
        (labels.description.clone(), posting.description.clone()),
        (labels.published.clone(), posting.published_raw.clone()),
        (labels.expires.clone(), posting.expires_raw.clone()),
        (labels.remaining.clone(), remaining),
        (labels.status.clone(), posting.status.clone()),
        (labels.pdf.clone(), pdf),
    ]
}

/// Writes lines top to bottom, adding pages as needed.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl PageWriter<'_> {
    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        if self.y < MARGIN {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= LINE_HEIGHT;
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-03-02 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_summary_is_pdf() {
        let posting = Posting::from_row(
            "31",
            "Adquisición de equipos de cómputo",
            "2026-03-01 08:00:00",
            "2026-03-10 08:00:00",
            "Vigente",
            None,
        );
        let artifact = build_summary(&posting, &NotificationLocale::default(), now()).unwrap();
        assert_eq!(artifact.file_name, "Publicacion_31.pdf");
        assert_eq!(artifact.mime_type, "application/pdf");
        assert!(artifact.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_description_spans_pages() {
        let description = "palabra ".repeat(4000);
        let posting = Posting::from_row("32", &description, "", "", "Vigente", None);
        let artifact = build_summary(&posting, &NotificationLocale::default(), now()).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_summary_fields_fallbacks() {
        let posting = Posting::from_row("33", "Servicio", "", "", "Vigente", None);
        let labels = NotificationLocale::default();
        let fields = summary_fields(&posting, &labels, now());
        assert_eq!(fields[3].1, labels.remaining_unknown);
        assert_eq!(fields[5].1, labels.pdf_unavailable);
    }
}
