//! ICS calendar export for a posting's availability window.

use icalendar::{Calendar, Component, EventLike};

use crate::models::{Artifact, EventWindow, Posting};
use crate::utils::truncate_graphemes;

/// Description length used in the event summary.
const SUMMARY_DESCRIPTION_LEN: usize = 30;

/// File name of a posting's calendar file.
pub fn calendar_file_name(posting: &Posting) -> String {
    format!("{}.ics", posting.id)
}

/// Build the calendar file, or `None` when either date is missing.
pub fn build_calendar(posting: &Posting) -> Option<Artifact> {
    let window = posting.event()?;
    Some(Artifact::calendar(
        calendar_file_name(posting),
        generate_ics(posting, window),
    ))
}

/// Generate .ics content for a posting window.
pub fn generate_ics(posting: &Posting, window: EventWindow) -> String {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&format!("publicacion-{}@bienesyservicios", posting.id));
    ics_event.summary(&event_summary(posting));
    ics_event.description(&posting.description);

    // Floating times: the page shows local dates without a zone
    ics_event.add_property("DTSTART", window.start.format("%Y%m%dT%H%M%S").to_string());
    ics_event.add_property("DTEND", window.end.format("%Y%m%dT%H%M%S").to_string());

    if let Some(ref url) = posting.attachment {
        ics_event.add_property("URL", url);
    }

    let ics_event = ics_event.done();
    cal.push(ics_event);
    cal.done().to_string()
}

fn event_summary(posting: &Posting) -> String {
    let short = truncate_graphemes(&posting.description, SUMMARY_DESCRIPTION_LEN);
    let short = short.strip_suffix("...").unwrap_or(&short);
    format!("Publicación #{} - {}...", posting.id, short)
}
