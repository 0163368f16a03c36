//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

use ::url::Url;
use unicode_segmentation::UnicodeSegmentation;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut a string to at most `max` graphemes, appending "..." when cut.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    if graphemes.len() <= max {
        return s.to_string();
    }
    let mut out: String = graphemes[..max].concat().trim_end().to_string();
    out.push_str("...");
    out
}

/// Greedy word wrap by grapheme count. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let graphemes: Vec<&str> = word.graphemes(true).collect();
            for chunk in graphemes.chunks(width) {
                let chunk_len = chunk.len();
                let sep = usize::from(line_len > 0);
                if line_len + sep + chunk_len > width && line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                if line_len > 0 {
                    line.push(' ');
                    line_len += 1;
                }
                line.push_str(&chunk.concat());
                line_len += chunk_len;
            }
        }
        lines.push(line);
    }

    lines
}
