//! Rendered notification payloads and file artifacts.

use std::fmt;

/// Inline keyboard button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub callback_data: String,
}

/// Text message with optional inline keyboard rows. Text is Telegram HTML.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePayload {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }
}

/// A generated or downloaded file ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "application/pdf".to_string(),
            bytes,
        }
    }

    pub fn calendar(file_name: impl Into<String>, content: String) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "text/calendar".to_string(),
            bytes: content.into_bytes(),
        }
    }
}

/// Where the original document of a posting can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Direct download URL
    pub url: String,
    /// File name to upload under
    pub file_name: String,
}

/// Everything sent to each subscriber for one posting; rendered once per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub posting_id: String,
    pub message: MessagePayload,
    pub attachments: Vec<Artifact>,
}

/// Inline button actions, encoded as `<action>_<posting id>` callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Download the original document
    Download,
    /// Generated PDF summary
    SharePdf,
    /// Calendar file
    Calendar,
}

impl ButtonAction {
    const ALL: [ButtonAction; 3] = [
        ButtonAction::Download,
        ButtonAction::SharePdf,
        ButtonAction::Calendar,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ButtonAction::Download => "download",
            ButtonAction::SharePdf => "sharepdf",
            ButtonAction::Calendar => "calendar",
        }
    }

    /// Callback data for this action on a posting.
    pub fn callback_data(&self, posting_id: &str) -> String {
        format!("{}_{}", self.prefix(), posting_id)
    }

    /// Parse callback data into an action and posting id.
    pub fn parse(data: &str) -> Option<(Self, String)> {
        Self::ALL.iter().find_map(|action| {
            data.strip_prefix(action.prefix())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|id| !id.is_empty())
                .map(|id| (*action, id.to_string()))
        })
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
