use serde::{Deserialize, Serialize};

pub type EmailId = String;

/// Sentinel id used when the provider message carried no usable id.
pub const UNKNOWN_ID: &str = "unknown";

/// Flat, classifier-ready view of one inbox message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub message_id: EmailId,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub has_attachments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Keep,
    Delete,
}

impl Verdict {
    /// Lenient parse of a model-produced verdict ("keep", " DELETE ").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KEEP" => Some(Self::Keep),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "KEEP",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub email_id: EmailId,
    pub subject: String,
    pub decision: Verdict,
    pub reason: String,
}

/// One listing call's worth of normalized messages.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<EmailRecord>,
    pub next_page_token: Option<String>,
}

impl Page {
    /// Nothing to process here and nowhere further to go. A page whose
    /// messages all failed to fetch still carries its continuation token.
    pub fn is_last(&self) -> bool {
        self.records.is_empty() && self.next_page_token.is_none()
    }
}
