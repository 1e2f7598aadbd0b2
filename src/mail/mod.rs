pub mod error;
pub mod gmail;
pub mod raw;

use async_trait::async_trait;

pub use error::MailError;
pub use raw::{MessageListing, RawMessage};

/// Inbox, excluding anything already trashed.
pub const INBOX_QUERY: &str = "in:inbox -in:trash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashOutcome {
    Trashed,
    AlreadyInTrash,
}

/// Provider operations the triage pipeline needs.
///
/// Implementations do a single attempt per call; retries and backoff are
/// driven by the caller, which invokes [`MailClient::reset_transport`]
/// between attempts.
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn list_message_page(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessageListing, MailError>;

    async fn get_message(&self, id: &str) -> Result<RawMessage, MailError>;

    /// Move one message to trash. A message already in trash is reported
    /// as [`TrashOutcome::AlreadyInTrash`] without a second request.
    async fn trash_message(&self, id: &str) -> Result<TrashOutcome, MailError>;

    async fn trash_messages_batch(&self, ids: &[String]) -> Result<(), MailError>;

    /// Drop cached session state (connections, access token) and
    /// re-authenticate.
    async fn reset_transport(&self) -> Result<(), MailError>;
}
