pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::email::{Decision, EmailRecord};

/// Decides KEEP or DELETE for a batch of records in one call.
///
/// The returned list may be shorter than the batch, or contain ids that
/// were never submitted; the caller matches decisions back by id.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, batch: &[EmailRecord]) -> Result<Vec<Decision>>;
}
