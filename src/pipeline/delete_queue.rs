use log::{debug, error, info};

use crate::domain::email::EmailId;
use crate::mail::{MailClient, TrashOutcome};
use crate::pipeline::retry::{RetryPolicy, with_retry};

/// Ids waiting to be moved to trash.
#[derive(Debug)]
pub struct DeleteQueue {
    ids: Vec<EmailId>,
    threshold: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub trashed: usize,
    pub already_trashed: usize,
    pub failed: usize,
}

impl DeleteQueue {
    pub fn new(threshold: usize) -> Self {
        Self {
            ids: Vec::with_capacity(threshold),
            threshold: threshold.max(1),
        }
    }

    pub fn push(&mut self, id: EmailId) {
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Queue has reached the size that forces a flush.
    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.threshold
    }

    pub fn ids(&self) -> &[EmailId] {
        &self.ids
    }

    /// Trash every queued id, then empty the queue whatever the outcome.
    ///
    /// Each id is retried on its own under `policy`; failures are logged
    /// and counted, never re-queued. With `batch` set, the whole queue goes
    /// out as one retried batch call and a failure marks every id failed.
    pub async fn flush(
        &mut self,
        mail: &dyn MailClient,
        policy: &RetryPolicy,
        batch: bool,
    ) -> FlushReport {
        let ids = std::mem::take(&mut self.ids);
        let mut report = FlushReport::default();
        if ids.is_empty() {
            return report;
        }
        debug!("flushing {} queued deletes", ids.len());

        if batch {
            match with_retry(policy, mail, "batch trash", || {
                mail.trash_messages_batch(&ids)
            })
            .await
            {
                Ok(()) => report.trashed = ids.len(),
                Err(e) => {
                    error!("failed to trash batch of {} emails: {e}", ids.len());
                    report.failed = ids.len();
                }
            }
            return report;
        }

        for id in &ids {
            match with_retry(policy, mail, "trash message", || mail.trash_message(id)).await {
                Ok(TrashOutcome::Trashed) => {
                    debug!("moved email {id} to trash");
                    report.trashed += 1;
                }
                Ok(TrashOutcome::AlreadyInTrash) => report.already_trashed += 1,
                Err(e) => {
                    error!("failed to delete email {id}: {e}");
                    report.failed += 1;
                }
            }
        }
        if report.failed > 0 {
            info!(
                "delete flush: {} trashed, {} already in trash, {} failed",
                report.trashed, report.already_trashed, report.failed
            );
        }
        report
    }
}
