use std::time::Duration;

use crate::mail::INBOX_QUERY;
use crate::pipeline::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub query: String,
    /// Message ids requested per listing call.
    pub page_size: u32,
    /// Records per classifier call.
    pub sub_batch_size: usize,
    /// Queue length that forces an immediate trash flush.
    pub delete_flush_threshold: usize,
    /// Pause between sub-batches of one page.
    pub sub_batch_pause: Duration,
    /// Deadline for the fetch-ahead of the next page.
    pub fetch_timeout: Duration,
    /// Wait before the single synchronous retry of a timed-out fetch-ahead.
    pub fetch_retry_cooldown: Duration,
    /// Wait before resetting the transport after a loop error.
    pub recovery_cooldown: Duration,
    /// Classifier calls and delete flushes allowed in flight at once.
    pub max_concurrent: usize,
    /// Per-message fetches in flight while building a page.
    pub fetch_concurrency: usize,
    /// Flush the delete queue with one batch call instead of per-id calls.
    pub batch_delete: bool,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query: INBOX_QUERY.to_string(),
            page_size: 500,
            sub_batch_size: 50,
            delete_flush_threshold: 25,
            sub_batch_pause: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(60),
            fetch_retry_cooldown: Duration::from_secs(5),
            recovery_cooldown: Duration::from_secs(10),
            max_concurrent: 10,
            fetch_concurrency: 20,
            batch_delete: false,
            retry: RetryPolicy::default(),
        }
    }
}
