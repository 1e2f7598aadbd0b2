//! Fetch → normalize → classify → delete loop over the inbox.
//!
//! Pages are processed strictly in order. While page N is being classified
//! the listing and message fetches for page N+1 run alongside it on the
//! same task, so network latency hides behind classifier latency.

pub mod config;
pub mod context;
pub mod delete_queue;
pub mod retry;

use futures::StreamExt;
use futures::stream;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::classifier::Classifier;
use crate::domain::email::{Decision, EmailRecord, Page, Verdict};
use crate::mail::{MailClient, MailError};
use crate::normalize::clean::truncate_chars;
use crate::normalize::normalize_message;
use crate::store::batch_cache::BatchCache;

pub use config::PipelineConfig;
pub use context::{RunContext, RunSummary, ShutdownFlag};
pub use delete_queue::{DeleteQueue, FlushReport};
pub use retry::{RetryPolicy, with_retry};

/// Controller states. Fetching the next page has no state of its own: it
/// runs inside `Processing`, alongside the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    FetchingFirst,
    Processing,
    Draining,
    ShuttingDown,
    Done,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A page fetch failed and the reset-and-refetch recovery failed too.
    #[error("run stopped ({summary}): {source}")]
    Fatal {
        summary: RunSummary,
        #[source]
        source: MailError,
    },
}

pub struct Pipeline<'a> {
    mail: &'a dyn MailClient,
    classifier: &'a dyn Classifier,
    cache: Option<&'a BatchCache>,
    cfg: PipelineConfig,
    limiter: Semaphore,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        mail: &'a dyn MailClient,
        classifier: &'a dyn Classifier,
        cfg: PipelineConfig,
    ) -> Self {
        let limiter = Semaphore::new(cfg.max_concurrent.max(1));
        Self {
            mail,
            classifier,
            cache: None,
            cfg,
            limiter,
        }
    }

    /// Persist every page to `cache` before it is processed.
    pub fn with_cache(mut self, cache: &'a BatchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn enter(&self, state: &mut RunState, next: RunState) {
        debug!("pipeline state {state:?} -> {next:?}");
        *state = next;
    }

    /// Run over the whole inbox until it is exhausted, shutdown is
    /// requested, or a page cannot be fetched even after recovery.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunSummary, PipelineError> {
        let mut state = RunState::Idle;
        let mut queue = DeleteQueue::new(self.cfg.delete_flush_threshold);

        self.enter(&mut state, RunState::FetchingFirst);
        info!("fetching first page");
        let mut current = match self.fetch_page(None).await {
            Ok(page) => page,
            Err(e) => self.recover(ctx, None, e).await?,
        };

        let mut page_no = 0u64;
        while !current.is_last() {
            if ctx.is_shutting_down() {
                self.enter(&mut state, RunState::ShuttingDown);
                info!("shutdown requested; not starting page {page_no}");
                break;
            }
            self.enter(&mut state, RunState::Processing);

            let Page {
                records,
                next_page_token,
            } = current;

            if let Some(cache) = self.cache
                && let Err(e) = cache.write_page(page_no, &records)
            {
                warn!("could not cache page {page_no}: {e:#}");
            }
            if records.is_empty() {
                warn!("page {page_no} listed messages but none could be fetched; moving on");
            } else {
                info!("processing page {page_no} ({} emails)", records.len());
            }

            let fetch_next = async {
                match next_page_token.as_deref() {
                    Some(token) => self.fetch_ahead(ctx, token).await,
                    None => Ok(Page::default()),
                }
            };
            let ((), fetched) =
                tokio::join!(self.process_page(ctx, &mut queue, records), fetch_next);
            ctx.page_done();
            page_no += 1;

            current = match fetched {
                Ok(next) => next,
                Err(e) => self.recover(ctx, next_page_token.as_deref(), e).await?,
            };
            if current.is_last() {
                info!("no more messages to process");
            } else {
                info!("moving to page {page_no} ({})", ctx.summary());
            }
        }

        if state != RunState::ShuttingDown {
            self.enter(&mut state, RunState::Draining);
        }
        if !queue.is_empty() {
            self.flush(&mut queue).await;
        }
        self.enter(&mut state, RunState::Done);

        let summary = ctx.summary();
        info!("=== processing complete: {summary} ===");
        Ok(summary)
    }

    /// Cooldown, transport reset, then one more fetch of the same page.
    async fn recover(
        &self,
        ctx: &RunContext,
        token: Option<&str>,
        cause: MailError,
    ) -> Result<Page, PipelineError> {
        error!("error in processing loop: {cause}");
        if ctx.is_shutting_down() {
            return Ok(Page::default());
        }
        tokio::time::sleep(self.cfg.recovery_cooldown).await;

        let attempt = async {
            self.mail.reset_transport().await?;
            self.fetch_page(token).await
        };
        match attempt.await {
            Ok(page) => {
                info!("recovered; resuming with {} emails", page.records.len());
                Ok(page)
            }
            Err(source) => {
                error!("failed to recover: {source}");
                Err(PipelineError::Fatal {
                    summary: ctx.summary(),
                    source,
                })
            }
        }
    }

    /// Fetch of the next page under a deadline. A timeout gets one more
    /// synchronous try after a cooldown, unless shutdown was requested
    /// meanwhile; if that fails too the page counts as empty and the run ends.
    async fn fetch_ahead(&self, ctx: &RunContext, token: &str) -> Result<Page, MailError> {
        match tokio::time::timeout(self.cfg.fetch_timeout, self.fetch_page(Some(token))).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "timeout fetching next page after {:?}, retrying",
                    self.cfg.fetch_timeout
                );
                tokio::time::sleep(self.cfg.fetch_retry_cooldown).await;
                if ctx.is_shutting_down() {
                    info!("shutdown requested; not retrying the next-page fetch");
                    return Ok(Page::default());
                }
                match self.fetch_page(Some(token)).await {
                    Ok(page) => Ok(page),
                    Err(e) => {
                        error!("retry of timed-out fetch failed: {e}");
                        Ok(Page::default())
                    }
                }
            }
        }
    }

    /// List one page of ids and fetch + normalize each message, keeping
    /// listing order. Messages that cannot be fetched are skipped.
    pub async fn fetch_page(&self, token: Option<&str>) -> Result<Page, MailError> {
        let mail = self.mail;
        let cfg = &self.cfg;
        debug!("fetching page with token {token:?}");

        let listing = with_retry(&cfg.retry, mail, "list messages", move || {
            mail.list_message_page(&cfg.query, cfg.page_size, token)
        })
        .await?;

        let ids = listing.ids();
        if ids.is_empty() {
            return Ok(Page {
                records: Vec::new(),
                next_page_token: listing.next_page_token,
            });
        }
        info!("found {} messages in listing", ids.len());

        let records: Vec<EmailRecord> = stream::iter(ids.iter())
            .map(|id| async move {
                match with_retry(&cfg.retry, mail, "get message", move || mail.get_message(id))
                    .await
                {
                    Ok(raw) => Some(normalize_message(&raw)),
                    Err(e) => {
                        error!("skipping message {id}: {e}");
                        None
                    }
                }
            })
            .buffered(cfg.fetch_concurrency.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await;

        Ok(Page {
            records,
            next_page_token: listing.next_page_token,
        })
    }

    /// Classify a page's records in fixed-size sub-batches, in order.
    async fn process_page(
        &self,
        ctx: &RunContext,
        queue: &mut DeleteQueue,
        records: Vec<EmailRecord>,
    ) {
        let size = self.cfg.sub_batch_size.max(1);
        let total = records.len().div_ceil(size);

        for (i, sub_batch) in records.chunks(size).enumerate() {
            debug!("processing sub-batch {} of {total}", i + 1);
            self.process_sub_batch(ctx, queue, sub_batch).await;
            if !queue.is_empty() {
                self.flush(queue).await;
            }
            if i + 1 < total {
                tokio::time::sleep(self.cfg.sub_batch_pause).await;
            }
        }
    }

    async fn process_sub_batch(
        &self,
        ctx: &RunContext,
        queue: &mut DeleteQueue,
        batch: &[EmailRecord],
    ) {
        let decisions = {
            let Ok(_permit) = self.limiter.acquire().await else {
                error!("concurrency limiter closed; skipping sub-batch");
                return;
            };
            match self.classifier.classify(batch).await {
                Ok(d) => d,
                Err(e) => {
                    error!("error in sub-batch of {} emails: {e:#}", batch.len());
                    return;
                }
            }
        };

        let mut pending: HashMap<&str, usize> = HashMap::new();
        for r in batch {
            *pending.entry(r.message_id.as_str()).or_default() += 1;
        }

        for decision in decisions {
            match pending.get_mut(decision.email_id.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => {
                    warn!(
                        "ignoring decision for {} (not pending in this sub-batch)",
                        decision.email_id
                    );
                    continue;
                }
            }

            log_decision(&decision);
            ctx.record(decision.decision);
            if decision.decision == Verdict::Delete {
                queue.push(decision.email_id);
                if queue.is_full() {
                    self.flush(queue).await;
                }
            }
        }

        let unresolved: Vec<&str> = batch
            .iter()
            .map(|r| r.message_id.as_str())
            .filter(|id| {
                pending.get_mut(id).is_some_and(|n| {
                    let left = *n > 0;
                    *n = n.saturating_sub(1);
                    left
                })
            })
            .collect();
        if !unresolved.is_empty() {
            warn!(
                "{} emails got no decision and stay unresolved: {}",
                unresolved.len(),
                unresolved.join(", ")
            );
        }
        info!("{}", ctx.summary());
    }

    async fn flush(&self, queue: &mut DeleteQueue) -> FlushReport {
        let _permit = self.limiter.acquire().await.ok();
        queue
            .flush(self.mail, &self.cfg.retry, self.cfg.batch_delete)
            .await
    }
}

fn log_decision(d: &Decision) {
    info!(
        "[{}] Subject: {} | Reason: {}",
        d.decision.as_str(),
        truncate_chars(&d.subject, 50),
        truncate_chars(&d.reason, 100)
    );
}
