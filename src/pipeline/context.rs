use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::domain::email::Verdict;

/// Cloneable shutdown signal, set from the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one pipeline run: running totals plus the shutdown signal.
#[derive(Debug)]
pub struct RunContext {
    shutdown: ShutdownFlag,
    processed: AtomicU64,
    kept: AtomicU64,
    deleted: AtomicU64,
    pages: AtomicU64,
    started: Instant,
}

impl RunContext {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self {
            shutdown,
            processed: AtomicU64::new(0),
            kept: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_requested()
    }

    pub fn record(&self, verdict: Verdict) {
        match verdict {
            Verdict::Keep => self.kept.fetch_add(1, Ordering::Relaxed),
            Verdict::Delete => self.deleted.fetch_add(1, Ordering::Relaxed),
        };
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_done(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            processed: self.processed.load(Ordering::Relaxed),
            kept: self.kept.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
            shutdown_requested: self.is_shutting_down(),
        }
    }
}

/// Snapshot of a run's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub kept: u64,
    pub deleted: u64,
    pub pages: u64,
    pub elapsed: Duration,
    pub shutdown_requested: bool,
}

impl RunSummary {
    /// Emails per second since the run started.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {} | Kept: {} | Deleted: {} | Pages: {} | Rate: {:.1}/s",
            self.processed,
            self.kept,
            self.deleted,
            self.pages,
            self.rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_verdicts() {
        let ctx = RunContext::new(ShutdownFlag::new());
        ctx.record(Verdict::Keep);
        ctx.record(Verdict::Delete);
        ctx.record(Verdict::Keep);
        let s = ctx.summary();
        assert_eq!((s.processed, s.kept, s.deleted), (3, 2, 1));
        assert!(!s.shutdown_requested);
    }

    #[test]
    fn shutdown_flag_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let ctx = RunContext::new(flag.clone());
        flag.request();
        assert!(ctx.is_shutting_down());
        assert!(ctx.summary().shutdown_requested);
    }

    #[test]
    fn summary_display() {
        let s = RunSummary {
            processed: 10,
            kept: 7,
            deleted: 3,
            pages: 1,
            elapsed: Duration::from_secs(5),
            shutdown_requested: false,
        };
        assert_eq!(
            s.to_string(),
            "Processed: 10 | Kept: 7 | Deleted: 3 | Pages: 1 | Rate: 2.0/s"
        );
    }
}
