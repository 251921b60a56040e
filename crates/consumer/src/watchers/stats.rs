//! In-process event counters.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use consumer_types::{PipelineError, Record};
use tracing::info;

use super::ConsumerWatcher;

/// Counts every consumer event.
#[derive(Debug, Default, Clone)]
pub struct StatsWatcher {
    received: Arc<AtomicU64>,
    downloaded: Arc<AtomicU64>,
    processed: Arc<AtomicU64>,
    published: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    not_handled: Arc<AtomicU64>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub downloaded: u64,
    pub processed: u64,
    pub published: u64,
    pub failures: u64,
    pub not_handled: u64,
}

impl StatsWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            not_handled: self.not_handled.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            received = s.received,
            downloaded = s.downloaded,
            processed = s.processed,
            published = s.published,
            failures = s.failures,
            not_handled = s.not_handled,
            "Consumer statistics"
        );
    }
}

impl ConsumerWatcher for StatsWatcher {
    fn on_recv(&self, _record: &Record) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn on_download(&self, _archive: &Path) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
    }

    fn on_process(&self, _record: &Record, _result: &str) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_consumer_success(&self, _record: &Record, _result: &str) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    fn on_consumer_failure(&self, _record: &Record, _error: &PipelineError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_not_handled(&self, _record: &Record) {
        self.not_handled.fetch_add(1, Ordering::Relaxed);
    }
}
