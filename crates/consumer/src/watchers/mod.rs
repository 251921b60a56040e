//! Observers of the pipeline.
//!
//! Two narrow capabilities are defined: [`ConsumerWatcher`] for the
//! lifecycle of a record inside the consumer, and [`EngineWatcher`] for
//! events raised by the processing engine. A type that needs both simply
//! implements both traits and is registered in both lists of [`Watchers`].

use std::path::Path;
use std::sync::Arc;

use consumer_types::{PipelineError, Record};

pub mod cluster_id;
pub mod payload_tracker;
pub mod stats;

pub use cluster_id::ClusterIdWatcher;
pub use payload_tracker::PayloadTrackerWatcher;
pub use stats::{StatsSnapshot, StatsWatcher};

/// Events fired by the consumer while a record travels through the pipeline.
///
/// Every method defaults to doing nothing; notifications need no
/// acknowledgment.
pub trait ConsumerWatcher: Send + Sync {
    /// A record was received and decoded (successfully or not).
    fn on_recv(&self, _record: &Record) {}

    /// The archive referenced by the record was retrieved.
    fn on_download(&self, _archive: &Path) {}

    /// The engine produced a result for the record.
    fn on_process(&self, _record: &Record, _result: &str) {}

    /// The report was published.
    fn on_consumer_success(&self, _record: &Record, _result: &str) {}

    /// The record failed somewhere after the eligibility gate.
    fn on_consumer_failure(&self, _record: &Record, _error: &PipelineError) {}

    /// The eligibility gate rejected the record.
    fn on_not_handled(&self, _record: &Record) {}
}

/// Events fired by the processing engine.
pub trait EngineWatcher: Send + Sync {
    /// The archive was extracted under `root`.
    fn on_extract(&self, _root: &Path) {}
}

/// Fan-out registry of watchers.
#[derive(Default, Clone)]
pub struct Watchers {
    consumer: Vec<Arc<dyn ConsumerWatcher>>,
    engine: Vec<Arc<dyn EngineWatcher>>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_consumer_watcher(&mut self, watcher: Arc<dyn ConsumerWatcher>) {
        self.consumer.push(watcher);
    }

    pub fn add_engine_watcher(&mut self, watcher: Arc<dyn EngineWatcher>) {
        self.engine.push(watcher);
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty() && self.engine.is_empty()
    }

    fn each<F: Fn(&dyn ConsumerWatcher)>(&self, f: F) {
        for watcher in &self.consumer {
            f(watcher.as_ref());
        }
    }
}

impl ConsumerWatcher for Watchers {
    fn on_recv(&self, record: &Record) {
        self.each(|w| w.on_recv(record));
    }

    fn on_download(&self, archive: &Path) {
        self.each(|w| w.on_download(archive));
    }

    fn on_process(&self, record: &Record, result: &str) {
        self.each(|w| w.on_process(record, result));
    }

    fn on_consumer_success(&self, record: &Record, result: &str) {
        self.each(|w| w.on_consumer_success(record, result));
    }

    fn on_consumer_failure(&self, record: &Record, error: &PipelineError) {
        self.each(|w| w.on_consumer_failure(record, error));
    }

    fn on_not_handled(&self, record: &Record) {
        self.each(|w| w.on_not_handled(record));
    }
}

impl EngineWatcher for Watchers {
    fn on_extract(&self, root: &Path) {
        for watcher in &self.engine {
            watcher.on_extract(root);
        }
    }
}
