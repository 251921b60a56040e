//! The primary poll → decode → gate → process → publish loop.
//!
//! Records are handled one at a time, in the order the source yields them.
//! No per-record failure ever leaves this loop: decode errors are gated out,
//! processing errors are reported to the watchers and the publisher, and the
//! next record is polled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consumer_types::{PipelineError, RawRecord, Record, RecordValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::consumer::RecordSource;
use crate::decoder;
use crate::gate::{extract_url, Eligibility, EligibilityGate};
use crate::publisher::ReportPublisher;
use crate::supervisor::ProcessingSupervisor;
use crate::watchdog::{LivenessWatchdog, ReceiptClock};
use crate::watchers::{ClusterIdWatcher, ConsumerWatcher, EngineWatcher, Watchers};

/// Pause after a failed receive before polling again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Retrieves the archive a validated locator points to.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> anyhow::Result<PathBuf>;
}

/// Processes a retrieved archive into a JSON-encoded report.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn process(&self, archive: &Path, watcher: &dyn EngineWatcher) -> anyhow::Result<String>;
}

pub struct Pipeline {
    downloader: Arc<dyn Downloader>,
    engine: Arc<dyn Engine>,
    publisher: ReportPublisher,
    watchers: Arc<Watchers>,
    cluster_ids: Option<Arc<ClusterIdWatcher>>,
    gate: EligibilityGate,
    supervisor: ProcessingSupervisor,
    clock: ReceiptClock,
    max_elapsed: Duration,
}

pub struct PipelineBuilder {
    downloader: Arc<dyn Downloader>,
    engine: Arc<dyn Engine>,
    publisher: ReportPublisher,
    watchers: Watchers,
    cluster_ids: Option<Arc<ClusterIdWatcher>>,
    gate: EligibilityGate,
    supervisor: ProcessingSupervisor,
    max_elapsed: Duration,
}

impl PipelineBuilder {
    pub fn max_record_age(mut self, age: Duration) -> Self {
        self.gate = EligibilityGate::new(age);
        self
    }

    pub fn max_elapsed_time(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Zero disables the processing deadline.
    pub fn processing_timeout(mut self, timeout: Duration) -> Self {
        self.supervisor = ProcessingSupervisor::new(timeout);
        self
    }

    pub fn consumer_watcher(mut self, watcher: Arc<dyn ConsumerWatcher>) -> Self {
        self.watchers.add_consumer_watcher(watcher);
        self
    }

    pub fn engine_watcher(mut self, watcher: Arc<dyn EngineWatcher>) -> Self {
        self.watchers.add_engine_watcher(watcher);
        self
    }

    /// Take `ClusterName` from the extracted archive when it carries a valid
    /// cluster id.
    pub fn cluster_id_watcher(mut self, watcher: Arc<ClusterIdWatcher>) -> Self {
        self.watchers.add_consumer_watcher(watcher.clone());
        self.watchers.add_engine_watcher(watcher.clone());
        self.cluster_ids = Some(watcher);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            downloader: self.downloader,
            engine: self.engine,
            publisher: self.publisher,
            watchers: Arc::new(self.watchers),
            cluster_ids: self.cluster_ids,
            gate: self.gate,
            supervisor: self.supervisor,
            clock: ReceiptClock::new(),
            max_elapsed: self.max_elapsed,
        }
    }
}

impl Pipeline {
    pub fn builder(
        downloader: Arc<dyn Downloader>,
        engine: Arc<dyn Engine>,
        publisher: ReportPublisher,
    ) -> PipelineBuilder {
        PipelineBuilder {
            downloader,
            engine,
            publisher,
            watchers: Watchers::new(),
            cluster_ids: None,
            gate: EligibilityGate::default(),
            supervisor: ProcessingSupervisor::default(),
            max_elapsed: crate::watchdog::DEFAULT_MAX_ELAPSED,
        }
    }

    pub fn receipt_clock(&self) -> &ReceiptClock {
        &self.clock
    }

    /// Consume `source` until `token` is cancelled or the source is exhausted.
    pub async fn run<S: RecordSource>(&self, source: &S, token: CancellationToken) {
        let watchdog_token = token.child_token();
        let watchdog = LivenessWatchdog::new(self.clock.clone(), self.max_elapsed)
            .spawn(watchdog_token.clone());

        info!(
            max_record_age_secs = self.gate.max_record_age().as_secs(),
            max_elapsed_secs = self.max_elapsed.as_secs(),
            processing_timeout_secs = self.supervisor.timeout().map(|t| t.as_secs()),
            "Consumer started"
        );

        loop {
            let received = tokio::select! {
                _ = token.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                received = source.recv() => received,
            };

            let raw = match received {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("Record source exhausted");
                    break;
                }
                Err(e) => {
                    error!("{e}");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    continue;
                }
            };

            self.clock.touch();
            let record = self.handle(raw).await;

            if let Err(e) = source.commit(&record).await {
                warn!(offset = record.offset, "{e}");
            }
        }

        watchdog_token.cancel();
        if let Err(e) = watchdog.await {
            warn!("Liveness watchdog ended abnormally: {e}");
        }
        self.publisher.flush();
    }

    /// Handle one raw record and return it decoded.
    pub async fn handle(&self, raw: RawRecord) -> Record {
        let record = raw.map_value(|payload| RecordValue::from(decoder::decode(&payload)));
        self.watchers.on_recv(&record);

        match self.gate.evaluate(&record) {
            Eligibility::Handled => {}
            Eligibility::NotHandled(rejection) => {
                if rejection.notifies_watchers() {
                    self.watchers.on_not_handled(&record);
                }
                return record;
            }
        }

        if let Err(err) = self.process(&record).await {
            self.watchers.on_consumer_failure(&record, &err);
            self.publisher.error(&record, &err);
        }
        record
    }

    async fn process(&self, record: &Record) -> Result<(), PipelineError> {
        let url = extract_url(record)?;

        let archive = self
            .downloader
            .download(url)
            .await
            .map_err(|e| PipelineError::Download(format!("{e:#}")))?;
        self.watchers.on_download(&archive);

        let engine = Arc::clone(&self.engine);
        let watchers = Arc::clone(&self.watchers);
        let response = self
            .supervisor
            .run(async move { engine.process(&archive, watchers.as_ref()).await })
            .await
            .map_err(|e| PipelineError::Processing(format!("{e:#}")))?;
        self.watchers.on_process(record, &response);

        let mut message = record
            .message()
            .cloned()
            .ok_or_else(|| PipelineError::UrlExtraction("value is not a mapping".to_string()))?;

        if let Some(Some(cluster_name)) = self
            .cluster_ids
            .as_ref()
            .and_then(|w| w.take_cluster_name(record))
        {
            debug!(%cluster_name, "Using cluster id from the archive");
            message.insert("ClusterName".to_string(), Value::String(cluster_name));
        }

        self.publisher.publish(record, &message, &response)?;
        self.watchers.on_consumer_success(record, &response);
        Ok(())
    }
}
