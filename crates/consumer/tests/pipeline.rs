//! Pipeline end-to-end tests against an in-memory record source.
//!
//! Test flow:
//! 1. Queue raw records covering the eligible and the skipped cases
//! 2. Run the pipeline until the source is exhausted
//! 3. Verify published reports, committed offsets and watcher counters

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ccx_pipeline_consumer::{
    ClusterIdWatcher, Downloader, Engine, EngineWatcher, MessageSink, Pipeline, RecordSource,
    ReportPublisher, Result, StatsSnapshot, StatsWatcher,
};
use consumer_types::{Payload, RawRecord, Record};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// `{"identity": {"internal": {"org_id": "12383032"}}}`
const IDENTITY: &str = "eyJpZGVudGl0eSI6IHsiaW50ZXJuYWwiOiB7Im9yZ19pZCI6ICIxMjM4MzAzMiJ9fX0=";
const CLUSTER_ID: &str = "182c15df-6014-42f8-bdd0-68c2c5b0b81e";

#[derive(Default)]
struct QueueSource {
    records: Mutex<VecDeque<RawRecord>>,
    committed: Mutex<Vec<i64>>,
}

impl QueueSource {
    fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records: Mutex::new(records.into()),
            committed: Mutex::default(),
        }
    }
}

#[async_trait]
impl RecordSource for QueueSource {
    async fn recv(&self) -> Result<Option<RawRecord>> {
        Ok(self.records.lock().unwrap().pop_front())
    }

    async fn commit(&self, record: &Record) -> Result<()> {
        self.committed.lock().unwrap().push(record.offset);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    fn reports(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| serde_json::from_slice(payload).unwrap())
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.sent.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }
}

/// Resolves every locator except "missing" to a path in the archive store.
struct StoreDownloader {
    store: PathBuf,
}

#[async_trait]
impl Downloader for StoreDownloader {
    async fn download(&self, url: &str) -> anyhow::Result<PathBuf> {
        if url == "missing" {
            anyhow::bail!("no such archive: {url}");
        }
        Ok(self.store.join(url))
    }
}

/// Extracts into a fresh directory holding `config/id` and reports the
/// archive file name.
struct FakeEngine {
    cluster_id: Option<&'static str>,
}

#[async_trait]
impl Engine for FakeEngine {
    async fn process(&self, archive: &Path, watcher: &dyn EngineWatcher) -> anyhow::Result<String> {
        let extracted = tempfile::tempdir()?;
        if let Some(id) = self.cluster_id {
            std::fs::create_dir(extracted.path().join("config"))?;
            std::fs::write(extracted.path().join("config").join("id"), id)?;
        }
        watcher.on_extract(extracted.path());

        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(json!({"archive": name, "reports": []}).to_string())
    }
}

fn raw(offset: i64, timestamp: Option<i64>, value: Payload) -> RawRecord {
    RawRecord {
        topic: "incoming".to_string(),
        partition: 0,
        offset,
        key: None,
        timestamp,
        value,
    }
}

fn notification(url: &str) -> Payload {
    Payload::from(
        json!({
            "url": url,
            "b64_identity": IDENTITY,
            "timestamp": "2020-01-23T16:15:59.478901889Z",
            "request_id": format!("request-{url}"),
        })
        .to_string()
        .into_bytes(),
    )
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("ccx_pipeline_consumer=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[tokio::test]
async fn test_pipeline_processes_eligible_records_only() {
    init_tracing();

    let now = now_ms();
    let three_hours_ms = 3 * 60 * 60 * 1000;
    let source = QueueSource::new(vec![
        raw(0, Some(now), notification("first.tar.gz")),
        raw(1, Some(now), Payload::Empty),
        raw(2, Some(now), Payload::from(b"{not json".to_vec())),
        raw(3, Some(now - three_hours_ms), notification("old.tar.gz")),
        raw(4, None, notification("untimed.tar.gz")),
        raw(5, Some(now), notification("missing")),
        raw(6, Some(now), notification("second.tar.gz")),
    ]);

    let sink = Arc::new(RecordingSink::default());
    let stats = Arc::new(StatsWatcher::new());
    let store = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::builder(
        Arc::new(StoreDownloader {
            store: store.path().to_path_buf(),
        }),
        Arc::new(FakeEngine { cluster_id: None }),
        ReportPublisher::new(sink.clone(), "outgoing"),
    )
    .consumer_watcher(stats.clone())
    .build();

    pipeline.run(&source, CancellationToken::new()).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["OrgID"], 12383032);
    assert_eq!(reports[0]["ClusterName"], Value::Null);
    assert_eq!(reports[0]["Report"]["archive"], "first.tar.gz");
    assert_eq!(reports[0]["LastChecked"], "2020-01-23T16:15:59.478901889Z");
    assert_eq!(reports[0]["RequestId"], "request-first.tar.gz");
    assert_eq!(reports[1]["Report"]["archive"], "second.tar.gz");

    assert_eq!(
        *source.committed.lock().unwrap(),
        vec![0, 1, 2, 3, 4, 5, 6]
    );

    assert_eq!(
        stats.snapshot(),
        StatsSnapshot {
            received: 7,
            downloaded: 2,
            processed: 2,
            published: 2,
            failures: 1,
            not_handled: 0,
        }
    );
}

#[tokio::test]
async fn test_pipeline_takes_cluster_name_from_archive() {
    init_tracing();

    let source = QueueSource::new(vec![raw(0, Some(now_ms()), notification("archive.tar.gz"))]);
    let sink = Arc::new(RecordingSink::default());
    let pipeline = Pipeline::builder(
        Arc::new(StoreDownloader {
            store: PathBuf::from("/archives"),
        }),
        Arc::new(FakeEngine {
            cluster_id: Some(CLUSTER_ID),
        }),
        ReportPublisher::new(sink.clone(), "outgoing"),
    )
    .cluster_id_watcher(Arc::new(ClusterIdWatcher::new()))
    .build();

    pipeline.run(&source, CancellationToken::new()).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["ClusterName"], CLUSTER_ID);
}

#[tokio::test]
async fn test_pipeline_keeps_decoded_cluster_name_without_id_file() {
    init_tracing();

    let source = QueueSource::new(vec![raw(0, Some(now_ms()), notification("archive.tar.gz"))]);
    let sink = Arc::new(RecordingSink::default());
    let pipeline = Pipeline::builder(
        Arc::new(StoreDownloader {
            store: PathBuf::from("/archives"),
        }),
        Arc::new(FakeEngine { cluster_id: None }),
        ReportPublisher::new(sink.clone(), "outgoing"),
    )
    .cluster_id_watcher(Arc::new(ClusterIdWatcher::new()))
    .build();

    pipeline.run(&source, CancellationToken::new()).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["ClusterName"], Value::Null);
}

#[tokio::test]
async fn test_pipeline_stops_when_cancelled() {
    init_tracing();

    /// Never yields a record.
    struct IdleSource;

    #[async_trait]
    impl RecordSource for IdleSource {
        async fn recv(&self) -> Result<Option<RawRecord>> {
            std::future::pending().await
        }
    }

    let pipeline = Pipeline::builder(
        Arc::new(StoreDownloader {
            store: PathBuf::from("/archives"),
        }),
        Arc::new(FakeEngine { cluster_id: None }),
        ReportPublisher::new(Arc::new(RecordingSink::default()), "outgoing"),
    )
    .build();

    let token = CancellationToken::new();
    token.cancel();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        pipeline.run(&IdleSource, token),
    )
    .await
    .expect("pipeline should stop once cancelled");
}

#[tokio::test]
async fn test_pipeline_survives_panicking_engine_without_timeout() {
    init_tracing();

    /// Panics on the first archive, succeeds afterwards.
    struct FlakyEngine {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Engine for FlakyEngine {
        async fn process(&self, _archive: &Path, _watcher: &dyn EngineWatcher) -> anyhow::Result<String> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                panic!("engine crashed");
            }
            Ok(r#"{"reports":[]}"#.to_string())
        }
    }

    let now = now_ms();
    let source = QueueSource::new(vec![
        raw(0, Some(now), notification("crash.tar.gz")),
        raw(1, Some(now), notification("fine.tar.gz")),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let stats = Arc::new(StatsWatcher::new());
    let pipeline = Pipeline::builder(
        Arc::new(StoreDownloader {
            store: PathBuf::from("/archives"),
        }),
        Arc::new(FlakyEngine {
            calls: Mutex::new(0),
        }),
        ReportPublisher::new(sink.clone(), "outgoing"),
    )
    .processing_timeout(std::time::Duration::ZERO)
    .consumer_watcher(stats.clone())
    .build();

    pipeline.run(&source, CancellationToken::new()).await;

    assert_eq!(*source.committed.lock().unwrap(), vec![0, 1]);
    assert_eq!(sink.reports().len(), 1);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.failures, 1);
    assert_eq!(snapshot.published, 1);
}
