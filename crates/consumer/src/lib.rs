//! Kafka consumer library for `ccx-data-pipeline`: receives notifications about
//! uploaded cluster archives, processes the archives and publishes the resulting
//! reports.
//!
//! Features:
//!
//! - Decoding: Validate incoming messages and decode their base64 identity
//! - Eligibility Gate: Skip empty, undecodable, untimestamped or too old records
//! - Soft Processing Deadline: Warn when processing outlives its time frame
//! - Liveness Watchdog: Warn when no message arrives for too long
//! - Watchers: Observe record lifecycle events (stats, payload tracker, cluster id)

/// High-level API creating the record source and the message sink
///
/// Both talk to the same brokers given in the consumer config.
pub mod client;

/// Record source trait and its Kafka implementation with manual commits
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod gate;

/// Per-record processing loop
///
/// Ties the decoder, gate, supervisor, publisher and watchers together.
pub mod pipeline;
pub mod publisher;
pub mod supervisor;
pub mod watchdog;
pub mod watchers;

// Re-export main types for easy access
pub use client::Client;
pub use consumer::{ConsumerConfig, KafkaSource, RecordSource};
pub use decoder::{decode, decode_identity};
pub use error::{Error, Result};
pub use gate::{extract_url, Eligibility, EligibilityGate, Rejection, DEFAULT_MAX_RECORD_AGE};
pub use pipeline::{Downloader, Engine, Pipeline, PipelineBuilder};
pub use publisher::{format_report, KafkaSink, MessageSink, ReportPublisher};
pub use supervisor::ProcessingSupervisor;
pub use watchdog::{LivenessWatchdog, ReceiptClock, WatchdogState, DEFAULT_MAX_ELAPSED};
pub use watchers::{
    ClusterIdWatcher, ConsumerWatcher, EngineWatcher, PayloadTrackerWatcher, StatsSnapshot,
    StatsWatcher, Watchers,
};
