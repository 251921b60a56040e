//! ccx-data-pipeline
//!
//! Consumes notifications about uploaded cluster archives from Kafka, runs each
//! archive through a processing engine and publishes the resulting report.
//!
//! # Crates
//!
//! - `consumer_types` - records, decoded messages and pipeline errors
//! - `ccx_pipeline_consumer` - decoding, eligibility gate, liveness watchdog,
//!   processing supervisor, watchers and the pipeline loop
//!
//! This crate adds the command-line configuration and the local collaborators
//! used by the binary.
//!
//! # CLI Usage
//!
//! ```bash
//! ccx-data-pipeline \
//!   --bootstrap-server localhost:9092 \
//!   --incoming-topic platform.upload.announce \
//!   --outgoing-topic ccx.ocp.results \
//!   --engine-command /usr/libexec/ccx/analyze \
//!   --max-record-age 2h --max-elapsed-time 30m --processing-timeout 5m
//! ```

pub mod config;
pub mod downloader;
pub mod engine;

pub use config::Config;
pub use downloader::LocalDownloader;
pub use engine::CommandEngine;
