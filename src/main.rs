//! Command-line entry point for ccx-data-pipeline
//!
//! # Usage Examples
//!
//! ```bash
//! # Brokers and topics given directly
//! ccx-data-pipeline \
//!   --bootstrap-server localhost:9092 \
//!   --incoming-topic platform.upload.announce \
//!   --outgoing-topic ccx.ocp.results \
//!   --engine-command /usr/libexec/ccx/analyze
//!
//! # Brokers taken from a variable set by the deployment
//! ccx-data-pipeline \
//!   --bootstrap-server-env KAFKA_BROKERS \
//!   --incoming-topic platform.upload.announce \
//!   --outgoing-topic ccx.ocp.results \
//!   --payload-tracker-topic platform.payload-status \
//!   --engine-command /usr/libexec/ccx/analyze
//! ```
//!
//! Log verbosity is controlled with `RUST_LOG` (default `info`).

use std::sync::Arc;

use anyhow::Context;
use ccx_data_pipeline::{CommandEngine, Config, LocalDownloader};
use ccx_pipeline_consumer::{
    Client, ClusterIdWatcher, MessageSink, PayloadTrackerWatcher, Pipeline, ReportPublisher,
    StatsWatcher,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    info!("ccx-data-pipeline version {}", env!("CARGO_PKG_VERSION"));

    let consumer_config = config
        .consumer_config()
        .context("invalid consumer configuration")?;
    let outgoing_topic = config
        .outgoing_topic()
        .context("invalid producer configuration")?;

    let client = Client::new(consumer_config)?;
    let source = client.create_source()?;
    let sink: Arc<dyn MessageSink> = Arc::new(client.create_sink()?);

    let stats = Arc::new(StatsWatcher::new());
    let mut builder = Pipeline::builder(
        Arc::new(LocalDownloader::new(config.archive_root.clone())),
        Arc::new(CommandEngine::new(
            config.engine_command.clone(),
            config.engine_args.clone(),
        )),
        ReportPublisher::new(Arc::clone(&sink), outgoing_topic),
    )
    .max_record_age(config.max_record_age)
    .max_elapsed_time(config.max_elapsed_time)
    .processing_timeout(config.processing_timeout)
    .consumer_watcher(stats.clone())
    .cluster_id_watcher(Arc::new(ClusterIdWatcher::new()));

    if let Some(topic) = &config.payload_tracker_topic {
        info!("Sending payload tracker status updates to '{topic}'");
        builder = builder.consumer_watcher(Arc::new(PayloadTrackerWatcher::new(
            Arc::clone(&sink),
            topic.clone(),
        )));
    }
    let pipeline = builder.build();

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.cancel(),
            Err(e) => warn!("Unable to listen for the shutdown signal: {e}"),
        }
    });

    pipeline.run(&source, token).await;

    stats.log_summary();
    info!("ccx-data-pipeline stopped");
    Ok(())
}
