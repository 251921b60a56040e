//! Command-line and environment configuration.

pub mod duration;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use ccx_pipeline_consumer::ConsumerConfig;
use clap::Parser;

pub use duration::parse_duration;

/// Configuration of the pipeline consumer.
#[derive(Debug, Clone, Parser)]
#[command(name = "ccx-data-pipeline")]
#[command(about = "Processes uploaded cluster archives and publishes the reports")]
#[command(version)]
pub struct Config {
    /// Kafka brokers (comma-separated)
    #[clap(long = "bootstrap-server", env = "CCX_BOOTSTRAP_SERVER", default_value = "")]
    pub brokers: String,
    /// Name of an environment variable holding the brokers; overrides
    /// --bootstrap-server when that variable is set
    #[clap(long, env = "CCX_BOOTSTRAP_SERVER_ENV")]
    pub bootstrap_server_env: Option<String>,
    /// Consumer group ID
    #[clap(long, env = "CCX_GROUP_ID", default_value = "ccx-data-pipeline")]
    pub group_id: String,
    /// Topic announcing new archives
    #[clap(long, env = "CCX_INCOMING_TOPIC", default_value = "")]
    pub incoming_topic: String,
    /// Name of an environment variable holding the incoming topic
    #[clap(long, env = "CCX_INCOMING_TOPIC_ENV")]
    pub incoming_topic_env: Option<String>,
    /// Topic receiving the reports
    #[clap(long, env = "CCX_OUTGOING_TOPIC", default_value = "")]
    pub outgoing_topic: String,
    /// Name of an environment variable holding the outgoing topic
    #[clap(long, env = "CCX_OUTGOING_TOPIC_ENV")]
    pub outgoing_topic_env: Option<String>,
    /// Topic receiving payload tracker status updates; disabled when unset
    #[clap(long, env = "CCX_PAYLOAD_TRACKER_TOPIC")]
    pub payload_tracker_topic: Option<String>,
    /// Records older than this are skipped (e.g. "2h", "90m")
    #[clap(long, env = "CCX_MAX_RECORD_AGE", default_value = "2h", value_parser = parse_duration)]
    pub max_record_age: Duration,
    /// Warn when no record arrives for this long
    #[clap(long, env = "CCX_MAX_ELAPSED_TIME", default_value = "30m", value_parser = parse_duration)]
    pub max_elapsed_time: Duration,
    /// Warn when processing one archive takes longer than this; "0" disables
    #[clap(long, env = "CCX_PROCESSING_TIMEOUT", default_value = "0", value_parser = parse_duration)]
    pub processing_timeout: Duration,
    /// Auto offset reset strategy ("earliest" or "latest")
    #[clap(long, default_value = "earliest")]
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    #[clap(long, default_value = "6000")]
    pub session_timeout_ms: String,
    /// Directory relative archive locators are resolved against
    #[clap(long, env = "CCX_ARCHIVE_ROOT")]
    pub archive_root: Option<PathBuf>,
    /// Executable processing an archive. Invoked as
    /// `<command> [args...] <archive> <extraction dir>`; its stdout is the report
    #[clap(long, env = "CCX_ENGINE_COMMAND")]
    pub engine_command: PathBuf,
    /// Extra arguments passed to the engine before the archive path
    #[clap(long = "engine-arg", value_name = "ARG")]
    pub engine_args: Vec<String>,
}

impl Config {
    /// Consumer settings, with the brokers and incoming topic resolved from
    /// the process environment.
    pub fn consumer_config(&self) -> anyhow::Result<ConsumerConfig> {
        self.consumer_config_with(|name| std::env::var(name).ok())
    }

    pub fn consumer_config_with<F>(&self, lookup: F) -> anyhow::Result<ConsumerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let brokers = resolve(
            "bootstrap server",
            &self.brokers,
            self.bootstrap_server_env.as_deref(),
            &lookup,
        )?;
        let topic = resolve(
            "incoming topic",
            &self.incoming_topic,
            self.incoming_topic_env.as_deref(),
            &lookup,
        )?;

        Ok(ConsumerConfig {
            brokers,
            group_id: self.group_id.clone(),
            topic,
            auto_offset_reset: self.auto_offset_reset.clone(),
            session_timeout_ms: self.session_timeout_ms.clone(),
        })
    }

    pub fn outgoing_topic(&self) -> anyhow::Result<String> {
        self.outgoing_topic_with(|name| std::env::var(name).ok())
    }

    pub fn outgoing_topic_with<F>(&self, lookup: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(
            "outgoing topic",
            &self.outgoing_topic,
            self.outgoing_topic_env.as_deref(),
            &lookup,
        )
    }
}

/// Take the value of the `env_name` variable when it is set, `direct`
/// otherwise. The result must not be empty.
fn resolve<F>(what: &str, direct: &str, env_name: Option<&str>, lookup: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = env_name
        .and_then(|name| {
            let value = lookup(name);
            if value.is_none() {
                tracing::debug!("Environment variable {name} is not set, using the {what} option");
            }
            value
        })
        .unwrap_or_else(|| direct.to_string());

    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(anyhow::anyhow!("no {what} configured")).with_context(|| match env_name {
            Some(name) => format!("neither the {what} option nor ${name} is set"),
            None => format!("the {what} option is required"),
        });
    }
    Ok(value)
}
