use async_trait::async_trait;
use consumer_types::{Payload, RawRecord, Record};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as RdkafkaConsumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};

use crate::error::{Error, Result};

/// Configuration for the Kafka consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic announcing new archives
    pub topic: String,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// Old records are skipped by the eligibility gate anyway, so "earliest"
    /// only costs the time needed to read past them.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "ccx-data-pipeline".to_string(),
            topic: "".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "6000".to_string(),
        }
    }
}

/// Source of raw records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Wait for the next record. `Ok(None)` means the source is exhausted.
    async fn recv(&self) -> Result<Option<RawRecord>>;

    /// Mark `record` as consumed.
    async fn commit(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
}

/// Kafka consumer yielding one record at a time
pub struct KafkaSource {
    consumer: StreamConsumer,
    config: ConsumerConfig,
}

impl KafkaSource {
    /// Create a consumer subscribed to the configured topic
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        if config.topic.is_empty() {
            return Err(Error::InvalidConfig("incoming topic is empty".to_string()));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| Error::Consumer(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| Error::Consumer(format!("Failed to subscribe to topic: {e}")))?;

        tracing::info!(
            "Consuming topic '{}' as group '{}' from brokers {}",
            config.topic,
            config.group_id,
            config.brokers
        );

        Ok(Self { consumer, config })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Get the underlying consumer (for advanced use cases)
    pub fn inner(&self) -> &StreamConsumer {
        &self.consumer
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn recv(&self) -> Result<Option<RawRecord>> {
        let msg = self
            .consumer
            .recv()
            .await
            .map_err(|e| Error::Consumer(format!("Error receiving message: {e}")))?;
        Ok(Some(raw_record(&msg)))
    }

    async fn commit(&self, record: &Record) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
            .map_err(|e| Error::Consumer(format!("Failed to add partition offset: {e}")))?;

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| Error::Consumer(format!("Failed to commit offset: {e}")))
    }
}

fn raw_record(msg: &BorrowedMessage) -> RawRecord {
    RawRecord {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        timestamp: msg.timestamp().to_millis(),
        value: msg
            .payload()
            .map(|bytes| Payload::Bytes(bytes.to_vec()))
            .unwrap_or(Payload::Empty),
    }
}
