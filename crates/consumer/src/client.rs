use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;

use crate::consumer::{ConsumerConfig, KafkaSource};
use crate::error::{Error, Result};
use crate::publisher::KafkaSink;

/// Identifier reported to the brokers by the producer.
const CLIENT_ID: &str = "ccx-data-pipeline";

/// Kafka client creating the source of incoming records and the sink for
/// outgoing messages against the same brokers.
pub struct Client {
    config: ConsumerConfig,
}

impl Client {
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        if config.brokers.trim().is_empty() {
            return Err(Error::InvalidConfig("no bootstrap servers configured".to_string()));
        }
        Ok(Self { config })
    }

    /// Create the consumer of incoming records
    pub fn create_source(&self) -> Result<KafkaSource> {
        KafkaSource::new(self.config.clone())
    }

    /// Create a producer for outgoing messages
    pub fn create_sink(&self) -> Result<KafkaSink> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("client.id", CLIENT_ID)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| Error::Producer(format!("Failed to create producer: {e}")))?;

        Ok(KafkaSink::new(producer))
    }

    /// Get the config
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }
}
