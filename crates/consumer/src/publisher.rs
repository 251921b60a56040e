//! Outbound envelope formatting and publishing.

use std::sync::Arc;
use std::time::Duration;

use consumer_types::{DecodedMessage, PipelineError, Record};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// How long to wait for in-flight messages when flushing a sink.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outgoing channel accepting byte messages for a named destination.
pub trait MessageSink: Send + Sync {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Wait for queued messages to leave the process.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// [`MessageSink`] backed by a Kafka producer.
///
/// Sends are enqueued without waiting for the delivery report; `rdkafka`
/// owns retries and connection management.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    pub fn new(producer: FutureProducer) -> Self {
        Self { producer }
    }
}

impl MessageSink for KafkaSink {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::<(), Vec<u8>>::to(topic).payload(&payload);
        self.producer
            .send_result(record)
            .map(|_delivery| ())
            .map_err(|(e, _)| Error::Producer(format!("Failed to enqueue message: {e}")))
    }

    fn flush(&self) -> Result<()> {
        self.producer.flush(FLUSH_TIMEOUT)?;
        Ok(())
    }
}

/// The outbound envelope. Field order is part of the wire format.
#[derive(Debug, Serialize)]
struct Report<'a> {
    #[serde(rename = "OrgID")]
    org_id: i64,
    #[serde(rename = "ClusterName")]
    cluster_name: &'a Value,
    #[serde(rename = "Report")]
    report: Value,
    #[serde(rename = "LastChecked")]
    last_checked: &'a Value,
    #[serde(rename = "RequestId")]
    request_id: &'a Value,
}

/// Assemble the newline-terminated outbound message for `message` and the
/// JSON-encoded engine `response`.
pub fn format_report(message: &DecodedMessage, response: &str) -> std::result::Result<String, PipelineError> {
    let report: Value = serde_json::from_str(response)
        .map_err(|e| PipelineError::ResponseEncoding(format!("{e}: {response}")))?;

    let envelope = Report {
        org_id: org_id(message)?,
        cluster_name: message.get("ClusterName").unwrap_or(&Value::Null),
        report,
        last_checked: message.get("timestamp").unwrap_or(&Value::Null),
        request_id: message.get("request_id").unwrap_or(&Value::Null),
    };

    let mut encoded = serde_json::to_string(&envelope)
        .map_err(|e| PipelineError::ResponseEncoding(e.to_string()))?;
    encoded.push('\n');
    Ok(encoded)
}

fn org_id(message: &DecodedMessage) -> std::result::Result<i64, PipelineError> {
    let value = message
        .get("identity")
        .and_then(|identity| identity.pointer("/identity/internal/org_id"))
        .ok_or_else(|| PipelineError::OrgId("missing identity.internal.org_id".to_string()))?;

    match value {
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| PipelineError::OrgId(format!("{s}: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| PipelineError::OrgId(n.to_string())),
        other => Err(PipelineError::OrgId(other.to_string())),
    }
}

/// Publishes reports to the outgoing topic and logs pipeline errors.
#[derive(Clone)]
pub struct ReportPublisher {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl ReportPublisher {
    pub fn new(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        info!("Producing to topic '{topic}'");
        Self { sink, topic }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publish(
        &self,
        record: &Record,
        message: &DecodedMessage,
        response: &str,
    ) -> std::result::Result<(), PipelineError> {
        let encoded = format_report(message, response)?;

        debug!("Sending response to the {} topic.", self.topic);
        self.sink
            .send(&self.topic, encoded.into_bytes())
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        debug!("Message has been sent successfully.");

        let last_checked = message
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default();
        info!(
            "Status: Success; Topic: {}; Partition: {}; Offset: {}; LastChecked: {}",
            record.topic, record.partition, record.offset, last_checked
        );
        Ok(())
    }

    /// Report a pipeline error for `record`.
    pub fn error(&self, record: &Record, err: &PipelineError) {
        error!("{}", err.format(record));
    }

    pub fn flush(&self) {
        if let Err(e) = self.sink.flush() {
            warn!("Failed to flush outgoing messages: {e}");
        }
    }
}
