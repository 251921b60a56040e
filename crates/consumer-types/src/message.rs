//! Record types.
//!
//! A record is one unit of input from the queue: routing metadata plus a
//! value. Before decoding the value is a raw [`Payload`]; afterwards it is a
//! [`RecordValue`] holding either the decoded JSON or the error that decoding
//! produced.

use serde_json::{Map, Value};

use crate::error::PipelineError;

/// A validated, enriched input message.
///
/// On success it contains `url`, `identity` and `ClusterName`, and no longer
/// contains `b64_identity`. Unknown fields are passed through untouched.
pub type DecodedMessage = Map<String, Value>;

/// A record received from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<V = RecordValue> {
    /// Topic name
    pub topic: String,
    /// Partition number
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Producer-assigned timestamp in milliseconds since epoch.
    ///
    /// `None` when the queue could not provide an integer timestamp.
    pub timestamp: Option<i64>,
    /// Payload or decode outcome
    pub value: V,
}

/// A record exactly as the queue client delivered it.
pub type RawRecord = Record<Payload>;

/// The value of a raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Binary payload (the usual case for Kafka)
    Bytes(Vec<u8>),
    /// Textual payload
    Text(String),
    /// A structure some upstream component already decoded
    Structured(Value),
    /// No payload at all (e.g. a tombstone)
    Empty,
}

/// The value of a record after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Json(Value),
    Failed(PipelineError),
}

impl<V> Record<V> {
    /// Replace the value, keeping the coordinates.
    pub fn map_value<U, F>(self, f: F) -> Record<U>
    where
        F: FnOnce(V) -> U,
    {
        Record {
            topic: self.topic,
            partition: self.partition,
            offset: self.offset,
            key: self.key,
            timestamp: self.timestamp,
            value: f(self.value),
        }
    }
}

impl Record<RecordValue> {
    /// The decoded message, when decoding succeeded and produced an object.
    pub fn message(&self) -> Option<&DecodedMessage> {
        match &self.value {
            RecordValue::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// The `request_id` the producer attached to the message, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.message()
            .and_then(|m| m.get("request_id"))
            .and_then(Value::as_str)
    }
}

impl From<Result<DecodedMessage, PipelineError>> for RecordValue {
    fn from(outcome: Result<DecodedMessage, PipelineError>) -> Self {
        match outcome {
            Ok(message) => RecordValue::Json(Value::Object(message)),
            Err(err) => RecordValue::Failed(err),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl Payload {
    /// Short description of the payload kind, used in type errors.
    pub fn describe(&self) -> String {
        match self {
            Payload::Bytes(_) => "bytes".to_string(),
            Payload::Text(_) => "string".to_string(),
            Payload::Structured(value) => describe_json(value).to_string(),
            Payload::Empty => "empty payload".to_string(),
        }
    }
}

/// Name of the JSON kind of `value`.
pub fn describe_json(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
