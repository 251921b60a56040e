//! Eligibility gate: decides whether a decoded record proceeds to processing.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. the record carries a non-empty value
//! 2. the value is not a decode failure
//! 3. the record timestamp is present and within `max_record_age`
//! 4. the value is a JSON object
//! 5. the object has a `url` field

use std::time::Duration;

use chrono::{DateTime, Utc};
use consumer_types::{describe_json, PipelineError, Record, RecordValue};
use serde_json::Value;
use tracing::{debug, error};

/// Default maximum age of a record before it is skipped (2 hours).
pub const DEFAULT_MAX_RECORD_AGE: Duration = Duration::from_secs(7200);

/// Outcome of [`EligibilityGate::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Handled,
    NotHandled(Rejection),
}

/// Why a record was not handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    EmptyValue,
    DecodeFailed(PipelineError),
    MissingTimestamp,
    TooOld { age: Duration },
    NotAMapping(&'static str),
    MissingUrl,
}

impl Rejection {
    /// Whether watchers should get an `on_not_handled` notification.
    ///
    /// Decode failures were already reported when decoding, and records
    /// skipped for their age are expected during backlog draining.
    pub fn notifies_watchers(&self) -> bool {
        !matches!(
            self,
            Rejection::DecodeFailed(_) | Rejection::MissingTimestamp | Rejection::TooOld { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct EligibilityGate {
    max_record_age: Duration,
}

impl Default for EligibilityGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_AGE)
    }
}

impl EligibilityGate {
    pub fn new(max_record_age: Duration) -> Self {
        Self { max_record_age }
    }

    pub fn max_record_age(&self) -> Duration {
        self.max_record_age
    }

    /// Whether the record should be handled, as of now.
    pub fn handles(&self, record: &Record) -> bool {
        self.evaluate(record) == Eligibility::Handled
    }

    pub fn evaluate(&self, record: &Record) -> Eligibility {
        self.evaluate_at(record, Utc::now())
    }

    /// Evaluate the record as of `now`.
    pub fn evaluate_at(&self, record: &Record, now: DateTime<Utc>) -> Eligibility {
        match self.check(record, now) {
            Ok(()) => Eligibility::Handled,
            Err(rejection) => Eligibility::NotHandled(rejection),
        }
    }

    fn check(&self, record: &Record, now: DateTime<Utc>) -> Result<(), Rejection> {
        let value = match &record.value {
            RecordValue::Json(value) if is_empty(value) => {
                debug!("Input message value is empty");
                return Err(Rejection::EmptyValue);
            }
            RecordValue::Json(value) => value,
            RecordValue::Failed(err) => {
                error!("{}", err.format(record));
                return Err(Rejection::DecodeFailed(err.clone()));
            }
        };

        let Some(timestamp_ms) = record.timestamp else {
            error!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "Input message timestamp is not an integer"
            );
            return Err(Rejection::MissingTimestamp);
        };

        let age_ms = now.timestamp_millis().saturating_sub(timestamp_ms);
        let max_age_ms = i64::try_from(self.max_record_age.as_millis()).unwrap_or(i64::MAX);
        if age_ms > max_age_ms {
            let age = Duration::from_millis(age_ms.unsigned_abs());
            debug!(
                offset = record.offset,
                age_secs = age.as_secs(),
                "Skipping old message"
            );
            return Err(Rejection::TooOld { age });
        }

        let Value::Object(map) = value else {
            debug!("Input message value is not a dictionary: {value}");
            return Err(Rejection::NotAMapping(describe_json(value)));
        };

        if !map.contains_key("url") {
            debug!("Input message is missing a 'url' field: {value}");
            return Err(Rejection::MissingUrl);
        }

        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Read the locator from a record that passed the gate.
///
/// The gate only guarantees a `url` field. A non-string `url`, or a record
/// that reached processing without being gated, is a hard failure for that
/// record.
pub fn extract_url(record: &Record) -> Result<&str, PipelineError> {
    let message = match &record.value {
        RecordValue::Json(Value::Object(map)) => map,
        RecordValue::Json(other) => {
            return Err(PipelineError::UrlExtraction(format!(
                "value is not a mapping: {}",
                describe_json(other)
            )));
        }
        RecordValue::Failed(err) => {
            return Err(PipelineError::UrlExtraction(err.to_string()));
        }
    };

    let url = message
        .get("url")
        .ok_or_else(|| PipelineError::UrlExtraction("missing 'url' field".to_string()))?
        .as_str()
        .ok_or_else(|| PipelineError::UrlExtraction("'url' is not a string".to_string()))?;

    debug!("Extracted URL from input message: {url}");
    Ok(url)
}
