//! Status updates for the payload tracker service.
//!
//! Each status change of a record carrying a `request_id` is announced on a
//! dedicated topic, so the upload can be followed across services.

use std::sync::Arc;

use chrono::Utc;
use consumer_types::{PipelineError, Record};
use serde::Serialize;
use tracing::{debug, warn};

use super::ConsumerWatcher;
use crate::publisher::MessageSink;

const SERVICE_NAME: &str = "ccx-data-pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Received,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Serialize)]
struct StatusMessage<'a> {
    service: &'a str,
    request_id: &'a str,
    status: Status,
    date: String,
}

pub struct PayloadTrackerWatcher {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl PayloadTrackerWatcher {
    pub fn new(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    fn publish_status(&self, record: &Record, status: Status) {
        let Some(request_id) = record.request_id() else {
            debug!(offset = record.offset, "No request_id; skipping payload tracker update");
            return;
        };

        let message = StatusMessage {
            service: SERVICE_NAME,
            request_id,
            status,
            date: Utc::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        };

        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Unable to encode payload tracker status: {e}");
                return;
            }
        };

        if let Err(e) = self.sink.send(&self.topic, payload) {
            warn!(request_id, "Unable to send payload tracker status: {e}");
        }
    }
}

impl ConsumerWatcher for PayloadTrackerWatcher {
    fn on_recv(&self, record: &Record) {
        self.publish_status(record, Status::Received);
    }

    fn on_process(&self, record: &Record, _result: &str) {
        self.publish_status(record, Status::Processing);
    }

    fn on_consumer_success(&self, record: &Record, _result: &str) {
        self.publish_status(record, Status::Success);
    }

    fn on_consumer_failure(&self, record: &Record, _error: &PipelineError) {
        self.publish_status(record, Status::Error);
    }
}
