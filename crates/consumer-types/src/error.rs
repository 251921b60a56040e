//! Error types for per-record pipeline failures.
//!
//! A [`PipelineError`] is a value, not a fault: the decoder stores it inside
//! the record it failed to decode, and the pipeline reports it once before
//! moving on to the next record.

use std::fmt;

use thiserror::Error;

use crate::message::Record;

/// Errors that can occur while handling a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("unexpected input message type: {0}")]
    UnexpectedType(String),

    #[error("unable to decode received message: {0}")]
    Decode(String),

    #[error("invalid input message JSON schema: {0}")]
    Schema(String),

    #[error("invalid input message JSON schema: identity: {0}")]
    IdentitySchema(String),

    #[error("base64 encoded identity could not be parsed: {0}")]
    Base64(String),

    #[error("unable to extract URL from input message: {0}")]
    UrlExtraction(String),

    #[error("error encoding the response to publish: {0}")]
    ResponseEncoding(String),

    #[error("error extracting the OrgID: {0}")]
    OrgId(String),

    #[error("unable to publish the report: {0}")]
    Delivery(String),

    #[error("unable to download the archive: {0}")]
    Download(String),

    #[error("error processing the archive: {0}")]
    Processing(String),
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The payload is not a decodable byte or string form.
    Type,
    /// The payload (or the embedded identity) is not valid JSON.
    Syntax,
    /// The payload or the identity violates its schema.
    Schema,
    /// The embedded identity is not valid base64.
    Encoding,
    /// A required field is missing where its presence was assumed.
    Extraction,
    /// The outbound envelope could not be assembled.
    Output,
    /// A collaborator (downloader, engine, queue) failed.
    External,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::UnexpectedType(_) => ErrorClass::Type,
            PipelineError::Decode(_) => ErrorClass::Syntax,
            PipelineError::Schema(_) | PipelineError::IdentitySchema(_) => ErrorClass::Schema,
            PipelineError::Base64(_) => ErrorClass::Encoding,
            PipelineError::UrlExtraction(_) => ErrorClass::Extraction,
            PipelineError::ResponseEncoding(_) | PipelineError::OrgId(_) => ErrorClass::Output,
            PipelineError::Delivery(_)
            | PipelineError::Download(_)
            | PipelineError::Processing(_) => ErrorClass::External,
        }
    }

    /// Render the error from the perspective of the record it relates to,
    /// so a log line can be correlated with its source coordinates.
    pub fn format<V>(&self, record: &Record<V>) -> String {
        format!(
            "Status: Error; Topic: {}; Partition: {}; Offset: {}; Cause: {}",
            record.topic, record.partition, record.offset, self
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Type => "type",
            ErrorClass::Syntax => "syntax",
            ErrorClass::Schema => "schema",
            ErrorClass::Encoding => "encoding",
            ErrorClass::Extraction => "extraction",
            ErrorClass::Output => "output",
            ErrorClass::External => "external",
        };
        f.write_str(name)
    }
}

/// Result type alias for per-record operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Payload, Record};

    #[test]
    fn test_format_includes_record_coordinates() {
        let record = Record {
            topic: "platform.upload.announce".to_string(),
            partition: 3,
            offset: 1024,
            key: None,
            timestamp: Some(0),
            value: Payload::Empty,
        };
        let err = PipelineError::Decode("expected value at line 1 column 1".to_string());

        assert_eq!(
            err.format(&record),
            "Status: Error; Topic: platform.upload.announce; Partition: 3; Offset: 1024; \
             Cause: unable to decode received message: expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_identity_schema_shares_schema_class() {
        let outer = PipelineError::Schema("missing field `url`".to_string());
        let inner = PipelineError::IdentitySchema("missing field `org_id`".to_string());

        assert_eq!(outer.class(), ErrorClass::Schema);
        assert_eq!(inner.class(), ErrorClass::Schema);
        assert_ne!(outer, inner);
        assert!(inner
            .to_string()
            .starts_with("invalid input message JSON schema: "));
    }
}
