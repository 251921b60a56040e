//! Shared types for the ccx-data-pipeline consumer.
//!
//! # Modules
//!
//! - [`message`] - raw and decoded records
//! - [`schema`] - wire schemas of the input message and the embedded identity
//! - [`error`] - per-record pipeline errors
//!
//! These live in their own crate so that watchers, engines and publishers can
//! be written against them without depending on the Kafka client.

pub mod error;
pub mod message;
pub mod schema;

pub use error::{ErrorClass, PipelineError, Result};
pub use message::{describe_json, DecodedMessage, Payload, RawRecord, Record, RecordValue};
pub use schema::{IdentityDocument, InputMessage};
