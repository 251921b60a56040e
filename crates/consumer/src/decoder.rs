//! Raw payload → validated, enriched message.
//!
//! Decoding never panics and never returns early through `?` into the
//! polling loop: every failure is a [`PipelineError`] value that travels with
//! the record until the eligibility gate reports it.
//!
//! Validation order is fixed: input message schema, base64, identity JSON,
//! identity schema. A malformed message is classified by the first step it
//! fails.

use base64::Engine;
use consumer_types::{DecodedMessage, IdentityDocument, InputMessage, Payload, PipelineError};
use serde_json::Value;
use tracing::debug;

/// Decode a raw payload into a [`DecodedMessage`].
pub fn decode(payload: &Payload) -> Result<DecodedMessage, PipelineError> {
    let parsed: Value = match payload {
        Payload::Bytes(bytes) => serde_json::from_slice::<Value>(bytes),
        Payload::Text(text) => serde_json::from_str::<Value>(text),
        Payload::Structured(_) | Payload::Empty => {
            return Err(PipelineError::UnexpectedType(payload.describe()));
        }
    }
    .map_err(|e| PipelineError::Decode(e.to_string()))?;

    let input = InputMessage::validate(&parsed).map_err(|e| PipelineError::Schema(e.to_string()))?;

    let identity = decode_identity(&input.b64_identity)?;
    let cluster_name = IdentityDocument::validate(&identity)
        .map_err(|e| PipelineError::IdentitySchema(e.to_string()))?
        .cluster_id()
        .map(|id| Value::String(id.to_string()))
        .unwrap_or(Value::Null);

    // The schema check above guarantees an object.
    let Value::Object(mut message) = parsed else {
        return Err(PipelineError::Schema("message is not an object".to_string()));
    };

    message.remove("b64_identity");
    message.insert("identity".to_string(), identity);
    message.insert("ClusterName".to_string(), cluster_name);

    debug!(url = %input.url, "decoded input message");
    Ok(message)
}

/// Base64-decode the embedded identity and parse it as JSON.
///
/// Schema validation of the result is left to the caller.
pub fn decode_identity(b64_identity: &str) -> Result<Value, PipelineError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64_identity)
        .map_err(|e| PipelineError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| PipelineError::Decode(format!("identity: {e}")))
}
