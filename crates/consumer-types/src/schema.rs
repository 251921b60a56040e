//! Wire schemas of the input message and of the embedded identity.
//!
//! Validation is done by deserializing a [`serde_json::Value`] into these
//! structs. Unknown properties are ignored, so producers may add fields
//! without breaking the consumer.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Schema of the input message consumed from the queue.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InputMessage {
    pub url: String,
    /// Base64-encoded JSON identity document
    pub b64_identity: String,
    pub timestamp: String,
}

/// Schema of the decoded `b64_identity` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdentityDocument {
    pub identity: Identity,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Identity {
    #[serde(default, deserialize_with = "present")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub auth_type: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub internal: Option<Internal>,
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub system: Option<System>,
    #[serde(default, deserialize_with = "present")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Internal {
    #[serde(default, deserialize_with = "present")]
    pub auth_time: Option<f64>,
    /// Required whenever `internal` is present
    pub org_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct System {
    #[serde(default, deserialize_with = "present")]
    pub cluster_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    #[serde(default, deserialize_with = "present")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub locale: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub is_internal: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub is_org_admin: Option<bool>,
}

/// Optional property that must hold a value of its type when present.
///
/// Absent properties fall back to `None` through `#[serde(default)]`; an
/// explicit `null` is a type violation.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl InputMessage {
    pub fn validate(value: &Value) -> Result<Self, serde_json::Error> {
        InputMessage::deserialize(value)
    }
}

impl IdentityDocument {
    pub fn validate(value: &Value) -> Result<Self, serde_json::Error> {
        IdentityDocument::deserialize(value)
    }

    /// `identity.system.cluster_id`, if the identity carries one.
    pub fn cluster_id(&self) -> Option<&str> {
        self.identity
            .system
            .as_ref()
            .and_then(|system| system.cluster_id.as_deref())
    }
}
