//! JSON text codec for the Boardsync wire protocol.
//!
//! Everything on the wire — negotiation frames, topic payloads, REST
//! bodies — is UTF-8 JSON text, so the codec is a thin typed wrapper
//! around `serde_json`.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Encodes a value as a JSON text string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a value from a JSON text string.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the text is not valid JSON
/// or does not match the expected shape.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Deserialization(e.to_string()))
}
