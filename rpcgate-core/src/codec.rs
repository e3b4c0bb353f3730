//! Codec for request bodies and replies
//!
//! Decoding happens in two steps. The body is first parsed into a generic
//! `serde_json::Value` to decide whether it is a single call or a batch; the
//! calls themselves stay raw values so that each one can be validated on its
//! own by [`CallEnvelope::from_raw`](crate::CallEnvelope::from_raw).
//!
//! # Error Mapping
//!
//! - Empty body → `-32600` (Invalid Request)
//! - Invalid JSON, or a body that is literally `null` → `-32700` (Parse error)
//! - Empty batch `[]` → `-32600` (Invalid Request)
//!
//! # Examples
//!
//! ```rust
//! use rpcgate_core::codec;
//!
//! let payload = codec::decode_body(br#"[{"method":"a"},{"method":"b"}]"#).unwrap();
//! assert!(payload.is_batch());
//! assert_eq!(payload.len(), 2);
//! ```

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Decoded request body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The body was a single JSON value
    Single(Value),
    /// The body was a JSON array of values
    Batch(Vec<Value>),
}

impl Payload {
    /// Check if the body was an array
    pub fn is_batch(&self) -> bool {
        matches!(self, Payload::Batch(_))
    }

    /// Number of calls in the payload
    pub fn len(&self) -> usize {
        match self {
            Payload::Single(_) => 1,
            Payload::Batch(calls) => calls.len(),
        }
    }

    /// Check if the payload holds no call
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize into a list of raw calls
    ///
    /// A single call becomes a one-element batch.
    pub fn into_calls(self) -> Vec<Value> {
        match self {
            Payload::Single(call) => vec![call],
            Payload::Batch(calls) => calls,
        }
    }
}

/// Check if a body holds nothing but whitespace
pub fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Decode a request body into a single call or a batch
///
/// # Errors
///
/// - `Error::InvalidRequest` if the body is blank or an empty array
/// - `Error::Parse` if the body is not valid JSON or is `null`
pub fn decode_body(body: &[u8]) -> Result<Payload> {
    if is_blank(body) {
        return Err(Error::InvalidRequest("Empty request body".to_string()));
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| Error::Parse(e.to_string()))?;

    match value {
        Value::Null => Err(Error::Parse("Request body decodes to null".to_string())),
        Value::Array(calls) if calls.is_empty() => {
            Err(Error::InvalidRequest("Batch cannot be empty".to_string()))
        }
        Value::Array(calls) => Ok(Payload::Batch(calls)),
        single => Ok(Payload::Single(single)),
    }
}

/// Check if a body decodes to a JSON object with the given top-level key
///
/// Anything else, including invalid JSON, answers `false`. Used to detect
/// flags such as `smd` carried in the body rather than the query string.
pub fn object_has_key(body: &[u8], key: &str) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => object.contains_key(key),
        _ => false,
    }
}

/// Encode any serializable reply to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}
