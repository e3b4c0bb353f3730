//! JSON-RPC 2.0 wire types
//!
//! The dispatcher only ever emits responses, so this module holds the call
//! identifier and the response record. Incoming calls are parsed by the
//! [`envelope`](crate::envelope) module instead of a derived `Deserialize`,
//! because a malformed call must still be answered in place inside a batch.
//!
//! # Request IDs
//!
//! A call may carry any JSON scalar as `id`. A missing or `null` id means the
//! caller does not want correlation, and the response omits the member
//! entirely.

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version echoed in every response
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 call identifier
///
/// This enum uses `#[serde(untagged)]` to serialize directly as the inner
/// value, so an id round-trips byte for byte (`1` stays `1`, `"1"` stays
/// `"1"`, `1.5` stays `1.5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier, integer or floating point
    Number(serde_json::Number),
    /// Boolean identifier (accepted for compatibility with lenient clients)
    Bool(bool),
}

impl Id {
    /// Extract an id from a raw JSON value
    ///
    /// Returns `Ok(None)` for `null`, and `Err` with the offending value for
    /// arrays and objects, which are not valid identifiers.
    pub fn from_value(value: &Value) -> std::result::Result<Option<Self>, &Value> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Id::String(s.clone()))),
            Value::Number(n) => Ok(Some(Id::Number(n.clone()))),
            Value::Bool(b) => Ok(Some(Id::Bool(*b))),
            other => Err(other),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n.into())
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id::Number(n.into())
    }
}

/// Outcome of a single call
///
/// Flattened into the response so that exactly one of `result` or `error`
/// appears on the wire. A `null` result still serializes as `"result": null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// The handler succeeded
    #[serde(rename = "result")]
    Result(Value),
    /// The call failed
    #[serde(rename = "error")]
    Error(JsonRpcErrorData),
}

/// JSON-RPC 2.0 response record
///
/// # Examples
///
/// ```rust
/// use rpcgate_core::{Id, JsonRpcResponse};
/// use serde_json::json;
///
/// let response = JsonRpcResponse::success(json!("pong"), Some(Id::from(1i64)));
/// assert_eq!(
///     serde_json::to_string(&response).unwrap(),
///     r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,

    /// Echo of the call's id, absent when the call had none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    /// Result or error
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(result: Value, id: Option<Id>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcErrorData, id: Option<Id>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// The result payload, if the call succeeded
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// The error record, if the call failed
    pub fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_display() {
        assert_eq!(Id::from("test").to_string(), "\"test\"");
        assert_eq!(Id::from(42i64).to_string(), "42");
        assert_eq!(Id::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(Id::from_value(&json!(null)), Ok(None));
        assert_eq!(Id::from_value(&json!("a")), Ok(Some(Id::from("a"))));
        assert_eq!(Id::from_value(&json!(7)), Ok(Some(Id::from(7i64))));
        assert!(Id::from_value(&json!({"nested": 1})).is_err());
        assert!(Id::from_value(&json!([1])).is_err());
    }

    #[test]
    fn test_float_id_is_preserved() {
        let id = Id::from_value(&json!(1.5)).unwrap();
        let response = JsonRpcResponse::success(json!(true), id);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], json!(1.5));
    }

    #[test]
    fn test_response_without_id() {
        let response = JsonRpcResponse::success(json!({"ok": true}), None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_null_result_is_kept() {
        let response = JsonRpcResponse::success(Value::Null, Some(Id::from(3i64)));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.as_object().unwrap().contains_key("result"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_response_has_no_result() {
        let response = JsonRpcResponse::error(
            JsonRpcErrorData::internal_error("test error"),
            Some(Id::from("a")),
        );
        let value = serde_json::to_value(&response).unwrap();

        assert!(response.is_error());
        assert!(!response.is_success());
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32603);
        assert_eq!(value["id"], "a");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.result(), Some(&json!("pong")));
        assert_eq!(response.id, Some(Id::from(1i64)));
    }
}
