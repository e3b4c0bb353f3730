//! Error types for rpcgate
//!
//! This module provides error handling for JSON-RPC 2.0 dispatch. It defines
//! three layers:
//!
//! - **ErrorCode**: The fixed code space the server is allowed to emit
//! - **Error**: Failure kinds raised inside the server and by handlers (uses thiserror)
//! - **JsonRpcErrorData**: Wire-format error objects of JSON-RPC 2.0
//!
//! # Code Space
//!
//! The reserved JSON-RPC 2.0 codes plus three server-defined codes:
//! - `-32700`: Parse error (invalid JSON)
//! - `-32600`: Invalid request (wrong transport method, empty body, malformed call)
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32001`: Unauthorized (missing or unknown access key)
//! - `-32002`: Forbidden (ACL denial)
//! - `-32003`: External integration error (upstream failures with details)
//!
//! # Translation
//!
//! Every `Error` can be turned into a `JsonRpcErrorData` with
//! [`Error::to_error_data`]. Kinds without a JSON-RPC meaning (serialization,
//! I/O, configuration) collapse into `-32603` so the transport always receives
//! a well-formed error object.
//!
//! # Examples
//!
//! ```rust
//! use rpcgate_core::{Error, ErrorCode};
//!
//! let error = Error::MethodNotFound("Api.unknown".into());
//! let data = error.to_error_data();
//! assert_eq!(data.code, ErrorCode::MethodNotFound.code());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rpcgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// The fixed set of error codes the server emits
///
/// The first five mirror the JSON-RPC 2.0 reserved codes. The remaining ones
/// live in the implementation-defined server range (`-32000` to `-32099`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid JSON was received
    ParseError,
    /// The request or a call inside it is not acceptable
    InvalidRequest,
    /// No handler is registered for the method
    MethodNotFound,
    /// The handler rejected the shape of `params`
    InvalidParams,
    /// Uncaught handler failure or any unrecognized failure kind
    InternalError,
    /// Missing or unrecognized access key
    Unauthorized,
    /// The authenticated service may not call the method
    Forbidden,
    /// A downstream integration failed
    ExternalIntegration,
}

impl ErrorCode {
    /// Every code, in declaration order
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::ParseError,
        ErrorCode::InvalidRequest,
        ErrorCode::MethodNotFound,
        ErrorCode::InvalidParams,
        ErrorCode::InternalError,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::ExternalIntegration,
    ];

    /// Numeric wire value
    pub const fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::Unauthorized => -32001,
            ErrorCode::Forbidden => -32002,
            ErrorCode::ExternalIntegration => -32003,
        }
    }

    /// The well-known message used when the failure site supplies none
    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::Forbidden => "Forbidden",
            ErrorCode::ExternalIntegration => "External integration error",
        }
    }

    /// Look up a code by its numeric value
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Application-level error type for rpcgate operations
///
/// Handlers return this type, the dispatcher raises it, and the per-call
/// boundary translates it into a [`JsonRpcErrorData`].
///
/// # Error Categories
///
/// - **Protocol errors**: Parse, InvalidRequest, MethodNotFound, InvalidParams
/// - **Access errors**: Unauthorized, Forbidden
/// - **Domain errors**: ExternalIntegration
/// - **Processing errors**: Internal, Serialization, Io, Config
/// - **Operational errors**: BatchSizeExceeded
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Error already structured as a JSON-RPC error object
    ///
    /// Handlers use this to return a custom code; it is forwarded untouched.
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The request body is not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid JSON-RPC request or call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found in the registry
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid method parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Internal server or handler error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Missing or unrecognized access key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The calling service is not allowed to invoke the method
    #[error("Service '{service}' is not allowed to call '{method}'")]
    Forbidden {
        /// Resolved service identity
        service: String,
        /// Fully qualified method name
        method: String,
    },

    /// One or more downstream integrations failed
    #[error("External integration error ({} failure(s))", .0.len())]
    ExternalIntegration(Vec<ErrorDetail>),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Batch request size exceeded limit
    #[error("Batch size limit exceeded: limit={limit}, actual={actual}")]
    BatchSizeExceeded {
        /// The maximum allowed batch size
        limit: usize,
        /// The actual batch size that was rejected
        actual: usize,
    },
}

impl Error {
    /// Report a single failed integration
    pub fn external(detail: ErrorDetail) -> Self {
        Error::ExternalIntegration(vec![detail])
    }

    /// Wrap any displayable failure as an internal error
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Error::Internal(err.to_string())
    }

    /// The code this error is reported with
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::JsonRpc(data) => {
                ErrorCode::from_code(data.code).unwrap_or(ErrorCode::InternalError)
            }
            Error::Parse(_) => ErrorCode::ParseError,
            Error::InvalidRequest(_) | Error::BatchSizeExceeded { .. } => ErrorCode::InvalidRequest,
            Error::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Error::InvalidParams(_) => ErrorCode::InvalidParams,
            Error::Unauthorized(_) => ErrorCode::Unauthorized,
            Error::Forbidden { .. } => ErrorCode::Forbidden,
            Error::ExternalIntegration(_) => ErrorCode::ExternalIntegration,
            Error::Internal(_) | Error::Serialization(_) | Error::Io(_) | Error::Config(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Translate into the public wire shape
    ///
    /// Protocol and access errors keep their specific message. Processing
    /// errors are reported as `Internal error` with the cause as message.
    pub fn to_error_data(&self) -> JsonRpcErrorData {
        match self {
            Error::JsonRpc(data) => data.clone(),
            Error::Parse(_) => JsonRpcErrorData::parse_error(),
            Error::InvalidRequest(msg) => JsonRpcErrorData::invalid_request(msg.clone()),
            Error::BatchSizeExceeded { limit, actual } => {
                JsonRpcErrorData::batch_size_exceeded(*limit, *actual)
            }
            Error::MethodNotFound(method) => JsonRpcErrorData::method_not_found(method.clone()),
            Error::InvalidParams(msg) => JsonRpcErrorData::invalid_params(msg.clone()),
            Error::Unauthorized(_) => JsonRpcErrorData::from_code(ErrorCode::Unauthorized),
            Error::Forbidden { .. } => {
                JsonRpcErrorData::new(ErrorCode::Forbidden.code(), self.to_string())
            }
            Error::ExternalIntegration(details) => {
                JsonRpcErrorData::external_integration(details.clone())
            }
            Error::Internal(msg) => JsonRpcErrorData::internal_error(msg.clone()),
            Error::Serialization(_) | Error::Io(_) | Error::Config(_) => {
                JsonRpcErrorData::internal_error(self.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<Error> for JsonRpcErrorData {
    fn from(err: Error) -> Self {
        err.to_error_data()
    }
}

/// One structured entry of an error's `data` list
///
/// Used by external integration failures to report which upstream failed
/// (`object_name`) and what it answered (`meta`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Upstream error code
    pub code: i64,

    /// Upstream error message
    #[serde(default)]
    pub message: Option<String>,

    /// Name of the integration that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,

    /// Arbitrary diagnostic payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// Create a detail entry with an upstream code and optional message
    pub fn new(code: i64, message: Option<impl Into<String>>) -> Self {
        Self {
            code,
            message: message.map(Into::into),
            object_name: None,
            meta: None,
        }
    }

    /// Name the integration that produced this entry
    pub fn with_object_name(mut self, object_name: impl Into<String>) -> Self {
        self.object_name = Some(object_name.into());
        self
    }

    /// Attach the upstream payload
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// JSON-RPC 2.0 error data as sent over the wire
///
/// It appears in the `error` member of a response.
///
/// # Fields
///
/// - `code`: An integer from [`ErrorCode`] (or a handler-chosen custom code)
/// - `message`: A short description; defaults to the code's well-known message
/// - `data`: Ordered detail entries, omitted from the wire when empty
///
/// # Examples
///
/// ```rust
/// use rpcgate_core::{ErrorDetail, JsonRpcErrorData};
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::external_integration(vec![
///     ErrorDetail::new(502, Some("Bad gateway"))
///         .with_object_name("billing")
///         .with_meta(json!({"status": 502})),
/// ]);
/// assert_eq!(error.code, -32003);
/// assert_eq!(error.data.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Structured detail entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<ErrorDetail>,
}

impl JsonRpcErrorData {
    /// Create an error with an explicit code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Vec::new(),
        }
    }

    /// Create an error carrying only a code's well-known message
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code.code(), code.default_message())
    }

    /// Create an error with an explicit code, an optional message and details
    ///
    /// A missing message falls back to the well-known message of `code`, or
    /// to the internal error message when `code` is a custom value.
    pub fn with_details(code: i32, message: Option<String>, data: Vec<ErrorDetail>) -> Self {
        let message = message.unwrap_or_else(|| {
            ErrorCode::from_code(code)
                .unwrap_or(ErrorCode::InternalError)
                .default_message()
                .to_string()
        });
        Self {
            code,
            message,
            data,
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::from_code(ErrorCode::ParseError)
    }

    /// Create an invalid request error (-32600)
    ///
    /// # Arguments
    ///
    /// * `msg` - Specific reason why the request is invalid
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest.code(), msg)
    }

    /// Create a method not found error (-32601)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rpcgate_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::method_not_found("Api.missing");
    /// assert_eq!(error.message, "Method not found: Api.missing");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        if method.is_empty() {
            return Self::from_code(ErrorCode::MethodNotFound);
        }
        Self::new(
            ErrorCode::MethodNotFound.code(),
            format!("Method not found: {}", method),
        )
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams.code(), msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError.code(), msg)
    }

    /// Create an unauthorized error (-32001)
    pub fn unauthorized() -> Self {
        Self::from_code(ErrorCode::Unauthorized)
    }

    /// Create an external integration error (-32003) with its failure list
    pub fn external_integration(details: Vec<ErrorDetail>) -> Self {
        Self::with_details(ErrorCode::ExternalIntegration.code(), None, details)
    }

    /// Create a batch size exceeded error (-32600)
    pub fn batch_size_exceeded(limit: usize, actual: usize) -> Self {
        Self::new(
            ErrorCode::InvalidRequest.code(),
            format!("Batch size limit exceeded: limit={}, actual={}", limit, actual),
        )
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: Api.x"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
