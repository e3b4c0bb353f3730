//! Core JSON-RPC 2.0 types for rpcgate
//!
//! This crate provides the transport-agnostic building blocks of the
//! dispatcher. It includes:
//!
//! - **Error model**: The fixed error-code space and its wire representation
//! - **Types**: Call identifiers and response records
//! - **Envelope**: Validated calls carrying service identity and routing overrides
//! - **Codec**: Body decoding into single calls or batches
//! - **Observability**: Logging and OpenTelemetry setup
//!
//! The `rpcgate-server` crate builds the authenticator, the method registry,
//! the dispatcher and the HTTP adapter on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use rpcgate_core::{codec, CallEnvelope, RoutingOverrides, ServiceIdentity};
//!
//! let payload = codec::decode_body(br#"{"jsonrpc":"2.0","method":"Api.ping","id":1}"#).unwrap();
//! let call = payload.into_calls().remove(0);
//! let envelope =
//!     CallEnvelope::from_raw(call, &RoutingOverrides::none(), ServiceIdentity::guest()).unwrap();
//! assert_eq!(envelope.target("Api").unwrap().action, "ping");
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod types;

pub use envelope::{CallEnvelope, MethodPath, RoutingOverrides, ServiceIdentity};
pub use error::{Error, ErrorCode, ErrorDetail, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Id, JsonRpcResponse, Outcome, JSONRPC_VERSION};
