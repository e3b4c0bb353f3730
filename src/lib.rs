//! rpcgate - JSON-RPC 2.0 dispatcher over HTTP
//!
//! Convenience crate re-exporting the rpcgate sub-crates, so a single
//! dependency gives access to the whole dispatcher.
//!
//! # Architecture
//!
//! - **rpcgate-core**: error model, wire types, call envelope, codec,
//!   observability setup
//! - **rpcgate-server**: settings, authentication, ACL, method registry,
//!   middleware, batch processing, dispatcher, SMD, HTTP adapter
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpcgate::server::{from_typed_fn, http, EndpointOptions};
//! use rpcgate::JsonRpcServer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = JsonRpcServer::builder()
//!         .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
//!         .build()?;
//!
//!     let options = EndpointOptions::new().uri("/rpc");
//!     http::serve(Arc::new(server), options, ([127, 0, 0, 1], 8080)).await;
//!     Ok(())
//! }
//! ```
//!
//! ```text
//! $ curl -s -X POST http://127.0.0.1:8080/rpc -H 'Access-Key: <key>' \
//!     -d '{"jsonrpc":"2.0","method":"Api.ping","id":1}'
//! {"jsonrpc":"2.0","id":1,"result":"pong"}
//! ```

pub use rpcgate_core as core;
pub use rpcgate_server as server;

pub use rpcgate_core::{Error, JsonRpcResponse, Result};
pub use rpcgate_server::{EndpointOptions, JsonRpcServer, Settings};
