//! JSON-RPC 2.0 dispatcher over HTTP
//!
//! This crate accepts one HTTP POST body holding a single call or a batch of
//! calls, authenticates the caller with a shared access key, routes every
//! call to a registered handler and assembles a JSON-RPC 2.0 reply.
//!
//! # Core Features
//!
//! - **Explicit registry**: handlers are registered per namespace under a
//!   `Controller.action` name and looked up with a typed not-found error
//! - **Shared-key authentication**: constant-time lookup of the access-key
//!   header, resolving the calling service
//! - **Per-method ACL**: services allowed to call each method
//! - **Batch processing**: per-call isolation, parallel or sequential
//! - **Middleware**: hooks around every call, tracing by default
//! - **SMD**: a self-describing schema of the registered methods
//! - **HTTP**: a `warp` filter mounting the dispatcher at a path
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpcgate_server::{http, EndpointOptions, JsonRpcServer, from_typed_fn};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = JsonRpcServer::builder()
//!         .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
//!         .handler("Math.add", from_typed_fn(|p: AddParams| async move { Ok(p.a + p.b) }))
//!         .build()?;
//!
//!     let options = EndpointOptions::new().uri("/rpc");
//!     http::serve(Arc::new(server), options, ([127, 0, 0, 1], 8080)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Request Lifecycle
//!
//! ```text
//! HTTP POST → Authenticator → decode body → per call: envelope → resolve
//!           → authorize (ACL) → middleware → handler → response
//! ```
//!
//! Request-level failures (wrong HTTP method, bad key, unreadable body)
//! produce a single error response without `id`. Per-call failures produce an
//! error response for that call only.

mod acl;
mod auth;
mod batch;
mod builder;
mod handler;
pub mod http;
mod metrics;
mod middleware;
mod options;
mod router;
mod server;
mod settings;
mod smd;

pub use acl::AclTable;
pub use auth::{constant_time_compare, Authenticator};
pub use batch::{BatchContext, BatchMode, BatchProcessor};
pub use builder::ServerBuilder;
pub use handler::{
    from_fn, from_typed_fn, from_typed_fn_with_call, CallContext, Handler, HandlerFuture,
};
pub use metrics::{ServerMetrics, UNKNOWN_METHOD};
pub use middleware::{
    Middleware, MiddlewareAction, MiddlewareChain, MiddlewareContext, SyncMiddleware,
    TracingMiddleware,
};
pub use options::{EndpointOptions, ResolvedOptions};
pub use router::{HandlerRef, MethodKey, Router, RouterBuilder, DEFAULT_CONTROLLER};
pub use server::{JsonRpcServer, RpcReply, RpcRequest, SMD_FLAG};
pub use settings::{Settings, DEFAULT_NAMESPACE};
pub use smd::{MethodDoc, ParamDoc, SmdGenerator};
