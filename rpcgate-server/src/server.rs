//! Request dispatcher
//!
//! [`JsonRpcServer::handle`] runs the whole lifecycle of one HTTP request:
//!
//! 1. resolve the mount point's options against the settings
//! 2. answer with the SMD document if the request asks for it
//! 3. reject anything but POST
//! 4. authenticate the caller, unless the mount point disables it
//! 5. decode the body into one call or a batch
//! 6. run every call through the router, isolated from its siblings
//! 7. shape the reply: one object for one call, an array otherwise
//!
//! Failures in steps 3 to 5 answer the whole request with a single error
//! response that carries no `id`.

use bytes::Bytes;
use rpcgate_core::{codec, Error, JsonRpcResponse, Result, ServiceIdentity};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use warp::http::header::{HeaderMap, HeaderName, HeaderValue};
use warp::http::Method;

use crate::auth::Authenticator;
use crate::batch::{BatchContext, BatchProcessor};
use crate::builder::ServerBuilder;
use crate::metrics::ServerMetrics;
use crate::options::{EndpointOptions, ResolvedOptions};
use crate::router::Router;
use crate::settings::Settings;
use crate::smd::SmdGenerator;

/// Query key or body key that asks for the SMD document
pub const SMD_FLAG: &str = "smd";

/// Transport-level view of an HTTP request
#[derive(Debug, Clone)]
pub struct RpcRequest {
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: HeaderMap,
    /// Decoded query string
    pub query: HashMap<String, String>,
    /// Raw body
    pub body: Bytes,
}

impl RpcRequest {
    /// A POST request with the given body and nothing else
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: body.into(),
        }
    }

    /// Replace the HTTP method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Check whether the request asks for the SMD document
    pub fn wants_smd(&self) -> bool {
        self.query.contains_key(SMD_FLAG) || codec::object_has_key(&self.body, SMD_FLAG)
    }
}

/// What a request is answered with
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RpcReply {
    /// One response object
    Single(JsonRpcResponse),
    /// One response per call, in call order
    Batch(Vec<JsonRpcResponse>),
    /// The SMD document
    Schema(Value),
}

impl RpcReply {
    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RpcReply::Single(_) => "single",
            RpcReply::Batch(_) => "batch",
            RpcReply::Schema(_) => "schema",
        }
    }

    /// The response if this is a single reply
    pub fn as_single(&self) -> Option<&JsonRpcResponse> {
        match self {
            RpcReply::Single(response) => Some(response),
            _ => None,
        }
    }

    /// The responses if this is a batch reply
    pub fn as_batch(&self) -> Option<&[JsonRpcResponse]> {
        match self {
            RpcReply::Batch(responses) => Some(responses),
            _ => None,
        }
    }

    /// The document if this is a schema reply
    pub fn as_schema(&self) -> Option<&Value> {
        match self {
            RpcReply::Schema(document) => Some(document),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 dispatcher
///
/// Holds everything that lives for the whole process: the method registry,
/// the settings, the authenticator and the batch processor. Per-request
/// state is built inside [`JsonRpcServer::handle`] and dropped with it.
pub struct JsonRpcServer {
    router: Router,
    settings: Arc<Settings>,
    authenticator: Authenticator,
    batch: BatchProcessor,
    metrics: Option<Arc<ServerMetrics>>,
}

impl JsonRpcServer {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn from_parts(
        router: Router,
        settings: Arc<Settings>,
        batch: BatchProcessor,
        metrics: Option<Arc<ServerMetrics>>,
    ) -> Result<Self> {
        let authenticator = Authenticator::from_settings(&settings)?;
        Ok(Self {
            router,
            settings,
            authenticator,
            batch,
            metrics,
        })
    }

    /// The method registry
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Process-wide settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Batch processor
    pub fn batch_processor(&self) -> &BatchProcessor {
        &self.batch
    }

    /// Handle one HTTP request on a mount point
    ///
    /// Never fails: every failure is turned into a JSON-RPC error response.
    #[tracing::instrument(
        skip_all,
        fields(http.method = %request.method, body_len = request.body.len())
    )]
    pub async fn handle(&self, request: &RpcRequest, options: &EndpointOptions) -> RpcReply {
        let options = Arc::new(options.resolve(&self.settings));

        let reply = if request.wants_smd() {
            tracing::debug!(uri = %options.uri, "Serving SMD document");
            RpcReply::Schema(SmdGenerator::generate(&options, &self.router))
        } else {
            match self.dispatch(request, options).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "Request rejected");
                    let data = e.to_error_data();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_error(data.code);
                    }
                    RpcReply::Single(JsonRpcResponse::error(data, None))
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_request(reply.kind());
        }
        reply
    }

    async fn dispatch(
        &self,
        request: &RpcRequest,
        options: Arc<ResolvedOptions>,
    ) -> Result<RpcReply> {
        if request.method != Method::POST {
            return Err(Error::InvalidRequest(format!(
                "HTTP method {} is not allowed",
                request.method
            )));
        }

        let service = self.identify(request, &options)?;
        let payload = codec::decode_body(&request.body)?;

        let ctx = BatchContext::new(self.router.clone(), options, service)
            .with_metrics(self.metrics.clone());
        let mut responses = self.batch.process(payload.into_calls(), &ctx).await?;

        if responses.len() == 1 {
            Ok(RpcReply::Single(responses.remove(0)))
        } else {
            Ok(RpcReply::Batch(responses))
        }
    }

    fn identify(&self, request: &RpcRequest, options: &ResolvedOptions) -> Result<ServiceIdentity> {
        if !options.auth {
            return Ok(ServiceIdentity::guest());
        }

        self.authenticator.authenticate(&request.headers).map_err(|e| {
            if let Some(metrics) = &self.metrics {
                metrics.record_auth_failure();
            }
            e
        })
    }
}

impl std::fmt::Debug for JsonRpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcServer")
            .field("router", &self.router)
            .field("batch", &self.batch)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_typed_fn;
    use serde_json::json;

    fn server() -> JsonRpcServer {
        JsonRpcServer::builder()
            .settings(Settings::default().with_key("billing", "secret"))
            .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
            .build()
            .unwrap()
    }

    fn open() -> EndpointOptions {
        EndpointOptions::new().auth(false)
    }

    #[tokio::test]
    async fn test_single_call() {
        let reply = server()
            .handle(
                &RpcRequest::post(r#"{"jsonrpc":"2.0","method":"Api.ping","id":1}"#),
                &open(),
            )
            .await;

        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": "pong"})
        );
    }

    #[tokio::test]
    async fn test_get_is_rejected() {
        let reply = server()
            .handle(
                &RpcRequest::post(r#"{"method":"Api.ping","id":1}"#).with_method(Method::GET),
                &open(),
            )
            .await;

        let response = reply.as_single().unwrap();
        assert_eq!(response.error_data().unwrap().code, -32600);
        assert!(response.id.is_none());
    }

    #[tokio::test]
    async fn test_smd_skips_method_check() {
        let reply = server()
            .handle(
                &RpcRequest::post("").with_method(Method::GET).with_query("smd", ""),
                &EndpointOptions::new(),
            )
            .await;

        let schema = reply.as_schema().unwrap();
        assert!(schema["services"].get("Api.ping").is_some());
    }

    #[tokio::test]
    async fn test_smd_in_body() {
        let reply = server()
            .handle(&RpcRequest::post(r#"{"smd": true}"#), &EndpointOptions::new())
            .await;
        assert_eq!(reply.kind(), "schema");
    }

    #[tokio::test]
    async fn test_auth_resolves_service() {
        let server = JsonRpcServer::builder()
            .settings(Settings::default().with_key("billing", "secret"))
            .handler(
                "Api.whoami",
                crate::handler::from_fn(|_params, call| async move {
                    Ok(json!(call.service().as_str()))
                }),
            )
            .build()
            .unwrap();

        let request = RpcRequest::post(r#"{"method":"Api.whoami","id":1}"#).with_header(
            HeaderName::from_static("access-key"),
            HeaderValue::from_static("secret"),
        );
        let reply = server.handle(&request, &EndpointOptions::new()).await;
        assert_eq!(reply.as_single().unwrap().result(), Some(&json!("billing")));
    }

    #[tokio::test]
    async fn test_one_element_array_is_single() {
        let reply = server()
            .handle(&RpcRequest::post(r#"[{"method":"Api.ping","id":1}]"#), &open())
            .await;
        assert_eq!(reply.kind(), "single");
    }
}
