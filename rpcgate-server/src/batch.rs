//! Batch processing
//!
//! Every decoded request is handled as a batch, a single call being a batch
//! of one. Each call is isolated: a call that fails validation, is denied,
//! returns an error or panics produces an error response for itself and never
//! affects its siblings. Responses always come back in the order of the
//! calls.
//!
//! # Batch Modes
//!
//! - **Parallel**: every call runs on its own tokio task
//! - **Sequential**: calls run one after the other, in source order
//!
//! # Size Limiting
//!
//! A processor may carry a maximum batch size. A larger batch is rejected as
//! a whole before any call runs.
//!
//! # Examples
//!
//! ```rust
//! use rpcgate_server::{BatchMode, BatchProcessor};
//!
//! let processor = BatchProcessor::with_limit(BatchMode::Parallel, Some(100));
//! let sequential = BatchProcessor::new(BatchMode::Sequential);
//! ```

use futures::FutureExt;
use rpcgate_core::{
    CallEnvelope, Error, Id, JsonRpcErrorData, JsonRpcResponse, Result, ServiceIdentity,
};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{ServerMetrics, UNKNOWN_METHOD};
use crate::options::ResolvedOptions;
use crate::router::Router;

/// How the calls of a batch are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Run all calls concurrently, reassembling responses in source order
    #[default]
    Parallel,
    /// Run calls one after the other in source order
    Sequential,
}

impl BatchMode {
    /// Lowercase label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

/// Everything a call needs besides its raw JSON
///
/// Shared by all calls of one request.
#[derive(Clone)]
pub struct BatchContext {
    router: Router,
    options: Arc<ResolvedOptions>,
    service: ServiceIdentity,
    metrics: Option<Arc<ServerMetrics>>,
}

impl BatchContext {
    /// Create a context for the calls of one request
    pub fn new(router: Router, options: Arc<ResolvedOptions>, service: ServiceIdentity) -> Self {
        Self {
            router,
            options,
            service,
            metrics: None,
        }
    }

    /// Record call metrics
    pub fn with_metrics(mut self, metrics: Option<Arc<ServerMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Service identity of the request
    pub fn service(&self) -> &ServiceIdentity {
        &self.service
    }
}

/// Runs the calls of a request
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
}

impl BatchProcessor {
    /// Create a processor without a size limit
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            max_size: None,
        }
    }

    /// Create a processor with an optional size limit
    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self { mode, max_size }
    }

    /// Execution mode
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Maximum batch size, if any
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Process the calls of one request
    ///
    /// Returns exactly one response per call, in call order.
    ///
    /// # Errors
    ///
    /// Returns `Error::BatchSizeExceeded` when the batch is larger than the
    /// configured limit. Per-call failures are never returned here; they are
    /// turned into error responses.
    #[tracing::instrument(
        skip(self, calls, ctx),
        fields(batch_size = calls.len(), mode = self.mode.as_str(), service = %ctx.service)
    )]
    pub async fn process(
        &self,
        calls: Vec<Value>,
        ctx: &BatchContext,
    ) -> Result<Vec<JsonRpcResponse>> {
        if let Some(limit) = self.max_size {
            if calls.len() > limit {
                tracing::warn!(limit, actual = calls.len(), "Batch size exceeded");
                return Err(Error::BatchSizeExceeded {
                    limit,
                    actual: calls.len(),
                });
            }
        }

        if let Some(metrics) = &ctx.metrics {
            metrics.record_batch(calls.len() as u64, self.mode.as_str());
        }

        let responses = match self.mode {
            BatchMode::Parallel => process_parallel(calls, ctx).await,
            BatchMode::Sequential => process_sequential(calls, ctx).await,
        };

        tracing::debug!(response_count = responses.len(), "Batch processed");
        Ok(responses)
    }
}

async fn process_parallel(calls: Vec<Value>, ctx: &BatchContext) -> Vec<JsonRpcResponse> {
    let tasks: Vec<_> = calls
        .into_iter()
        .map(|raw| {
            let id = CallEnvelope::peek_id(&raw);
            let ctx = ctx.clone();
            (id, tokio::spawn(async move { process_call(raw, &ctx).await }))
        })
        .collect();

    let mut responses = Vec::with_capacity(tasks.len());
    for (id, task) in tasks {
        let response = match task.await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(id = ?id, error = %e, "Call task failed");
                panic_response(id)
            }
        };
        responses.push(response);
    }
    responses
}

async fn process_sequential(calls: Vec<Value>, ctx: &BatchContext) -> Vec<JsonRpcResponse> {
    let mut responses = Vec::with_capacity(calls.len());
    for raw in calls {
        let id = CallEnvelope::peek_id(&raw);
        let response = match AssertUnwindSafe(process_call(raw, ctx)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!(id = ?id, "Call panicked");
                panic_response(id)
            }
        };
        responses.push(response);
    }
    responses
}

fn panic_response(id: Option<Id>) -> JsonRpcResponse {
    JsonRpcResponse::error(JsonRpcErrorData::internal_error("Internal error"), id)
}

/// Build the envelope of one call, run it and shape its response
async fn process_call(raw: Value, ctx: &BatchContext) -> JsonRpcResponse {
    let fallback_id = CallEnvelope::peek_id(&raw);

    let call = match CallEnvelope::from_raw(raw, &ctx.options.overrides, ctx.service.clone()) {
        Ok(call) => Arc::new(call),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed call");
            return error_response(&e, fallback_id, ctx);
        }
    };

    let id = call.id().cloned();
    let method = method_label(&call, ctx);
    let started = Instant::now();

    let result = ctx.router.call(call, &ctx.options).await;

    if let Some(metrics) = &ctx.metrics {
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics.record_call(&method, outcome, started.elapsed().as_secs_f64());
    }

    match result {
        Ok(value) => JsonRpcResponse::success(value, id),
        Err(e) => error_response(&e, id, ctx),
    }
}

/// Metric label of a call: its resolved method, or [`UNKNOWN_METHOD`]
fn method_label(call: &CallEnvelope, ctx: &BatchContext) -> String {
    call.target(&ctx.options.controller)
        .ok()
        .filter(|path| ctx.router.resolve(path, &ctx.options.namespace).is_ok())
        .map(|path| path.to_string())
        .unwrap_or_else(|| UNKNOWN_METHOD.to_string())
}

fn error_response(error: &Error, id: Option<Id>, ctx: &BatchContext) -> JsonRpcResponse {
    if error.code() == rpcgate_core::ErrorCode::InternalError {
        tracing::error!(error = %error, "Call failed with an internal error");
    }
    let data = error.to_error_data();
    if let Some(metrics) = &ctx.metrics {
        metrics.record_error(data.code);
    }
    JsonRpcResponse::error(data, id)
}
