//! Dispatcher metrics
//!
//! OpenTelemetry instruments recorded by the dispatcher when metrics are
//! enabled on the builder. They are exported through whatever meter provider
//! `init_observability` installed; without one, recording is a no-op.
//!
//! # Metrics Collected
//!
//! - **rpcgate.requests.total**: HTTP requests handled, by reply kind
//! - **rpcgate.calls.total**: calls dispatched, by method and outcome; calls to
//!   unregistered methods share the [`UNKNOWN_METHOD`] label
//! - **rpcgate.call.duration**: call latency in seconds
//! - **rpcgate.batch.size**: calls per request
//! - **rpcgate.errors.total**: error responses, by JSON-RPC code
//! - **rpcgate.auth.failures**: rejected access keys

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// `method` attribute of calls that did not resolve to a registered handler
pub const UNKNOWN_METHOD: &str = "unknown";

/// Dispatcher metrics instruments
pub struct ServerMetrics {
    /// Requests handled
    pub requests_total: Counter<u64>,
    /// Calls dispatched
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
    /// Error responses
    pub errors_total: Counter<u64>,
    /// Rejected access keys
    pub auth_failures: Counter<u64>,
}

impl ServerMetrics {
    /// Create instruments on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into()).build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    /// Create instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("rpcgate.requests.total")
                .with_description("Total number of HTTP requests handled")
                .build(),
            calls_total: meter
                .u64_counter("rpcgate.calls.total")
                .with_description("Total number of JSON-RPC calls dispatched")
                .build(),
            call_duration: meter
                .f64_histogram("rpcgate.call.duration")
                .with_description("Call processing duration in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("rpcgate.batch.size")
                .with_description("Number of calls per request")
                .build(),
            errors_total: meter
                .u64_counter("rpcgate.errors.total")
                .with_description("Total number of error responses")
                .build(),
            auth_failures: meter
                .u64_counter("rpcgate.auth.failures")
                .with_description("Total number of rejected access keys")
                .build(),
        }
    }

    /// Record a handled request
    pub fn record_request(&self, kind: &str) {
        self.requests_total
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }

    /// Record a dispatched call
    pub fn record_call(&self, method: &str, outcome: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Record the size of a request's batch
    pub fn record_batch(&self, size: u64, mode: &str) {
        self.batch_size
            .record(size, &[KeyValue::new("mode", mode.to_string())]);
    }

    /// Record an error response
    pub fn record_error(&self, code: i32) {
        self.errors_total
            .add(1, &[KeyValue::new("code", i64::from(code))]);
    }

    /// Record a rejected access key
    pub fn record_auth_failure(&self) {
        self.auth_failures.add(1, &[]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}
