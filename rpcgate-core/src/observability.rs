//! Logging and OpenTelemetry setup
//!
//! Call [`init_observability`] once at process start, before building the
//! server. It installs a `tracing` subscriber that filters with `RUST_LOG`
//! (or the configured level) and writes structured logs to stdout. When
//! traces or metrics are enabled, spans and instruments are also exported to
//! an OTLP collector over gRPC.
//!
//! ```rust,no_run
//! use rpcgate_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("billing-gateway")
//!         .with_log_level("debug")
//!         .with_traces(false);
//!
//!     rpcgate_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... serve requests ...
//!
//!     rpcgate_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `RUST_LOG`: Log level filter (e.g., "info", "rpcgate_server=debug")
//! - `RPCGATE_OTLP_TRACES`, `RPCGATE_OTLP_METRICS`: read by
//!   [`ObservabilityConfig::from_env`], `1`/`true`/`on` enables export
//! - `RPCGATE_LOG_FORMAT`: `text` or `json`, read by
//!   [`ObservabilityConfig::from_env`]

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "rpcgate"
/// - Service version: Current crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - Traces and metrics export: disabled
/// - JSON logs: enabled
/// - Log level: `$RUST_LOG` or "info"
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to exported telemetry
    pub service_name: String,

    /// Service version attached to exported telemetry
    pub service_version: String,

    /// OTLP gRPC endpoint of the collector
    pub otlp_endpoint: String,

    /// Export spans to the collector
    pub enable_traces: bool,

    /// Export metrics to the collector
    pub enable_metrics: bool,

    /// Format local logs as JSON lines instead of human-readable text
    pub json_logs: bool,

    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "rpcgate".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: false,
            enable_metrics: false,
            json_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by the `RPCGATE_*` environment variables
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let mut config = Self::new(service_name);
        if let Some(on) = env_flag("RPCGATE_OTLP_TRACES") {
            config.enable_traces = on;
        }
        if let Some(on) = env_flag("RPCGATE_OTLP_METRICS") {
            config.enable_metrics = on;
        }
        if let Ok(format) = std::env::var("RPCGATE_LOG_FORMAT") {
            config.json_logs = !format.eq_ignore_ascii_case("text");
        }
        config
    }

    /// Set the OTLP endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metrics export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Choose between JSON and plain text logs
    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Providers installed by [`init_observability`], kept for shutdown
#[derive(Default)]
struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

impl Providers {
    fn shutdown(&self) {
        if let Some(tracer) = &self.tracer {
            if let Err(e) = tracer.shutdown() {
                tracing::warn!(error = %e, "Tracer provider shutdown failed");
            }
        }
        if let Some(meter) = &self.meter {
            if let Err(e) = meter.shutdown() {
                tracing::warn!(error = %e, "Meter provider shutdown failed");
            }
        }
    }
}

static PROVIDERS: OnceLock<Providers> = OnceLock::new();

/// Install the global subscriber and, if enabled, the OTLP providers
///
/// # Errors
///
/// Fails when the log filter is malformed, an exporter cannot be built, or a
/// global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let providers = Providers {
        tracer: config.enable_traces.then(|| tracer_provider(&config)).transpose()?,
        meter: config.enable_metrics.then(|| meter_provider(&config)).transpose()?,
    };

    // Stored first: `shutdown_observability` must reach them even when
    // `try_init` below fails.
    if let Err(unused) = PROVIDERS.set(providers) {
        unused.shutdown();
        return Err("observability is already initialized".into());
    }
    let installed = PROVIDERS.get().ok_or("observability providers missing")?;

    let tracer = installed.tracer.as_ref().map(|provider| {
        global::set_tracer_provider(provider.clone());
        provider.tracer(config.service_name.clone())
    });
    if let Some(provider) = &installed.meter {
        global::set_meter_provider(provider.clone());
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Telemetry ready"
    );

    Ok(())
}

fn tracer_provider(config: &ObservabilityConfig) -> Result<SdkTracerProvider, BoxError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .build())
}

fn meter_provider(config: &ObservabilityConfig) -> Result<SdkMeterProvider, BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRICS_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    // `Option<Layer>` is itself a layer, so disabled parts are simply `None`.
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    let json_layer = config
        .json_logs
        .then(|| tracing_subscriber::fmt::layer().json().with_current_span(true));
    let text_layer = (!config.json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending spans and metrics and stop the exporters
///
/// Does nothing when no exporter was installed. A second call only logs that
/// the providers are already shut down.
pub fn shutdown_observability() {
    if let Some(providers) = PROVIDERS.get() {
        providers.shutdown();
        tracing::info!("Telemetry flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "rpcgate");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert!(config.json_logs);
    }

    #[test]
    fn test_config_builder_chaining() {
        let config = ObservabilityConfig::new("gateway")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("2.0.0")
            .with_traces(true)
            .with_metrics(true)
            .with_json_logs(false);

        assert_eq!(config.service_name, "gateway");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "2.0.0");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("on"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[tokio::test]
    async fn test_providers_kept_when_subscriber_install_fails() {
        // Whichever subscriber gets here first, the one below cannot install.
        let _ = tracing_subscriber::registry().try_init();

        let config = ObservabilityConfig::new("test-exporters")
            .with_endpoint("http://127.0.0.1:4317")
            .with_traces(true);

        assert!(init_observability(config).is_err());
        assert!(PROVIDERS.get().is_some_and(|p| p.tracer.is_some()));

        let again = ObservabilityConfig::new("test-again").with_traces(false);
        assert!(init_observability(again).is_err());
    }

    #[test]
    fn test_shutdown_is_repeatable() {
        shutdown_observability();
        shutdown_observability();
    }
}
