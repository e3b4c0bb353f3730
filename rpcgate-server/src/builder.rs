//! Server builder
//!
//! Fluent construction of a [`JsonRpcServer`]. The builder lets you:
//! - supply settings directly or load them from a file and the environment
//! - register method handlers, optionally with SMD documentation
//! - configure batch processing
//! - enable metrics and OpenTelemetry export
//!
//! # Examples
//!
//! ```rust
//! use rpcgate_server::{BatchMode, JsonRpcServer, Settings, from_typed_fn};
//!
//! # fn example() -> rpcgate_core::Result<()> {
//! let server = JsonRpcServer::builder()
//!     .settings(Settings::default().with_key("billing", "k-billing"))
//!     .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
//!     .batch_mode(BatchMode::Sequential)
//!     .max_batch_size(50)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use rpcgate_core::{Error, ObservabilityConfig, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::{BatchMode, BatchProcessor};
use crate::handler::Handler;
use crate::metrics::ServerMetrics;
use crate::router::Router;
use crate::server::JsonRpcServer;
use crate::settings::Settings;
use crate::smd::MethodDoc;

const DEFAULT_SERVICE_NAME: &str = "rpcgate";

/// Builder for a [`JsonRpcServer`]
pub struct ServerBuilder {
    settings: Option<Settings>,
    settings_path: Option<PathBuf>,
    router: Router,
    batch_mode: BatchMode,
    max_batch_size: Option<usize>,
    metrics: bool,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            settings: None,
            settings_path: None,
            router: Router::new(),
            batch_mode: BatchMode::default(),
            max_batch_size: None,
            metrics: false,
            observability_config: None,
            service_name: None,
        }
    }

    /// Use these settings instead of loading them
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Load settings from a TOML file (plus environment overrides)
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Register a handler in the default namespace
    pub fn handler(mut self, method: &str, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Register a handler in a namespace
    pub fn handler_in(mut self, namespace: &str, method: &str, handler: Box<dyn Handler>) -> Self {
        self.router.register_in(namespace, method, handler);
        self
    }

    /// Register a handler with SMD documentation
    pub fn documented(
        mut self,
        namespace: &str,
        method: &str,
        handler: Box<dyn Handler>,
        doc: MethodDoc,
    ) -> Self {
        self.router.register_documented(namespace, method, handler, doc);
        self
    }

    /// Set the router (replaces any previously registered handlers)
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Set the batch processing mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// Set the maximum batch size, overriding the settings
    pub fn max_batch_size(mut self, max_size: usize) -> Self {
        self.max_batch_size = Some(max_size);
        self
    }

    /// Record metrics on the global meter provider
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Initialize logging and OpenTelemetry export when building
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Initialize logging and OpenTelemetry export with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for observability and metrics
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the server
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the settings can't be loaded or the access header
    ///   name is invalid
    /// - `Error::Internal` if observability can't be initialized
    pub fn build(self) -> Result<JsonRpcServer> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => Settings::load(self.settings_path.as_deref())?,
        };

        let service_name = self
            .service_name
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let observability = self.observability_config.is_some();
        if let Some(mut config) = self.observability_config {
            config.service_name = service_name.clone();
            rpcgate_core::init_observability(config).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;
        }

        let metrics = (self.metrics || observability)
            .then(|| Arc::new(ServerMetrics::new(service_name.clone())));

        let max_batch_size = self.max_batch_size.or(settings.max_batch_size);
        let batch = BatchProcessor::with_limit(self.batch_mode, max_batch_size);

        tracing::info!(
            service = %service_name,
            methods = self.router.len(),
            mode = self.batch_mode.as_str(),
            max_batch_size,
            auth = settings.auth_validate,
            "Server configured"
        );

        JsonRpcServer::from_parts(self.router, Arc::new(settings), batch, metrics)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
