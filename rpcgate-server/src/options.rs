//! Per-mount options
//!
//! Every mount point of the dispatcher carries an [`EndpointOptions`] value
//! where each field is optional. Before a request is handled the options are
//! resolved against the process-wide [`Settings`] into a [`ResolvedOptions`],
//! which is what the rest of the request lifecycle reads.
//!
//! | option | default |
//! |---|---|
//! | uri | `/` |
//! | namespace | `settings.controller_namespace` |
//! | postfix | `settings.controller_postfix` |
//! | description | `settings.description` |
//! | controller | `settings.default_controller` |
//! | middleware | [`MiddlewareChain::default_hooks`] |
//! | acl | `settings.acl` |
//! | auth | `settings.auth_validate` |
//!
//! Empty strings and an empty middleware chain count as unset. An explicitly
//! empty ACL or `auth = false` is kept as given.

use rpcgate_core::RoutingOverrides;

use crate::acl::AclTable;
use crate::middleware::MiddlewareChain;
use crate::settings::Settings;

/// Options of one mount point, all optional
#[derive(Debug, Clone, Default)]
pub struct EndpointOptions {
    uri: Option<String>,
    namespace: Option<String>,
    postfix: Option<String>,
    description: Option<String>,
    controller: Option<String>,
    middleware: Option<MiddlewareChain>,
    acl: Option<AclTable>,
    auth: Option<bool>,
    endpoint: Option<String>,
    action: Option<String>,
}

impl EndpointOptions {
    /// Options with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount path
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Registry namespace handlers are resolved in
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Suffix appended to controller names when displayed
    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = Some(postfix.into());
        self
    }

    /// SMD description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Controller used for method names without a controller segment
    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Replace the middleware chain
    pub fn middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Replace the access table
    pub fn acl(mut self, acl: AclTable) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Enable or disable authentication
    pub fn auth(mut self, enabled: bool) -> Self {
        self.auth = Some(enabled);
        self
    }

    /// Route every call on this mount to one controller
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Route every call on this mount to one action
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Fill unset fields from the settings
    pub fn resolve(&self, settings: &Settings) -> ResolvedOptions {
        ResolvedOptions {
            uri: non_empty(&self.uri).unwrap_or_else(|| "/".to_string()),
            namespace: non_empty(&self.namespace)
                .unwrap_or_else(|| settings.controller_namespace.clone()),
            postfix: non_empty(&self.postfix)
                .unwrap_or_else(|| settings.controller_postfix.clone()),
            description: non_empty(&self.description)
                .unwrap_or_else(|| settings.description.clone()),
            controller: non_empty(&self.controller)
                .unwrap_or_else(|| settings.default_controller.clone()),
            middleware: self
                .middleware
                .clone()
                .filter(|chain| !chain.is_empty())
                .unwrap_or_else(MiddlewareChain::default_hooks),
            acl: self
                .acl
                .clone()
                .unwrap_or_else(|| AclTable::from_map(settings.acl.clone())),
            auth: self.auth.unwrap_or(settings.auth_validate),
            overrides: RoutingOverrides {
                endpoint: non_empty(&self.endpoint),
                action: non_empty(&self.action),
            },
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Options with every default filled in
///
/// Read-only for the lifetime of the request it was resolved for.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Mount path
    pub uri: String,
    /// Registry namespace
    pub namespace: String,
    /// Controller name suffix
    pub postfix: String,
    /// SMD description
    pub description: String,
    /// Default controller
    pub controller: String,
    /// Per-call hooks
    pub middleware: MiddlewareChain,
    /// Access table
    pub acl: AclTable,
    /// Whether the authenticator runs
    pub auth: bool,
    /// Routing overrides applied to every call
    pub overrides: RoutingOverrides,
}
