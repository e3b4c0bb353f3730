//! Method registry and invoker
//!
//! Handlers are registered up front under a `(namespace, controller, action)`
//! key. A call is dispatched in three steps:
//!
//! 1. **resolve**: look the call's [`MethodPath`] up in the mount point's
//!    namespace, failing with method-not-found
//! 2. **authorize**: check the calling service against the access table,
//!    failing with forbidden
//! 3. **invoke**: run the middleware chain around the handler
//!
//! The call envelope is passed explicitly through every step.
//!
//! # Examples
//!
//! ```rust
//! use rpcgate_server::{Router, from_typed_fn};
//!
//! let mut router = Router::new();
//! router.register("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }));
//! router.register_in("billing", "Invoice.total", from_typed_fn(|_: ()| async { Ok(0) }));
//!
//! assert!(router.has_method("app", "Api.ping"));
//! assert!(router.has_method("billing", "Invoice.total"));
//! ```

use rpcgate_core::{Error, MethodPath, Result, ServiceIdentity};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::acl::AclTable;
use crate::handler::{CallContext, Handler};
use crate::middleware::MiddlewareContext;
use crate::options::ResolvedOptions;
use crate::settings::DEFAULT_NAMESPACE;
use crate::smd::MethodDoc;

/// Controller used when a method is registered without one
pub const DEFAULT_CONTROLLER: &str = "Api";

/// Registry key of one method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    /// Registry namespace
    pub namespace: String,
    /// Controller segment
    pub controller: String,
    /// Action segment
    pub action: String,
}

impl MethodKey {
    fn new(namespace: &str, path: &MethodPath) -> Self {
        Self {
            namespace: namespace.to_string(),
            controller: path.controller.clone(),
            action: path.action.clone(),
        }
    }
}

#[derive(Clone)]
struct Registered {
    handler: Arc<dyn Handler>,
    doc: MethodDoc,
}

/// A resolved handler together with the key it was found under
#[derive(Clone)]
pub struct HandlerRef {
    key: MethodKey,
    handler: Arc<dyn Handler>,
}

impl HandlerRef {
    /// Registry key
    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    /// Human-readable handler name, e.g. `app::ApiController@ping`
    pub fn display_name(&self, postfix: &str) -> String {
        format!(
            "{}::{}{}@{}",
            self.key.namespace, self.key.controller, postfix, self.key.action
        )
    }

    /// Run the handler without middleware
    pub async fn invoke(&self, params: Option<Value>, call: CallContext) -> Result<Value> {
        self.handler.handle(params, call).await
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef").field("key", &self.key).finish()
    }
}

/// Registry of JSON-RPC methods
///
/// Cloning is cheap; the table lives behind an `Arc` and is copied on write
/// only while the router is still being populated.
#[derive(Clone, Default)]
pub struct Router {
    methods: Arc<HashMap<MethodKey, Registered>>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler in the default namespace
    ///
    /// `method` is `Controller.action`; a bare action is registered under
    /// [`DEFAULT_CONTROLLER`].
    pub fn register(&mut self, method: &str, handler: Box<dyn Handler>) {
        self.register_in(DEFAULT_NAMESPACE, method, handler);
    }

    /// Register a handler in a namespace
    pub fn register_in(&mut self, namespace: &str, method: &str, handler: Box<dyn Handler>) {
        self.register_documented(namespace, method, handler, MethodDoc::default());
    }

    /// Register a handler with SMD documentation
    pub fn register_documented(
        &mut self,
        namespace: &str,
        method: &str,
        handler: Box<dyn Handler>,
        doc: MethodDoc,
    ) {
        let Some(path) = MethodPath::parse(method, DEFAULT_CONTROLLER) else {
            tracing::warn!(namespace, method, "Ignoring handler with an invalid method name");
            return;
        };

        let key = MethodKey::new(namespace, &path);
        tracing::debug!(namespace, method = %path, "Registered handler");
        Arc::make_mut(&mut self.methods).insert(
            key,
            Registered {
                handler: Arc::from(handler),
                doc,
            },
        );
    }

    /// Check if a method is registered
    pub fn has_method(&self, namespace: &str, method: &str) -> bool {
        MethodPath::parse(method, DEFAULT_CONTROLLER)
            .map(|path| self.methods.contains_key(&MethodKey::new(namespace, &path)))
            .unwrap_or(false)
    }

    /// Number of registered methods across all namespaces
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods of one namespace with their documentation, sorted by name
    pub fn methods_in(&self, namespace: &str) -> Vec<(MethodPath, &MethodDoc)> {
        let mut methods: Vec<_> = self
            .methods
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(key, registered)| {
                (
                    MethodPath {
                        controller: key.controller.clone(),
                        action: key.action.clone(),
                    },
                    &registered.doc,
                )
            })
            .collect();
        methods.sort_by_key(|(path, _)| path.to_string());
        methods
    }

    /// Find the handler for a method path
    ///
    /// # Errors
    ///
    /// Returns `Error::MethodNotFound` when nothing is registered under the
    /// path in `namespace`.
    pub fn resolve(&self, path: &MethodPath, namespace: &str) -> Result<HandlerRef> {
        let key = MethodKey::new(namespace, path);
        match self.methods.get(&key) {
            Some(registered) => Ok(HandlerRef {
                key,
                handler: Arc::clone(&registered.handler),
            }),
            None => Err(Error::MethodNotFound(path.to_string())),
        }
    }

    /// Check whether a service may call a method
    pub fn authorize(&self, service: &ServiceIdentity, path: &MethodPath, acl: &AclTable) -> bool {
        acl.permits(service, path)
    }

    /// Resolve, authorize and invoke one call
    ///
    /// # Errors
    ///
    /// - `Error::MethodNotFound` if the method can't be parsed or resolved
    /// - `Error::Forbidden` if the access table denies the service
    /// - whatever the middleware or handler returns
    pub async fn call(&self, call: CallContext, options: &ResolvedOptions) -> Result<Value> {
        let target = call.target(&options.controller)?;
        let handler = self.resolve(&target, &options.namespace)?;

        if !self.authorize(call.service(), &target, &options.acl) {
            tracing::warn!(service = %call.service(), method = %target, "Call denied by ACL");
            return Err(Error::Forbidden {
                service: call.service().to_string(),
                method: target.to_string(),
            });
        }

        tracing::trace!(handler = %handler.display_name(&options.postfix), "Invoking");

        let ctx = MiddlewareContext::new(call, target);
        options
            .middleware
            .execute(ctx, |ctx| async move { handler.invoke(ctx.params, ctx.call).await })
            .await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .methods
            .keys()
            .map(|key| format!("{}:{}.{}", key.namespace, key.controller, key.action))
            .collect();
        keys.sort();
        f.debug_struct("Router").field("methods", &keys).finish()
    }
}

/// Builder for constructing a router
#[derive(Default)]
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler in the default namespace
    pub fn handler(mut self, method: &str, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Add a handler in a namespace
    pub fn handler_in(mut self, namespace: &str, method: &str, handler: Box<dyn Handler>) -> Self {
        self.router.register_in(namespace, method, handler);
        self
    }

    /// Add a documented handler in a namespace
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

    /// Build the router
    pub fn build(self) -> Router {
        self.router
    }
}
