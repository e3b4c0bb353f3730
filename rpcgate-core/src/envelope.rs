//! Call envelope: one validated call plus its request-scoped context
//!
//! A batch is decoded into raw JSON values first. Each value is then turned
//! into a [`CallEnvelope`] on its own, so a malformed call only fails itself
//! and never its siblings.
//!
//! The envelope is built in one step from three inputs:
//!
//! - the raw call object (`jsonrpc`, `method`, `params`, `id`)
//! - the routing overrides of the mount point (`endpoint`, `action`)
//! - the service identity resolved by the authenticator
//!
//! and is immutable afterwards. Handlers and middleware receive it explicitly
//! as an `Arc<CallEnvelope>`; nothing is stored in ambient state.
//!
//! # Method Paths
//!
//! A method name is split at its last dot into a controller and an action:
//! `"User.find"` targets action `find` on controller `User`, while a bare
//! `"ping"` targets the mount point's default controller.

use crate::error::{Error, Result};
use crate::types::{Id, JSONRPC_VERSION};
use serde_json::Value;
use std::fmt;

/// Identity of the calling service
///
/// Resolved from the access-key header, or [`ServiceIdentity::guest`] when
/// authentication is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    /// Sentinel name used when authentication is disabled
    pub const GUEST: &'static str = "guest";

    /// Create an identity for a named service
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The unauthenticated guest identity
    pub fn guest() -> Self {
        Self(Self::GUEST.to_string())
    }

    /// Check if this is the guest sentinel
    pub fn is_guest(&self) -> bool {
        self.0 == Self::GUEST
    }

    /// The service name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routing overrides injected by the mount point
///
/// Lets the same logical method be addressed under different hosting
/// conventions: `endpoint` replaces the controller segment, `action` replaces
/// the action segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingOverrides {
    /// Controller that every call on this mount resolves to
    pub endpoint: Option<String>,
    /// Action that every call on this mount resolves to
    pub action: Option<String>,
}

impl RoutingOverrides {
    /// No overrides
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if any override is set
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.action.is_none()
    }
}

/// Controller and action a call resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPath {
    /// Controller segment (may itself contain dots, e.g. `v1.User`)
    pub controller: String,
    /// Action segment
    pub action: String,
}

impl MethodPath {
    /// Split a method name at its last dot
    ///
    /// Returns `None` for an empty name or an empty action segment.
    pub fn parse(method: &str, default_controller: &str) -> Option<Self> {
        let (controller, action) = match method.rsplit_once('.') {
            Some((controller, action)) => (controller, action),
            None => (default_controller, method),
        };
        if action.is_empty() || controller.is_empty() {
            return None;
        }
        Some(Self {
            controller: controller.to_string(),
            action: action.to_string(),
        })
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.controller, self.action)
    }
}

/// One validated JSON-RPC call with its request-scoped context
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    method: Option<String>,
    params: Option<Value>,
    id: Option<Id>,
    service: ServiceIdentity,
    overrides: RoutingOverrides,
}

impl CallEnvelope {
    /// Build an envelope from a raw call object
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` when the call is not an object, when
    /// `jsonrpc` is present but not `"2.0"`, when `method` is present but not
    /// a string, or when `id` is an array or object.
    ///
    /// A missing `method` is accepted here and reported as method-not-found
    /// when the call is resolved.
    pub fn from_raw(
        raw: Value,
        overrides: &RoutingOverrides,
        service: ServiceIdentity,
    ) -> Result<Self> {
        let mut object = match raw {
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidRequest(format!(
                    "Call must be an object, got {}",
                    json_kind(&other)
                )))
            }
        };

        match object.get("jsonrpc") {
            None => {}
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(Error::InvalidRequest(format!(
                    "Unsupported jsonrpc version: {}",
                    other
                )))
            }
        }

        let id = match object.get("id") {
            None => None,
            Some(value) => Id::from_value(value).map_err(|bad| {
                Error::InvalidRequest(format!("Invalid id: {} is not a scalar", json_kind(bad)))
            })?,
        };

        let method = match object.remove("method") {
            None | Some(Value::Null) => None,
            Some(Value::String(method)) => Some(method),
            Some(other) => {
                return Err(Error::InvalidRequest(format!(
                    "Method must be a string, got {}",
                    json_kind(&other)
                )))
            }
        };

        let params = object.remove("params");

        Ok(Self {
            method,
            params,
            id,
            service,
            overrides: overrides.clone(),
        })
    }

    /// Best-effort id extraction for calls that failed validation
    ///
    /// Used to correlate an error response with a call that could not be
    /// turned into an envelope.
    pub fn peek_id(raw: &Value) -> Option<Id> {
        raw.get("id")
            .and_then(|value| Id::from_value(value).ok())
            .flatten()
    }

    /// The method name as sent by the caller
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The call parameters
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// The call id
    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    /// The resolved service identity
    pub fn service(&self) -> &ServiceIdentity {
        &self.service
    }

    /// The routing overrides applied to this call
    pub fn overrides(&self) -> &RoutingOverrides {
        &self.overrides
    }

    /// Resolve the controller and action this call targets
    ///
    /// Overrides win over the segments parsed from the method name.
    ///
    /// # Errors
    ///
    /// Returns `Error::MethodNotFound` when no method was sent (and no
    /// override supplies the action) or the name has an empty segment.
    pub fn target(&self, default_controller: &str) -> Result<MethodPath> {
        let method = self.method.as_deref().unwrap_or_default();

        let parsed = match (&self.overrides.endpoint, &self.overrides.action) {
            (Some(endpoint), Some(action)) => Some(MethodPath {
                controller: endpoint.clone(),
                action: action.clone(),
            }),
            (None, Some(action)) => {
                let controller = method
                    .rsplit_once('.')
                    .map(|(controller, _)| controller)
                    .filter(|controller| !controller.is_empty())
                    .unwrap_or(default_controller);
                Some(MethodPath {
                    controller: controller.to_string(),
                    action: action.clone(),
                })
            }
            (Some(endpoint), None) => {
                let action = method.rsplit_once('.').map_or(method, |(_, action)| action);
                MethodPath::parse(action, endpoint)
            }
            (None, None) => MethodPath::parse(method, default_controller),
        };

        parsed.ok_or_else(|| Error::MethodNotFound(method.to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
