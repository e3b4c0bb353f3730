//! Process-wide settings
//!
//! Settings are loaded once at startup and shared read-only by every request.
//! They supply the access keys, the ACL and the defaults that per-mount
//! [`EndpointOptions`](crate::EndpointOptions) fall back to.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `RPCGATE__` for the scalar fields
//!    (e.g. `RPCGATE__AUTH_VALIDATE=false`, `RPCGATE__MAX_BATCH_SIZE=50`)
//!
//! `config` folds every table key to lower case, so service and method names
//! are never used as keys. Access keys and ACL rules are lists of entries
//! whose names are values:
//!
//! ```toml
//! access_header_name = "Access-Key"
//! auth_validate = true
//!
//! [[keys]]
//! service = "billing"
//! key = "3f1c9a"
//!
//! [[keys]]
//! service = "crm"
//! key = "77ab20"
//!
//! [[acl]]
//! method = "Api.refund"
//! services = ["billing"]
//! ```
//!
//! They can only come from the file or from code; a `RPCGATE__KEYS__*`
//! variable is rejected as a configuration error.

use rpcgate_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;

/// Registry namespace used when nothing else is configured
pub const DEFAULT_NAMESPACE: &str = "app";

/// Process-wide dispatcher settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Header carrying the caller's access key
    pub access_header_name: String,

    /// Access keys, by service name
    #[serde(deserialize_with = "key_entries")]
    pub keys: HashMap<String, String>,

    /// Default registry namespace
    pub controller_namespace: String,

    /// Suffix appended to controller names when they are displayed
    pub controller_postfix: String,

    /// Default SMD description
    pub description: String,

    /// Controller used when a method name has no controller segment
    pub default_controller: String,

    /// Default ACL: method name → services allowed to call it
    #[serde(deserialize_with = "acl_entries")]
    pub acl: HashMap<String, Vec<String>>,

    /// Whether the authenticator runs by default
    pub auth_validate: bool,

    /// Largest batch accepted in one request, unlimited when unset
    pub max_batch_size: Option<usize>,
}

#[derive(Deserialize)]
struct KeyEntry {
    service: String,
    key: String,
}

#[derive(Deserialize)]
struct AclEntry {
    method: String,
    services: Vec<String>,
}

fn key_entries<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<KeyEntry>::deserialize(deserializer)?;
    Ok(entries.into_iter().map(|e| (e.service, e.key)).collect())
}

// Repeated methods merge their service lists.
fn acl_entries<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut acl: HashMap<String, Vec<String>> = HashMap::new();
    for entry in Vec::<AclEntry>::deserialize(deserializer)? {
        acl.entry(entry.method).or_default().extend(entry.services);
    }
    Ok(acl)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_header_name: "Access-Key".to_string(),
            keys: HashMap::new(),
            controller_namespace: DEFAULT_NAMESPACE.to_string(),
            controller_postfix: "Controller".to_string(),
            description: "JsonRpc Server".to_string(),
            default_controller: "Api".to_string(),
            acl: HashMap::new(),
            auth_validate: true,
            max_batch_size: None,
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder
            .add_source(
                config::Environment::with_prefix("RPCGATE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Register an access key for a service
    pub fn with_key(mut self, service: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(service.into(), key.into());
        self
    }

    /// Allow a set of services to call a method
    pub fn with_acl_entry<I, S>(mut self, method: impl Into<String>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acl
            .insert(method.into(), services.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable authentication by default
    pub fn with_auth(mut self, enabled: bool) -> Self {
        self.auth_validate = enabled;
        self
    }
}
