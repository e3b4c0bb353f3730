//! Per-method access control
//!
//! The table maps a method name to the services allowed to call it. Lookup
//! rules:
//!
//! - An empty table allows everything.
//! - A method missing from a non-empty table is allowed for everyone.
//! - A listed method is allowed only for the listed services; `"*"` in the
//!   list allows every service, including the guest identity.
//!
//! Method names are matched in their qualified `Controller.action` form, with
//! a `Controller.*` entry covering every action of a controller.

use rpcgate_core::{MethodPath, ServiceIdentity};
use std::collections::{HashMap, HashSet};

const WILDCARD: &str = "*";

/// Access table: method → allowed services
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclTable {
    rules: HashMap<String, HashSet<String>>,
}

impl AclTable {
    /// Create an empty table (allows everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from method → services pairs
    pub fn from_map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, S)>,
        S: IntoIterator<Item = String>,
    {
        let rules = entries
            .into_iter()
            .map(|(method, services)| (method, services.into_iter().collect()))
            .collect();
        Self { rules }
    }

    /// Allow a service to call a method
    pub fn allow(mut self, method: impl Into<String>, service: impl Into<String>) -> Self {
        self.rules
            .entry(method.into())
            .or_default()
            .insert(service.into());
        self
    }

    /// Check if the table has no rule
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether a service may call a method
    pub fn permits(&self, service: &ServiceIdentity, method: &MethodPath) -> bool {
        let exact = self.rules.get(&method.to_string());
        let controller_wide = self.rules.get(&format!("{}.{}", method.controller, WILDCARD));

        if exact.is_none() && controller_wide.is_none() {
            return true;
        }

        [exact, controller_wide]
            .into_iter()
            .flatten()
            .any(|allowed| allowed.contains(WILDCARD) || allowed.contains(service.as_str()))
    }
}
