//! Service Mapping Description
//!
//! A request carrying an `smd` key is answered with a self-describing schema
//! document instead of being dispatched. The document lists every method
//! registered in the mount point's namespace:
//!
//! ```json
//! {
//!   "transport": "POST",
//!   "envelope": "JSON-RPC-2.0",
//!   "contentType": "application/json",
//!   "SMDVersion": "2.0",
//!   "description": "JsonRpc Server",
//!   "target": "/rpc",
//!   "services": {
//!     "Api.ping": {"description": "Health check", "parameters": [], "returns": "string"}
//!   }
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::options::ResolvedOptions;
use crate::router::Router;

/// Documentation attached to a registered method
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodDoc {
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Named parameters, in declaration order
    pub parameters: Vec<ParamDoc>,
    /// Return type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

impl MethodDoc {
    /// Documentation with just a description
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Add a parameter
    pub fn param(mut self, param: ParamDoc) -> Self {
        self.parameters.push(param);
        self
    }

    /// Set the return type
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = Some(type_name.into());
        self
    }
}

/// One documented parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDoc {
    /// Parameter name
    pub name: String,
    /// Type name (`string`, `integer`, `object`, ...)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the parameter may be omitted
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl ParamDoc {
    /// A required parameter
    pub fn required(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
        }
    }

    /// An optional parameter
    pub fn optional(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name, type_name)
        }
    }
}

/// Builds the SMD document for a mount point
pub struct SmdGenerator;

impl SmdGenerator {
    /// Generate the schema document
    ///
    /// Pure: reads the registry and the options, never invokes a handler.
    pub fn generate(options: &ResolvedOptions, router: &Router) -> Value {
        let mut services = Map::new();
        for (path, doc) in router.methods_in(&options.namespace) {
            let entry = serde_json::to_value(doc).unwrap_or_else(|_| Value::Object(Map::new()));
            services.insert(path.to_string(), entry);
        }

        serde_json::json!({
            "transport": "POST",
            "envelope": "JSON-RPC-2.0",
            "contentType": "application/json",
            "SMDVersion": "2.0",
            "description": options.description,
            "target": options.uri,
            "services": services,
        })
    }
}
