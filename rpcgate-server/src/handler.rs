//! Method handlers
//!
//! A handler is the typed invocable a method name resolves to. It receives the
//! call's params and the call's [`CallEnvelope`], which carries the resolved
//! service identity and the call id. Nothing about the current call is kept in
//! shared state; the envelope is the only context a handler gets.
//!
//! ```rust
//! use rpcgate_server::{from_fn, from_typed_fn};
//! use serde::Deserialize;
//!
//! let ping = from_fn(|_params, _call| async { Ok(serde_json::json!("pong")) });
//!
//! #[derive(Deserialize)]
//! struct Transfer { from: String, to: String, cents: u64 }
//!
//! let transfer = from_typed_fn(|t: Transfer| async move {
//!     Ok(format!("{} -> {}: {}", t.from, t.to, t.cents))
//! });
//! ```

use rpcgate_core::{CallEnvelope, Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future a handler returns for one call
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Envelope handed to handlers and middleware for the duration of one call
pub type CallContext = Arc<CallEnvelope>;

/// Invocable a method name resolves to
///
/// Batch calls may run on several tokio tasks at once, hence `Send + Sync`.
/// Any `Fn(Option<Value>, CallContext) -> impl Future<Output = Result<Value>>`
/// is a handler.
///
/// The error a handler returns becomes the call's error response:
/// `InvalidParams` maps to -32602, `ExternalIntegration` to -32003 with its
/// details, `JsonRpc` is forwarded untouched and everything else is -32603.
pub trait Handler: Send + Sync {
    /// Run one call with its `params` member (`None` when absent)
    fn handle(&self, params: Option<Value>, call: CallContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Option<Value>, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn handle(&self, params: Option<Value>, call: CallContext) -> HandlerFuture {
        Box::pin(self(params, call))
    }
}

/// Box an async function over raw JSON params
///
/// ```rust
/// use rpcgate_server::from_fn;
///
/// let whoami = from_fn(|_params, call| async move {
///     Ok(serde_json::json!({"service": call.service().as_str()}))
/// });
/// ```
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Value>, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(func)
}

/// Box an async function taking deserialized params
///
/// Params that do not fit `P` fail the call with `InvalidParams`. Absent
/// params are read as `null`, so `()` and `Option<_>` accept them.
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    from_typed_fn_with_call(move |params: P, _call| func(params))
}

/// Like [`from_typed_fn`], with the call envelope as second argument
///
/// ```rust
/// use rpcgate_server::from_typed_fn_with_call;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Order { sku: String }
///
/// let place = from_typed_fn_with_call(|order: Order, call| async move {
///     Ok(format!("{} ordered {}", call.service(), order.sku))
/// });
/// ```
pub fn from_typed_fn_with_call<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);
    from_fn(move |params: Option<Value>, call: CallContext| {
        let func = Arc::clone(&func);
        async move {
            let typed = decode_params::<P>(params)?;
            let value = func(typed, call).await?;
            serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}

fn decode_params<P: DeserializeOwned>(params: Option<Value>) -> Result<P> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| Error::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcgate_core::{RoutingOverrides, ServiceIdentity};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Refund {
        invoice: String,
        cents: u64,
    }

    fn call(service: &str) -> CallContext {
        Arc::new(
            CallEnvelope::from_raw(
                json!({"method": "Billing.refund", "id": 1}),
                &RoutingOverrides::none(),
                ServiceIdentity::new(service),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_typed_params_and_result() {
        let handler = from_typed_fn(|r: Refund| async move {
            Ok(json!({"invoice": r.invoice, "refunded": r.cents}))
        });

        let result = handler
            .handle(Some(json!({"invoice": "INV-7", "cents": 250})), call("billing"))
            .await
            .unwrap();

        assert_eq!(result, json!({"invoice": "INV-7", "refunded": 250}));
    }

    #[tokio::test]
    async fn test_mismatched_params_are_invalid() {
        let handler = from_typed_fn(|r: Refund| async move { Ok(r.cents) });

        let wrong_type = handler
            .handle(Some(json!({"invoice": "INV-7", "cents": "many"})), call("billing"))
            .await
            .unwrap_err();
        assert!(matches!(wrong_type, Error::InvalidParams(_)));

        let absent = handler.handle(None, call("billing")).await.unwrap_err();
        assert!(matches!(absent, Error::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_unit_params_accept_absent_params() {
        let handler = from_typed_fn(|_: ()| async { Ok("pong") });
        let result = handler.handle(None, call("guest")).await.unwrap();
        assert_eq!(result, json!("pong"));
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through() {
        let handler = from_typed_fn(|_: ()| async {
            Err::<(), _>(Error::Unauthorized("key revoked".to_string()))
        });
        let err = handler.handle(None, call("guest")).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_handler_sees_envelope() {
        let handler = from_typed_fn_with_call(|_: (), call| async move {
            Ok(json!({"service": call.service().as_str(), "id": call.id()}))
        });

        let result = handler.handle(None, call("billing")).await.unwrap();
        assert_eq!(result, json!({"service": "billing", "id": 1}));
    }
}
