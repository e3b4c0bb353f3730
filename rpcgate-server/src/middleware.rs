//! Per-call middleware
//!
//! Middleware hooks wrap every call after it has been resolved and
//! authorized. Each hook sees the call envelope and can:
//!
//! - inspect or rewrite the params passed to the handler
//! - short-circuit the call with its own result
//! - fail the call with an error
//! - observe the outcome after the handler ran
//!
//! # Execution Order
//!
//! `before_call` runs in registration order, `after_call` in reverse order:
//!
//! ```text
//! call → [A before] → [B before] → handler → [B after] → [A after] → response
//! ```
//!
//! A failing `after_call` is logged and ignored; the remaining hooks still run.
//!
//! # Default Chain
//!
//! Mount points without explicit middleware use a chain holding only
//! [`TracingMiddleware`].

use async_trait::async_trait;
use rpcgate_core::{MethodPath, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::handler::CallContext;

/// What a `before_call` hook decided
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareAction {
    /// Hand the call on to the next hook, then the handler
    Continue,
    /// Answer with this value; the handler and later hooks are skipped
    ShortCircuit(Value),
}

/// State shared by the hooks of one call
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    /// The call envelope
    pub call: CallContext,
    /// Resolved controller and action
    pub target: MethodPath,
    /// Params that will be passed to the handler
    pub params: Option<Value>,
    /// When the chain started running for this call
    pub started_at: Instant,
    /// Values a hook leaves for its own `after_call`
    scratch: HashMap<&'static str, Value>,
}

impl MiddlewareContext {
    /// Create a context for a resolved call
    pub fn new(call: CallContext, target: MethodPath) -> Self {
        let params = call.params().cloned();
        Self {
            call,
            target,
            params,
            started_at: Instant::now(),
            scratch: HashMap::new(),
        }
    }

    /// Keep a value until the end of the call
    pub fn stash(&mut self, key: &'static str, value: impl Into<Value>) {
        self.scratch.insert(key, value.into());
    }

    /// A value stashed earlier in this call
    pub fn stashed(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }
}

/// Async call hook
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before the handler
    async fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction>;

    /// Runs once the call has an outcome, whether from the handler or a hook
    async fn after_call(
        &self,
        _ctx: &mut MiddlewareContext,
        _outcome: &Result<Value>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Call hook that never awaits
pub trait SyncMiddleware: Send + Sync {
    /// Runs before the handler
    fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction>;

    /// Runs once the call has an outcome
    fn after_call(&self, _ctx: &mut MiddlewareContext, _outcome: &Result<Value>) -> Result<()> {
        Ok(())
    }
}

struct Blocking<T>(T);

#[async_trait]
impl<T: SyncMiddleware + 'static> Middleware for Blocking<T> {
    async fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
        self.0.before_call(ctx)
    }

    async fn after_call(&self, ctx: &mut MiddlewareContext, outcome: &Result<Value>) -> Result<()> {
        self.0.after_call(ctx, outcome)
    }
}

/// Ordered list of call hooks
#[derive(Clone)]
pub struct MiddlewareChain {
    hooks: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// A chain with no hooks
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// The chain used when a mount point configures none
    pub fn default_hooks() -> Self {
        let mut chain = Self::new();
        chain.add_sync(TracingMiddleware::new());
        chain
    }

    /// Append an async hook
    pub fn add(&mut self, hook: Arc<dyn Middleware>) {
        self.hooks.push(hook);
    }

    /// Append a hook that never awaits
    pub fn add_sync<T: SyncMiddleware + 'static>(&mut self, hook: T) {
        self.hooks.push(Arc::new(Blocking(hook)));
    }

    /// Run the chain around a handler
    ///
    /// Only the hooks whose `before_call` ran get their `after_call` called.
    pub async fn execute<F, Fut>(&self, mut ctx: MiddlewareContext, handler: F) -> Result<Value>
    where
        F: FnOnce(MiddlewareContext) -> Fut + Send,
        Fut: std::future::Future<Output = Result<Value>> + Send,
    {
        let mut entered = 0;
        let mut early = None;

        for hook in &self.hooks {
            entered += 1;
            match hook.before_call(&mut ctx).await {
                Ok(MiddlewareAction::Continue) => {}
                Ok(MiddlewareAction::ShortCircuit(value)) => {
                    early = Some(Ok(value));
                    break;
                }
                Err(e) => {
                    early = Some(Err(e));
                    break;
                }
            }
        }

        let outcome = match early {
            Some(outcome) => outcome,
            None => handler(ctx.clone()).await,
        };

        for hook in self.hooks[..entered].iter().rev() {
            if let Err(e) = hook.after_call(&mut ctx, &outcome).await {
                tracing::warn!(method = %ctx.target, error = %e, "after_call hook failed");
            }
        }

        outcome
    }

    /// Number of hooks in the chain
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// True when no hook is registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::default_hooks()
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Logs each call with its service, method, outcome and duration
///
/// This is the default hook of every mount point.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    /// The logging hook
    pub fn new() -> Self {
        Self
    }
}

impl SyncMiddleware for TracingMiddleware {
    fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
        tracing::debug!(
            service = %ctx.call.service(),
            method = %ctx.target,
            id = ?ctx.call.id(),
            "Call started"
        );
        Ok(MiddlewareAction::Continue)
    }

    fn after_call(&self, ctx: &mut MiddlewareContext, outcome: &Result<Value>) -> Result<()> {
        let elapsed_us = ctx.started_at.elapsed().as_micros() as u64;

        match outcome {
            Ok(_) => tracing::info!(
                service = %ctx.call.service(),
                method = %ctx.target,
                elapsed_us,
                "Call succeeded"
            ),
            Err(e) => tracing::warn!(
                service = %ctx.call.service(),
                method = %ctx.target,
                elapsed_us,
                error = %e,
                "Call failed"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcgate_core::{CallEnvelope, Error, RoutingOverrides, ServiceIdentity};
    use serde_json::json;
    use std::sync::Mutex;

    fn context() -> MiddlewareContext {
        let call = CallEnvelope::from_raw(
            json!({"method": "Api.test", "params": {"n": 1}, "id": 1}),
            &RoutingOverrides::none(),
            ServiceIdentity::guest(),
        )
        .unwrap();
        let target = call.target("Api").unwrap();
        MiddlewareContext::new(Arc::new(call), target)
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder(&'static str, Log);

    impl SyncMiddleware for Recorder {
        fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
            self.1.lock().unwrap().push(format!("{} before", self.0));
            ctx.stash(self.0, true);
            Ok(MiddlewareAction::Continue)
        }

        fn after_call(&self, _ctx: &mut MiddlewareContext, _outcome: &Result<Value>) -> Result<()> {
            self.1.lock().unwrap().push(format!("{} after", self.0));
            Ok(())
        }
    }

    struct Answer(Value);

    impl SyncMiddleware for Answer {
        fn before_call(&self, _ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
            Ok(MiddlewareAction::ShortCircuit(self.0.clone()))
        }
    }

    struct Reject;

    impl SyncMiddleware for Reject {
        fn before_call(&self, _ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
            Err(Error::InvalidParams("rejected by hook".into()))
        }
    }

    struct DoubleN;

    impl SyncMiddleware for DoubleN {
        fn before_call(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
            let n = ctx.params.as_ref().and_then(|p| p["n"].as_i64()).unwrap_or(0);
            ctx.params = Some(json!({"n": n * 2}));
            Ok(MiddlewareAction::Continue)
        }
    }

    struct FailingAfter;

    impl SyncMiddleware for FailingAfter {
        fn before_call(&self, _ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
            Ok(MiddlewareAction::Continue)
        }

        fn after_call(&self, _ctx: &mut MiddlewareContext, _outcome: &Result<Value>) -> Result<()> {
            Err(Error::Internal("audit sink down".into()))
        }
    }

    #[tokio::test]
    async fn test_hooks_wrap_handler_in_nested_order() {
        let log = Log::default();
        let mut chain = MiddlewareChain::new();
        chain.add_sync(Recorder("outer", log.clone()));
        chain.add_sync(Recorder("inner", log.clone()));

        let outcome = chain
            .execute(context(), |ctx| async move {
                assert_eq!(ctx.stashed("outer"), Some(&json!(true)));
                assert_eq!(ctx.stashed("inner"), Some(&json!(true)));
                Ok(json!("done"))
            })
            .await;

        assert_eq!(outcome.unwrap(), json!("done"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer before", "inner before", "inner after", "outer after"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler_and_later_hooks() {
        let log = Log::default();
        let mut chain = MiddlewareChain::new();
        chain.add_sync(Recorder("outer", log.clone()));
        chain.add_sync(Answer(json!("cached")));
        chain.add_sync(Recorder("never", log.clone()));

        let outcome = chain
            .execute(context(), |_ctx| async move {
                panic!("handler must not run");
            })
            .await;

        assert_eq!(outcome.unwrap(), json!("cached"));
        assert_eq!(*log.lock().unwrap(), vec!["outer before", "outer after"]);
    }

    #[tokio::test]
    async fn test_rejecting_hook_fails_the_call() {
        let mut chain = MiddlewareChain::new();
        chain.add_sync(Reject);

        let outcome = chain
            .execute(context(), |_ctx| async move {
                panic!("handler must not run");
            })
            .await;

        assert!(matches!(outcome, Err(Error::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_hook_rewrites_params() {
        let mut chain = MiddlewareChain::new();
        chain.add_sync(DoubleN);

        let outcome = chain
            .execute(context(), |ctx| async move { Ok(ctx.params.unwrap_or_default()) })
            .await;

        assert_eq!(outcome.unwrap(), json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_failing_after_call_keeps_outcome() {
        let log = Log::default();
        let mut chain = MiddlewareChain::new();
        chain.add_sync(Recorder("outer", log.clone()));
        chain.add_sync(FailingAfter);

        let outcome = chain.execute(context(), |_ctx| async { Ok(json!(7)) }).await;

        assert_eq!(outcome.unwrap(), json!(7));
        assert_eq!(*log.lock().unwrap(), vec!["outer before", "outer after"]);
    }

    #[tokio::test]
    async fn test_default_chain_passes_handler_errors_through() {
        let chain = MiddlewareChain::default();
        assert_eq!(chain.len(), 1);

        let outcome = chain
            .execute(context(), |_ctx| async move {
                Err(Error::MethodNotFound("Api.test".to_string()))
            })
            .await;

        assert!(matches!(outcome, Err(Error::MethodNotFound(_))));
    }

    #[tokio::test]
    async fn test_started_at_precedes_outcome() {
        let ctx = context();
        let started = ctx.started_at;

        let outcome = MiddlewareChain::default()
            .execute(ctx, |ctx| async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok(json!(ctx.started_at.elapsed().as_millis() >= 5))
            })
            .await;

        assert_eq!(outcome.unwrap(), json!(true));
        assert!(started.elapsed().as_millis() >= 5);
    }

    #[tokio::test]
    async fn test_empty_chain_runs_handler() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let outcome = chain.execute(context(), |_ctx| async { Ok(json!(1)) }).await;
        assert_eq!(outcome.unwrap(), json!(1));
    }
}
