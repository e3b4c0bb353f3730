//! Ping server demo
//!
//! Serves a handful of methods at `/rpc` until Ctrl-C.
//!
//! Run with: cargo run --example ping_server [settings.toml]
//!
//! Without a settings file a single service `demo` with key `demo-key` is
//! configured. Try:
//!
//! ```text
//! curl -s -X POST http://127.0.0.1:8080/rpc -H 'Access-Key: demo-key' \
//!     -d '{"jsonrpc":"2.0","method":"Api.ping","id":1}'
//! curl -s 'http://127.0.0.1:8080/rpc?smd'
//! ```

use rpcgate::core::{ErrorDetail, ObservabilityConfig};
use rpcgate::server::{
    from_typed_fn, from_typed_fn_with_call, http, MethodDoc, ParamDoc, DEFAULT_NAMESPACE,
};
use rpcgate::{EndpointOptions, Error, JsonRpcServer, Settings};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[derive(Deserialize)]
struct SyncParams {
    accounts: Vec<String>,
}

async fn add(params: AddParams) -> rpcgate::Result<i64> {
    tracing::debug!(a = params.a, b = params.b, "Adding numbers");
    params
        .a
        .checked_add(params.b)
        .ok_or_else(|| Error::InvalidParams("Sum overflows".to_string()))
}

async fn sync_accounts(params: SyncParams) -> rpcgate::Result<usize> {
    // Pretend every account starting with "x" is rejected upstream.
    let failures: Vec<_> = params
        .accounts
        .iter()
        .filter(|account| account.starts_with('x'))
        .map(|account| {
            ErrorDetail::new(404, Some("Unknown account"))
                .with_object_name(account.clone())
        })
        .collect();

    if failures.is_empty() {
        Ok(params.accounts.len())
    } else {
        Err(Error::ExternalIntegration(failures))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = JsonRpcServer::builder()
        .service_name("rpcgate-demo")
        .with_observability(
            ObservabilityConfig::new("rpcgate-demo")
                .with_json_logs(false)
                .with_log_level("debug"),
        );

    builder = match std::env::args().nth(1) {
        Some(path) => builder.settings_file(path),
        None => builder.settings(Settings::default().with_key("demo", "demo-key")),
    };

    let server = builder
        .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
        .handler(
            "Api.whoami",
            from_typed_fn_with_call(|_: (), call| async move {
                Ok(call.service().as_str().to_string())
            }),
        )
        .documented(
            DEFAULT_NAMESPACE,
            "Math.add",
            from_typed_fn(add),
            MethodDoc::new("Add two integers")
                .param(ParamDoc::required("a", "integer"))
                .param(ParamDoc::required("b", "integer"))
                .returns("integer"),
        )
        .documented(
            DEFAULT_NAMESPACE,
            "Crm.sync",
            from_typed_fn(sync_accounts),
            MethodDoc::new("Push accounts to the CRM")
                .param(ParamDoc::required("accounts", "array"))
                .returns("integer"),
        )
        .build()?;

    let options = EndpointOptions::new()
        .uri("/rpc")
        .description("rpcgate demo server");

    let (addr, running) = http::serve_with_shutdown(
        Arc::new(server),
        options,
        ([127, 0, 0, 1], 8080),
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )?;

    println!("rpcgate demo listening on http://{}/rpc", addr);
    running.await;

    rpcgate::core::shutdown_observability();
    Ok(())
}
