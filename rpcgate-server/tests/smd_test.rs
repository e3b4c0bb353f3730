//! SMD short-circuit integration tests

use rpcgate_server::{
    from_fn, from_typed_fn, EndpointOptions, JsonRpcServer, MethodDoc, ParamDoc, RpcRequest,
    Settings,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use warp::http::Method;

fn server(calls: Arc<AtomicUsize>) -> JsonRpcServer {
    JsonRpcServer::builder()
        .settings(Settings::default().with_key("billing", "secret"))
        .handler(
            "Api.ping",
            from_fn(move |_params, _call| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("pong"))
                }
            }),
        )
        .documented(
            "app",
            "Math.add",
            from_typed_fn(|p: (i64, i64)| async move { Ok(p.0 + p.1) }),
            MethodDoc::new("Add two integers")
                .param(ParamDoc::required("a", "integer"))
                .param(ParamDoc::required("b", "integer"))
                .returns("integer"),
        )
        .handler_in("admin", "Ops.purge", from_typed_fn(|_: ()| async { Ok(true) }))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_smd_query_skips_auth_and_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = server(calls.clone());

    // Auth is on and no key is sent; the body is a valid call.
    let request = RpcRequest::post(r#"{"method":"Api.ping","id":1}"#).with_query("smd", "1");
    let reply = server
        .handle(&request, &EndpointOptions::new().uri("/api"))
        .await;

    let smd = reply.as_schema().unwrap();
    assert_eq!(smd["transport"], "POST");
    assert_eq!(smd["envelope"], "JSON-RPC-2.0");
    assert_eq!(smd["contentType"], "application/json");
    assert_eq!(smd["SMDVersion"], "2.0");
    assert_eq!(smd["target"], "/api");
    assert_eq!(smd["description"], "JsonRpc Server");
    assert!(smd["services"].get("Api.ping").is_some());
    assert_eq!(smd["services"]["Math.add"]["returns"], "integer");
    assert!(smd["services"].get("Ops.purge").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_smd_body_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reply = server(calls.clone())
        .handle(
            &RpcRequest::post(r#"{"smd":null,"method":"Api.ping"}"#),
            &EndpointOptions::new(),
        )
        .await;

    assert!(reply.as_schema().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_smd_on_get() {
    let reply = server(Arc::new(AtomicUsize::new(0)))
        .handle(
            &RpcRequest::post("").with_method(Method::GET).with_query("smd", ""),
            &EndpointOptions::new(),
        )
        .await;
    assert!(reply.as_schema().is_some());
}

#[tokio::test]
async fn test_smd_follows_namespace_and_description() {
    let reply = server(Arc::new(AtomicUsize::new(0)))
        .handle(
            &RpcRequest::post("").with_query("smd", ""),
            &EndpointOptions::new().namespace("admin").description("Operations"),
        )
        .await;

    let smd = reply.as_schema().unwrap();
    assert_eq!(smd["description"], "Operations");
    assert!(smd["services"].get("Ops.purge").is_some());
    assert!(smd["services"].get("Api.ping").is_none());
}

#[tokio::test]
async fn test_smd_key_inside_batch_is_not_a_flag() {
    let reply = server(Arc::new(AtomicUsize::new(0)))
        .handle(
            &RpcRequest::post(r#"[{"smd":1,"method":"Api.ping","id":1}]"#),
            &EndpointOptions::new().auth(false),
        )
        .await;

    assert!(reply.as_schema().is_none());
    assert_eq!(reply.as_single().unwrap().result(), Some(&json!("pong")));
}
