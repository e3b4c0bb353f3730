//! Authentication integration tests

use rpcgate_server::{from_fn, EndpointOptions, JsonRpcServer, RpcRequest, Settings};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use warp::http::header::{HeaderName, HeaderValue};

const BODY: &str = r#"[{"method":"Api.whoami","id":1},{"method":"Api.whoami","id":2}]"#;

fn server(settings: Settings, calls: Arc<AtomicUsize>) -> JsonRpcServer {
    JsonRpcServer::builder()
        .settings(settings)
        .handler(
            "Api.whoami",
            from_fn(move |_params, call| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(call.service().as_str()))
                }
            }),
        )
        .build()
        .unwrap()
}

fn keyed() -> Settings {
    Settings::default()
        .with_key("billing", "k-billing")
        .with_key("crm", "k-crm")
}

fn with_key(header: &'static str, key: &'static str) -> RpcRequest {
    RpcRequest::post(BODY).with_header(
        HeaderName::from_static(header),
        HeaderValue::from_static(key),
    )
}

async fn reply(server: &JsonRpcServer, request: RpcRequest, options: EndpointOptions) -> Value {
    serde_json::to_value(server.handle(&request, &options).await).unwrap()
}

#[tokio::test]
async fn test_valid_key_resolves_service() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = server(keyed(), calls.clone());

    let reply = reply(&server, with_key("access-key", "k-crm"), EndpointOptions::new()).await;

    let responses = reply.as_array().unwrap();
    assert_eq!(responses[0]["result"], "crm");
    assert_eq!(responses[1]["result"], "crm");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = server(keyed(), calls.clone());

    let reply = reply(&server, RpcRequest::post(BODY), EndpointOptions::new()).await;

    assert!(reply.is_object());
    assert_eq!(reply["error"]["code"], -32001);
    assert_eq!(reply["error"]["message"], "Unauthorized");
    assert!(reply.get("id").is_none());
    assert!(reply.get("result").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = server(keyed(), calls.clone());

    let reply = reply(&server, with_key("access-key", "k-other"), EndpointOptions::new()).await;

    assert_eq!(reply["error"]["code"], -32001);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_key_value_is_case_sensitive() {
    let server = server(keyed(), Arc::new(AtomicUsize::new(0)));
    let reply = reply(&server, with_key("access-key", "K-CRM"), EndpointOptions::new()).await;
    assert_eq!(reply["error"]["code"], -32001);
}

#[tokio::test]
async fn test_auth_disabled_uses_guest() {
    let server = server(keyed(), Arc::new(AtomicUsize::new(0)));

    for request in [RpcRequest::post(BODY), with_key("access-key", "k-billing")] {
        let reply = reply(&server, request, EndpointOptions::new().auth(false)).await;
        for response in reply.as_array().unwrap() {
            assert_eq!(response["result"], "guest");
        }
    }
}

#[tokio::test]
async fn test_auth_disabled_by_settings() {
    let server = server(keyed().with_auth(false), Arc::new(AtomicUsize::new(0)));
    let reply = reply(&server, RpcRequest::post(BODY), EndpointOptions::new()).await;
    assert_eq!(reply[0]["result"], "guest");

    let reply = reply_enabled(&server).await;
    assert_eq!(reply["error"]["code"], -32001);
}

async fn reply_enabled(server: &JsonRpcServer) -> Value {
    reply(server, RpcRequest::post(BODY), EndpointOptions::new().auth(true)).await
}

#[tokio::test]
async fn test_custom_header_name() {
    let settings = Settings {
        access_header_name: "X-Service-Key".to_string(),
        ..keyed()
    };
    let server = server(settings, Arc::new(AtomicUsize::new(0)));

    let rejected = reply(&server, with_key("access-key", "k-crm"), EndpointOptions::new()).await;
    assert_eq!(rejected["error"]["code"], -32001);

    let accepted = reply(&server, with_key("x-service-key", "k-crm"), EndpointOptions::new()).await;
    assert_eq!(accepted[0]["result"], "crm");
}

#[tokio::test]
async fn test_acl_from_settings() {
    let settings = keyed().with_acl_entry("Api.whoami", ["billing"]);
    let server = server(settings, Arc::new(AtomicUsize::new(0)));

    let denied = reply(&server, with_key("access-key", "k-crm"), EndpointOptions::new()).await;
    assert_eq!(denied[0]["error"]["code"], -32002);

    let allowed = reply(&server, with_key("access-key", "k-billing"), EndpointOptions::new()).await;
    assert_eq!(allowed[0]["result"], "billing");
}

#[tokio::test]
async fn test_file_loaded_acl_keeps_name_case() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[[keys]]
service = "BillingService"
key = "k-billing"

[[keys]]
service = "CrmService"
key = "k-crm"

[[acl]]
method = "Api.whoami"
services = ["BillingService"]
"#
    )
    .unwrap();

    let server = JsonRpcServer::builder()
        .settings_file(file.path())
        .handler(
            "Api.whoami",
            from_fn(|_params, call| async move { Ok(json!(call.service().as_str())) }),
        )
        .build()
        .unwrap();

    let denied = reply(&server, with_key("access-key", "k-crm"), EndpointOptions::new()).await;
    assert_eq!(denied[0]["error"]["code"], -32002);
    assert_eq!(denied[1]["error"]["code"], -32002);

    let allowed = reply(&server, with_key("access-key", "k-billing"), EndpointOptions::new()).await;
    assert_eq!(allowed[0]["result"], "BillingService");
}
