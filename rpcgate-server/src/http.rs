//! HTTP adapter
//!
//! Mounts a [`JsonRpcServer`] on a `warp` filter. The filter matches the
//! mount point's `uri`, extracts the method, headers, query string and body,
//! and always answers `200 OK` with the JSON reply; errors travel inside the
//! JSON-RPC payload.
//!
//! ```rust,no_run
//! use rpcgate_server::{http, EndpointOptions, JsonRpcServer, from_typed_fn};
//! use std::sync::Arc;
//!
//! # async fn example() -> rpcgate_core::Result<()> {
//! let server = JsonRpcServer::builder()
//!     .handler("Api.ping", from_typed_fn(|_: ()| async { Ok("pong") }))
//!     .build()?;
//!
//! http::serve(Arc::new(server), EndpointOptions::new().uri("/rpc"), ([127, 0, 0, 1], 8080)).await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use rpcgate_core::{Error, Result};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::header::HeaderMap;
use warp::http::Method;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

use crate::options::EndpointOptions;
use crate::server::{JsonRpcServer, RpcRequest};

/// Build the filter serving one mount point
pub fn routes(
    server: Arc<JsonRpcServer>,
    options: EndpointOptions,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let mount = normalize(&options.resolve(server.settings()).uri).to_string();

    let at_mount = warp::path::full()
        .and_then(move |path: FullPath| {
            let matches = normalize(path.as_str()) == mount;
            async move {
                if matches {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one();

    let server = warp::any().map(move || Arc::clone(&server));
    let options = warp::any().map(move || options.clone());

    at_mount
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::body::bytes())
        .and(server)
        .and(options)
        .and_then(dispatch)
}

fn normalize(path: &str) -> &str {
    path.trim_end_matches('/')
}

async fn dispatch(
    method: Method,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Bytes,
    server: Arc<JsonRpcServer>,
    options: EndpointOptions,
) -> std::result::Result<impl Reply, Infallible> {
    let request = RpcRequest {
        method,
        headers,
        query,
        body,
    };
    let reply = server.handle(&request, &options).await;
    Ok(warp::reply::json(&reply))
}

/// Serve one mount point until the process exits
pub async fn serve(
    server: Arc<JsonRpcServer>,
    options: EndpointOptions,
    addr: impl Into<SocketAddr>,
) {
    let addr = addr.into();
    tracing::info!(addr = %addr, "Server listening");
    warp::serve(routes(server, options).with(warp::trace::request()))
        .run(addr)
        .await;
}

/// Serve one mount point until `signal` resolves
///
/// Returns the bound address and the server future; the caller drives the
/// future. Binding to port 0 picks a free port.
///
/// # Errors
///
/// Returns `Error::Io` when the address can't be bound.
pub fn serve_with_shutdown(
    server: Arc<JsonRpcServer>,
    options: EndpointOptions,
    addr: impl Into<SocketAddr>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, running) = warp::serve(routes(server, options).with(warp::trace::request()))
        .try_bind_with_graceful_shutdown(addr.into(), signal)
        .map_err(|e| Error::Io(e.to_string()))?;
    tracing::info!(addr = %bound, "Server listening");
    Ok((bound, running))
}
