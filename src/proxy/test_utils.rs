//! Test utilities for proxy module testing
//!
//! Mock upstreams bound to ephemeral ports and helpers for driving the
//! proxy router in-process.

use crate::proxy::{ProxyConfig, ProxyService};
use axum::{body::Body, http::Request, response::Response, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::proxy::LogStore;

/// Serve `app` on `127.0.0.1:0` and return its address
pub async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream");
    });
    addr
}

/// Raw TCP upstream that reads one request head, writes `reply` verbatim
/// and closes the connection
pub async fn spawn_raw_upstream(reply: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..read]);
        }
        stream.write_all(reply).await.expect("write reply");
        stream.shutdown().await.ok();
    });
    addr
}

/// Address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

/// Proxy router plus a handle on its log
pub fn proxy_app(config: ProxyConfig) -> (Router, Arc<LogStore>) {
    let service = ProxyService::new(config);
    let store = service.log_store();
    (service.into_router(), store)
}

/// Send one request through the router and collect the body
pub async fn send(app: &Router, request: Request<Body>) -> (Response, bytes::Bytes) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("collect body");
    (Response::from_parts(parts, Body::empty()), bytes)
}
