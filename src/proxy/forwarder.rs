//! Request forwarding with full transaction capture
//!
//! One call to [`Forwarder::handle`] proxies one request and produces exactly
//! one finalized log entry, whatever the outcome. The request and response
//! bodies are buffered so they can be logged; the response relayed to the
//! caller is the upstream's, byte for byte.

use crate::proxy::error_response::ErrorResponseExt;
use crate::proxy::headers::{
    append_forwarded_for, client_ip, remove_hop_by_hop, HOST, X_PROXY_TARGET,
};
use crate::proxy::log_store::{EntryHandle, LogStore, RequestMetadata};
use crate::proxy::types::*;
use crate::proxy::url_resolver::{Resolution, TargetResolver};
use axum::body::Body;
use axum::response::IntoResponse;
use bytes::Bytes;
use http::request::Parts;
use http_body_util::BodyExt;
use hyper::header::HeaderValue;
use hyper::{Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Forwards requests upstream and records each transaction
#[derive(Clone)]
pub struct Forwarder {
    resolver: Arc<TargetResolver>,
    store: Arc<LogStore>,
    upstream_timeout: Option<Duration>,
    client: HttpClient,
}

impl Forwarder {
    pub fn new(config: &ProxyConfig, store: Arc<LogStore>) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(hyper_util::rt::TokioExecutor::new())
            .http1_title_case_headers(true)
            .http1_preserve_header_case(true)
            .build(connector);

        Self {
            resolver: Arc::new(TargetResolver::new(config.default_target.clone())),
            store,
            upstream_timeout: config.upstream_timeout,
            client,
        }
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    /// Proxy one request. Errors are answered with 400 or 502 and recorded on
    /// the request's log entry.
    pub async fn handle(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let entry = self.store.create(RequestMetadata {
            client_ip: client_ip(&parts.headers, peer),
            method: parts.method.to_string(),
            url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| parts.uri.to_string()),
            headers: parts.headers.clone(),
        });

        match self.forward(parts, body, peer, &entry).await {
            Ok(response) => {
                entry.finish();
                response
            }
            Err(error) => {
                warn!(
                    entry_id = %entry.id(),
                    status = error.status_code().as_u16(),
                    error = %error,
                    "proxy request failed"
                );
                entry.set_error(error.to_string());
                entry.finish();
                error.into_response()
            }
        }
    }

    async fn forward(
        &self,
        parts: Parts,
        body: Body,
        peer: Option<SocketAddr>,
        entry: &EntryHandle,
    ) -> ProxyResult<Response<Body>> {
        let resolution = self.resolver.resolve(&parts.uri, &parts.headers)?;

        let body = body
            .collect()
            .await
            .map_err(|e| ProxyError::RequestBody(error_chain(&e)))?
            .to_bytes();
        entry.record_request_body(&body);

        let outgoing = build_upstream_request(parts, &resolution, body, peer)?;
        entry.set_target(resolution.target.as_str());
        debug!(
            entry_id = %entry.id(),
            upstream = %outgoing.uri(),
            "forwarding request"
        );

        let (mut response_parts, response_body) = self.exchange(outgoing).await?;
        entry.record_response(response_parts.status, &response_parts.headers, &response_body);

        remove_hop_by_hop(&mut response_parts.headers);
        Ok(Response::from_parts(response_parts, Body::from(response_body)))
    }

    /// Send the request and read the whole response body, under the
    /// configured timeout
    async fn exchange(&self, request: Request<Body>) -> ProxyResult<(http::response::Parts, Bytes)> {
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| ProxyError::Upstream(error_chain(&e)))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| ProxyError::ResponseBody(error_chain(&e)))?
                .to_bytes();
            Ok::<_, ProxyError>((parts, body))
        };

        match self.upstream_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ProxyError::UpstreamTimeout(limit))?,
            None => exchange.await,
        }
    }
}

/// Rewrite the inbound request for the resolved upstream
fn build_upstream_request(
    parts: Parts,
    resolution: &Resolution,
    body: Bytes,
    peer: Option<SocketAddr>,
) -> ProxyResult<Request<Body>> {
    let uri = resolution.upstream_uri(parts.uri.path())?;

    let mut headers = parts.headers;
    headers.remove(X_PROXY_TARGET);
    remove_hop_by_hop(&mut headers);
    append_forwarded_for(&mut headers, peer);
    let host = HeaderValue::from_str(&resolution.target.host_header())
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
    headers.insert(HOST, host);

    let mut request = Request::builder().method(parts.method).uri(uri).body(Body::from(body))?;
    *request.headers_mut() = headers;
    Ok(request)
}
