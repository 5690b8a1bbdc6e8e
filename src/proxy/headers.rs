//! HTTP header constants and utilities for the proxy service
//!
//! This module centralizes the header names, query keys and paths that
//! steer proxying, plus the header transforms applied on the way through.

use ::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Header naming the upstream a request should be forwarded to
pub const X_PROXY_TARGET: &str = "x-proxy-target";

/// Query parameter naming the upstream a request should be forwarded to
pub const TARGET_QUERY_PARAM: &str = "target";

/// Path prefix carrying a percent-encoded absolute target URL
pub const PROXY_PATH_PREFIX: &str = "/proxy/";

/// Client address headers set by load balancers in front of the proxy
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Standard header re-exports for convenience
pub use header::{CONTENT_ENCODING, CONTENT_TYPE, HOST};

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Well-known paths served by the proxy itself
pub mod paths {
    /// Liveness probe
    pub const HEALTH: &str = "/healthz";

    /// Transaction list
    pub const LOGS: &str = "/api/logs";

    /// Single transaction by id
    pub const LOG_BY_ID: &str = "/api/logs/{id}";
}

/// Common content types
pub mod content_types {
    pub const JSON: &str = "application/json";
    pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
}

/// Flatten headers into a `Name -> "v1, v2"` map with canonical name casing.
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (canonical_header_name(name.as_str()), values)
        })
        .collect()
}

/// `content-type` -> `Content-Type`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append the peer address to `X-Forwarded-For`, preserving earlier hops.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: Option<SocketAddr>) {
    let Some(peer) = peer else {
        return;
    };

    let prior = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");
    let value = if prior.is_empty() {
        peer.ip().to_string()
    } else {
        format!("{prior}, {}", peer.ip())
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Address of the original client: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    if let Some(forwarded) = header_value(X_FORWARDED_FOR) {
        return forwarded
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
    }
    if let Some(real_ip) = header_value(X_REAL_IP) {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}
