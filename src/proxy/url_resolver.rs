//! Target URL resolution and path handling for proxy requests
//!
//! A request names its upstream in one of four ways, checked in order:
//!
//! 1. the `X-Proxy-Target` header,
//! 2. the `target` query parameter (removed before forwarding),
//! 3. a `/proxy/<percent-encoded URL>` path,
//! 4. the configured default target.
//!
//! Header, query and default targets are treated as a base onto which the
//! inbound path and query are appended. A path-embedded target is the
//! complete upstream URL and replaces the inbound path.

use crate::proxy::headers::{PROXY_PATH_PREFIX, TARGET_QUERY_PARAM, X_PROXY_TARGET};
use crate::proxy::types::*;
use hyper::http::uri::{Authority, PathAndQuery, Scheme};
use hyper::{HeaderMap, Uri};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A resolved upstream origin with optional base path and query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    raw: String,
    scheme: Scheme,
    authority: Authority,
    path: String,
    query: Option<String>,
}

impl Target {
    /// Parse an absolute URL, requiring both a scheme and a host
    pub fn parse(value: &str) -> ProxyResult<Self> {
        let uri: Uri = value
            .parse()
            .map_err(|e| ProxyError::InvalidTarget(format!("{value:?}: {e}")))?;

        let parts = uri.into_parts();
        let (Some(scheme), Some(authority)) = (parts.scheme, parts.authority) else {
            return Err(ProxyError::IncompleteTarget);
        };
        if authority.host().is_empty() {
            return Err(ProxyError::IncompleteTarget);
        }

        let (path, query) = match parts.path_and_query {
            Some(pq) => (
                pq.path().to_string(),
                pq.query().filter(|q| !q.is_empty()).map(str::to_string),
            ),
            None => (String::new(), None),
        };

        Ok(Self {
            raw: value.to_string(),
            scheme,
            authority,
            path,
            query,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Full authority, including any userinfo
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Host and optional port without userinfo, as sent in the outbound
    /// `Host` header
    pub fn host_header(&self) -> String {
        let host = self.authority.host();
        match self.authority.port() {
            Some(port) => format!("{host}:{}", port.as_str()),
            None => host.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl FromStr for Target {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Outcome of resolving one inbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub target: Target,
    /// Whether the inbound path and query are appended to the target's base
    pub uses_request_path: bool,
    /// Inbound query to forward, with the target parameter stripped if it
    /// was the resolution source
    pub forward_query: Option<String>,
}

impl Resolution {
    /// Build the absolute URI of the upstream request
    pub fn upstream_uri(&self, inbound_path: &str) -> ProxyResult<Uri> {
        let target = &self.target;
        let (path, query) = if self.uses_request_path {
            (
                join_url_path(target.path(), inbound_path),
                merge_query(target.query(), self.forward_query.as_deref()),
            )
        } else {
            (
                target.path().to_string(),
                target
                    .query()
                    .map(str::to_string)
                    .or_else(|| self.forward_query.clone()),
            )
        };

        let path = if path.is_empty() { "/".to_string() } else { path };
        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        let path_and_query = PathAndQuery::from_maybe_shared(path_and_query)
            .map_err(|e| ProxyError::UpstreamRequest(e.into()))?;

        Ok(Uri::builder()
            .scheme(target.scheme().clone())
            .authority(target.authority().clone())
            .path_and_query(path_and_query)
            .build()?)
    }
}

/// Strategy for resolving the upstream of each request
#[derive(Clone, Debug, Default)]
pub struct TargetResolver {
    default_target: Option<Target>,
}

impl TargetResolver {
    pub fn new(default_target: Option<Target>) -> Self {
        Self { default_target }
    }

    pub fn default_target(&self) -> Option<&Target> {
        self.default_target.as_ref()
    }

    /// Resolve the upstream for a request; first matching signal wins
    pub fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> ProxyResult<Resolution> {
        let inbound_query = uri.query().filter(|q| !q.is_empty()).map(str::to_string);

        if let Some(value) = headers.get(X_PROXY_TARGET) {
            let value = value
                .to_str()
                .map_err(|e| ProxyError::InvalidTarget(format!("{X_PROXY_TARGET} header: {e}")))?;
            if !value.is_empty() {
                return Ok(Resolution {
                    target: Target::parse(value)?,
                    uses_request_path: true,
                    forward_query: inbound_query,
                });
            }
        }

        if let Some(query) = inbound_query.as_deref() {
            if let Some((value, remaining)) = take_target_param(query) {
                return Ok(Resolution {
                    target: Target::parse(&value)?,
                    uses_request_path: true,
                    forward_query: remaining,
                });
            }
        }

        if let Some(encoded) = uri.path().strip_prefix(PROXY_PATH_PREFIX) {
            let decoded = percent_decode_path(encoded)?;
            return Ok(Resolution {
                target: Target::parse(&decoded)?,
                uses_request_path: false,
                forward_query: inbound_query,
            });
        }

        match &self.default_target {
            Some(target) => Ok(Resolution {
                target: target.clone(),
                uses_request_path: true,
                forward_query: inbound_query,
            }),
            None => Err(ProxyError::NoTarget),
        }
    }
}

/// Find the first `target` parameter; if its value is non-empty, return it
/// with the query rebuilt from every other parameter in original order.
fn take_target_param(query: &str) -> Option<(String, Option<String>)> {
    let value = query
        .split('&')
        .find_map(|pair| match split_pair(pair) {
            (key, value) if key == TARGET_QUERY_PARAM => Some(value),
            _ => None,
        })
        .filter(|value| !value.is_empty())?;

    let remaining = query
        .split('&')
        .filter(|pair| !pair.is_empty() && split_pair(pair).0 != TARGET_QUERY_PARAM)
        .collect::<Vec<_>>()
        .join("&");

    Some((value, Some(remaining).filter(|q| !q.is_empty())))
}

fn split_pair(pair: &str) -> (String, String) {
    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
    (form_decode(key), form_decode(value))
}

fn form_decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .unwrap_or(spaced)
}

/// Percent-decode a path segment, rejecting malformed escapes
fn percent_decode_path(encoded: &str) -> ProxyResult<String> {
    let bytes = encoded.as_bytes();
    for (i, _) in encoded.match_indices('%') {
        let escape = bytes.get(i + 1..i + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            let end = (i + 3).min(encoded.len());
            let shown = String::from_utf8_lossy(&bytes[i..end]);
            return Err(ProxyError::InvalidProxyPath(format!(
                "invalid URL escape {shown:?}"
            )));
        }
    }

    urlencoding::decode(encoded)
        .map(Cow::into_owned)
        .map_err(|e| ProxyError::InvalidProxyPath(e.to_string()))
}

/// Join two path fragments with exactly one `/` at the seam
pub fn join_url_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Prepend the target's base query to the inbound query
pub fn merge_query(base: Option<&str>, inbound: Option<&str>) -> Option<String> {
    let base = base.filter(|q| !q.is_empty());
    let inbound = inbound.filter(|q| !q.is_empty());
    match (base, inbound) {
        (Some(base), Some(inbound)) => Some(format!("{base}&{inbound}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}
