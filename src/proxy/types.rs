//! Type definitions for the proxy module

use crate::proxy::url_resolver::Target;
use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

// ========== Identity and Capacity Types ==========

/// Identifier of a recorded transaction, assigned in creation order starting at 1
#[nutype(derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    From,
    AsRef
))]
pub struct LogEntryId(u64);

/// Maximum number of transactions retained by the log store
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, Default, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |limit: &usize| *limit > 0),
    default = 1000,
)]
pub struct LogLimit(usize);

impl LogLimit {
    /// Build a limit from a configured value, falling back to
    /// [`DEFAULT_LOG_LIMIT`] when the value is zero or negative.
    pub fn from_configured(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|limit| Self::try_new(limit).ok())
            .unwrap_or_default()
    }
}

// ========== Constants ==========

/// Number of transactions retained when no positive limit is configured
pub const DEFAULT_LOG_LIMIT: usize = 1000;

/// Default bound on a single upstream exchange
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Upstream used when a request carries no target of its own
    pub default_target: Option<Target>,
    /// Capacity of the transaction log
    pub log_limit: LogLimit,
    /// Bound on sending the upstream request and reading its response;
    /// `None` leaves the wait to the transport
    pub upstream_timeout: Option<Duration>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            default_target: None,
            log_limit: LogLimit::default(),
            upstream_timeout: Some(DEFAULT_UPSTREAM_TIMEOUT),
        }
    }
}

/// Errors that can occur while proxying a single request
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("no target specified")]
    NoTarget,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("target must include scheme and host")]
    IncompleteTarget,

    #[error("invalid proxy path: {0}")]
    InvalidProxyPath(String),

    #[error("read request body: {0}")]
    RequestBody(String),

    #[error("invalid upstream request: {0}")]
    UpstreamRequest(#[from] http::Error),

    #[error("{0}")]
    Upstream(String),

    #[error("upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("read response body: {0}")]
    ResponseBody(String),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Render an error together with its chain of sources, e.g.
/// `client error (Connect): tcp connect error: Connection refused`.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_limit_falls_back_for_non_positive_values() {
        assert_eq!(*LogLimit::from_configured(0).as_ref(), DEFAULT_LOG_LIMIT);
        assert_eq!(*LogLimit::from_configured(-5).as_ref(), DEFAULT_LOG_LIMIT);
        assert_eq!(*LogLimit::from_configured(25).as_ref(), 25);
    }

    #[test]
    fn test_log_limit_rejects_zero() {
        assert!(LogLimit::try_new(0).is_err());
        assert!(LogLimit::try_new(1).is_ok());
    }

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert!(config.default_target.is_none());
        assert_eq!(*config.log_limit.as_ref(), 1000);
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ProxyError::NoTarget.to_string(), "no target specified");
        assert_eq!(
            ProxyError::IncompleteTarget.to_string(),
            "target must include scheme and host"
        );
        assert_eq!(
            ProxyError::RequestBody("boom".to_string()).to_string(),
            "read request body: boom"
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        #[derive(Debug, Error)]
        #[error("connect failed")]
        struct Wrapper(#[source] std::io::Error);

        let wrapped = Wrapper(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(error_chain(&wrapped), "connect failed: refused");
    }
}
