//! Proxy module: forwarding and traffic capture
//!
//! - Target resolution: which upstream each request goes to
//! - Forwarder: relays the request and records the transaction
//! - Log store: bounded, concurrent transaction log
//! - Body normalization: bounded, displayable body text

pub mod api;
pub mod body;
pub mod error_response;
pub mod forwarder;
pub mod headers;
pub mod log_store;
pub mod middleware;
pub mod service;
pub mod sniff;
pub mod types;
pub mod url_resolver;

#[cfg(test)]
mod test_utils;


pub use log_store::{LogEntryView, LogStore};
pub use service::ProxyService;
pub use types::{ProxyConfig, ProxyError, ProxyResult};
pub use url_resolver::{Target, TargetResolver};
