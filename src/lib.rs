//! Peephole - an intercepting HTTP reverse proxy
//!
//! Every request is forwarded to an upstream chosen per request and the full
//! transaction is kept in a bounded in-memory log, browsable over a small
//! JSON API.

pub mod application;
pub mod config;
pub mod error;
pub mod proxy;

pub use application::Application;
pub use error::{Error, Result};
