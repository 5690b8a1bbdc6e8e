//! Application wiring
//!
//! Settings, tracing and the HTTP server that hosts the proxy.

pub mod app;
pub mod telemetry;

pub use app::Application;
