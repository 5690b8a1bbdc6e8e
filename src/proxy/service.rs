//! Main proxy service implementation
//!
//! The `ProxyService` ties the forwarder and the log store to an axum router.
//!
//! ## Service Lifecycle
//!
//! ```rust,ignore
//! use peephole::proxy::{ProxyConfig, ProxyService};
//!
//! let service = ProxyService::new(ProxyConfig::default());
//! let router = service.into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! ```
//!
//! ## Routes
//!
//! - `/healthz`: liveness, any method
//! - `GET /api/logs`, `GET /api/logs/{id}`: transaction log
//! - anything else: proxied

use crate::proxy::{api, forwarder::Forwarder, headers::paths, log_store::LogStore, middleware, types::*};
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::from_fn,
    response::Response,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Main proxy service combining forwarding and the transaction log
#[derive(Clone)]
pub struct ProxyService {
    forwarder: Forwarder,
    store: Arc<LogStore>,
}

impl ProxyService {
    /// Create a new proxy service
    pub fn new(config: ProxyConfig) -> Self {
        let store = Arc::new(LogStore::new(config.log_limit));
        let forwarder = Forwarder::new(&config, Arc::clone(&store));
        Self { forwarder, store }
    }

    /// Get a reference to the transaction log
    pub fn log_store(&self) -> Arc<LogStore> {
        Arc::clone(&self.store)
    }

    /// Create an Axum router for the proxy service with middleware
    pub fn into_router(self) -> Router {
        let api_routes = Router::new()
            .route(paths::LOGS, get(api::list_logs))
            .route(paths::LOG_BY_ID, get(api::get_log))
            .with_state(Arc::clone(&self.store));

        Router::new()
            .route(paths::HEALTH, any(api::health))
            .fallback(proxy_handler)
            .with_state(Arc::new(self.forwarder))
            .merge(api_routes)
            .layer(from_fn(middleware::logging_middleware))
    }
}

/// Axum handler for proxying requests
async fn proxy_handler(State(forwarder): State<Arc<Forwarder>>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    forwarder.handle(request, peer).await
}
