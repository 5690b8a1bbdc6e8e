use crate::config::Settings;
use crate::proxy::{LogStore, ProxyService};
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    listener: TcpListener,
    service: ProxyService,
}

impl Application {
    /// Load settings from files and environment and bind the listener
    pub async fn new() -> Result<Self> {
        Self::from_settings(Settings::new()?).await
    }

    #[instrument(skip(settings), fields(host = %settings.application.host, port = settings.application.port))]
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let proxy_config = settings.proxy_config()?;
        let listener = TcpListener::bind(settings.listen_addr()?).await?;

        info!(
            default_target = proxy_config
                .default_target
                .as_ref()
                .map(|t| t.as_str())
                .unwrap_or("<none>"),
            log_limit = %proxy_config.log_limit,
            upstream_timeout_ms = proxy_config
                .upstream_timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0),
            "Proxy configured"
        );

        Ok(Self {
            settings,
            listener,
            service: ProxyService::new(proxy_config),
        })
    }

    /// Address actually bound, useful when the configured port is 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn log_store(&self) -> Arc<LogStore> {
        self.service.log_store()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Serve until ctrl-c
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, environment = %self.settings.application.environment, "Starting Peephole proxy");

        let router = self.service.into_router();
        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("Proxy stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
