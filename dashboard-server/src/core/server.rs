//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::net::SocketAddr;

use crate::api;
use crate::core::{Config, Result, ServerError, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 启动后台任务与 HTTP 服务，直到收到关闭信号
    pub async fn run(&self) -> Result<()> {
        let state = ServerState::initialize(&self.config)?;

        let tasks = state.start_background_tasks();
        let app = api::build_app(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(
            %addr,
            sites = self.config.sites.len(),
            timezone = %self.config.timezone,
            environment = %self.config.environment,
            "Dashboard server listening"
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        tasks.shutdown().await;
        served.map_err(ServerError::Serve)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Graceful shutdown handler
///
/// Listens for SIGTERM and Ctrl+C signals
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
