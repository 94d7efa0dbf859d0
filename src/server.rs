//! A small serving wrapper around [`axum::serve`] with graceful shutdown.

use {
    crate::{HttpConfig, Result, Router},
    axum::ServiceExt as _,
    tokio::{net::TcpListener, signal},
    tokio_util::sync::CancellationToken,
};

/// Serves a [`Router`] until SIGINT, SIGTERM or cancellation of its token.
///
/// Once shutdown starts, in-flight requests get `shutdown_timeout` to finish
/// before the server stops regardless.
///
/// ```rust,no_run
/// use switchyard::{Config, MatchitEngine, Request, Router, Server};
///
/// # async fn example() -> switchyard::Result<()> {
/// let config = Config::default();
/// config.setup_tracing();
///
/// let router = Router::with_config(MatchitEngine::new(), &config.routing);
/// router.get("/", |_req: Request| async { "Hello, World!" }, []);
///
/// Server::new(router, config.http).start().await
/// # }
/// ```
pub struct Server {
    router: Router,
    config: HttpConfig,
    token: CancellationToken,
}

impl Server {
    pub fn new(router: Router, config: HttpConfig) -> Self {
        Self {
            router,
            config,
            token: CancellationToken::new(),
        }
    }

    /// A token that stops the server when cancelled. It is also cancelled
    /// when a shutdown signal arrives.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Binds `bind_addr:bind_port` and serves until shutdown.
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.full_bind_addr();
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Bound to {}", &bind_addr);
        self.serve(listener).await
    }

    /// Serves on an already bound listener until shutdown.
    ///
    /// The route table is finalized first, so registration errors surface
    /// here instead of on the first request.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.router.finalize()?;
        tracing::info!(engine = self.router.engine_name(), "Waiting for connections");

        let token = self.token.clone();
        let shutdown_timeout = self.config.shutdown_timeout;
        let serve_future = axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal(token.clone()))
            .into_future();

        // The grace period only starts once shutdown has been requested.
        tokio::select! {
            result = serve_future => {
                result?;
                tracing::info!("Graceful shutdown completed");
            }
            _ = async {
                token.cancelled().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            }
        }

        Ok(())
    }
}

/// Resolves on Ctrl+C, SIGTERM or cancellation of `token`, cancelling the
/// token in every case.
///
/// If a signal handler cannot be installed the failure is logged and that
/// signal is ignored.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => tracing::debug!("Cancellation token triggered"),
    }

    tracing::info!("Shutdown requested, draining in-flight requests");
    token.cancel();
}
