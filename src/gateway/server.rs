//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, cors_layer, create_router};
use crate::auth::TokenVerifier;
use crate::completion::{CompletionBackend, OpenAiClient};
use crate::config::Config;
use crate::{Error, Result};

/// Chat gateway server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Assembled router
    router: Router,
}

impl Gateway {
    /// Create a gateway talking to the configured completion API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required value is missing or invalid.
    /// The process should not serve traffic in that case.
    pub fn new(config: Config) -> Result<Self> {
        config.validate_server()?;
        let completion = Arc::new(OpenAiClient::from_config(&config.completion)?);
        Self::with_backend(config, completion)
    }

    /// Create a gateway with an explicit completion backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the auth or CORS configuration is invalid.
    pub fn with_backend(config: Config, completion: Arc<dyn CompletionBackend>) -> Result<Self> {
        let verifier = TokenVerifier::from_config(&config)?;
        let cors = cors_layer(&config.cors)?;
        let state = Arc::new(AppState {
            verifier: Arc::new(verifier),
            completion,
        });
        let router = create_router(state, cors, config.server.max_body_size);

        Ok(Self { config, router })
    }

    /// The assembled router (for embedding or tests)
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until a shutdown signal.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until a shutdown signal.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;

        info!("============================================================");
        info!("CHAT AUTH GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(addr = %local, "Listening");
        info!(
            audience = %self.config.auth.audience,
            issuer = ?self.config.expected_issuer(),
            leeway_secs = self.config.auth.leeway_secs,
            "Token verification (HS256)"
        );
        info!(
            model = %self.config.completion.model,
            base_url = %self.config.completion.base_url,
            timeout = ?self.config.completion.timeout,
            "Completion API"
        );
        info!(origins = ?self.config.cors.allowed_origins, "CORS allowed origins");
        info!("  GET  http://{local}/health");
        info!("  POST http://{local}/chat  (Bearer token required)");
        info!("============================================================");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
