//! HTTP surface for routing, execution and fleet reporting

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod events;
mod health;
mod metrics;
mod request_context;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use pathway_config::Config;
use pathway_llm::{Orchestrator, ProviderSet, ResponseCache};
use pathway_routing::RouterState;
use pathway_routing::sweep;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use request_context::{CLIENT_ID_HEADER, PROVIDER_KEY_HEADER, REQUEST_ID_HEADER};
pub use routes::AppState;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    state: Arc<RouterState>,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Must run inside a Tokio runtime when the health sweep is enabled;
    /// the sweep stops when `shutdown` is cancelled.
    pub fn new(config: &Config, shutdown: &CancellationToken) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let state = Arc::new(RouterState::from_config(config));
        let providers = ProviderSet::from_config(&config.providers);
        let cache = config
            .cache
            .as_ref()
            .filter(|c| c.enabled)
            .map(ResponseCache::new);

        tracing::info!(
            models = state.registry().profiles().len(),
            providers = providers.len(),
            cache = cache.is_some(),
            "router state initialized"
        );

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&state),
            providers,
            cache,
            config.execution.clone(),
        ));

        let summary = config
            .sweep
            .enabled
            .then(|| sweep::spawn(Arc::clone(&state), config.sweep.interval, shutdown.clone()));

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(routes::api_router(AppState::new(orchestrator, summary)));

        // Request context (innermost, runs just before handlers)
        app = app.layer(axum::middleware::from_fn(request_context::request_context_middleware));

        let histogram = metrics::request_duration_histogram();
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let histogram = histogram.clone();
            async move { metrics::http_metrics_middleware(histogram, req, next).await }
        }));

        app = app.layer(TraceLayer::new_for_http());

        Self {
            router: app,
            listen_address,
            state,
        }
    }

    /// Get the configured listen address
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared router state behind the handlers
    pub const fn state(&self) -> &Arc<RouterState> {
        &self.state
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
