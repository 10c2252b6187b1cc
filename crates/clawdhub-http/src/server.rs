//! HTTP server implementation - REST facade over the registry engine.

use anyhow::Result;
use clawdhub_registry::Registry;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ratelimit::RateLimiter;
use crate::routes::create_app;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS for browser clients
    pub enable_cors: bool,
    /// Enable request tracing
    pub enable_tracing: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Server start time for uptime tracking
    pub started_at: Instant,
    /// The registry engine
    pub registry: Arc<Registry>,
    /// Process-local request budgets
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            started_at: Instant::now(),
            registry,
            limiter: RateLimiter::new(),
        }
    }
}

/// HTTP server that exposes the registry via REST
pub struct HttpServer {
    config: HttpServerConfig,
    registry: Arc<Registry>,
}

impl HttpServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            config: HttpServerConfig::default(),
            registry,
        }
    }

    pub fn with_config(config: HttpServerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Run the HTTP server until the process exits.
    pub async fn run(&self) -> Result<()> {
        let state = Arc::new(AppState::new(self.registry.clone()));
        let mut app = create_app(state);

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }

        if self.config.enable_tracing {
            app = app.layer(TraceLayer::new_for_http());
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(
            address = %addr,
            cors = self.config.enable_cors,
            tracing = self.config.enable_tracing,
            "HTTP server starting"
        );
        println!("ClawdHub registry API listening on http://{}", addr);
        println!("  API endpoints: http://{}/api/v1/...", addr);
        println!("  Health check:  http://{}/api/v1/health", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
