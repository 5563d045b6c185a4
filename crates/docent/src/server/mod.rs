//! HTTP surface
//!
//! Routes:
//! - `POST /chat` answers one question about the document
//! - `GET /source` returns the current document text and counts
//! - `GET /source/stats` returns the counts only
//! - `GET /health`

mod error;
pub mod handlers;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::chat::ChatService;
use crate::completion::{CompletionClient, CompletionProvider};
use crate::config::Config;
use crate::error::{DocentError, Result};
use crate::prompt::PromptBuilder;
use crate::ratelimit::RateLimiter;
use crate::source::ContentFetcher;

use handlers::{chat_handler, health_handler, source_handler, source_stats_handler};

/// Shared application state for all handlers
pub struct AppState {
    pub chat: ChatService,
    /// Peers allowed to name the client via forwarding headers
    pub trusted_proxies: Vec<IpAddr>,
}

impl AppState {
    /// Wire every component from one resolved configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let completion: Arc<dyn CompletionProvider> =
            Arc::new(CompletionClient::new(&config.completion)?);
        Self::with_provider(config, completion)
    }

    /// Same as [`AppState::from_config`] with a caller-supplied completion backend
    pub fn with_provider(config: &Config, completion: Arc<dyn CompletionProvider>) -> Result<Self> {
        let fetcher = Arc::new(ContentFetcher::new(&config.source)?);
        let chat = ChatService::new(
            RateLimiter::in_memory(&config.rate_limit),
            fetcher,
            PromptBuilder::new(&config.prompt),
            completion,
        );
        Ok(Self {
            chat,
            trusted_proxies: config.server.trusted_proxies.clone(),
        })
    }
}

/// The main HTTP server
pub struct DocentServer {
    config: Config,
}

impl DocentServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the server and listen until Ctrl+C / SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState::from_config(&self.config)?);
        let app = create_router(
            state,
            Duration::from_secs(self.config.server.request_timeout_secs),
        );

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| DocentError::Config(format!("Invalid listen address: {e}")))?;

        if self.config.completion.api_key.is_none() {
            tracing::warn!(
                "{} is not set; /chat will fail until it is configured",
                self.config.completion.api_key_env
            );
        }
        if !self.config.server.trusted_proxies.is_empty() {
            tracing::info!(
                "Trusting forwarding headers from {:?}",
                self.config.server.trusted_proxies
            );
        }
        tracing::info!("Document source: {}", self.config.source.primary_url);
        if let Some(ref backup) = self.config.source.backup_url {
            tracing::info!("Backup source: {backup}");
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DocentError::Server(format!("Failed to bind to {addr}: {e}")))?;
        tracing::info!("Listening on {addr}");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DocentError::Server(format!("Server error: {e}")))?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes and middleware configured
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/source", get(source_handler))
        .route("/source/stats", get(source_stats_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.source.primary_url = "http://127.0.0.1:9/policy".to_string();
        config.source.backup_url = None;
        config.source.max_retries = 0;
        config
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = Arc::new(AppState::from_config(&offline_config()).unwrap());
        let app = create_router(state, Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body_str.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let state = Arc::new(AppState::from_config(&offline_config()).unwrap());
        let app = create_router(state, Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/chat")
                    .header("origin", "https://example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let state = Arc::new(AppState::from_config(&offline_config()).unwrap());
        let app = create_router(state, Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
