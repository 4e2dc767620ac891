//! Chatbot Backend
//!
//! A REST API server for a web chat application. Relays user messages to an
//! upstream completion provider while persisting conversation history.

mod api;
mod auth;
mod chat;
mod config;
mod error;
mod provider;
mod relay;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use config::Config;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use auth::{HttpIdentityProvider, IdentityProvider};
use chat::ChatDb;
use provider::OpenRouterClient;
use relay::{RelayConfig, RelayService};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    // Open the conversation store
    let chat_db = Arc::new(ChatDb::new(&config.persistence.db_path).await?);

    // One shared HTTP client for identity and completion calls
    let http_client = reqwest::Client::new();

    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
        http_client.clone(),
        config.auth.base_url.clone(),
    ));

    let completion_provider = Arc::new(OpenRouterClient::new(
        http_client,
        config.upstream.base_url.clone(),
        config.upstream.api_key.clone(),
    ));

    let relay_service = Arc::new(RelayService::new(
        identity.clone(),
        chat_db.clone(),
        completion_provider,
        RelayConfig {
            public_model: config.upstream.public_model.clone(),
            private_model: config.upstream.private_model.clone(),
        },
    ));

    let state: api::RouterState = (identity, chat_db, relay_service);

    // Build our application with routes
    let app = Router::new()
        // Health check
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        // Message relay
        .route("/api/chat", post(api::chat::chat))
        // Conversation management API
        .route(
            "/api/conversations",
            get(api::conversations::list_conversations)
                .post(api::conversations::create_conversation),
        )
        .route(
            "/api/conversations/:id",
            get(api::conversations::get_conversation)
                .delete(api::conversations::delete_conversation),
        )
        .route(
            "/api/conversations/:id/title",
            put(api::conversations::update_conversation_title),
        )
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive()) // Browser UI calls from another origin
        .with_state(state);

    // Bind to address from config
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Setup graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
