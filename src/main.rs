//! ChatGuard Cloud Server
//!
//! Moderation and audit backend for the campus chatbot. Every incoming
//! query runs through the guardrail pipeline (validator agents, then the
//! answer agent) and is appended to the query log; the admin surface exposes
//! log browsing/export, weekly metrics, curation of training examples, and
//! agent/model/message configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      CHATGUARD CLOUD                       │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │  API      │  │  Guardrail   │  │  Model Provider     │  │
//! │  │  Gateway  │  │  Pipeline    │  │  Client (HTTP)      │  │
//! │  │  (Axum)   │  │  (validators)│  │                     │  │
//! │  └─────┬─────┘  └──────┬───────┘  └──────────┬──────────┘  │
//! │        └───────────────┼─────────────────────┘             │
//! │                        ▼                                   │
//! │                 ┌─────────────┐                            │
//! │                 │ PostgreSQL  │                            │
//! │                 └─────────────┘                            │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod pipeline;
mod time;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatguard_cloud=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("ChatGuard Cloud Server starting...");
    tracing::info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Build application state
    let model = Arc::new(pipeline::openai::OpenAiClient::new(&config));
    let state = AppState {
        pool,
        config: config.clone(),
        model,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub model: Arc<dyn pipeline::ModelClient>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/ask", post(handlers::ask::ask));

    // Admin routes (shared bearer token when configured)
    let admin_routes = Router::new()
        // Query logs
        .route("/query-logs", get(handlers::query_logs::list))
        .route("/query-logs/export/csv", get(handlers::export::csv))
        .route("/query-logs/:id", get(handlers::query_logs::get))
        .route("/query-logs/:id/blacklist", post(handlers::query_logs::add_blacklist))
        .route("/query-logs/:id/blacklist", delete(handlers::query_logs::remove_blacklist))
        .route("/query-logs/:id/whitelist", post(handlers::query_logs::add_whitelist))
        .route("/query-logs/:id/whitelist", delete(handlers::query_logs::remove_whitelist))

        // Metrics
        .route("/metrics/weekly", get(handlers::metrics::weekly))

        // Curation
        .route("/training-examples", get(handlers::training::get))
        .route("/training-examples", put(handlers::training::put))

        // Agents
        .route("/agents", get(handlers::agents::list))
        .route("/agents", post(handlers::agents::create))
        .route("/agents/:agent_key", get(handlers::agents::get))
        .route("/agents/:agent_key", put(handlers::agents::update))
        .route("/agents/:agent_key", delete(handlers::agents::delete))

        // Model catalogue
        .route("/models", get(handlers::models::list))
        .route("/models", post(handlers::models::create))
        .route("/models/:model_id", put(handlers::models::update))
        .route("/models/:model_id", delete(handlers::models::delete))

        // Messages
        .route("/messages", get(handlers::messages::list))
        .route("/messages/:message_key", get(handlers::messages::get))
        .route("/messages/:message_key", put(handlers::messages::put))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin_auth,
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
