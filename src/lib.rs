//! Creator Growth - engagement analytics for connected Instagram accounts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Connect / callback / disconnect                          │
//! │  - Posts and growth statistics                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Account connection flow                                  │
//! │  - Media ingestion queue                                    │
//! │  - Token refresh scheduler                                  │
//! │  - Growth statistics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                           │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │         Data Layer           │ │        Provider            │
//! │  - SQLite (sqlx)             │ │  - Instagram Graph API     │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `provider`: Provider OAuth and graph client
//! - `data`: Database layer
//! - `auth`: Signed session and OAuth state tokens
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Built once at startup. Every long-lived service lives here and is handed
/// to handlers and background tasks explicitly.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Account connection flow
    pub accounts: Arc<service::AccountService>,

    /// Growth statistics
    pub growth: Arc<service::GrowthService>,

    /// Background media ingestion
    pub ingestion: service::IngestionQueue,

    /// Token refresh scheduler (spawned separately)
    pub token_refresh: Arc<service::TokenRefreshScheduler>,
}

impl AppState {
    /// Initialize application state with the live provider client
    ///
    /// # Errors
    /// Returns error if the database or HTTP client cannot be initialized
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let provider = provider::InstagramClient::new(config.provider.clone())?;
        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Initialize application state around a given provider client
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Start the ingestion queue
    /// 3. Build services
    pub async fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn provider::ProviderClient>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let config = Arc::new(config);

        // 2. Start the ingestion queue
        let ingestion = Arc::new(service::MediaIngestion::new(
            db.clone(),
            provider.clone(),
            config.jobs.ingestion.media_fetch_limit,
        ));
        let ingestion = service::IngestionQueue::start(ingestion, config.jobs.ingestion.max_concurrent);

        // 3. Build services
        let accounts = Arc::new(service::AccountService::new(
            db.clone(),
            provider.clone(),
            config.clone(),
            ingestion.clone(),
        ));
        let growth = Arc::new(service::GrowthService::new(db.clone()));
        let token_refresh = Arc::new(service::TokenRefreshScheduler::new(
            db.clone(),
            provider,
            config.jobs.token_refresh.clone(),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config,
            db,
            accounts,
            growth,
            ingestion,
            token_refresh,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::callback_router())
        .nest("/api/instagram", api::instagram_router())
        .nest("/api/growth", api::growth_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

/// Allow the configured frontend origin only
fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let origin = server.frontend_url.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(origin) => base.allow_origin(origin),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %server.frontend_url,
                "Failed to parse CORS origin from frontend URL; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
