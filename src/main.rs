//! Creator Growth binary entry point

use creator_growth::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Start background tasks (token refresh)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides the configured level
    let default_filter = format!("creator_growth={},tower_http=debug", config.logging.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Creator Growth...");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        frontend_url = %config.server.frontend_url,
        "Configuration loaded"
    );
    if !config.has_provider_credentials() {
        tracing::warn!("Provider credentials are not configured; connecting accounts will fail");
    }

    // 3. Initialize metrics
    creator_growth::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Start background tasks
    if config.jobs.token_refresh.enabled {
        let _refresh_task = state.token_refresh.clone().spawn();
    } else {
        tracing::info!("Token refresh scheduler disabled");
    }

    // 6. Start HTTP server
    let app = creator_growth::build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
