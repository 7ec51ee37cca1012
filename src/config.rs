//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub provider: ProviderConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Frontend origin the OAuth callback redirects back to
    pub frontend_url: String,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Signed token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session and OAuth state tokens (32+ bytes)
    pub session_secret: String,
    /// Session lifetime in seconds (default: 86400 = 24h)
    pub session_max_age: i64,
    /// OAuth state token lifetime in seconds (default: 600 = 10 minutes)
    pub state_token_ttl: i64,
}

/// Social provider (OAuth client) configuration
///
/// Credentials are optional at load time. Operations that need them fail
/// with a configuration error instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    /// Authorization dialog the user is sent to
    pub authorize_url: String,
    /// Host of the authorization-code exchange endpoint
    pub api_base_url: String,
    /// Host of the graph endpoints (long-lived exchange, refresh, profile, media)
    pub graph_base_url: String,
    /// Comma-separated OAuth scopes
    pub scopes: String,
    /// Timeout for token and profile calls
    pub request_timeout_seconds: u64,
    /// Timeout for media listing calls
    pub media_timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn client_id(&self) -> Result<&str, AppError> {
        required(self.client_id.as_deref(), "provider.client_id")
    }

    pub fn client_secret(&self) -> Result<&str, AppError> {
        required(self.client_secret.as_deref(), "provider.client_secret")
    }

    pub fn redirect_uri(&self) -> Result<&str, AppError> {
        required(self.redirect_uri.as_deref(), "provider.redirect_uri")
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} is not set")))
}

/// Background job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub token_refresh: TokenRefreshConfig,
    pub ingestion: IngestionConfig,
}

/// Token refresh scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshConfig {
    /// Spawn the scheduler at startup
    pub enabled: bool,
    /// Grace period before the first scan (default: 30)
    pub startup_delay_seconds: u64,
    /// Scan interval (default: 43200 = 12h)
    pub interval_seconds: u64,
    /// Tokens expiring within this many days are refreshed (default: 7)
    pub refresh_window_days: i64,
}

/// Media ingestion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Media items requested per fetch (default: 50)
    pub media_fetch_limit: u32,
    /// Concurrent background ingestion jobs (default: 4)
    pub max_concurrent: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CREATOR_GROWTH__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.frontend_url", "http://localhost:5173")?
            .set_default("database.path", "data/creator-growth.db")?
            .set_default("auth.session_max_age", 86400)?
            .set_default("auth.state_token_ttl", 600)?
            .set_default(
                "provider.authorize_url",
                "https://www.facebook.com/v18.0/dialog/oauth",
            )?
            .set_default("provider.api_base_url", "https://api.instagram.com")?
            .set_default("provider.graph_base_url", "https://graph.instagram.com")?
            .set_default(
                "provider.scopes",
                "instagram_basic,pages_show_list,pages_read_engagement,business_management",
            )?
            .set_default("provider.request_timeout_seconds", 15)?
            .set_default("provider.media_timeout_seconds", 20)?
            .set_default("jobs.token_refresh.enabled", true)?
            .set_default("jobs.token_refresh.startup_delay_seconds", 30)?
            .set_default("jobs.token_refresh.interval_seconds", 43200)?
            .set_default("jobs.token_refresh.refresh_window_days", 7)?
            .set_default("jobs.ingestion.media_fetch_limit", 50)?
            .set_default("jobs.ingestion.max_concurrent", 4)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (CREATOR_GROWTH__*)
            .add_source(
                Environment::with_prefix("CREATOR_GROWTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 || self.auth.state_token_ttl <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age and auth.state_token_ttl must be greater than 0".to_string(),
            ));
        }

        if self.jobs.token_refresh.interval_seconds == 0 {
            return Err(AppError::Config(
                "jobs.token_refresh.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.jobs.token_refresh.refresh_window_days <= 0 {
            return Err(AppError::Config(
                "jobs.token_refresh.refresh_window_days must be greater than 0".to_string(),
            ));
        }

        if self.jobs.ingestion.max_concurrent == 0 {
            return Err(AppError::Config(
                "jobs.ingestion.max_concurrent must be greater than 0".to_string(),
            ));
        }

        const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(
                "logging.format must be \"pretty\" or \"json\"".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether both OAuth client credentials are set
    pub fn has_provider_credentials(&self) -> bool {
        self.provider.client_id.is_some() && self.provider.client_secret.is_some()
    }
}
