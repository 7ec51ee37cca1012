//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use creator_growth::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const STUB_PROVIDER_ACCOUNT_ID: &str = "17841400";
pub const STUB_USERNAME: &str = "stub_creator";
pub const VALID_CODE: &str = "valid-code";
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Test server instance
///
/// Runs the real router against a stub provider on another ephemeral port.
pub struct TestServer {
    pub addr: String,
    pub provider_addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let provider_addr = spawn_stub_provider().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = test_config(db_path, &provider_addr);

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Redirects are asserted, not followed
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = creator_growth::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            provider_addr,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user and a session token for it
    pub async fn create_test_user(&self, email: &str) -> (creator_growth::data::User, String) {
        use creator_growth::auth::{Session, create_session_token};

        let user = self
            .state
            .db
            .create_user(email, "hashed-password")
            .await
            .unwrap();
        let session = Session::new(user.id.clone(), user.email.clone(), 3600);
        let token = create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token");

        (user, token)
    }

    /// Run the whole connect flow for a user and return the callback response
    pub async fn connect_account(&self, token: &str) -> reqwest::Response {
        let response = self
            .client
            .get(self.url("/api/instagram/connect"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        let authorize_url = url::Url::parse(body["url"].as_str().unwrap()).unwrap();
        let params: HashMap<_, _> = authorize_url.query_pairs().into_owned().collect();

        let mut callback = url::Url::parse(&self.url("/auth/instagram/callback")).unwrap();
        callback
            .query_pairs_mut()
            .append_pair("code", VALID_CODE)
            .append_pair("state", &params["state"]);

        self.client.get(callback).send().await.unwrap()
    }

    /// Poll the posts endpoint until `expected` posts are stored
    pub async fn wait_for_posts(&self, token: &str, expected: u64) -> serde_json::Value {
        let mut body = serde_json::Value::Null;
        for _ in 0..50 {
            let response = self
                .client
                .get(self.url("/api/instagram/posts"))
                .bearer_auth(token)
                .send()
                .await
                .unwrap();
            body = response.json().await.unwrap();
            if body["posts_count"].as_u64() == Some(expected) {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("posts never reached {expected}: {body}");
    }
}

fn test_config(db_path: std::path::PathBuf, provider_addr: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            frontend_url: "http://localhost:5173".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 3600,
            state_token_ttl: 600,
        },
        provider: config::ProviderConfig {
            client_id: Some("test-client-id".to_string()),
            client_secret: Some("test-client-secret".to_string()),
            redirect_uri: Some("http://localhost:8080/auth/instagram/callback".to_string()),
            authorize_url: format!("{provider_addr}/dialog/oauth"),
            api_base_url: format!("{provider_addr}/"),
            graph_base_url: format!("{provider_addr}/"),
            scopes: "instagram_basic".to_string(),
            request_timeout_seconds: 5,
            media_timeout_seconds: 5,
        },
        jobs: config::JobsConfig {
            token_refresh: config::TokenRefreshConfig {
                enabled: false,
                startup_delay_seconds: 0,
                interval_seconds: 43_200,
                refresh_window_days: 7,
            },
            ingestion: config::IngestionConfig {
                media_fetch_limit: 50,
                max_concurrent: 2,
            },
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

// =============================================================================
// Stub provider
// =============================================================================

type Params = Query<HashMap<String, String>>;

fn provider_error(code: i64, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": {"message": message, "type": "OAuthException", "code": code}
        })),
    )
        .into_response()
}

async fn code_exchange(body: String) -> Response {
    let form: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();

    if form.get("code").map(String::as_str) != Some(VALID_CODE)
        || form.get("client_secret").map(String::as_str) != Some("test-client-secret")
    {
        return provider_error(100, "Invalid authorization code");
    }

    Json(serde_json::json!({
        "access_token": "short-token",
        "user_id": 17841400u64
    }))
    .into_response()
}

async fn long_lived_exchange(Query(params): Params) -> Response {
    if params.get("grant_type").map(String::as_str) != Some("ig_exchange_token") {
        return provider_error(100, "Unsupported grant type");
    }

    Json(serde_json::json!({
        "access_token": "long-token",
        "token_type": "bearer",
        "expires_in": 5_184_000
    }))
    .into_response()
}

async fn refresh(Query(params): Params) -> Response {
    match params.get("access_token").map(String::as_str) {
        Some(EXPIRED_TOKEN) => provider_error(190, "Session has expired"),
        Some(_) => Json(serde_json::json!({
            "access_token": "refreshed-token",
            "token_type": "bearer",
            "expires_in": 5_184_000
        }))
        .into_response(),
        None => provider_error(100, "Missing access token"),
    }
}

async fn profile() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": STUB_PROVIDER_ACCOUNT_ID,
        "username": STUB_USERNAME
    }))
}

async fn media() -> Json<serde_json::Value> {
    let now = Utc::now();
    let at = |days: i64| {
        (now - Duration::days(days))
            .format("%Y-%m-%dT%H:%M:%S+0000")
            .to_string()
    };

    Json(serde_json::json!({
        "data": [
            {
                "id": "media-1",
                "caption": "Leg day #Fitness",
                "media_type": "IMAGE",
                "media_url": "https://cdn.example.com/media-1.jpg",
                "timestamp": at(1),
                "like_count": 10,
                "comments_count": 1
            },
            {
                "id": "media-2",
                "caption": "Sunrise run #fitness #running",
                "media_type": "VIDEO",
                "media_url": "https://cdn.example.com/media-2.mp4",
                "timestamp": at(3),
                "like_count": 20,
                "comments_count": 2
            },
            {
                "id": "media-3",
                "caption": "Throwback",
                "media_type": "CAROUSEL_ALBUM",
                "media_url": "https://cdn.example.com/media-3.jpg",
                "timestamp": at(20),
                "like_count": 5,
                "comments_count": 0
            }
        ]
    }))
}

async fn spawn_stub_provider() -> String {
    let app = Router::new()
        .route("/oauth/access_token", post(code_exchange))
        .route("/access_token", get(long_lived_exchange))
        .route("/refresh_access_token", get(refresh))
        .route("/me", get(profile))
        .route("/me/media", get(media));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
