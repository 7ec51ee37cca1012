//! Instagram Graph API client
//!
//! Talks to the provider over HTTPS with query-string or form-encoded
//! parameters and JSON responses. No retries: every call fails fast with a
//! typed error once its timeout elapses.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    CodeExchangeResponse, EXPIRED_TOKEN_CODE, LongLivedToken, LongLivedTokenResponse, MediaItem,
    MediaListResponse, Profile, RefreshedToken, ShortLivedToken, parse_error_body,
};
use super::{DEFAULT_MEDIA_LIMIT, ProviderClient};
use crate::config::ProviderConfig;
use crate::error::AppError;
use crate::metrics::observe_provider_request;

const MEDIA_FIELDS: &str = "id,caption,media_type,media_url,timestamp,like_count,comments_count";

/// reqwest-backed provider client
#[derive(Clone)]
pub struct InstagramClient {
    http_client: reqwest::Client,
    config: ProviderConfig,
}

impl InstagramClient {
    /// Create new client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("creator-growth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_seconds)
    }

    fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.config.media_timeout_seconds)
    }

    fn graph_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
        endpoint_url(&self.config.graph_base_url, path, params)
    }

    /// Send a request and decode its JSON body
    ///
    /// `endpoint` labels metrics and log lines. Token-bearing URLs are never
    /// logged.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        let started = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                observe_provider_request(endpoint, "error", started.elapsed());
                let e = e.without_url();
                tracing::warn!(endpoint, error = %e, "Provider request failed");
                return Err(AppError::Upstream(format!("{endpoint} request failed: {e}")));
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::Upstream(format!("{endpoint} response unreadable: {}", e.without_url()))
        })?;
        observe_provider_request(endpoint, status.as_str(), started.elapsed());

        if !status.is_success() {
            return Err(classify_error(endpoint, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(endpoint, error = %e, "Malformed provider response");
            AppError::Upstream(format!("{endpoint} returned a malformed response"))
        })
    }
}

fn endpoint_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
    let mut url = Url::parse(base)
        .and_then(|base| base.join(path))
        .map_err(|e| AppError::Config(format!("invalid provider URL {base}: {e}")))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Map a non-2xx provider response to a typed error
fn classify_error(endpoint: &str, status: reqwest::StatusCode, body: &str) -> AppError {
    let (code, message) = parse_error_body(body).unwrap_or((None, None));

    if code == Some(EXPIRED_TOKEN_CODE) {
        tracing::warn!(endpoint, %status, "Provider rejected an expired token");
        return AppError::TokenExpired;
    }

    tracing::warn!(endpoint, %status, code = ?code, message = ?message, "Provider returned an error");
    match message {
        Some(message) => AppError::Upstream(format!("{endpoint} failed with {status}: {message}")),
        None => AppError::Upstream(format!("{endpoint} failed with {status}")),
    }
}

/// Build the provider authorization dialog URL
///
/// # Errors
/// `Config` when client id or redirect URI are unset
pub fn authorization_url(config: &ProviderConfig, state: &str) -> Result<String, AppError> {
    let url = endpoint_url(
        &config.authorize_url,
        "",
        &[
            ("client_id", config.client_id()?),
            ("redirect_uri", config.redirect_uri()?),
            ("scope", config.scopes.as_str()),
            ("response_type", "code"),
            ("state", state),
        ],
    )?;
    Ok(url.into())
}

#[async_trait]
impl ProviderClient for InstagramClient {
    async fn exchange_code_for_token(&self, code: &str) -> Result<ShortLivedToken, AppError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", self.config.client_id()?)
            .append_pair("client_secret", self.config.client_secret()?)
            .append_pair("grant_type", "authorization_code")
            .append_pair("redirect_uri", self.config.redirect_uri()?)
            .append_pair("code", code)
            .finish();
        let url = endpoint_url(&self.config.api_base_url, "oauth/access_token", &[])?;

        let request = self
            .http_client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .timeout(self.request_timeout());

        let response: CodeExchangeResponse = self.send("oauth_access_token", request).await?;
        if response.access_token.is_empty() {
            return Err(AppError::Upstream(
                "oauth_access_token returned an empty token".to_string(),
            ));
        }

        Ok(ShortLivedToken {
            access_token: response.access_token,
            provider_user_id: response.user_id,
        })
    }

    async fn exchange_for_long_lived(&self, short_token: &str) -> Result<LongLivedToken, AppError> {
        let url = self.graph_url(
            "access_token",
            &[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", self.config.client_secret()?),
                ("access_token", short_token),
            ],
        )?;
        let request = self.http_client.get(url).timeout(self.request_timeout());

        let response: LongLivedTokenResponse = self.send("long_lived_token", request).await?;
        Ok(LongLivedToken {
            access_token: response.access_token,
            expires_in: response.expires_in,
        })
    }

    async fn fetch_profile(&self, token: &str) -> Result<Profile, AppError> {
        let url = self.graph_url("me", &[("fields", "id,username"), ("access_token", token)])?;
        let request = self.http_client.get(url).timeout(self.request_timeout());

        self.send("profile", request).await
    }

    async fn fetch_media(&self, token: &str, limit: i64) -> Result<Vec<MediaItem>, AppError> {
        let limit = if limit <= 0 { DEFAULT_MEDIA_LIMIT } else { limit }.to_string();
        let url = self.graph_url(
            "me/media",
            &[
                ("fields", MEDIA_FIELDS),
                ("access_token", token),
                ("limit", limit.as_str()),
            ],
        )?;
        let request = self.http_client.get(url).timeout(self.media_timeout());

        let response: MediaListResponse = self.send("media", request).await?;
        Ok(response.data)
    }

    async fn refresh_long_lived(&self, token: &str) -> Result<RefreshedToken, AppError> {
        let url = self.graph_url(
            "refresh_access_token",
            &[("grant_type", "ig_refresh_token"), ("access_token", token)],
        )?;
        let request = self.http_client.get(url).timeout(self.request_timeout());

        let response: LongLivedTokenResponse = self.send("refresh_token", request).await?;
        Ok(RefreshedToken {
            access_token: response.access_token,
            expires_at: super::token_expiry(Utc::now(), response.expires_in)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        response::IntoResponse,
        routing::{get, post},
    };
    use std::collections::HashMap;

    type Params = Query<HashMap<String, String>>;

    async fn code_exchange(body: String) -> impl IntoResponse {
        let form: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        if form.get("code").map(String::as_str) == Some("good-code")
            && form.get("grant_type").map(String::as_str) == Some("authorization_code")
        {
            (
                StatusCode::OK,
                Json(serde_json::json!({"access_token": "short-token", "user_id": 17841400}))
                    .into_response(),
            )
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error_type": "OAuthException",
                    "code": 400,
                    "error_message": "Invalid authorization code"
                }))
                .into_response(),
            )
        }
    }

    async fn refresh(Query(params): Params) -> impl IntoResponse {
        match params.get("access_token").map(String::as_str) {
            Some("expired") => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": {"message": "Session has expired", "type": "OAuthException", "code": 190}
                })),
            ),
            Some("broken") => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"unexpected": true})),
            ),
            Some("forever") => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": "refreshed-token",
                    "expires_in": i64::MAX
                })),
            ),
            _ => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": "refreshed-token",
                    "token_type": "bearer",
                    "expires_in": 5_184_000
                })),
            ),
        }
    }

    async fn media(Query(params): Params) -> Json<serde_json::Value> {
        let limit: usize = params
            .get("limit")
            .and_then(|limit| limit.parse().ok())
            .unwrap_or(0);
        let data: Vec<_> = (0..limit)
            .map(|i| serde_json::json!({"id": format!("m{i}"), "like_count": i}))
            .collect();
        Json(serde_json::json!({ "data": data }))
    }

    async fn profile() -> &'static str {
        "not json"
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/oauth/access_token", post(code_exchange))
            .route("/refresh_access_token", get(refresh))
            .route("/me/media", get(media))
            .route("/me", get(profile));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    async fn stub_client() -> InstagramClient {
        let base = spawn_stub().await;
        let mut config = crate::config::tests::valid_config().provider;
        config.api_base_url = base.clone();
        config.graph_base_url = base;
        InstagramClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn code_exchange_parses_numeric_user_id() {
        let client = stub_client().await;

        let token = client.exchange_code_for_token("good-code").await.unwrap();
        assert_eq!(token.access_token, "short-token");
        assert_eq!(token.provider_user_id, "17841400");
    }

    #[tokio::test]
    async fn rejected_code_is_upstream_error() {
        let client = stub_client().await;

        let error = client.exchange_code_for_token("bad-code").await.unwrap_err();
        assert!(
            matches!(&error, AppError::Upstream(message) if message.contains("Invalid authorization code"))
        );
    }

    #[tokio::test]
    async fn missing_secret_is_config_error() {
        let mut client = stub_client().await;
        client.config.client_secret = None;

        let error = client.exchange_code_for_token("good-code").await.unwrap_err();
        assert!(matches!(error, AppError::Config(_)));
    }

    #[tokio::test]
    async fn refresh_sets_absolute_expiry() {
        let client = stub_client().await;

        let before = Utc::now();
        let refreshed = client.refresh_long_lived("valid").await.unwrap();
        assert_eq!(refreshed.access_token, "refreshed-token");
        assert!(refreshed.expires_at >= before + chrono::Duration::days(59));
    }

    #[tokio::test]
    async fn expired_token_is_distinct_failure() {
        let client = stub_client().await;

        let error = client.refresh_long_lived("expired").await.unwrap_err();
        assert!(matches!(error, AppError::TokenExpired));

        let error = client.refresh_long_lived("broken").await.unwrap_err();
        assert!(matches!(error, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn out_of_range_lifetime_is_upstream_error() {
        let client = stub_client().await;

        let error = client.refresh_long_lived("forever").await.unwrap_err();
        assert!(matches!(error, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn media_limit_falls_back_to_default() {
        let client = stub_client().await;

        let items = client.fetch_media("token", 0).await.unwrap();
        assert_eq!(items.len(), DEFAULT_MEDIA_LIMIT as usize);

        let items = client.fetch_media("token", 3).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].like_count, 2);
    }

    #[tokio::test]
    async fn malformed_body_is_upstream_error() {
        let client = stub_client().await;

        let error = client.fetch_profile("token").await.unwrap_err();
        assert!(matches!(error, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_upstream_error() {
        let mut config = crate::config::tests::valid_config().provider;
        config.graph_base_url = "http://127.0.0.1:9/".to_string();
        config.request_timeout_seconds = 2;
        let client = InstagramClient::new(config).unwrap();

        let error = client.fetch_profile("token").await.unwrap_err();
        assert!(matches!(error, AppError::Upstream(_)));
    }

    #[test]
    fn authorization_url_carries_state_and_client() {
        let config = crate::config::tests::valid_config().provider;

        let url = Url::parse(&authorization_url(&config, "signed-state").unwrap()).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "signed-state");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:8080/auth/instagram/callback"
        );
    }

    #[test]
    fn authorization_url_requires_client_id() {
        let mut config = crate::config::tests::valid_config().provider;
        config.client_id = None;

        assert!(matches!(
            authorization_url(&config, "state"),
            Err(AppError::Config(_))
        ));
    }
}
