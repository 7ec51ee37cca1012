//! Instagram connection endpoints
//!
//! Connect flow, manual post refresh, post listing and disconnect. Every
//! route except the provider callback requires a session.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
    routing::{delete, get, post},
};

use super::dto::{
    CallbackParams, ConnectUrlResponse, DisconnectResponse, PostsParams, PostsResponse,
    ScheduledResponse,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::AccountSummary;
use crate::error::AppError;

/// Posts returned when the client does not ask for a page size
const DEFAULT_POSTS_PAGE: i64 = 50;

/// Create Instagram router
///
/// Routes:
/// - GET /api/instagram/connect - Provider authorization URL
/// - POST /api/instagram/refresh - Schedule a media fetch
/// - GET /api/instagram/posts - Stored posts, newest first
/// - DELETE /api/instagram/disconnect - Remove the connected account
pub fn instagram_router() -> Router<AppState> {
    Router::new()
        .route("/connect", get(connect))
        .route("/refresh", post(refresh_posts))
        .route("/posts", get(list_posts))
        .route("/disconnect", delete(disconnect))
}

/// Create OAuth callback router
///
/// Routes:
/// - GET /auth/instagram/callback - Provider redirect target
pub fn callback_router() -> Router<AppState> {
    Router::new().route("/auth/instagram/callback", get(oauth_callback))
}

/// GET /api/instagram/connect
async fn connect(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<ConnectUrlResponse>, AppError> {
    let url = state
        .accounts
        .authorization_url(&session.user_id, &session.email)?;
    Ok(Json(ConnectUrlResponse { url }))
}

/// GET /auth/instagram/callback
///
/// Redirects to the frontend with `connected=true` on success and
/// `connected=false` when the user declined on the provider side.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    if let Some(error) = params.error {
        tracing::info!(
            error = %error,
            description = ?params.error_description,
            "Provider authorization declined"
        );
        let target = frontend_redirect(
            &state.config.server.frontend_url,
            &[("connected", "false"), ("error", error.as_str())],
        )?;
        return Ok(Redirect::temporary(&target));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("missing code".to_string()))?;
    let oauth_state = params
        .state
        .ok_or_else(|| AppError::Validation("missing state".to_string()))?;

    state
        .accounts
        .complete_callback(&code, &oauth_state)
        .await?;

    let target = frontend_redirect(&state.config.server.frontend_url, &[("connected", "true")])?;
    Ok(Redirect::temporary(&target))
}

fn frontend_redirect(frontend_url: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
    let mut url = url::Url::parse(frontend_url)
        .map_err(|e| AppError::Config(format!("invalid server.frontend_url: {e}")))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

/// POST /api/instagram/refresh
///
/// Answers 202 immediately; completion shows up in later post listings.
async fn refresh_posts(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let account = state.accounts.schedule_fetch(&session.user_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScheduledResponse {
            status: "fetch scheduled",
            account: AccountSummary::from(&account),
        }),
    ))
}

/// GET /api/instagram/posts
async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<PostsParams>,
) -> Result<Json<PostsResponse>, AppError> {
    let account = state.accounts.get_account_for_user(&session.user_id).await?;
    let posts = state
        .db
        .get_posts_by_account(&account.id, params.limit.unwrap_or(DEFAULT_POSTS_PAGE))
        .await?;

    Ok(Json(PostsResponse {
        account: AccountSummary::from(&account),
        posts_count: posts.len(),
        posts,
    }))
}

/// DELETE /api/instagram/disconnect
async fn disconnect(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<DisconnectResponse>, AppError> {
    let account = state.accounts.disconnect(&session.user_id).await?;

    Ok(Json(DisconnectResponse {
        message: "Instagram account disconnected successfully",
        account: AccountSummary::from(&account),
    }))
}
