//! Growth statistics endpoint

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};

use super::dto::{GrowthStatsResponse, StatsParams};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::AccountSummary;
use crate::error::AppError;
use crate::service::StatsPeriod;

/// Create growth router
///
/// Routes:
/// - GET /api/growth/stats?period=7|week|14|30|month|90
pub fn growth_router() -> Router<AppState> {
    Router::new().route("/stats", get(growth_stats))
}

/// GET /api/growth/stats
///
/// Missing or unrecognized periods fall back to 30 days.
async fn growth_stats(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<StatsParams>,
) -> Result<Json<GrowthStatsResponse>, AppError> {
    let account = state.accounts.get_account_for_user(&session.user_id).await?;
    let period = params
        .period
        .as_deref()
        .map(StatsPeriod::parse)
        .unwrap_or_default();

    let stats = state.growth.stats(&account.id, period).await?;

    Ok(Json(GrowthStatsResponse {
        account: AccountSummary::from(&account),
        stats,
    }))
}
