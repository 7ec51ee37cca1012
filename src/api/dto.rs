//! Request and response bodies
//!
//! Shapes the JSON the frontend consumes. Domain types stay in `data` and
//! `service`; this module only wraps them.

use serde::{Deserialize, Serialize};

use crate::data::{AccountSummary, Post};
use crate::service::GrowthStats;

// =============================================================================
// Query parameters
// =============================================================================

/// Query of the provider redirect back to us
///
/// The provider sends either `code` + `state` or an `error` when the user
/// declined.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostsParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub period: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ConnectUrlResponse {
    pub url: String,
}

/// Body of a 202 for background work
#[derive(Debug, Serialize)]
pub struct ScheduledResponse {
    pub status: &'static str,
    pub account: AccountSummary,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub account: AccountSummary,
    pub posts_count: usize,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct GrowthStatsResponse {
    pub account: AccountSummary,
    pub stats: GrowthStats,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub message: &'static str,
    pub account: AccountSummary,
}
