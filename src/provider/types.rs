//! Provider wire types
//!
//! Response bodies of the provider's OAuth and graph endpoints, plus the
//! parsed results handed to the rest of the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Results
// =============================================================================

/// Short-lived token returned by the authorization-code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortLivedToken {
    pub access_token: String,
    pub provider_user_id: String,
}

/// Long-lived token (nominally ~60 days)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongLivedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Provider profile of the token owner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
}

/// Refreshed long-lived token with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A media item as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Raw provider timestamp, parsed during ingestion
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default, rename = "comments_count")]
    pub comment_count: i64,
}

// =============================================================================
// Response bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CodeExchangeResponse {
    pub access_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
}

/// Body of both the long-lived exchange and the refresh endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct LongLivedTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaListResponse {
    #[serde(default)]
    pub data: Vec<MediaItem>,
}

/// Graph API error envelope: `{"error": {"message", "type", "code"}}`
#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorEnvelope {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// OAuth endpoint error body: `{"error_type", "code", "error_message"}`
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Graph error code for an invalid or expired access token
pub(crate) const EXPIRED_TOKEN_CODE: i64 = 190;

/// Error details pulled out of a non-2xx body, if it has a known shape
pub(crate) fn parse_error_body(body: &str) -> Option<(Option<i64>, Option<String>)> {
    if let Ok(envelope) = serde_json::from_str::<GraphErrorEnvelope>(body) {
        return Some((envelope.error.code, envelope.error.message));
    }
    serde_json::from_str::<OAuthError>(body)
        .ok()
        .filter(|error| error.code.is_some() || error.error_message.is_some())
        .map(|error| (error.code, error.error_message))
}

/// Provider ids arrive as JSON numbers from some endpoints and strings from others
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Number(value) => value.to_string(),
    })
}
