//! Data models
//!
//! Rust structs representing database entities and aggregate rows.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// An application user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Already-hashed credential, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Connected account
// =============================================================================

/// A provider account connected to an application user
///
/// At most one row exists per `provider_account_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConnectedAccount {
    pub id: String,
    /// Owning application user
    pub user_id: String,
    /// Account id assigned by the provider (unique)
    pub provider_account_id: String,
    /// Provider username
    pub display_name: String,
    /// Long-lived provider access token
    #[serde(skip_serializing)]
    pub access_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectedAccount {
    /// Build a new, not yet persisted account
    pub fn new(
        user_id: impl Into<String>,
        provider_account_id: impl Into<String>,
        display_name: impl Into<String>,
        access_token: impl Into<String>,
        token_expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new().0,
            user_id: user_id.into(),
            provider_account_id: provider_account_id.into(),
            display_name: display_name.into(),
            access_token: access_token.into(),
            token_expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public view of an account, as returned alongside API payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
}

impl From<&ConnectedAccount> for AccountSummary {
    fn from(account: &ConnectedAccount) -> Self {
        Self {
            id: account.id.clone(),
            username: account.display_name.clone(),
        }
    }
}

// =============================================================================
// Post
// =============================================================================

/// A media item fetched from the provider
///
/// Unique on `(account_id, provider_post_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub provider_post_id: String,
    pub account_id: String,
    pub caption: String,
    /// IMAGE, VIDEO, CAROUSEL_ALBUM, ...
    pub media_type: String,
    pub media_url: String,
    pub like_count: i64,
    pub comment_count: i64,
    /// None when the provider timestamp could not be parsed
    pub posted_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl Post {
    /// Likes plus comments
    pub fn engagement(&self) -> i64 {
        self.like_count + self.comment_count
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Raw sums over a time window of posts
///
/// Zero rows aggregate to all-zero totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct EngagementTotals {
    pub post_count: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

/// A trailing time range over `posted_at`
///
/// `start` is always inclusive; `end` is inclusive only when
/// `inclusive_end` is set, so adjacent windows never share a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub inclusive_end: bool,
}

impl TimeWindow {
    /// `[end - length, end]`
    pub fn trailing(end: DateTime<Utc>, length: chrono::Duration) -> Self {
        Self {
            start: end - length,
            end,
            inclusive_end: true,
        }
    }

    /// `[start - length, start)`, the window immediately before `self`
    pub fn preceding(&self, length: chrono::Duration) -> Self {
        Self {
            start: self.start - length,
            end: self.start,
            inclusive_end: false,
        }
    }
}
