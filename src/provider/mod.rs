//! Social provider integration
//!
//! Handles:
//! - Authorization-code, long-lived and refresh token exchanges
//! - Profile and media lookups

mod client;
mod types;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;

pub use client::{InstagramClient, authorization_url};
pub use types::{LongLivedToken, MediaItem, Profile, RefreshedToken, ShortLivedToken};

/// Page size used when a caller asks for a non-positive number of media items
pub const DEFAULT_MEDIA_LIMIT: i64 = 25;

/// Absolute expiry of a token the provider says lives `expires_in` seconds
///
/// # Errors
/// `Upstream` when the lifetime does not fit in a timestamp
pub fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AppError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AppError::Upstream(format!("token lifetime out of range: {expires_in}")))
}

/// Token exchange client
///
/// Calls only the remote provider; never touches local state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Trade an authorization code for a short-lived token
    async fn exchange_code_for_token(&self, code: &str) -> Result<ShortLivedToken, AppError>;

    /// Trade a short-lived token for a long-lived one
    async fn exchange_for_long_lived(&self, short_token: &str) -> Result<LongLivedToken, AppError>;

    async fn fetch_profile(&self, token: &str) -> Result<Profile, AppError>;

    /// Most recent media items, newest first
    async fn fetch_media(&self, token: &str, limit: i64) -> Result<Vec<MediaItem>, AppError>;

    /// Extend a still-valid long-lived token
    ///
    /// # Errors
    /// `TokenExpired` if the provider reports the token as expired
    async fn refresh_long_lived(&self, token: &str) -> Result<RefreshedToken, AppError>;
}
