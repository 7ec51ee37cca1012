//! OAuth state tokens
//!
//! The provider callback carries no session, so the state parameter both
//! prevents CSRF and tells the callback which user started the flow.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::session::{SignedClaims, TokenPurpose, sign_token, verify_token};
use crate::error::AppError;

/// Claims bound into the OAuth `state` parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClaims {
    pub purpose: TokenPurpose,
    pub user_id: String,
    pub email: String,
    /// Makes every state value unique
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedClaims for StateClaims {
    const PURPOSE: TokenPurpose = TokenPurpose::OAuthState;

    fn purpose(&self) -> TokenPurpose {
        self.purpose
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

fn generate_nonce() -> String {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint a state token for a pending OAuth flow
pub fn create_state_token(
    user_id: &str,
    email: &str,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = StateClaims {
        purpose: TokenPurpose::OAuthState,
        user_id: user_id.to_string(),
        email: email.to_string(),
        nonce: generate_nonce(),
        expires_at: Utc::now() + Duration::seconds(ttl_secs),
    };
    sign_token(&claims, secret)
}

/// Verify a state token returned by the provider callback
pub fn verify_state_token(token: &str, secret: &str) -> Result<StateClaims, AppError> {
    verify_token(token, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{Session, create_session_token};

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    #[test]
    fn state_token_recovers_user() {
        let token = create_state_token("user-1", "creator@example.com", SECRET, 600).unwrap();
        let claims = verify_state_token(&token, SECRET).unwrap();

        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.email, "creator@example.com");
    }

    #[test]
    fn state_tokens_are_unique() {
        let first = create_state_token("user-1", "a@example.com", SECRET, 600).unwrap();
        let second = create_state_token("user-1", "a@example.com", SECRET, 600).unwrap();
        assert_ne!(first, second);

        let claims = verify_state_token(&first, SECRET).unwrap();
        let nonce = general_purpose::URL_SAFE_NO_PAD
            .decode(&claims.nonce)
            .unwrap();
        assert_eq!(nonce.len(), 16);
    }

    #[test]
    fn expired_state_token_is_rejected() {
        let token = create_state_token("user-1", "a@example.com", SECRET, -1).unwrap();
        assert!(matches!(
            verify_state_token(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn session_token_is_not_a_state_token() {
        let session = Session::new("user-1", "a@example.com", 3600);
        let token = create_session_token(&session, SECRET).unwrap();

        assert!(verify_state_token(&token, SECRET).is_err());
    }
}
