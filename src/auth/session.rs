//! Signed tokens
//!
//! Uses HMAC-signed tokens for both user sessions and OAuth state.
//! No server-side storage needed.
//!
//! Token format: base64(payload).base64(hmac_sha256(payload))

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// What a token may be used for
///
/// Checked on verification so a state token is never accepted as a
/// session and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    OAuthState,
}

/// Claims shared by every signed token
pub trait SignedClaims: Serialize + DeserializeOwned {
    const PURPOSE: TokenPurpose;

    fn purpose(&self) -> TokenPurpose;

    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self) -> bool {
        self.expires_at() < Utc::now()
    }
}

/// Authenticated user session
///
/// Presented as `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub purpose: TokenPurpose,
    pub user_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, max_age_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            purpose: TokenPurpose::Session,
            user_id: user_id.into(),
            email: email.into(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_secs),
        }
    }
}

impl SignedClaims for Session {
    const PURPOSE: TokenPurpose = TokenPurpose::Session;

    fn purpose(&self) -> TokenPurpose {
        self.purpose
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Sign claims into a token string
pub fn sign_token<C: SignedClaims>(claims: &C, secret: &str) -> Result<String, AppError> {
    // 1. Serialize claims to JSON
    let payload = serde_json::to_string(claims).map_err(|e| AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a token
///
/// # Errors
/// `InvalidSignature` if the signature does not match, `Unauthorized` if the
/// token is malformed, expired, or minted for another purpose
pub fn verify_token<C: SignedClaims>(token: &str, secret: &str) -> Result<C, AppError> {
    // 1. Split token into payload and signature
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    if signature_b64.contains('.') {
        return Err(AppError::Unauthorized);
    }

    // 2. Verify HMAC signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::InvalidSignature)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let claims: C = serde_json::from_slice(&payload_bytes).map_err(|_| AppError::Unauthorized)?;

    // 4. Check purpose and expiry
    if claims.purpose() != C::PURPOSE || claims.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}

/// Create a signed session token
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    sign_token(session, secret)
}

/// Verify and decode a session token
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    verify_token(token, secret)
}
