//! Account service
//!
//! Connects, looks up and disconnects the provider account of an
//! application user.

use std::sync::Arc;

use chrono::Utc;

use super::ingestion::IngestionQueue;
use crate::auth::{create_state_token, verify_state_token};
use crate::config::AppConfig;
use crate::data::{ConnectedAccount, Database};
use crate::error::AppError;
use crate::provider::{self, ProviderClient, token_expiry};

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    provider: Arc<dyn ProviderClient>,
    config: Arc<AppConfig>,
    ingestion: IngestionQueue,
}

impl AccountService {
    /// Create new account service
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn ProviderClient>,
        config: Arc<AppConfig>,
        ingestion: IngestionQueue,
    ) -> Self {
        Self {
            db,
            provider,
            config,
            ingestion,
        }
    }

    /// Get the connected account of a user
    pub async fn get_account_for_user(&self, user_id: &str) -> Result<ConnectedAccount, AppError> {
        self.db
            .get_connected_account_by_user(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Provider dialog URL that starts the connect flow
    ///
    /// The `state` parameter is a signed token naming the user, since the
    /// callback arrives without a session.
    ///
    /// # Errors
    /// `Config` when client id or redirect URI are unset
    pub fn authorization_url(&self, user_id: &str, email: &str) -> Result<String, AppError> {
        let state = create_state_token(
            user_id,
            email,
            &self.config.auth.session_secret,
            self.config.auth.state_token_ttl,
        )?;
        provider::authorization_url(&self.config.provider, &state)
    }

    /// Finish the connect flow
    ///
    /// # Steps
    /// 1. Verify the state token and recover the user
    /// 2. Exchange the code for a short-lived token
    /// 3. Exchange that for a long-lived token
    /// 4. Fetch the provider profile
    /// 5. Refuse a provider account owned by someone else, then connect it,
    ///    replacing any other account of the user in the same transaction
    /// 6. Schedule a background media fetch
    ///
    /// # Errors
    /// `Unauthorized`/`InvalidSignature` for a bad state, provider errors
    /// from the exchanges, `Validation` if the provider account already
    /// belongs to another user
    pub async fn complete_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<ConnectedAccount, AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("missing authorization code".to_string()));
        }

        // 1. Verify state
        let claims = verify_state_token(state, &self.config.auth.session_secret)?;
        if self.db.get_user(&claims.user_id).await?.is_none() {
            tracing::warn!(user_id = %claims.user_id, "OAuth callback for unknown user");
            return Err(AppError::Unauthorized);
        }

        // 2-4. Token exchanges and profile
        let short_lived = self.provider.exchange_code_for_token(code).await?;
        let long_lived = self
            .provider
            .exchange_for_long_lived(&short_lived.access_token)
            .await?;
        let profile = self.provider.fetch_profile(&long_lived.access_token).await?;

        let provider_account_id = if profile.id.is_empty() {
            short_lived.provider_user_id
        } else {
            profile.id
        };

        // Refuse before touching the user's current account
        if let Some(owned) = self
            .db
            .get_connected_account_by_provider_id(&provider_account_id)
            .await?
            .filter(|a| a.user_id != claims.user_id)
        {
            tracing::warn!(
                user_id = %claims.user_id,
                account_id = %owned.id,
                "Provider account is connected to another user"
            );
            return Err(AppError::Validation(
                "this account is already connected to another user".to_string(),
            ));
        }

        // 5. Upsert; a user owns at most one account so a different one replaces it
        let expires_at = token_expiry(Utc::now(), long_lived.expires_in)?;
        let account = ConnectedAccount::new(
            claims.user_id.clone(),
            provider_account_id,
            profile.username,
            long_lived.access_token,
            expires_at,
        );
        let stored = self.db.connect_account_for_user(&account).await?;

        tracing::info!(
            user_id = %stored.user_id,
            account_id = %stored.id,
            username = %stored.display_name,
            expires_at = %stored.token_expires_at,
            "Provider account connected"
        );

        // 6. Background fetch
        if let Err(e) = self.ingestion.submit(stored.id.clone()) {
            tracing::warn!(account_id = %stored.id, error = %e, "Could not schedule media fetch");
        }

        Ok(stored)
    }

    /// Schedule a background media fetch for the user's account
    pub async fn schedule_fetch(&self, user_id: &str) -> Result<ConnectedAccount, AppError> {
        let account = self.get_account_for_user(user_id).await?;
        self.ingestion.submit(account.id.clone())?;
        Ok(account)
    }

    /// Remove the user's connected account and its posts
    ///
    /// # Returns
    /// The account that was removed
    pub async fn disconnect(&self, user_id: &str) -> Result<ConnectedAccount, AppError> {
        let account = self.get_account_for_user(user_id).await?;

        if !self.db.delete_connected_account_by_user(user_id).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(
            user_id,
            account_id = %account.id,
            "Provider account disconnected"
        );
        Ok(account)
    }
}
