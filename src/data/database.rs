//! SQLite database operations
//!
//! All database access goes through this module.
//! Row-level atomicity of upserts and cascading deletes are delegated to
//! SQLite (`ON CONFLICT ... DO UPDATE`, `ON DELETE CASCADE`).

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::models::*;
use crate::error::AppError;

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default and maximum page size for post listings
pub const DEFAULT_POST_LIMIT: i64 = 25;
pub const MAX_POST_LIMIT: i64 = 100;

/// `posted_at` predicate for a window; NULL timestamps never match.
fn window_clause(window: &TimeWindow) -> &'static str {
    if window.inclusive_end {
        "posted_at IS NOT NULL AND posted_at >= ? AND posted_at <= ?"
    } else {
        "posted_at IS NOT NULL AND posted_at >= ? AND posted_at < ?"
    }
}

fn normalize_post_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_POST_LIMIT
    } else {
        limit.min(MAX_POST_LIMIT)
    }
}

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user with an already-hashed credential
    ///
    /// # Errors
    /// `Validation` when the email is empty or already registered
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, AppError> {
        let email = email.trim();
        if email.is_empty() || password_hash.is_empty() {
            return Err(AppError::Validation(
                "email and password are required".to_string(),
            ));
        }

        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(EntityId::new().0)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => Err(
                AppError::Validation("email already in use".to_string()),
            ),
            Err(error) => Err(error.into()),
        }
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    // =========================================================================
    // Connected accounts
    // =========================================================================

    /// Insert or update a connected account keyed on `provider_account_id`
    ///
    /// On conflict only the display name, token, expiry and `updated_at`
    /// change; the stored id, owner and `created_at` are preserved.
    ///
    /// # Returns
    /// The row as stored after the upsert
    pub async fn upsert_connected_account(
        &self,
        account: &ConnectedAccount,
    ) -> Result<ConnectedAccount, AppError> {
        let now = Utc::now();
        let stored = sqlx::query_as::<_, ConnectedAccount>(
            r#"
            INSERT INTO connected_accounts (
                id, user_id, provider_account_id, display_name, access_token,
                token_expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(provider_account_id) DO UPDATE SET
                display_name = excluded.display_name,
                access_token = excluded.access_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider_account_id)
        .bind(&account.display_name)
        .bind(&account.access_token)
        .bind(account.token_expires_at)
        .bind(account.created_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Attach a provider account to a user in one transaction
    ///
    /// Any other account the user owns is deleted (posts cascade) and the
    /// given one is upserted. If the provider account already belongs to a
    /// different user nothing is changed.
    ///
    /// # Errors
    /// `Validation` when the provider account is owned by another user
    pub async fn connect_account_for_user(
        &self,
        account: &ConnectedAccount,
    ) -> Result<ConnectedAccount, AppError> {
        let mut tx = self.pool.begin().await?;

        let replaced = sqlx::query(
            "DELETE FROM connected_accounts WHERE user_id = ? AND provider_account_id != ?",
        )
        .bind(&account.user_id)
        .bind(&account.provider_account_id)
        .execute(&mut *tx)
        .await?;

        let now = Utc::now();
        let stored = sqlx::query_as::<_, ConnectedAccount>(
            r#"
            INSERT INTO connected_accounts (
                id, user_id, provider_account_id, display_name, access_token,
                token_expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(provider_account_id) DO UPDATE SET
                display_name = excluded.display_name,
                access_token = excluded.access_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = excluded.updated_at
            WHERE connected_accounts.user_id = excluded.user_id
            RETURNING *
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider_account_id)
        .bind(&account.display_name)
        .bind(&account.access_token)
        .bind(account.token_expires_at)
        .bind(account.created_at)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        // No row back means the conflict guard refused the update
        let Some(stored) = stored else {
            tx.rollback().await?;
            return Err(AppError::Validation(
                "this account is already connected to another user".to_string(),
            ));
        };

        tx.commit().await?;

        if replaced.rows_affected() > 0 {
            tracing::info!(
                user_id = %stored.user_id,
                account_id = %stored.id,
                "Replaced previously connected account"
            );
        }

        Ok(stored)
    }

    /// Get a connected account by the provider's account id
    pub async fn get_connected_account_by_provider_id(
        &self,
        provider_account_id: &str,
    ) -> Result<Option<ConnectedAccount>, AppError> {
        let account = sqlx::query_as::<_, ConnectedAccount>(
            "SELECT * FROM connected_accounts WHERE provider_account_id = ?",
        )
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Get a connected account by internal id
    pub async fn get_connected_account(
        &self,
        id: &str,
    ) -> Result<Option<ConnectedAccount>, AppError> {
        let account =
            sqlx::query_as::<_, ConnectedAccount>("SELECT * FROM connected_accounts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(account)
    }

    /// Get the connected account owned by an application user
    pub async fn get_connected_account_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<ConnectedAccount>, AppError> {
        let account = sqlx::query_as::<_, ConnectedAccount>(
            "SELECT * FROM connected_accounts WHERE user_id = ? ORDER BY created_at ASC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Delete the connected account of a user (posts cascade)
    ///
    /// # Returns
    /// `true` if a row was removed
    pub async fn delete_connected_account_by_user(&self, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM connected_accounts WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the token and expiry of an account
    ///
    /// # Returns
    /// `false` if the account no longer exists
    pub async fn update_account_token(
        &self,
        id: &str,
        access_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE connected_accounts
            SET access_token = ?, token_expires_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(token_expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Accounts whose token expiry falls strictly between `after` and `before`
    pub async fn get_accounts_expiring_between(
        &self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<ConnectedAccount>, AppError> {
        let accounts = sqlx::query_as::<_, ConnectedAccount>(
            r#"
            SELECT * FROM connected_accounts
            WHERE token_expires_at > ? AND token_expires_at < ?
            ORDER BY token_expires_at ASC
            "#,
        )
        .bind(after)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert or update a post keyed on `(account_id, provider_post_id)`
    ///
    /// A re-fetch with an unparseable timestamp keeps the previously stored
    /// `posted_at`.
    pub async fn upsert_post(&self, post: &Post) -> Result<Post, AppError> {
        let stored = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (
                id, provider_post_id, account_id, caption, media_type, media_url,
                like_count, comment_count, posted_at, fetched_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, provider_post_id) DO UPDATE SET
                caption = excluded.caption,
                media_type = excluded.media_type,
                media_url = excluded.media_url,
                like_count = excluded.like_count,
                comment_count = excluded.comment_count,
                posted_at = COALESCE(excluded.posted_at, posts.posted_at),
                fetched_at = excluded.fetched_at
            RETURNING *
            "#,
        )
        .bind(&post.id)
        .bind(&post.provider_post_id)
        .bind(&post.account_id)
        .bind(&post.caption)
        .bind(&post.media_type)
        .bind(&post.media_url)
        .bind(post.like_count)
        .bind(post.comment_count)
        .bind(post.posted_at)
        .bind(post.fetched_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Most recent posts of an account
    ///
    /// Posts without a timestamp sort last. A non-positive `limit` falls back
    /// to the default page size.
    pub async fn get_posts_by_account(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE account_id = ?
            ORDER BY posted_at IS NULL, posted_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(normalize_post_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Number of stored posts of an account, regardless of timestamps
    pub async fn count_posts(&self, account_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Count and engagement sums of posts inside a window
    pub async fn engagement_totals(
        &self,
        account_id: &str,
        window: &TimeWindow,
    ) -> Result<EngagementTotals, AppError> {
        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS post_count,
                COALESCE(SUM(like_count), 0) AS total_likes,
                COALESCE(SUM(comment_count), 0) AS total_comments
            FROM posts
            WHERE account_id = ? AND {}
            "#,
            window_clause(window)
        );

        let totals = sqlx::query_as::<_, EngagementTotals>(&sql)
            .bind(account_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?;

        Ok(totals)
    }

    /// Post with the highest likes + comments inside a window
    ///
    /// Ties go to the most recent post, then to the lowest id.
    pub async fn best_post_in_window(
        &self,
        account_id: &str,
        window: &TimeWindow,
    ) -> Result<Option<Post>, AppError> {
        let sql = format!(
            r#"
            SELECT * FROM posts
            WHERE account_id = ? AND {}
            ORDER BY (like_count + comment_count) DESC, posted_at DESC, id ASC
            LIMIT 1
            "#,
            window_clause(window)
        );

        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(account_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    /// Number of posts inside a window
    pub async fn count_posts_in_window(
        &self,
        account_id: &str,
        window: &TimeWindow,
    ) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT COUNT(*) FROM posts WHERE account_id = ? AND {}",
            window_clause(window)
        );

        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(account_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Captions of posts inside a window
    pub async fn captions_in_window(
        &self,
        account_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<String>, AppError> {
        let sql = format!(
            "SELECT caption FROM posts WHERE account_id = ? AND {} AND caption != ''",
            window_clause(window)
        );

        let captions = sqlx::query_scalar::<_, String>(&sql)
            .bind(account_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(captions)
    }

    /// Make every insert of the given provider post abort
    #[cfg(test)]
    pub(crate) async fn reject_post_inserts_for(
        &self,
        provider_post_id: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS reject_post_insert
            BEFORE INSERT ON posts
            WHEN NEW.provider_post_id = '{}'
            BEGIN
                SELECT RAISE(ABORT, 'post insert rejected');
            END
            "#,
            provider_post_id.replace('\'', "''")
        );
        sqlx::query(&sql).execute(&self.pool).await?;

        Ok(())
    }
}
