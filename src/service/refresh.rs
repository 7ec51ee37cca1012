//! Token refresh scheduler
//!
//! Periodically extends long-lived provider tokens that are about to expire.
//! Expired tokens cannot be refreshed and are left for re-authorization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::config::TokenRefreshConfig;
use crate::data::{ConnectedAccount, Database};
use crate::error::AppError;
use crate::metrics::{TOKEN_REFRESH_SCANS_TOTAL, TOKEN_REFRESH_TOTAL};
use crate::provider::ProviderClient;

/// Counts from one completed scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// Another scan was still running
    Skipped,
}

/// Clears the single-flight flag when a scan ends, including on early return
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Token refresh scheduler
pub struct TokenRefreshScheduler {
    db: Arc<Database>,
    provider: Arc<dyn ProviderClient>,
    config: TokenRefreshConfig,
    scanning: AtomicBool,
}

impl TokenRefreshScheduler {
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn ProviderClient>,
        config: TokenRefreshConfig,
    ) -> Self {
        Self {
            db,
            provider,
            config,
            scanning: AtomicBool::new(false),
        }
    }

    /// Spawn the background loop
    ///
    /// Waits for the startup grace period, scans once, then scans on every
    /// interval tick. Errors are logged and never leave the task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let startup_delay = Duration::from_secs(self.config.startup_delay_seconds);
        let interval_secs = self.config.interval_seconds.max(1);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(startup_delay).await;

            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                // The first tick completes immediately
                interval.tick().await;

                tracing::info!("Running scheduled token refresh scan...");
                match self.run_scan().await {
                    Ok(ScanOutcome::Completed(report)) => tracing::info!(
                        candidates = report.candidates,
                        refreshed = report.refreshed,
                        failed = report.failed,
                        "Token refresh scan completed"
                    ),
                    Ok(ScanOutcome::Skipped) => {
                        tracing::warn!("Token refresh scan still running; tick skipped")
                    }
                    Err(e) => tracing::error!(error = %e, "Token refresh scan failed"),
                }
            }
        });

        tracing::info!(
            startup_delay_seconds = startup_delay.as_secs(),
            interval_seconds = interval_secs,
            "Token refresh task spawned"
        );
        handle
    }

    /// Run one scan now
    pub async fn run_scan(&self) -> Result<ScanOutcome, AppError> {
        self.run_scan_at(Utc::now()).await
    }

    /// Run one scan as of `now`
    ///
    /// Refreshes every account whose token expires strictly between `now`
    /// and `now + refresh_window_days`. One account failing never stops the
    /// scan.
    ///
    /// # Errors
    /// Returns error only if the candidate query fails
    pub async fn run_scan_at(&self, now: DateTime<Utc>) -> Result<ScanOutcome, AppError> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            TOKEN_REFRESH_SCANS_TOTAL.with_label_values(&["skipped"]).inc();
            return Ok(ScanOutcome::Skipped);
        }
        let _guard = ScanGuard(&self.scanning);

        let window_end = now + chrono::Duration::days(self.config.refresh_window_days);
        let candidates = self
            .db
            .get_accounts_expiring_between(now, window_end)
            .await?;

        let mut report = ScanReport {
            candidates: candidates.len(),
            ..ScanReport::default()
        };

        for account in candidates {
            match self.refresh_account(&account).await {
                Ok(()) => {
                    report.refreshed += 1;
                    TOKEN_REFRESH_TOTAL.with_label_values(&["refreshed"]).inc();
                }
                Err(AppError::TokenExpired) => {
                    report.failed += 1;
                    TOKEN_REFRESH_TOTAL.with_label_values(&["expired"]).inc();
                    tracing::warn!(
                        account_id = %account.id,
                        "Provider reports token expired; re-authorization required"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    TOKEN_REFRESH_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::error!(
                        account_id = %account.id,
                        error = %e,
                        "Token refresh failed"
                    );
                }
            }
        }

        TOKEN_REFRESH_SCANS_TOTAL
            .with_label_values(&["completed"])
            .inc();
        Ok(ScanOutcome::Completed(report))
    }

    async fn refresh_account(&self, account: &ConnectedAccount) -> Result<(), AppError> {
        if account.access_token.trim().is_empty() {
            return Err(AppError::InvalidAccount(format!(
                "account {} has no access token",
                account.id
            )));
        }

        let refreshed = self
            .provider
            .refresh_long_lived(&account.access_token)
            .await?;

        let updated = self
            .db
            .update_account_token(&account.id, &refreshed.access_token, refreshed.expires_at)
            .await?;
        if !updated {
            // Disconnected while the refresh was in flight
            tracing::warn!(account_id = %account.id, "Account vanished before token update");
            return Err(AppError::NotFound);
        }

        tracing::info!(
            account_id = %account.id,
            expires_at = %refreshed.expires_at,
            "Token refreshed"
        );
        Ok(())
    }
}
