//! Media ingestion
//!
//! Pulls recent media of a connected account from the provider and upserts
//! it into the posts table. Ingestion only ever inserts or refreshes rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};

use crate::data::{Database, EntityId, Post};
use crate::error::AppError;
use crate::metrics::{INGESTION_JOBS_TOTAL, MEDIA_ITEMS_INGESTED_TOTAL};
use crate::provider::{MediaItem, ProviderClient};

/// Provider timestamp layouts tried after RFC 3339, in order
///
/// The graph API emits offsets without a colon (`+0000`).
const PROVIDER_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Parse a provider timestamp
///
/// Returns `None` when no known layout matches. The post is still stored.
pub fn parse_provider_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    PROVIDER_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn post_from_media(account_id: &str, item: MediaItem, fetched_at: DateTime<Utc>) -> Post {
    let posted_at = item.timestamp.as_deref().and_then(parse_provider_timestamp);
    if posted_at.is_none() {
        tracing::debug!(
            provider_post_id = %item.id,
            timestamp = ?item.timestamp,
            "Unparseable media timestamp"
        );
    }

    Post {
        id: EntityId::new().0,
        provider_post_id: item.id,
        account_id: account_id.to_string(),
        caption: item.caption.unwrap_or_default(),
        media_type: item.media_type.unwrap_or_default(),
        media_url: item.media_url.unwrap_or_default(),
        like_count: item.like_count,
        comment_count: item.comment_count,
        posted_at,
        fetched_at,
    }
}

/// Outcome of one fetch-and-store run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub fetched: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Media ingestion service
pub struct MediaIngestion {
    db: Arc<Database>,
    provider: Arc<dyn ProviderClient>,
    fetch_limit: i64,
}

impl MediaIngestion {
    pub fn new(db: Arc<Database>, provider: Arc<dyn ProviderClient>, fetch_limit: u32) -> Self {
        Self {
            db,
            provider,
            fetch_limit: i64::from(fetch_limit),
        }
    }

    /// Fetch recent media for an account and upsert every item
    ///
    /// A failing item is logged and skipped. An empty media list is a
    /// successful run.
    ///
    /// # Errors
    /// `NotFound` for an unknown account, `InvalidAccount` when the stored
    /// account lacks a provider id or token, provider errors from the fetch
    pub async fn fetch_and_store(&self, account_id: &str) -> Result<IngestionReport, AppError> {
        let account = self
            .db
            .get_connected_account(account_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if account.provider_account_id.trim().is_empty() || account.access_token.trim().is_empty() {
            return Err(AppError::InvalidAccount(format!(
                "account {} is missing its provider id or access token",
                account.id
            )));
        }

        let items = self
            .provider
            .fetch_media(&account.access_token, self.fetch_limit)
            .await?;

        let mut report = IngestionReport {
            fetched: items.len(),
            ..IngestionReport::default()
        };

        if items.is_empty() {
            tracing::info!(account_id = %account.id, "Provider returned no media");
            return Ok(report);
        }

        let fetched_at = Utc::now();
        for item in items {
            let post = post_from_media(&account.id, item, fetched_at);
            match self.db.upsert_post(&post).await {
                Ok(_) => {
                    report.stored += 1;
                    MEDIA_ITEMS_INGESTED_TOTAL
                        .with_label_values(&["stored"])
                        .inc();
                }
                Err(e) => {
                    report.failed += 1;
                    MEDIA_ITEMS_INGESTED_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    tracing::warn!(
                        account_id = %account.id,
                        provider_post_id = %post.provider_post_id,
                        error = %e,
                        "Failed to store media item"
                    );
                }
            }
        }

        tracing::info!(
            account_id = %account.id,
            fetched = report.fetched,
            stored = report.stored,
            failed = report.failed,
            "Media ingestion finished"
        );

        Ok(report)
    }
}

/// Background ingestion queue
///
/// `submit` never waits for the job. A dispatcher task runs jobs
/// concurrently, bounded by a semaphore. Job failures are logged and
/// counted, never returned.
#[derive(Clone)]
pub struct IngestionQueue {
    sender: mpsc::UnboundedSender<String>,
}

impl IngestionQueue {
    /// Spawn the dispatcher
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(ingestion: Arc<MediaIngestion>, max_concurrent: usize) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        tokio::spawn(async move {
            while let Some(account_id) = receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let ingestion = ingestion.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    match ingestion.fetch_and_store(&account_id).await {
                        Ok(_) => {
                            INGESTION_JOBS_TOTAL.with_label_values(&["succeeded"]).inc();
                        }
                        Err(e) => {
                            INGESTION_JOBS_TOTAL.with_label_values(&["failed"]).inc();
                            tracing::error!(
                                account_id = %account_id,
                                error = %e,
                                "Background media ingestion failed"
                            );
                        }
                    }
                });
            }

            tracing::debug!("Ingestion queue closed");
        });

        Self { sender }
    }

    /// Schedule a fetch-and-store run for an account
    ///
    /// # Errors
    /// Returns error only if the dispatcher has stopped
    pub fn submit(&self, account_id: impl Into<String>) -> Result<(), AppError> {
        let account_id = account_id.into();
        tracing::debug!(account_id = %account_id, "Scheduling media ingestion");
        self.sender
            .send(account_id)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("ingestion queue is closed")))
    }
}
