//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database and provider operations.

mod account;
mod growth;
mod ingestion;
mod refresh;

pub use account::AccountService;
pub use growth::{
    BestPost, GrowthService, GrowthStats, HashtagCount, StatsPeriod, extract_hashtags,
    summary_message, trend, truncate_caption,
};
pub use ingestion::{IngestionQueue, IngestionReport, MediaIngestion, parse_provider_timestamp};
pub use refresh::{ScanOutcome, ScanReport, TokenRefreshScheduler};
