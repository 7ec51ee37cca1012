//! Growth statistics
//!
//! Windowed engagement aggregates over stored posts: totals, averages,
//! trends against the preceding window, best post, posting cadence and a
//! short summary message. Zero posts is a normal state, never an error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::data::{Database, EngagementTotals, Post, TimeWindow};
use crate::error::AppError;

/// Characters kept from a best-post caption before the ellipsis
pub const CAPTION_PREVIEW_CHARS: usize = 100;

/// Number of hashtags reported per window
pub const TOP_HASHTAG_LIMIT: usize = 5;

/// Supported reporting periods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatsPeriod {
    Week,
    TwoWeeks,
    #[default]
    Month,
    Quarter,
}

impl StatsPeriod {
    /// Map a `period` query value
    ///
    /// Unrecognized values fall back to a month.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "7" | "week" => Self::Week,
            "14" => Self::TwoWeeks,
            "30" | "month" => Self::Month,
            "90" => Self::Quarter,
            _ => Self::Month,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::TwoWeeks => 14,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::days(self.days())
    }
}

/// Best performing post of the current window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPost {
    pub id: String,
    /// Truncated for display
    pub caption: String,
    pub media_type: String,
    pub media_url: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub engagement: i64,
    pub posted_at: Option<DateTime<Utc>>,
}

impl From<Post> for BestPost {
    fn from(post: Post) -> Self {
        Self {
            engagement: post.engagement(),
            caption: truncate_caption(&post.caption),
            id: post.id,
            media_type: post.media_type,
            media_url: post.media_url,
            like_count: post.like_count,
            comment_count: post.comment_count,
            posted_at: post.posted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashtagCount {
    pub tag: String,
    pub count: usize,
}

/// Growth statistics for one account and period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthStats {
    pub total_posts: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_engagement: i64,
    pub avg_likes_per_post: f64,
    pub avg_comments_per_post: f64,
    pub engagement_rate: f64,
    pub best_post: Option<BestPost>,
    pub likes_trend: f64,
    pub comments_trend: f64,
    pub posting_trend: f64,
    pub posts_this_week: i64,
    pub posts_this_month: i64,
    pub period_days: i64,
    pub top_hashtags: Vec<HashtagCount>,
    pub message: String,
}

/// Percentage change from `previous` to `current`
///
/// Defined as 0 when `previous` is 0.
pub fn trend(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current - previous) as f64 / previous as f64 * 100.0
}

/// `total / count`, or 0 for an empty window
pub fn average(total: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

/// Shorten a caption to [`CAPTION_PREVIEW_CHARS`] characters plus `...`
pub fn truncate_caption(caption: &str) -> String {
    match caption.char_indices().nth(CAPTION_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &caption[..cut]),
        None => caption.to_string(),
    }
}

/// Human-readable summary of the period
pub fn summary_message(total_posts: i64, likes_trend: f64, posts_this_week: i64) -> String {
    if total_posts == 0 {
        return "No posts in this period yet. Time to share something!".to_string();
    }

    let mut message = if likes_trend > 20.0 {
        "You're on fire! Engagement is way up."
    } else if likes_trend > 5.0 {
        "Nice! You're growing steadily."
    } else if likes_trend > -5.0 {
        "Holding steady. Keep doing your thing."
    } else if likes_trend > -20.0 {
        "Slight dip, but that happens."
    } else {
        "Engagement is down, but consistency is key."
    }
    .to_string();

    if posts_this_week == 0 {
        message.push_str(" You haven't posted this week though. Your audience misses you!");
    } else if posts_this_week >= 5 {
        message.push_str(" You've been posting a lot. Great hustle!");
    }

    message
}

/// Hashtags of a caption, lower-cased with trailing punctuation removed
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

    caption
        .split_whitespace()
        .filter(|word| word.starts_with('#'))
        .map(|word| word.trim_matches(PUNCTUATION))
        .filter(|tag| tag.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Most frequent hashtags, ties broken alphabetically
pub fn top_hashtags<'a>(
    captions: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<HashtagCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for caption in captions {
        for tag in extract_hashtags(caption) {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut ranked: Vec<HashtagCount> = counts
        .into_iter()
        .map(|(tag, count)| HashtagCount { tag, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked.truncate(limit);
    ranked
}

/// Growth statistics service
pub struct GrowthService {
    db: Arc<Database>,
}

impl GrowthService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Statistics for the period ending now
    pub async fn stats(&self, account_id: &str, period: StatsPeriod) -> Result<GrowthStats, AppError> {
        self.stats_at(account_id, period, Utc::now()).await
    }

    /// Statistics for the period ending at `now`
    ///
    /// The current window is `[now - period, now]`, the previous window
    /// `[now - 2 * period, now - period)`. Posts without a timestamp are in
    /// neither.
    pub async fn stats_at(
        &self,
        account_id: &str,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<GrowthStats, AppError> {
        let current_window = TimeWindow::trailing(now, period.duration());
        let previous_window = current_window.preceding(period.duration());

        let current = self.db.engagement_totals(account_id, &current_window).await?;
        let previous = self
            .db
            .engagement_totals(account_id, &previous_window)
            .await?;

        let best_post = self
            .db
            .best_post_in_window(account_id, &current_window)
            .await?
            .map(BestPost::from);

        let posts_this_week = self
            .db
            .count_posts_in_window(account_id, &TimeWindow::trailing(now, Duration::days(7)))
            .await?;
        let posts_this_month = self
            .db
            .count_posts_in_window(account_id, &TimeWindow::trailing(now, Duration::days(30)))
            .await?;

        let captions = self.db.captions_in_window(account_id, &current_window).await?;
        let top_hashtags = top_hashtags(captions.iter().map(String::as_str), TOP_HASHTAG_LIMIT);

        let stats = build_stats(
            current,
            previous,
            best_post,
            posts_this_week,
            posts_this_month,
            period,
            top_hashtags,
        );

        tracing::debug!(
            account_id,
            period_days = stats.period_days,
            total_posts = stats.total_posts,
            likes_trend = stats.likes_trend,
            "Growth stats computed"
        );

        Ok(stats)
    }
}

fn build_stats(
    current: EngagementTotals,
    previous: EngagementTotals,
    best_post: Option<BestPost>,
    posts_this_week: i64,
    posts_this_month: i64,
    period: StatsPeriod,
    top_hashtags: Vec<HashtagCount>,
) -> GrowthStats {
    let total_engagement = current.total_likes + current.total_comments;
    let likes_trend = trend(current.total_likes, previous.total_likes);

    GrowthStats {
        total_posts: current.post_count,
        total_likes: current.total_likes,
        total_comments: current.total_comments,
        total_engagement,
        avg_likes_per_post: average(current.total_likes, current.post_count),
        avg_comments_per_post: average(current.total_comments, current.post_count),
        engagement_rate: average(total_engagement, current.post_count),
        best_post,
        likes_trend,
        comments_trend: trend(current.total_comments, previous.total_comments),
        posting_trend: trend(current.post_count, previous.post_count),
        posts_this_week,
        posts_this_month,
        period_days: period.days(),
        top_hashtags,
        message: summary_message(current.post_count, likes_trend, posts_this_week),
    }
}
