use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, MediaType, UserId};

/// A single watch event from the media server's history
///
/// Appended by the external ingestion layer and read-only here. `completion_pct`
/// is 0-100; `user_rating` is the server-side 0-10 star rating when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub media_type: MediaType,
    pub started_at: Option<DateTime<Utc>>,
    pub completion_pct: f64,
    pub watch_count: u32,
    pub user_rating: Option<f64>,
}

/// Explicit user feedback on a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPolarity {
    Up,
    Down,
    Dismiss,
}

/// One feedback entry per (user, content) pair; last write wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub polarity: FeedbackPolarity,
}

/// What an influence override targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideTarget {
    Genre,
    Keyword,
}

/// How an influence override adjusts the computed affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideAction {
    Boost,
    Suppress,
    Block,
}

/// User-authored adjustment applied after affinity normalization
///
/// Never fed in as raw signal: boosts and suppressions shift the final
/// affinity (capped to [-1, 1]), while `block` pins it at -1.0 outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceOverride {
    pub user_id: UserId,
    pub target_type: OverrideTarget,
    pub target_key: String,
    pub action: OverrideAction,
    pub magnitude: Option<f64>,
}
