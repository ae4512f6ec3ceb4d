use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, ContentMetadata, MediaType, UserId};

/// Named recommendation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecMode {
    Tonight,
    Grab,
    Rediscover,
}

/// Per-recommendation signal breakdown, tagged by scoring method
///
/// Serialized with a `method` tag so consumers can tell a cold-start pick from
/// a retrieval-scored one without probing for individual keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScoreSignals {
    Retrieval {
        similarity: f64,
        genre_boost: f64,
        anti_penalty: f64,
        popularity_factor: f64,
    },
    ColdStartPopularity,
    Rediscover {
        original_signal: f64,
        last_watched: Option<DateTime<Utc>>,
    },
}

/// A single scored, explained recommendation
///
/// Constructed once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub content_id: ContentId,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    /// Final confidence, 0.0-1.0
    pub score: f64,
    pub signals: ScoreSignals,
    pub mode: RecMode,
    pub in_library: bool,
    pub explanation: String,
}

impl Recommendation {
    /// Assemble a recommendation from resolved metadata
    pub fn from_metadata(
        meta: &ContentMetadata,
        score: f64,
        signals: ScoreSignals,
        mode: RecMode,
        in_library: bool,
        explanation: String,
    ) -> Self {
        Self {
            content_id: meta.content_id,
            media_type: meta.media_type,
            title: meta.title.clone(),
            year: meta.year,
            genres: meta.genres.iter().cloned().collect(),
            score,
            signals,
            mode,
            in_library,
            explanation,
        }
    }
}

/// User-supplied candidate filters, applied as a hard pass/fail predicate
///
/// Every field is optional; anything the caller leaves out simply doesn't
/// constrain the result set. Unknown keys never reach this struct (they fail
/// to deserialize into a field and are dropped by serde), which gives the
/// permissive behavior the engine wants for free.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecFilters {
    pub genres: Option<Vec<String>>,
    pub exclude_genres: Option<Vec<String>>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub language: Option<String>,
}

impl RecFilters {
    /// Whether a candidate passes every present filter
    ///
    /// Filters only constrain what the metadata can attest to: a candidate
    /// with no year passes the year bounds, one with no language passes the
    /// language filter.
    pub fn matches(&self, meta: &ContentMetadata) -> bool {
        if let Some(required) = &self.genres {
            if !meta.genres.is_empty() && !required.iter().any(|g| meta.genres.contains(g)) {
                return false;
            }
        }

        if let Some(excluded) = &self.exclude_genres {
            if excluded.iter().any(|g| meta.genres.contains(g)) {
                return false;
            }
        }

        if let (Some(min), Some(year)) = (self.year_min, meta.year) {
            if year < min {
                return false;
            }
        }

        if let (Some(max), Some(year)) = (self.year_max, meta.year) {
            if year > max {
                return false;
            }
        }

        if let (Some(lang), Some(meta_lang)) = (&self.language, &meta.original_language) {
            if lang != meta_lang {
                return false;
            }
        }

        true
    }
}

/// Entry appended to the recommendation log sink
///
/// Fire-and-forget: the log write lives in its own failure domain and can
/// never fail a recommendation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub media_type: MediaType,
    pub mode: RecMode,
    pub score: f64,
    pub explanation: String,
    pub signals: ScoreSignals,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn from_recommendation(user_id: UserId, rec: &Recommendation) -> Self {
        Self {
            user_id,
            content_id: rec.content_id,
            media_type: rec.media_type,
            mode: rec.mode,
            score: rec.score,
            explanation: rec.explanation.clone(),
            signals: rec.signals.clone(),
            created_at: Utc::now(),
        }
    }
}
