use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod metadata;
pub mod profile;
pub mod recommendation;
pub mod watch;

pub use metadata::{CastMember, ContentMetadata, CrewMember};
pub use profile::{AntiProfile, ProfileStats, TasteProfile};
pub use recommendation::{LogEntry, RecFilters, RecMode, Recommendation, ScoreSignals};
pub use watch::{FeedbackPolarity, FeedbackRecord, InfluenceOverride, OverrideAction, OverrideTarget, WatchRecord};

/// Identifier for a user known to the media server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a content item in the metadata catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub u64);

impl Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a stored embedding vector
///
/// Minted by the backfill pipeline as `"{media_type}:{content_id}"` and carried
/// on [`ContentMetadata`]; the engine never inspects the contents, only hands
/// refs back to the similarity index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmbeddingRef(pub String);

impl Display for EmbeddingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Show => write!(f, "show"),
        }
    }
}
