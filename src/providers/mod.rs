/// External data-provider abstractions
///
/// The engine consumes history, metadata, feedback, vectors and embeddings
/// through these traits and never talks to storage directly. Concrete wire
/// clients for the vector store and the embedding generator live in this
/// module; history, metadata, feedback and the log sink are implemented by the
/// host application.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::{
    error::EngineResult,
    models::{
        ContentId, ContentMetadata, EmbeddingRef, FeedbackPolarity, InfluenceOverride, LogEntry,
        MediaType, UserId, WatchRecord,
    },
};

pub mod chroma;
pub mod ollama;

pub use chroma::ChromaIndex;
pub use ollama::OllamaEmbedder;

/// One nearest-neighbor result from the similarity index
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub embedding_ref: EmbeddingRef,
    pub content_id: ContentId,
    pub media_type: MediaType,
    /// Cosine distance; the retriever converts this to a similarity
    pub distance: f64,
}

/// A vector plus the identifying metadata stored alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub embedding_ref: EmbeddingRef,
    pub vector: Vec<f32>,
    /// The text the vector was generated from
    pub text: String,
    pub content_id: ContentId,
    pub media_type: MediaType,
}

/// Source of normalized watch-history records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Watch records for a user, optionally bounded by time and media domain.
    /// Order is not guaranteed; the engine re-sorts where it matters.
    async fn watch_history(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
        domain: Option<MediaType>,
    ) -> EngineResult<Vec<WatchRecord>>;
}

/// Read access to the content-metadata cache
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn metadata(
        &self,
        content_id: ContentId,
        media_type: MediaType,
    ) -> EngineResult<Option<ContentMetadata>>;

    /// Most popular items first; the cold-start source
    async fn list_by_popularity(&self, limit: usize) -> EngineResult<Vec<ContentMetadata>>;

    /// Items that have no embedding yet, for the backfill pipeline
    async fn list_missing_embedding(
        &self,
        media_type: MediaType,
    ) -> EngineResult<Vec<ContentMetadata>>;

    /// Record the embedding ref minted for an item during backfill
    async fn set_embedding_ref(
        &self,
        content_id: ContentId,
        media_type: MediaType,
        embedding_ref: &EmbeddingRef,
    ) -> EngineResult<()>;
}

/// Nearest-neighbor search over content embeddings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn upsert(&self, documents: Vec<IndexDocument>) -> EngineResult<()>;

    /// `k` nearest neighbors of `vector` by cosine distance
    async fn query(&self, vector: &[f32], k: usize) -> EngineResult<Vec<SimilarityHit>>;

    /// Resolve stored vectors by ref; refs unknown to the index are absent
    /// from the result map
    async fn vectors(
        &self,
        refs: &[EmbeddingRef],
    ) -> EngineResult<HashMap<EmbeddingRef, Vec<f32>>>;
}

/// Text-embedding generator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;

    /// Embed several texts in one call, same order as the input.
    /// Fails the whole batch rather than returning partial output.
    async fn embed_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>>;
}

/// Feedback and influence-override storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Most recent feedback per content item for this user
    async fn feedback(
        &self,
        user_id: UserId,
    ) -> EngineResult<HashMap<ContentId, FeedbackPolarity>>;

    async fn overrides(&self, user_id: UserId) -> EngineResult<Vec<InfluenceOverride>>;
}

/// Library-access boundary
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryAccess: Send + Sync {
    /// Content ids the user's library grants access to. `None` means no
    /// library mapping exists for this user, which the engine treats as
    /// unrestricted access.
    async fn accessible_ids(&self, user_id: UserId) -> EngineResult<Option<HashSet<ContentId>>>;
}

/// Durable append-only sink for emitted recommendations
///
/// Writes are best-effort and isolated from the request path; see
/// [`crate::services::log_writer`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommendationSink: Send + Sync {
    async fn append(&self, entry: &LogEntry) -> EngineResult<()>;
}
