/// Embedding backfill pipeline
///
/// Populates missing embeddings for cached metadata: builds a text
/// representation per item, embeds in rate-limited batches, upserts into the
/// similarity index and records the minted ref back into the metadata cache
/// batch by batch, so a mid-run failure keeps all completed work.
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::{
    error::EngineResult,
    models::{ContentMetadata, EmbeddingRef, MediaType},
    providers::{Embedder, IndexDocument, MetadataCache, SimilarityIndex},
};

/// Keywords included in the embedding text
const TEXT_KEYWORD_LIMIT: usize = 15;
/// Cast members included in the embedding text
const TEXT_CAST_LIMIT: usize = 5;

/// Outcome counters for one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

pub struct EmbeddingBackfill {
    metadata: Arc<dyn MetadataCache>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    batch_size: usize,
    batch_delay: Duration,
}

impl EmbeddingBackfill {
    pub fn new(
        metadata: Arc<dyn MetadataCache>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilarityIndex>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            metadata,
            embedder,
            index,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Embed every cached item of `media_type` that has no embedding yet
    ///
    /// Progress commits per batch: a failing batch is counted and skipped,
    /// never rolled into the next one, and work already upserted stays done.
    pub async fn run(&self, media_type: MediaType) -> EngineResult<BackfillReport> {
        let items = self.metadata.list_missing_embedding(media_type).await?;
        let total = items.len();

        if total == 0 {
            tracing::info!(media_type = %media_type, "No items need embedding");
            return Ok(BackfillReport::default());
        }

        tracing::info!(media_type = %media_type, total, "Starting embedding backfill");

        let mut report = BackfillReport {
            total,
            ..Default::default()
        };

        for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
            // Respect the embedding provider's throughput ceiling
            if batch_index > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            let mut texts = Vec::with_capacity(batch.len());
            let mut valid: Vec<&ContentMetadata> = Vec::with_capacity(batch.len());
            for item in batch {
                let text = build_embedding_text(item);
                if text.trim().is_empty() {
                    report.skipped += 1;
                    continue;
                }
                texts.push(text);
                valid.push(item);
            }

            if valid.is_empty() {
                continue;
            }

            let vectors = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    tracing::error!(error = %e, batch = batch_index, "Embedding batch failed");
                    report.failed += valid.len();
                    continue;
                }
            };

            if vectors.len() != valid.len() {
                tracing::error!(
                    expected = valid.len(),
                    got = vectors.len(),
                    batch = batch_index,
                    "Embedding count mismatch"
                );
                report.failed += valid.len();
                continue;
            }

            let documents: Vec<IndexDocument> = valid
                .iter()
                .zip(&texts)
                .zip(vectors)
                .map(|((item, text), vector)| IndexDocument {
                    embedding_ref: mint_ref(item),
                    vector,
                    text: text.clone(),
                    content_id: item.content_id,
                    media_type: item.media_type,
                })
                .collect();

            if let Err(e) = self.index.upsert(documents).await {
                tracing::error!(error = %e, batch = batch_index, "Vector store upsert failed");
                report.failed += valid.len();
                continue;
            }

            // Commit refs for this batch before moving on
            for item in &valid {
                let embedding_ref = mint_ref(item);
                match self
                    .metadata
                    .set_embedding_ref(item.content_id, item.media_type, &embedding_ref)
                    .await
                {
                    Ok(()) => report.embedded += 1,
                    Err(e) => {
                        tracing::warn!(
                            content_id = %item.content_id,
                            error = %e,
                            "Failed to record embedding ref"
                        );
                        report.failed += 1;
                    }
                }
            }

            tracing::info!(
                batch = batch_index,
                embedded = report.embedded,
                failed = report.failed,
                total,
                "Backfill progress"
            );
        }

        tracing::info!(
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed,
            total,
            "Embedding backfill finished"
        );

        Ok(report)
    }
}

fn mint_ref(item: &ContentMetadata) -> EmbeddingRef {
    EmbeddingRef(format!("{}:{}", item.media_type, item.content_id))
}

/// Text representation of an item for semantic embedding
///
/// Title, genres, thematic keywords, principal cast and crew, plot overview
/// and language, pipe-separated. Field order matters less than consistency:
/// the taste vector lives in the same space.
pub fn build_embedding_text(meta: &ContentMetadata) -> String {
    let mut parts: Vec<String> = Vec::new();

    let title_line = match meta.year {
        Some(year) => format!("{} ({})", meta.title, year),
        None => meta.title.clone(),
    };
    if !title_line.trim().is_empty() {
        parts.push(title_line);
    }

    if !meta.genres.is_empty() {
        let genres: Vec<&str> = meta.genres.iter().map(|g| g.as_str()).collect();
        parts.push(format!("Genres: {}", genres.join(", ")));
    }

    if !meta.keywords.is_empty() {
        let keywords: Vec<&str> = meta
            .keywords
            .iter()
            .take(TEXT_KEYWORD_LIMIT)
            .map(|k| k.as_str())
            .collect();
        parts.push(format!("Themes: {}", keywords.join(", ")));
    }

    if !meta.cast.is_empty() {
        let cast: Vec<&str> = meta.top_billed(TEXT_CAST_LIMIT).collect();
        parts.push(format!("Cast: {}", cast.join(", ")));
    }

    if !meta.crew.is_empty() {
        let crew: Vec<String> = meta
            .crew
            .iter()
            .map(|c| format!("{} ({})", c.name, c.role))
            .collect();
        parts.push(format!("Crew: {}", crew.join(", ")));
    }

    if let Some(overview) = &meta.overview {
        if !overview.trim().is_empty() {
            parts.push(overview.clone());
        }
    }

    if let Some(language) = &meta.original_language {
        if language != "en" {
            parts.push(format!("Language: {}", language));
        }
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{CastMember, ContentId, CrewMember};
    use crate::providers::{MockEmbedder, MockMetadataCache, MockSimilarityIndex};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn meta(id: u64, title: &str) -> ContentMetadata {
        ContentMetadata {
            content_id: ContentId(id),
            media_type: MediaType::Movie,
            title: title.to_string(),
            year: Some(2010),
            genres: BTreeSet::from(["Action".to_string()]),
            keywords: vec!["heist".to_string()],
            cast: vec![CastMember {
                name: "Lead Actor".to_string(),
                billing_order: 0,
            }],
            crew: vec![CrewMember {
                name: "The Director".to_string(),
                role: "Director".to_string(),
            }],
            popularity: Some(50.0),
            rating: Some(7.5),
            original_language: Some("en".to_string()),
            overview: Some("A daring heist goes wrong.".to_string()),
            embedding_ref: None,
        }
    }

    #[test]
    fn test_embedding_text_structure() {
        let text = build_embedding_text(&meta(1, "Heist Movie"));
        assert!(text.starts_with("Heist Movie (2010)"));
        assert!(text.contains("Genres: Action"));
        assert!(text.contains("Themes: heist"));
        assert!(text.contains("Cast: Lead Actor"));
        assert!(text.contains("Crew: The Director (Director)"));
        assert!(text.contains("A daring heist goes wrong."));
        // English is the default language and not worth spelling out
        assert!(!text.contains("Language:"));
    }

    #[test]
    fn test_embedding_text_non_english_language() {
        let mut m = meta(1, "Film");
        m.original_language = Some("de".to_string());
        assert!(build_embedding_text(&m).contains("Language: de"));
    }

    #[test]
    fn test_embedding_text_empty_for_blank_item() {
        let mut m = meta(1, "");
        m.genres.clear();
        m.keywords.clear();
        m.cast.clear();
        m.crew.clear();
        m.overview = None;
        assert!(build_embedding_text(&m).trim().is_empty());
    }

    #[tokio::test]
    async fn test_backfill_empty_catalog() {
        let mut metadata = MockMetadataCache::new();
        metadata
            .expect_list_missing_embedding()
            .returning(|_| Ok(Vec::new()));

        let backfill = EmbeddingBackfill::new(
            Arc::new(metadata),
            Arc::new(MockEmbedder::new()),
            Arc::new(MockSimilarityIndex::new()),
            10,
            Duration::from_millis(0),
        );

        let report = backfill.run(MediaType::Movie).await.unwrap();
        assert_eq!(report, BackfillReport::default());
    }

    #[tokio::test]
    async fn test_backfill_commits_refs_per_batch() {
        let mut metadata = MockMetadataCache::new();
        metadata
            .expect_list_missing_embedding()
            .returning(|_| Ok(vec![meta(1, "One"), meta(2, "Two"), meta(3, "Three")]));
        metadata
            .expect_set_embedding_ref()
            .times(3)
            .returning(|_, _, _| Ok(()));

        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed_batch()
            .returning(|texts| Ok(texts.iter().map(|_| vec![0.1, 0.2]).collect()));

        let mut index = MockSimilarityIndex::new();
        index.expect_upsert().times(2).returning(|_| Ok(()));

        let backfill = EmbeddingBackfill::new(
            Arc::new(metadata),
            Arc::new(embedder),
            Arc::new(index),
            2, // forces two batches for three items
            Duration::from_millis(0),
        );

        let report = backfill.run(MediaType::Movie).await.unwrap();
        assert_eq!(report.embedded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.total, 3);
    }

    #[tokio::test]
    async fn test_backfill_partial_failure_keeps_completed_work() {
        let mut metadata = MockMetadataCache::new();
        metadata
            .expect_list_missing_embedding()
            .returning(|_| Ok(vec![meta(1, "One"), meta(2, "Two"), meta(3, "Three"), meta(4, "Four")]));
        metadata
            .expect_set_embedding_ref()
            .returning(|_, _, _| Ok(()));

        // First batch embeds fine, second batch fails
        let calls = AtomicUsize::new(0);
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed_batch().returning(move |texts| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(texts.iter().map(|_| vec![0.5]).collect())
            } else {
                Err(EngineError::ExternalService("embedder down".to_string()))
            }
        });

        let mut index = MockSimilarityIndex::new();
        index.expect_upsert().times(1).returning(|_| Ok(()));

        let backfill = EmbeddingBackfill::new(
            Arc::new(metadata),
            Arc::new(embedder),
            Arc::new(index),
            2,
            Duration::from_millis(0),
        );

        let report = backfill.run(MediaType::Movie).await.unwrap();
        assert_eq!(report.embedded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.total, 4);
    }

    #[tokio::test]
    async fn test_backfill_vector_count_mismatch_fails_batch() {
        let mut metadata = MockMetadataCache::new();
        metadata
            .expect_list_missing_embedding()
            .returning(|_| Ok(vec![meta(1, "One"), meta(2, "Two")]));

        let mut embedder = MockEmbedder::new();
        // One vector for two inputs
        embedder
            .expect_embed_batch()
            .returning(|_| Ok(vec![vec![0.5]]));

        let backfill = EmbeddingBackfill::new(
            Arc::new(metadata),
            Arc::new(embedder),
            Arc::new(MockSimilarityIndex::new()),
            10,
            Duration::from_millis(0),
        );

        let report = backfill.run(MediaType::Movie).await.unwrap();
        assert_eq!(report.embedded, 0);
        assert_eq!(report.failed, 2);
    }
}
