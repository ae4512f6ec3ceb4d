/// Candidate retrieval
///
/// Turns weighted embedding refs into a single taste vector and asks the
/// similarity index for nearest neighbors, resolving each hit's metadata from
/// the cache. Degradation policy: a failing or unreachable similarity service
/// yields an empty candidate set, and hits whose metadata cannot be resolved
/// are soft-skipped; neither is an error.
use std::sync::Arc;

use crate::{
    models::{ContentId, ContentMetadata, EmbeddingRef},
    providers::{MetadataCache, SimilarityIndex},
};

/// A retrieval hit with resolved metadata, ready for scoring
#[derive(Debug, Clone)]
pub struct Candidate {
    pub content_id: ContentId,
    /// Cosine similarity in [0, 1]
    pub similarity: f64,
    pub metadata: ContentMetadata,
}

pub struct CandidateRetriever {
    index: Arc<dyn SimilarityIndex>,
    metadata: Arc<dyn MetadataCache>,
}

impl CandidateRetriever {
    pub fn new(index: Arc<dyn SimilarityIndex>, metadata: Arc<dyn MetadataCache>) -> Self {
        Self { index, metadata }
    }

    /// Resolve refs to vectors and average them, weighted by signal strength
    ///
    /// Returns `None` when nothing can be resolved (no refs, unknown refs, or
    /// an unreachable index) — the caller treats that as "no embeddable
    /// history".
    pub async fn taste_vector(&self, refs: &[(EmbeddingRef, f64)]) -> Option<Vec<f32>> {
        if refs.is_empty() {
            return None;
        }

        let ids: Vec<EmbeddingRef> = refs.iter().map(|(r, _)| r.clone()).collect();
        let vectors = match self.index.vectors(&ids).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!(error = %e, "Taste vector resolution failed");
                return None;
            }
        };

        let mut taste: Vec<f32> = Vec::new();
        let mut total_weight = 0.0_f64;

        for (embedding_ref, weight) in refs {
            let Some(vector) = vectors.get(embedding_ref) else {
                continue;
            };
            if taste.is_empty() {
                taste = vec![0.0; vector.len()];
            }
            for (acc, component) in taste.iter_mut().zip(vector) {
                *acc += component * *weight as f32;
            }
            total_weight += weight;
        }

        if taste.is_empty() || total_weight <= 0.0 {
            return None;
        }

        for component in &mut taste {
            *component /= total_weight as f32;
        }

        Some(taste)
    }

    /// Nearest-neighbor candidates for a taste vector
    pub async fn retrieve(&self, taste_vector: &[f32], limit: usize) -> Vec<Candidate> {
        let hits = match self.index.query(taste_vector, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Similarity query failed, returning no candidates");
                return Vec::new();
            }
        };

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            let metadata = match self.metadata.metadata(hit.content_id, hit.media_type).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) => {
                    tracing::debug!(content_id = %hit.content_id, "Unresolved candidate metadata, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(content_id = %hit.content_id, error = %e, "Metadata lookup failed, skipping candidate");
                    continue;
                }
            };

            candidates.push(Candidate {
                content_id: hit.content_id,
                similarity: (1.0 - hit.distance).max(0.0),
                metadata,
            });
        }

        tracing::debug!(
            requested = limit,
            resolved = candidates.len(),
            "Retrieved candidates"
        );

        candidates
    }
}
