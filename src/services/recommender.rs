/// Recommendation orchestrator
///
/// Composes profiler, retrieval, scoring and explanations into the three
/// product modes: "tonight" (in-library), "grab" (worth acquiring) and
/// "rediscover" (rewatch suggestions). Handles cold start and hands every
/// emitted recommendation to the background log writer.
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    config::Config,
    error::EngineResult,
    models::{
        ContentId, LogEntry, RecFilters, RecMode, Recommendation, ScoreSignals, TasteProfile,
        UserId,
    },
    providers::{
        FeedbackStore, HistoryProvider, LibraryAccess, MetadataCache, SimilarityIndex,
    },
    services::{
        explanations::ExplanationEngine,
        log_writer::RecommendationLogWriter,
        profiler::TasteProfiler,
        retrieval::CandidateRetriever,
        scoring::{score_candidates, LibraryPolicy, ScoredCandidate},
        signal::compute_signal,
    },
};

/// History window used when profiling for recommendations
const PROFILE_DEPTH_MONTHS: u32 = 12;

/// Completion above which an item counts as already watched
const WATCHED_COMPLETION_PCT: f64 = 40.0;

// Over-fetch factors: retrieval pulls more than `limit` because exclusion,
// library policy and user filters all trim the pool afterwards.
const TONIGHT_OVERFETCH: usize = 5;
const TONIGHT_OVERFETCH_CAP: usize = 200;
const GRAB_OVERFETCH: usize = 10;
const GRAB_OVERFETCH_CAP: usize = 500;
const COLD_START_OVERFETCH: usize = 3;

const COLD_START_SCORE: f64 = 0.5;

// Rediscover gates
const REDISCOVER_MIN_COMPLETION: f64 = 70.0;
const REDISCOVER_MIN_AGE_DAYS: i64 = 180;
const REDISCOVER_MIN_SIGNAL: f64 = 3.0;
const REDISCOVER_SCORE_DIVISOR: f64 = 10.0;

pub struct RecommendationEngine {
    profiler: TasteProfiler,
    retriever: CandidateRetriever,
    explainer: ExplanationEngine,
    history: Arc<dyn HistoryProvider>,
    metadata: Arc<dyn MetadataCache>,
    library: Arc<dyn LibraryAccess>,
    log_writer: RecommendationLogWriter,
}

impl RecommendationEngine {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        metadata: Arc<dyn MetadataCache>,
        feedback: Arc<dyn FeedbackStore>,
        index: Arc<dyn SimilarityIndex>,
        library: Arc<dyn LibraryAccess>,
        log_writer: RecommendationLogWriter,
        config: &Config,
    ) -> Self {
        Self {
            profiler: TasteProfiler::new(history.clone(), metadata.clone(), feedback),
            retriever: CandidateRetriever::new(index, metadata.clone()),
            explainer: ExplanationEngine::new(&config.explanation_language),
            history,
            metadata,
            library,
            log_writer,
        }
    }

    /// "Watch Tonight": recommend from the user's accessible library
    ///
    /// Falls back to popularity-ranked cold start when there is no usable
    /// history, no embeddable watches, or the similarity service is
    /// unreachable.
    pub async fn recommend_tonight(
        &self,
        user_id: UserId,
        limit: usize,
        filters: &RecFilters,
    ) -> EngineResult<Vec<Recommendation>> {
        let now = Utc::now();

        let profile = self
            .profiler
            .build_profile(user_id, PROFILE_DEPTH_MONTHS, None, now)
            .await?;
        if profile.is_cold() {
            return self.cold_start(user_id, limit, filters).await;
        }

        let refs = self
            .profiler
            .taste_vector_refs(user_id, PROFILE_DEPTH_MONTHS, None, now)
            .await?;
        let Some(taste_vector) = self.retriever.taste_vector(&refs).await else {
            return self.cold_start(user_id, limit, filters).await;
        };

        let overfetch = (limit * TONIGHT_OVERFETCH).min(TONIGHT_OVERFETCH_CAP);
        let candidates = self.retriever.retrieve(&taste_vector, overfetch).await;
        if candidates.is_empty() {
            // Unreachable similarity service degrades the same way as no
            // embeddable history
            return self.cold_start(user_id, limit, filters).await;
        }

        let exclude = self.watched_ids(user_id).await?;
        let accessible = self.accessible_ids(user_id).await;

        let scored = score_candidates(
            &candidates,
            &profile,
            &exclude,
            accessible.as_ref(),
            LibraryPolicy::InLibraryOnly,
            filters,
            limit,
        );

        let recommendations = self.finalize(user_id, scored, RecMode::Tonight, &profile);

        tracing::info!(
            user_id = %user_id,
            mode = "tonight",
            count = recommendations.len(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// "Worth Grabbing": recommend content missing from the library
    ///
    /// Inverted library policy, larger over-fetch, and no cold-start
    /// fallback: with nothing to personalize from, suggesting acquisitions
    /// would be noise.
    pub async fn recommend_grab(
        &self,
        user_id: UserId,
        limit: usize,
        filters: &RecFilters,
    ) -> EngineResult<Vec<Recommendation>> {
        let now = Utc::now();

        let profile = self
            .profiler
            .build_profile(user_id, PROFILE_DEPTH_MONTHS, None, now)
            .await?;
        if profile.is_cold() {
            return Ok(Vec::new());
        }

        let refs = self
            .profiler
            .taste_vector_refs(user_id, PROFILE_DEPTH_MONTHS, None, now)
            .await?;
        let Some(taste_vector) = self.retriever.taste_vector(&refs).await else {
            return Ok(Vec::new());
        };

        let overfetch = (limit * GRAB_OVERFETCH).min(GRAB_OVERFETCH_CAP);
        let candidates = self.retriever.retrieve(&taste_vector, overfetch).await;

        let exclude = self.watched_ids(user_id).await?;
        let accessible = self.accessible_ids(user_id).await;

        let scored = score_candidates(
            &candidates,
            &profile,
            &exclude,
            accessible.as_ref(),
            LibraryPolicy::OutOfLibraryOnly,
            filters,
            limit,
        );

        let recommendations = self.finalize(user_id, scored, RecMode::Grab, &profile);

        tracing::info!(
            user_id = %user_id,
            mode = "grab",
            count = recommendations.len(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// "Rediscover": suggest rewatching previously loved content
    ///
    /// No retrieval step at all: candidates come straight from watch history,
    /// gated on completion, age and recomputed raw signal, ranked by how much
    /// the user loved them.
    pub async fn recommend_rediscover(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> EngineResult<Vec<Recommendation>> {
        let now = Utc::now();
        let cutoff = now - Duration::days(REDISCOVER_MIN_AGE_DAYS);

        let records = self.history.watch_history(user_id, None, None).await?;

        let mut scored: Vec<ScoredCandidate> = Vec::new();
        for record in records {
            if record.completion_pct < REDISCOVER_MIN_COMPLETION {
                continue;
            }
            // Items watched recently are not ready for a rewatch yet
            if record.started_at.is_some_and(|watched| watched > cutoff) {
                continue;
            }

            // Raw signal, undecayed and without feedback: did they love it
            // when they watched it
            let signal = compute_signal(&record, None);
            if signal < REDISCOVER_MIN_SIGNAL {
                continue;
            }

            let Some(metadata) = self
                .metadata
                .metadata(record.content_id, record.media_type)
                .await?
            else {
                tracing::debug!(
                    content_id = %record.content_id,
                    "No metadata for rediscover candidate, skipping"
                );
                continue;
            };

            scored.push(ScoredCandidate {
                metadata,
                score: (signal / REDISCOVER_SCORE_DIVISOR).min(1.0),
                signals: ScoreSignals::Rediscover {
                    original_signal: signal,
                    last_watched: record.started_at,
                },
                in_library: true,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        let recommendations = self.finalize(user_id, scored, RecMode::Rediscover, &TasteProfile::empty());

        tracing::info!(
            user_id = %user_id,
            mode = "rediscover",
            count = recommendations.len(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    // ── Internal helpers ──────────────────────────────────────────

    /// Popularity-ranked fallback for users with no usable history
    async fn cold_start(
        &self,
        user_id: UserId,
        limit: usize,
        filters: &RecFilters,
    ) -> EngineResult<Vec<Recommendation>> {
        let items = match self.metadata.list_by_popularity(limit * COLD_START_OVERFETCH).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Cold-start popularity listing failed");
                return Ok(Vec::new());
            }
        };

        let mut recommendations = Vec::with_capacity(limit);
        for item in items {
            if !filters.matches(&item) {
                continue;
            }

            let rec = Recommendation::from_metadata(
                &item,
                COLD_START_SCORE,
                ScoreSignals::ColdStartPopularity,
                RecMode::Tonight,
                true,
                self.explainer.popularity_fixed(),
            );
            self.log_writer.enqueue(LogEntry::from_recommendation(user_id, &rec));
            recommendations.push(rec);

            if recommendations.len() >= limit {
                break;
            }
        }

        tracing::info!(
            user_id = %user_id,
            count = recommendations.len(),
            "Cold-start recommendations generated"
        );

        Ok(recommendations)
    }

    /// Attach explanations, build final records and queue log entries
    fn finalize(
        &self,
        user_id: UserId,
        scored: Vec<ScoredCandidate>,
        mode: RecMode,
        profile: &TasteProfile,
    ) -> Vec<Recommendation> {
        let mut rng = rand::rng();

        scored
            .into_iter()
            .map(|candidate| {
                let explanation = self.explainer.explain(&candidate, profile, &mut rng);
                let rec = Recommendation::from_metadata(
                    &candidate.metadata,
                    candidate.score,
                    candidate.signals.clone(),
                    mode,
                    candidate.in_library,
                    explanation,
                );
                self.log_writer.enqueue(LogEntry::from_recommendation(user_id, &rec));
                rec
            })
            .collect()
    }

    /// Ids the user has already watched past the completion threshold
    async fn watched_ids(&self, user_id: UserId) -> EngineResult<HashSet<ContentId>> {
        let records = self.history.watch_history(user_id, None, None).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.completion_pct >= WATCHED_COMPLETION_PCT)
            .map(|r| r.content_id)
            .collect())
    }

    /// Library-access set, degrading to unrestricted when the boundary fails
    async fn accessible_ids(&self, user_id: UserId) -> Option<HashSet<ContentId>> {
        match self.library.accessible_ids(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Library access lookup failed, treating as unrestricted");
                None
            }
        }
    }
}
