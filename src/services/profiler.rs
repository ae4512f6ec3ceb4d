/// Taste profiler
///
/// Folds a user's watch history into a [`TasteProfile`]: genre, personnel and
/// keyword affinities in [-1, 1], an anti-profile of active dislikes, and
/// descriptive stats. Aggregation and normalization are pure functions over an
/// immutable snapshot of (history, feedback, overrides); the async surface
/// only fetches that snapshot from the providers.
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::{
    error::EngineResult,
    models::{
        AntiProfile, ContentId, ContentMetadata, EmbeddingRef, FeedbackPolarity,
        InfluenceOverride, MediaType, OverrideAction, OverrideTarget, ProfileStats, TasteProfile,
        UserId, WatchRecord,
    },
    providers::{FeedbackStore, HistoryProvider, MetadataCache},
    services::signal::{compute_signal, temporal_decay},
};

/// Keywords per watched item that receive signal
const KEYWORDS_PER_ITEM: usize = 10;
/// Keyword signal is diluted relative to genre signal
const KEYWORD_WEIGHT: f64 = 0.5;
/// Top-billed cast members that receive signal
const TOP_BILLED_CAST: usize = 3;
/// Cast signal relative to director signal
const CAST_WEIGHT: f64 = 0.3;

const PERSONNEL_LIMIT: usize = 50;
const KEYWORD_LIMIT: usize = 30;
const ANTI_KEYWORD_LIMIT: usize = 15;

/// Genres below this final affinity land in the anti-profile
const ANTI_GENRE_THRESHOLD: f64 = -0.3;

const DEFAULT_OVERRIDE_MAGNITUDE: f64 = 0.3;

/// Taste-vector entries are capped for query performance
const TASTE_VECTOR_CAP: usize = 100;

/// A watch record joined with its resolved metadata
#[derive(Debug, Clone)]
pub struct EnrichedWatch {
    pub record: WatchRecord,
    pub metadata: ContentMetadata,
}

pub struct TasteProfiler {
    history: Arc<dyn HistoryProvider>,
    metadata: Arc<dyn MetadataCache>,
    feedback: Arc<dyn FeedbackStore>,
}

impl TasteProfiler {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        metadata: Arc<dyn MetadataCache>,
        feedback: Arc<dyn FeedbackStore>,
    ) -> Self {
        Self {
            history,
            metadata,
            feedback,
        }
    }

    /// Build the complete taste profile for a user
    ///
    /// `depth_months` bounds the history window (0 = all time); `domain`
    /// restricts it to one media type. `now` is passed in rather than sampled
    /// so identical inputs always produce identical profiles.
    pub async fn build_profile(
        &self,
        user_id: UserId,
        depth_months: u32,
        domain: Option<MediaType>,
        now: DateTime<Utc>,
    ) -> EngineResult<TasteProfile> {
        let watches = self.enriched_history(user_id, depth_months, domain, now).await?;
        if watches.is_empty() {
            return Ok(TasteProfile::empty());
        }

        let feedback = self.feedback.feedback(user_id).await?;
        let overrides = self.feedback.overrides(user_id).await?;

        let profile = aggregate_profile(&watches, &feedback, &overrides, now);

        tracing::info!(
            user_id = %user_id,
            watches = profile.stats.total_watches,
            genres = profile.genre_affinity.len(),
            anti_genres = profile.anti_profile.genres.len(),
            "Built taste profile"
        );

        Ok(profile)
    }

    /// Weighted embedding refs for the user's positively-signaled watches
    ///
    /// Returned unresolved (the retriever turns refs into vectors), sorted by
    /// weight descending and capped at 100 entries.
    pub async fn taste_vector_refs(
        &self,
        user_id: UserId,
        depth_months: u32,
        domain: Option<MediaType>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<(EmbeddingRef, f64)>> {
        let watches = self.enriched_history(user_id, depth_months, domain, now).await?;
        if watches.is_empty() {
            return Ok(Vec::new());
        }

        let feedback = self.feedback.feedback(user_id).await?;
        Ok(collect_taste_vector_refs(&watches, &feedback, now))
    }

    /// Fetch the watch window and join each record with its metadata.
    /// Records whose metadata cannot be resolved are skipped.
    pub(crate) async fn enriched_history(
        &self,
        user_id: UserId,
        depth_months: u32,
        domain: Option<MediaType>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<EnrichedWatch>> {
        let since = (depth_months > 0).then(|| now - Duration::days(depth_months as i64 * 30));
        let records = self.history.watch_history(user_id, since, domain).await?;

        let mut watches = Vec::with_capacity(records.len());
        for record in records {
            match self.metadata.metadata(record.content_id, record.media_type).await? {
                Some(metadata) => watches.push(EnrichedWatch { record, metadata }),
                None => {
                    tracing::debug!(
                        content_id = %record.content_id,
                        "No metadata for watched item, skipping"
                    );
                }
            }
        }

        Ok(watches)
    }
}

/// Accumulator map with default-zero semantics
#[derive(Debug, Default)]
struct Pool(BTreeMap<String, f64>);

impl Pool {
    fn add(&mut self, key: &str, amount: f64) {
        *self.0.entry(key.to_string()).or_insert(0.0) += amount;
    }

    fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    /// Largest absolute accumulated value, floored at 1.0 so it is always a
    /// safe denominator
    fn max_abs(&self) -> f64 {
        self.0.values().fold(1.0_f64, |max, v| max.max(v.abs()))
    }
}

/// Pure aggregation pass: signals -> pools -> normalization -> overrides ->
/// anti-profile. Deterministic for identical inputs.
pub(crate) fn aggregate_profile(
    watches: &[EnrichedWatch],
    feedback: &HashMap<ContentId, FeedbackPolarity>,
    overrides: &[InfluenceOverride],
    now: DateTime<Utc>,
) -> TasteProfile {
    let mut genre_pool = Pool::default();
    let mut anti_genre_pool = Pool::default();
    let mut keyword_pool = Pool::default();
    let mut anti_keyword_pool = Pool::default();
    let mut personnel_pool = Pool::default();

    let mut total_signal = 0.0;
    let mut total_completion = 0.0;

    for watch in watches {
        let record = &watch.record;
        let meta = &watch.metadata;

        let fb = feedback.get(&record.content_id).copied();
        let weighted = compute_signal(record, fb) * temporal_decay(record.started_at, now);

        total_signal += weighted.abs();
        total_completion += record.completion_pct;

        for genre in &meta.genres {
            if weighted > 0.0 {
                genre_pool.add(genre, weighted);
            } else {
                anti_genre_pool.add(genre, weighted.abs());
            }
        }

        for keyword in meta.keywords.iter().take(KEYWORDS_PER_ITEM) {
            if weighted > 0.0 {
                keyword_pool.add(keyword, weighted * KEYWORD_WEIGHT);
            } else {
                anti_keyword_pool.add(keyword, weighted.abs() * KEYWORD_WEIGHT);
            }
        }

        for director in meta.directors() {
            personnel_pool.add(director, weighted);
        }
        for actor in meta.top_billed(TOP_BILLED_CAST) {
            personnel_pool.add(actor, weighted * CAST_WEIGHT);
        }
    }

    // Genre affinity: shared denominator across the positive and anti pools
    // so the two sides stay comparable
    let genre_max = genre_pool.max_abs().max(anti_genre_pool.max_abs());
    let mut genre_affinity: BTreeMap<String, f64> = BTreeMap::new();
    for genre in genre_pool.0.keys().chain(anti_genre_pool.0.keys()) {
        let value = (genre_pool.get(genre) - anti_genre_pool.get(genre)) / genre_max;
        genre_affinity.insert(genre.clone(), round3(value));
    }

    let personnel_affinity = normalize_top(&personnel_pool, PERSONNEL_LIMIT);
    let mut keyword_affinity = normalize_top(&keyword_pool, KEYWORD_LIMIT);

    apply_overrides(&mut genre_affinity, overrides, OverrideTarget::Genre);
    apply_overrides(&mut keyword_affinity, overrides, OverrideTarget::Keyword);

    let anti_profile = AntiProfile {
        genres: genre_affinity
            .iter()
            .filter(|(_, &v)| v < ANTI_GENRE_THRESHOLD)
            .map(|(g, _)| g.clone())
            .collect(),
        keywords: top_by_weight(&anti_keyword_pool, ANTI_KEYWORD_LIMIT),
    };

    let total_watches = watches.len();
    let avg_completion = if total_watches > 0 {
        total_completion / total_watches as f64
    } else {
        0.0
    };

    TasteProfile {
        genre_affinity,
        personnel_affinity,
        keyword_affinity,
        anti_profile,
        stats: ProfileStats {
            total_watches,
            avg_completion: round1(avg_completion),
            total_signal_strength: round1(total_signal),
        },
    }
}

/// Positive-weight watches with an embedding ref, heaviest first
pub(crate) fn collect_taste_vector_refs(
    watches: &[EnrichedWatch],
    feedback: &HashMap<ContentId, FeedbackPolarity>,
    now: DateTime<Utc>,
) -> Vec<(EmbeddingRef, f64)> {
    let mut refs: Vec<(EmbeddingRef, f64)> = watches
        .iter()
        .filter_map(|watch| {
            let embedding_ref = watch.metadata.embedding_ref.clone()?;
            let fb = feedback.get(&watch.record.content_id).copied();
            let weight =
                compute_signal(&watch.record, fb) * temporal_decay(watch.record.started_at, now);
            (weight > 0.0).then_some((embedding_ref, weight))
        })
        .collect();

    refs.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    refs.truncate(TASTE_VECTOR_CAP);
    refs
}

/// Normalize a signed pool by its own max-abs and keep the top `limit`
/// entries by magnitude
fn normalize_top(pool: &Pool, limit: usize) -> BTreeMap<String, f64> {
    let max = pool.max_abs();

    let mut entries: Vec<(&String, f64)> = pool.0.iter().map(|(k, &v)| (k, v)).collect();
    entries.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    entries
        .into_iter()
        .take(limit)
        .map(|(k, v)| (k.clone(), round3(v / max)))
        .collect()
}

/// Top `limit` pool keys by accumulated weight, positive weights only
fn top_by_weight(pool: &Pool, limit: usize) -> std::collections::BTreeSet<String> {
    let mut entries: Vec<(&String, f64)> = pool.0.iter().map(|(k, &v)| (k, v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    entries
        .into_iter()
        .take(limit)
        .filter(|(_, v)| *v > 0.0)
        .map(|(k, _)| k.clone())
        .collect()
}

/// Final adjustment pass over computed affinities
///
/// Boost and suppress shift existing values within [-1, 1] and skip targets
/// the profile never saw; block pins the target at -1.0, inserting it if
/// needed so it always reaches the anti-profile.
fn apply_overrides(
    affinities: &mut BTreeMap<String, f64>,
    overrides: &[InfluenceOverride],
    target: OverrideTarget,
) {
    for ov in overrides.iter().filter(|o| o.target_type == target) {
        let magnitude = ov.magnitude.unwrap_or(DEFAULT_OVERRIDE_MAGNITUDE);
        match ov.action {
            OverrideAction::Boost => {
                if let Some(value) = affinities.get_mut(&ov.target_key) {
                    *value = (*value + magnitude).min(1.0);
                }
            }
            OverrideAction::Suppress => {
                if let Some(value) = affinities.get_mut(&ov.target_key) {
                    *value = (*value - magnitude).max(-1.0);
                }
            }
            OverrideAction::Block => {
                affinities.insert(ov.target_key.clone(), -1.0);
            }
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
