/// Scoring pipeline
///
/// Filters and scores retrieved candidates against a taste profile and
/// user-supplied constraints. Pure: no I/O, no clock, no randomness, so every
/// property of the ranking can be asserted directly.
use std::collections::HashSet;

use crate::{
    models::{ContentId, ContentMetadata, RecFilters, ScoreSignals, TasteProfile},
    services::retrieval::Candidate,
};

pub const SIMILARITY_WEIGHT: f64 = 0.6;
pub const GENRE_BOOST_WEIGHT: f64 = 0.25;
pub const POPULARITY_WEIGHT: f64 = 0.05;
pub const ANTI_PENALTY_WEIGHT: f64 = 0.10;

const ANTI_GENRE_PENALTY: f64 = 0.3;
const ANTI_KEYWORD_PENALTY: f64 = 0.1;

/// Library-membership filter applied per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryPolicy {
    /// Only candidates in the user's library ("tonight")
    InLibraryOnly,
    /// Only candidates missing from the library ("grab")
    OutOfLibraryOnly,
}

/// A scored candidate, carrying its metadata forward for explanation
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub metadata: ContentMetadata,
    pub score: f64,
    pub signals: ScoreSignals,
    pub in_library: bool,
}

/// Score, filter and rank candidates
///
/// Already-watched ids are dropped before scoring; the library policy decides
/// membership; user filters run as a hard predicate after scoring; the final
/// ranking is a stable descending sort truncated to `limit`, so equal scores
/// keep their retrieval order.
pub fn score_candidates(
    candidates: &[Candidate],
    profile: &TasteProfile,
    exclude_ids: &HashSet<ContentId>,
    accessible_ids: Option<&HashSet<ContentId>>,
    policy: LibraryPolicy,
    filters: &RecFilters,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = Vec::new();

    for candidate in candidates {
        if exclude_ids.contains(&candidate.content_id) {
            continue;
        }

        // No library mapping means everything counts as in-library
        let in_library =
            accessible_ids.map_or(true, |ids| ids.contains(&candidate.content_id));
        match policy {
            LibraryPolicy::InLibraryOnly if !in_library => continue,
            LibraryPolicy::OutOfLibraryOnly if in_library => continue,
            _ => {}
        }

        let meta = &candidate.metadata;
        let genre_boost = genre_boost(meta, profile);
        let anti_penalty = anti_penalty(meta, profile);
        let popularity_factor = meta.rating.map_or(0.0, |r| r / 100.0);

        let score = SIMILARITY_WEIGHT * candidate.similarity
            + GENRE_BOOST_WEIGHT * genre_boost
            + POPULARITY_WEIGHT * popularity_factor
            - ANTI_PENALTY_WEIGHT * anti_penalty;
        let score = round4(score.clamp(0.0, 1.0));

        if !filters.matches(meta) {
            continue;
        }

        scored.push(ScoredCandidate {
            metadata: meta.clone(),
            score,
            signals: ScoreSignals::Retrieval {
                similarity: round4(candidate.similarity),
                genre_boost: round4(genre_boost),
                anti_penalty: round4(anti_penalty),
                popularity_factor: round4(popularity_factor),
            },
            in_library,
        });
    }

    // Stable: ties keep their retrieval order
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// Mean affinity across the candidate's genres, zero when nothing matches
fn genre_boost(meta: &ContentMetadata, profile: &TasteProfile) -> f64 {
    if meta.genres.is_empty() || profile.genre_affinity.is_empty() {
        return 0.0;
    }

    let sum: f64 = meta
        .genres
        .iter()
        .map(|g| profile.genre_affinity.get(g).copied().unwrap_or(0.0))
        .sum();
    sum / meta.genres.len() as f64
}

/// Penalty for anti-profile matches, capped at 1.0
fn anti_penalty(meta: &ContentMetadata, profile: &TasteProfile) -> f64 {
    let anti = &profile.anti_profile;
    let mut penalty = 0.0;

    for genre in &meta.genres {
        if anti.genres.contains(genre) {
            penalty += ANTI_GENRE_PENALTY;
        }
    }
    for keyword in &meta.keywords {
        if anti.keywords.contains(keyword) {
            penalty += ANTI_KEYWORD_PENALTY;
        }
    }

    penalty.min(1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AntiProfile, MediaType, ProfileStats};
    use std::collections::{BTreeMap, BTreeSet};

    fn meta(id: u64, genres: &[&str], keywords: &[&str], rating: Option<f64>) -> ContentMetadata {
        ContentMetadata {
            content_id: ContentId(id),
            media_type: MediaType::Movie,
            title: format!("Title {}", id),
            year: Some(2015),
            genres: genres.iter().map(|g| g.to_string()).collect::<BTreeSet<_>>(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            cast: vec![],
            crew: vec![],
            popularity: None,
            rating,
            original_language: None,
            overview: None,
            embedding_ref: None,
        }
    }

    fn candidate(id: u64, similarity: f64, genres: &[&str]) -> Candidate {
        Candidate {
            content_id: ContentId(id),
            similarity,
            metadata: meta(id, genres, &[], Some(7.0)),
        }
    }

    fn profile(affinities: &[(&str, f64)], anti_genres: &[&str]) -> TasteProfile {
        TasteProfile {
            genre_affinity: affinities
                .iter()
                .map(|(g, v)| (g.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            personnel_affinity: BTreeMap::new(),
            keyword_affinity: BTreeMap::new(),
            anti_profile: AntiProfile {
                genres: anti_genres.iter().map(|g| g.to_string()).collect(),
                keywords: BTreeSet::new(),
            },
            stats: ProfileStats {
                total_watches: 10,
                avg_completion: 80.0,
                total_signal_strength: 40.0,
            },
        }
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let p = profile(&[("Action", 1.0)], &[]);
        let candidates = vec![candidate(1, 1.0, &["Action"])];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert!(scored[0].score <= 1.0);
        assert!(scored[0].score >= 0.0);
    }

    #[test]
    fn test_score_clamped_at_zero_under_heavy_penalty() {
        let p = profile(&[("Horror", -1.0)], &["Horror", "Slasher", "Gore", "Found Footage"]);
        let candidates = vec![Candidate {
            content_id: ContentId(1),
            similarity: 0.0,
            metadata: meta(1, &["Horror", "Slasher", "Gore", "Found Footage"], &[], None),
        }];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert_eq!(scored[0].score, 0.0);
    }

    #[test]
    fn test_score_formula() {
        let p = profile(&[("Action", 0.8)], &[]);
        let candidates = vec![candidate(1, 0.5, &["Action"])];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        // 0.6*0.5 + 0.25*0.8 + 0.05*0.07 - 0
        let expected = 0.3 + 0.2 + 0.0035;
        assert!((scored[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_ids_dropped_before_scoring() {
        let p = profile(&[], &[]);
        let candidates = vec![candidate(1, 0.9, &[]), candidate(2, 0.8, &[])];
        let exclude = HashSet::from([ContentId(1)]);
        let scored = score_candidates(
            &candidates,
            &p,
            &exclude,
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].metadata.content_id, ContentId(2));
    }

    #[test]
    fn test_library_policy_in_library_only() {
        let p = profile(&[], &[]);
        let candidates = vec![candidate(1, 0.9, &[]), candidate(2, 0.8, &[])];
        let accessible = HashSet::from([ContentId(2)]);
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            Some(&accessible),
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].metadata.content_id, ContentId(2));
        assert!(scored[0].in_library);
    }

    #[test]
    fn test_library_policy_out_of_library_only() {
        let p = profile(&[], &[]);
        let candidates = vec![candidate(1, 0.9, &[]), candidate(2, 0.8, &[])];
        let accessible = HashSet::from([ContentId(2)]);
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            Some(&accessible),
            LibraryPolicy::OutOfLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].metadata.content_id, ContentId(1));
        assert!(!scored[0].in_library);
    }

    #[test]
    fn test_no_library_mapping_means_everything_in_library() {
        let p = profile(&[], &[]);
        let candidates = vec![candidate(1, 0.9, &[])];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        assert_eq!(scored.len(), 1);
        assert!(scored[0].in_library);
    }

    #[test]
    fn test_stable_order_for_equal_scores() {
        let p = profile(&[], &[]);
        // Identical similarity and genres: identical scores
        let candidates = vec![
            candidate(10, 0.5, &["Drama"]),
            candidate(20, 0.5, &["Drama"]),
            candidate(30, 0.5, &["Drama"]),
        ];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        let ids: Vec<u64> = scored.iter().map(|s| s.metadata.content_id.0).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_ranking_descends_by_score() {
        let p = profile(&[], &[]);
        let candidates = vec![
            candidate(1, 0.2, &[]),
            candidate(2, 0.9, &[]),
            candidate(3, 0.5, &[]),
        ];
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &RecFilters::default(),
            10,
        );
        let ids: Vec<u64> = scored.iter().map(|s| s.metadata.content_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_filters_applied_before_truncation() {
        let p = profile(&[], &[]);
        // Highest-similarity candidate fails the filter; limit of 1 must
        // still return the best passing candidate
        let candidates = vec![candidate(1, 0.9, &["Horror"]), candidate(2, 0.3, &["Drama"])];
        let filters = RecFilters {
            exclude_genres: Some(vec!["Horror".to_string()]),
            ..Default::default()
        };
        let scored = score_candidates(
            &candidates,
            &p,
            &HashSet::new(),
            None,
            LibraryPolicy::InLibraryOnly,
            &filters,
            1,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].metadata.content_id, ContentId(2));
    }

    #[test]
    fn test_anti_penalty_caps_at_one() {
        let p = TasteProfile {
            anti_profile: AntiProfile {
                genres: (0..5).map(|i| format!("G{}", i)).collect(),
                keywords: BTreeSet::new(),
            },
            ..TasteProfile::empty()
        };
        let genres: Vec<String> = (0..5).map(|i| format!("G{}", i)).collect();
        let genre_refs: Vec<&str> = genres.iter().map(|s| s.as_str()).collect();
        // 5 anti-genre matches would be 1.5 uncapped
        assert_eq!(anti_penalty(&meta(1, &genre_refs, &[], None), &p), 1.0);
    }

    #[test]
    fn test_genre_boost_mean_includes_unmatched_genres() {
        let p = profile(&[("Action", 0.9)], &[]);
        let m = meta(1, &["Action", "Comedy"], &[], None);
        // Unmatched genres dilute the mean rather than being ignored
        assert!((genre_boost(&m, &p) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_genre_boost_zero_without_genres() {
        let p = profile(&[("Action", 0.9)], &[]);
        assert_eq!(genre_boost(&meta(1, &[], &[], None), &p), 0.0);
    }
}
