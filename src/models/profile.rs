use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Genres and keywords the user's history indicates active dislike for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiProfile {
    pub genres: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

/// Descriptive statistics over the profiled watch window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub total_watches: usize,
    /// Mean completion percentage across the window, 0-100
    pub avg_completion: f64,
    /// Sum of absolute weighted signals; a rough measure of how much
    /// evidence the profile rests on
    pub total_signal_strength: f64,
}

/// A user's quantitative preference model
///
/// Recomputed on demand from watch history, feedback and overrides; never
/// cached across requests inside the engine. All affinity values lie in
/// [-1, 1]. `total_watches == 0` is the cold-start marker the orchestrator
/// keys off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub genre_affinity: BTreeMap<String, f64>,
    /// Top 50 cast/crew names by affinity magnitude
    pub personnel_affinity: BTreeMap<String, f64>,
    /// Top 30 keywords by affinity magnitude
    pub keyword_affinity: BTreeMap<String, f64>,
    pub anti_profile: AntiProfile,
    pub stats: ProfileStats,
}

impl TasteProfile {
    /// Profile for a user with no usable history
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there is no history to personalize from
    pub fn is_cold(&self) -> bool {
        self.stats.total_watches == 0
    }
}
