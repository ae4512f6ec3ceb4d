/// Explanation engine
///
/// Template-based "Because you..." explanations, no LLM involved. The category
/// ladder is a pure function so tests can pin down which rule fired; only the
/// phrasing choice within a category consumes randomness, and the `Rng` is
/// injected by the caller.
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{
    models::{ContentMetadata, ScoreSignals, TasteProfile},
    services::scoring::ScoredCandidate,
};

/// Minimum affinity for a credited person to count as a match at all
const PERSONNEL_MATCH_THRESHOLD: f64 = 0.4;
/// Minimum affinity for the dedicated personnel templates
const PERSONNEL_DOMINANT_THRESHOLD: f64 = 0.5;
const MULTI_SIGNAL_GENRE_THRESHOLD: f64 = 0.2;
const GENRE_MATCH_THRESHOLD: f64 = 0.15;
const THEME_MATCH_THRESHOLD: f64 = 0.3;
const SIMILARITY_THRESHOLD: f64 = 0.6;

const THEME_MATCH_LIMIT: usize = 3;

struct TemplateSet {
    genre_match: &'static [&'static str],
    director_match: &'static [&'static str],
    actor_match: &'static [&'static str],
    theme_match: &'static [&'static str],
    similar_vibe: &'static [&'static str],
    rediscover: &'static [&'static str],
    popular: &'static [&'static str],
    multi_signal: &'static [&'static str],
}

static TEMPLATES_EN: TemplateSet = TemplateSet {
    genre_match: &[
        "You've been on a {genre} streak lately — this fits right in.",
        "Strong match for your {genre} taste.",
        "Your {genre} history says you'll like this one.",
        "Picked for your love of {genre}.",
    ],
    director_match: &[
        "Directed by {name}, whose films you consistently finish.",
        "From {name}, whose work you clearly enjoy.",
        "Another {name} film — and you haven't seen this one yet.",
    ],
    actor_match: &[
        "Stars {name}, a reliable pick based on your history.",
        "Featuring {name} — you tend to finish their movies.",
        "{name} is in this, and that has worked out well for you before.",
    ],
    theme_match: &[
        "Shares themes with titles you've rated highly: {themes}.",
        "Thematically similar to your favorites — {themes}.",
        "If you liked the {themes} angle, this delivers more of that.",
    ],
    similar_vibe: &[
        "Similar vibe to titles you've loved recently.",
        "The DNA of this one closely matches your taste profile.",
        "Algorithmically, this is a strong match for your viewing patterns.",
    ],
    rediscover: &[
        "You loved this {time_ago} — time for a rewatch?",
        "Watched {time_ago} and finished it. Worth revisiting.",
        "A favorite from your history — it's been a while.",
    ],
    popular: &[
        "Popular on the server — give it a try!",
        "Highly rated and widely watched here.",
        "A crowd favorite — solid starting point.",
    ],
    multi_signal: &[
        "Matches your {genre} taste, and features {name}.",
        "Strong {genre} match from {name} — right up your alley.",
    ],
};

static TEMPLATES_DE: TemplateSet = TemplateSet {
    genre_match: &[
        "Du hattest zuletzt einen {genre}-Lauf — das passt perfekt.",
        "Starke Übereinstimmung mit deinem {genre}-Geschmack.",
        "Basierend auf deiner {genre}-History sollte dir das gefallen.",
    ],
    director_match: &[
        "Regie: {name} — dessen Filme schaust du zu Ende.",
        "Von {name}, dessen Arbeit dir gefällt.",
    ],
    actor_match: &[
        "Mit {name} — basierend auf deiner History ein guter Tipp.",
    ],
    theme_match: &[
        "Thematisch ähnlich zu deinen Favoriten: {themes}.",
    ],
    similar_vibe: &[
        "Ähnliche Stimmung wie Titel, die dir gefallen haben.",
    ],
    rediscover: &[
        "Das hat dir {time_ago} gefallen — Zeit für ein Rewatch?",
    ],
    popular: &[
        "Beliebt auf dem Server — probier's mal!",
    ],
    multi_signal: &[
        "Passt zu deinem {genre}-Geschmack und hat {name} dabei.",
    ],
};

/// Which rule of the explanation ladder fired
#[derive(Debug, Clone, PartialEq)]
pub enum Category {
    Popular,
    MultiSignal { genre: String, name: String },
    DirectorMatch { name: String },
    ActorMatch { name: String },
    GenreMatch { genre: String },
    ThemeMatch { themes: String },
    SimilarVibe {
        /// True when no other rule fired and similarity itself is weak; the
        /// ladder has no better answer here
        weak_fallback: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct PersonnelMatch {
    name: String,
    affinity: f64,
    is_director: bool,
}

pub struct ExplanationEngine {
    templates: &'static TemplateSet,
}

impl ExplanationEngine {
    /// Engine for a language code; unrecognized codes fall back to English
    pub fn new(language: &str) -> Self {
        let templates = match language {
            "de" => &TEMPLATES_DE,
            _ => &TEMPLATES_EN,
        };
        Self { templates }
    }

    /// Explanation for a retrieval- or cold-start-scored candidate
    pub fn explain<R: Rng>(
        &self,
        candidate: &ScoredCandidate,
        profile: &TasteProfile,
        rng: &mut R,
    ) -> String {
        let category = match &candidate.signals {
            ScoreSignals::ColdStartPopularity => Category::Popular,
            ScoreSignals::Retrieval {
                similarity,
                genre_boost,
                ..
            } => select_category(*similarity, *genre_boost, &candidate.metadata, profile),
            ScoreSignals::Rediscover { last_watched, .. } => {
                return self.explain_rediscover(*last_watched, Utc::now(), rng);
            }
        };

        if let Category::SimilarVibe { weak_fallback: true } = category {
            tracing::debug!(
                content_id = %candidate.metadata.content_id,
                "No explanation rule fired; falling back to similarity phrasing"
            );
        }

        self.render(&category, rng)
    }

    /// Fixed phrasing used for cold-start batches
    pub fn popularity_fixed(&self) -> String {
        self.templates.popular[0].to_string()
    }

    /// Rediscover-mode explanation, keyed only by elapsed time
    pub fn explain_rediscover<R: Rng>(
        &self,
        last_watched: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> String {
        let time_ago = match last_watched {
            Some(watched) => {
                let days = (now - watched).num_days();
                if days > 365 {
                    let years = days / 365;
                    if days > 730 {
                        format!("{} years ago", years)
                    } else {
                        format!("{} year ago", years)
                    }
                } else if days > 30 {
                    format!("{} months ago", days / 30)
                } else {
                    "recently".to_string()
                }
            }
            None => "a while back".to_string(),
        };

        self.pick(self.templates.rediscover, rng)
            .replace("{time_ago}", &time_ago)
    }

    fn render<R: Rng>(&self, category: &Category, rng: &mut R) -> String {
        match category {
            Category::Popular => self.pick(self.templates.popular, rng).to_string(),
            Category::MultiSignal { genre, name } => self
                .pick(self.templates.multi_signal, rng)
                .replace("{genre}", genre)
                .replace("{name}", name),
            Category::DirectorMatch { name } => self
                .pick(self.templates.director_match, rng)
                .replace("{name}", name),
            Category::ActorMatch { name } => self
                .pick(self.templates.actor_match, rng)
                .replace("{name}", name),
            Category::GenreMatch { genre } => self
                .pick(self.templates.genre_match, rng)
                .replace("{genre}", genre),
            Category::ThemeMatch { themes } => self
                .pick(self.templates.theme_match, rng)
                .replace("{themes}", themes),
            Category::SimilarVibe { .. } => self.pick(self.templates.similar_vibe, rng).to_string(),
        }
    }

    fn pick<'a, R: Rng>(&self, templates: &'a [&'static str], rng: &mut R) -> &'a str {
        templates[rng.random_range(0..templates.len())]
    }
}

/// The decision ladder: first match wins
pub fn select_category(
    similarity: f64,
    genre_boost: f64,
    meta: &ContentMetadata,
    profile: &TasteProfile,
) -> Category {
    let personnel = find_personnel_match(meta, profile);
    let themes = find_theme_match(meta, profile);

    if genre_boost > MULTI_SIGNAL_GENRE_THRESHOLD {
        if let Some(person) = &personnel {
            return Category::MultiSignal {
                genre: top_matching_genre(meta, profile),
                name: person.name.clone(),
            };
        }
    }

    if let Some(person) = &personnel {
        if person.affinity > PERSONNEL_DOMINANT_THRESHOLD {
            return if person.is_director {
                Category::DirectorMatch {
                    name: person.name.clone(),
                }
            } else {
                Category::ActorMatch {
                    name: person.name.clone(),
                }
            };
        }
    }

    if genre_boost > GENRE_MATCH_THRESHOLD {
        return Category::GenreMatch {
            genre: top_matching_genre(meta, profile),
        };
    }

    if let Some(themes) = themes {
        return Category::ThemeMatch { themes };
    }

    Category::SimilarVibe {
        weak_fallback: similarity <= SIMILARITY_THRESHOLD,
    }
}

/// Best credited person the profile has a strong affinity for
fn find_personnel_match(meta: &ContentMetadata, profile: &TasteProfile) -> Option<PersonnelMatch> {
    if profile.personnel_affinity.is_empty() {
        return None;
    }

    let mut best: Option<PersonnelMatch> = None;
    let credited = meta
        .directors()
        .map(|name| (name, true))
        .chain(meta.cast.iter().map(|c| (c.name.as_str(), false)));

    for (name, is_director) in credited {
        let Some(&affinity) = profile.personnel_affinity.get(name) else {
            continue;
        };
        if affinity <= PERSONNEL_MATCH_THRESHOLD {
            continue;
        }
        if best.as_ref().map_or(true, |b| affinity > b.affinity) {
            best = Some(PersonnelMatch {
                name: name.to_string(),
                affinity,
                is_director,
            });
        }
    }

    best
}

/// Candidate keywords the profile is keen on, joined for display
fn find_theme_match(meta: &ContentMetadata, profile: &TasteProfile) -> Option<String> {
    if profile.keyword_affinity.is_empty() {
        return None;
    }

    let matching: Vec<&str> = meta
        .keywords
        .iter()
        .filter(|kw| {
            profile
                .keyword_affinity
                .get(kw.as_str())
                .is_some_and(|&v| v > THEME_MATCH_THRESHOLD)
        })
        .take(THEME_MATCH_LIMIT)
        .map(|kw| kw.as_str())
        .collect();

    if matching.is_empty() {
        None
    } else {
        Some(matching.join(", "))
    }
}

/// The candidate genre the user has the highest affinity for
fn top_matching_genre(meta: &ContentMetadata, profile: &TasteProfile) -> String {
    meta.genres
        .iter()
        .max_by(|a, b| {
            let av = profile.genre_affinity.get(*a).copied().unwrap_or(0.0);
            let bv = profile.genre_affinity.get(*b).copied().unwrap_or(0.0);
            av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .unwrap_or_else(|| "this genre".to_string())
}
