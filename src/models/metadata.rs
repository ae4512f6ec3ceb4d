use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ContentId, EmbeddingRef, MediaType};

/// A credited cast member, ordered by billing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub billing_order: u32,
}

/// A credited crew member with their role ("Director", "Writer", ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub role: String,
}

/// Typed metadata record for one content item
///
/// Owned by the external metadata cache; validated once at that boundary and
/// treated as immutable for the duration of a request. Absent values are
/// explicit `Option`s rather than re-interpreted downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub content_id: ContentId,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<i32>,
    pub genres: BTreeSet<String>,
    pub keywords: Vec<String>,
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
    pub popularity: Option<f64>,
    /// Aggregate audience rating, 0-10
    pub rating: Option<f64>,
    pub original_language: Option<String>,
    pub overview: Option<String>,
    pub embedding_ref: Option<EmbeddingRef>,
}

impl ContentMetadata {
    /// Names of credited directors
    pub fn directors(&self) -> impl Iterator<Item = &str> {
        self.crew
            .iter()
            .filter(|c| c.role == "Director")
            .map(|c| c.name.as_str())
    }

    /// Names of the top `n` billed cast members
    pub fn top_billed(&self, n: usize) -> impl Iterator<Item = &str> {
        let mut cast: Vec<&CastMember> = self.cast.iter().collect();
        cast.sort_by_key(|c| c.billing_order);
        cast.into_iter().take(n).map(|c| c.name.as_str())
    }
}
