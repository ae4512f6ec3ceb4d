//! Taste-profiling and recommendation-scoring engine.
//!
//! Converts a user's watch history into a quantitative preference model,
//! combines it with embedding-based similarity search, and produces ranked,
//! explained recommendations in three modes: `tonight` (in-library), `grab`
//! (worth acquiring) and `rediscover` (rewatch suggestions).
//!
//! This is a library boundary, not a network-facing service: transport,
//! persistence and the media-server integrations live in the host
//! application and reach the engine through the traits in [`providers`].

pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use models::{RecFilters, RecMode, Recommendation, TasteProfile};
pub use services::{EmbeddingBackfill, RecommendationEngine, RecommendationLogWriter};
