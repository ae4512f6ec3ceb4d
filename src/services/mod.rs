pub mod backfill;
pub mod explanations;
pub mod log_writer;
pub mod profiler;
pub mod recommender;
pub mod retrieval;
pub mod scoring;
pub mod signal;

pub use backfill::{BackfillReport, EmbeddingBackfill};
pub use explanations::ExplanationEngine;
pub use log_writer::{LogWriterHandle, RecommendationLogWriter};
pub use profiler::TasteProfiler;
pub use recommender::RecommendationEngine;
pub use retrieval::{Candidate, CandidateRetriever};
pub use scoring::LibraryPolicy;
