use thiserror::Error;

/// Engine-level errors
///
/// Most failure paths in this crate degrade to a defined fallback instead of
/// surfacing an error: missing data (no history, no embedding, unresolved
/// metadata) is handled by policy, and external-service failures collapse to
/// empty candidate sets or cold-start output. The variants below cover the
/// remaining cases where a caller genuinely needs to know something went wrong.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
