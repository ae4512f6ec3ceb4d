use serde::Deserialize;

/// Engine configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Vector store (ChromaDB) base URL
    #[serde(default = "default_vector_store_url")]
    pub vector_store_url: String,

    /// Embedding generator (Ollama) base URL
    #[serde(default = "default_embedder_url")]
    pub embedder_url: String,

    /// Vector store collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Timeout for external similarity/embedding calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Language code for explanation templates ("en", "de", ...)
    #[serde(default = "default_explanation_language")]
    pub explanation_language: String,

    /// Items per embedding batch during backfill
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Delay between embedding batches, in milliseconds
    #[serde(default = "default_embed_batch_delay_ms")]
    pub embed_batch_delay_ms: u64,
}

fn default_vector_store_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_embedder_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_collection_name() -> String {
    "media_library".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_explanation_language() -> String {
    "en".to_string()
}

fn default_embed_batch_size() -> usize {
    20
}

fn default_embed_batch_delay_ms() -> u64 {
    250
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_store_url: default_vector_store_url(),
            embedder_url: default_embedder_url(),
            collection_name: default_collection_name(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
            explanation_language: default_explanation_language(),
            embed_batch_size: default_embed_batch_size(),
            embed_batch_delay_ms: default_embed_batch_delay_ms(),
        }
    }
}
