/// Ollama-backed embedding generator
///
/// Uses the `/api/embed` endpoint, which accepts either a single string or a
/// list and always answers with a list of vectors.
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::{
    error::{EngineError, EngineResult},
    providers::Embedder,
};

pub struct OllamaEmbedder {
    http_client: HttpClient,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> EngineResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn call_embed(&self, input: serde_json::Value) -> EngineResult<Vec<Vec<f32>>> {
        let response = self
            .http_client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({
                "model": self.model,
                "input": input,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalService(format!(
                "Embedder returned status {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let embeddings = self.call_embed(json!(text)).await?;
        embeddings.into_iter().next().ok_or_else(|| {
            EngineError::ExternalService("Embedder returned no vector".to_string())
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.call_embed(json!(texts)).await?;

        if embeddings.len() != texts.len() {
            return Err(EngineError::ExternalService(format!(
                "Embedder returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }
}
