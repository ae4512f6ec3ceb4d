/// ChromaDB-backed similarity index
///
/// Speaks the ChromaDB v2 REST API: collections are looked up (or created with
/// cosine space) once and the id is cached for the lifetime of the client.
/// Identifying metadata (content id, media type) is stored alongside each
/// vector so query hits can be resolved without a second round trip.
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::{
    error::{EngineError, EngineResult},
    models::{ContentId, EmbeddingRef, MediaType},
    providers::{IndexDocument, SimilarityHit, SimilarityIndex},
};

pub struct ChromaIndex {
    http_client: HttpClient,
    base_url: String,
    collection_name: String,
    collection_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct HitMetadata {
    content_id: Option<u64>,
    media_type: Option<MediaType>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<HitMetadata>>>>,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
}

impl ChromaIndex {
    pub fn new(base_url: &str, collection_name: &str, timeout: Duration) -> EngineResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection_name: collection_name.to_string(),
            collection_id: OnceCell::new(),
        })
    }

    fn v2_base(&self) -> String {
        format!(
            "{}/api/v2/tenants/default_tenant/databases/default_database",
            self.base_url
        )
    }

    /// Get or create the collection, caching its id
    async fn ensure_collection(&self) -> EngineResult<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| self.resolve_collection())
            .await?;
        Ok(id.as_str())
    }

    async fn resolve_collection(&self) -> EngineResult<String> {
        let v2_base = self.v2_base();

        // Look for an existing collection first
        let response = self
            .http_client
            .get(format!("{}/collections", v2_base))
            .send()
            .await?;

        if response.status().is_success() {
            let collections: Vec<CollectionInfo> = response.json().await?;
            if let Some(existing) = collections.into_iter().find(|c| c.name == self.collection_name)
            {
                return Ok(existing.id);
            }
        }

        // Create with cosine space so distances convert directly to similarity
        let response = self
            .http_client
            .post(format!("{}/collections", v2_base))
            .json(&json!({
                "name": self.collection_name,
                "configuration": { "hnsw": { "space": "cosine" } },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalService(format!(
                "Vector store returned status {} creating collection: {}",
                status, body
            )));
        }

        let created: CollectionInfo = response.json().await?;
        tracing::info!(
            collection = %created.name,
            collection_id = %created.id,
            "Created vector store collection"
        );
        Ok(created.id)
    }
}

#[async_trait]
impl SimilarityIndex for ChromaIndex {
    async fn upsert(&self, documents: Vec<IndexDocument>) -> EngineResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let collection_id = self.ensure_collection().await?;

        let ids: Vec<&str> = documents.iter().map(|d| d.embedding_ref.0.as_str()).collect();
        let embeddings: Vec<&[f32]> = documents.iter().map(|d| d.vector.as_slice()).collect();
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let metadatas: Vec<serde_json::Value> = documents
            .iter()
            .map(|d| {
                json!({
                    "content_id": d.content_id.0,
                    "media_type": d.media_type,
                })
            })
            .collect();

        let response = self
            .http_client
            .post(format!(
                "{}/collections/{}/upsert",
                self.v2_base(),
                collection_id
            ))
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": texts,
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalService(format!(
                "Vector store returned status {} on upsert: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> EngineResult<Vec<SimilarityHit>> {
        let collection_id = self.ensure_collection().await?;

        let response = self
            .http_client
            .post(format!(
                "{}/collections/{}/query",
                self.v2_base(),
                collection_id
            ))
            .json(&json!({
                "query_embeddings": [vector],
                "n_results": k,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalService(format!(
                "Vector store returned status {} on query: {}",
                status, body
            )));
        }

        let parsed: QueryResponse = response.json().await?;

        let ids = parsed.ids.into_iter().next().unwrap_or_default();
        let distances = parsed
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = parsed
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();

        let mut hits = Vec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            let distance = distances.get(i).copied().unwrap_or(1.0);
            let meta = metadatas.get(i).and_then(|m| m.as_ref());

            // Hits without identifying metadata cannot be resolved downstream
            let (content_id, media_type) = match meta {
                Some(m) => match (m.content_id, m.media_type) {
                    (Some(cid), Some(mt)) => (ContentId(cid), mt),
                    _ => {
                        tracing::debug!(embedding_ref = %id, "Query hit missing content metadata, skipping");
                        continue;
                    }
                },
                None => {
                    tracing::debug!(embedding_ref = %id, "Query hit missing metadata entry, skipping");
                    continue;
                }
            };

            hits.push(SimilarityHit {
                embedding_ref: EmbeddingRef(id),
                content_id,
                media_type,
                distance,
            });
        }

        Ok(hits)
    }

    async fn vectors(
        &self,
        refs: &[EmbeddingRef],
    ) -> EngineResult<HashMap<EmbeddingRef, Vec<f32>>> {
        if refs.is_empty() {
            return Ok(HashMap::new());
        }

        let collection_id = self.ensure_collection().await?;
        let ids: Vec<&str> = refs.iter().map(|r| r.0.as_str()).collect();

        let response = self
            .http_client
            .post(format!(
                "{}/collections/{}/get",
                self.v2_base(),
                collection_id
            ))
            .json(&json!({
                "ids": ids,
                "include": ["embeddings"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ExternalService(format!(
                "Vector store returned status {} on get: {}",
                status, body
            )));
        }

        let parsed: GetResponse = response.json().await?;
        let embeddings = parsed.embeddings.unwrap_or_default();

        Ok(parsed
            .ids
            .into_iter()
            .zip(embeddings)
            .map(|(id, vector)| (EmbeddingRef(id), vector))
            .collect())
    }
}
