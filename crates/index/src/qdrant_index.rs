use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::store::{ChunkMetadata, ScoredChunk, VectorIndex, VectorRecord};

/// Qdrant collection reached over its REST API.
pub struct QdrantIndex {
    base_url: String,
    client: reqwest::Client,
    collection_name: String,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: Payload,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    text: String,
    source: String,
    page: u32,
    start_offset: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Payload,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantIndex {
    pub fn new(base_url: String, collection_name: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            collection_name,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection_name)
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self.client.get(self.collection_url()).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => anyhow::bail!("Failed to get collection info: {}", status),
        }
    }

    /// Create the collection with cosine distance if it is missing.
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        info!(collection = %self.collection_name, dimension, "Creating collection");

        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let response = self
            .client
            .put(self.collection_url())
            .json(&create_req)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to create collection: {}", error_text);
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(first.vector.len()).await?;

        let points = records
            .into_iter()
            .map(|record| -> Result<Point> {
                // Chunk ids are 32 hex chars, which Qdrant accepts as a UUID.
                let id = uuid::Uuid::try_parse(&record.id)
                    .context(format!("Point id is not a UUID: {}", record.id))?;
                Ok(Point {
                    id: id.to_string(),
                    vector: record.vector,
                    payload: Payload {
                        text: record.text,
                        source: record.metadata.source,
                        page: record.metadata.page,
                        start_offset: record.metadata.start_offset,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let url = format!("{}/points?wait=true", self.collection_url());
        let response = self
            .client
            .put(&url)
            .json(&UpsertPoints { points })
            .send()
            .await
            .context("Failed to send upsert request to Qdrant")?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to upsert points: {}", error_text);
        }

        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let url = format!("{}/points/search", self.collection_url());

        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send search request to Qdrant")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Qdrant search failed: {}", error_text);
        }

        let result: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Qdrant response")?;

        Ok(result
            .result
            .into_iter()
            .map(|point| ScoredChunk {
                text: point.payload.text,
                metadata: ChunkMetadata {
                    source: point.payload.source,
                    page: point.payload.page,
                    start_offset: point.payload.start_offset,
                },
                score: point.score,
            })
            .collect())
    }

    async fn delete_collection(&self) -> Result<()> {
        let response = self
            .client
            .delete(self.collection_url())
            .send()
            .await
            .context("Failed to send delete request to Qdrant")?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let error_text = response.text().await?;
        anyhow::bail!("Failed to delete collection: {}", error_text)
    }

    async fn count(&self) -> Result<usize> {
        let url = format!("{}/points/count", self.collection_url());
        let response = self
            .client
            .post(&url)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        if !response.status().is_success() {
            anyhow::bail!("Failed to count points: {}", response.status());
        }

        let count: CountResponse = response.json().await?;
        Ok(count.result.count)
    }
}
