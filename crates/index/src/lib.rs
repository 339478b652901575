pub mod embeddings;
pub mod local_index;
pub mod qdrant_index;
pub mod store;

pub use embeddings::{EmbeddingClient, EmbeddingFunction};
pub use local_index::LocalIndex;
pub use qdrant_index::QdrantIndex;
pub use store::{ChunkMetadata, ScoredChunk, VectorIndex, VectorRecord};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Embeds chunks and writes them to the vector index.
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn EmbeddingFunction>,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingFunction>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embed every chunk and upsert the batch. Returns the number stored.
    pub async fn add_chunks(&self, chunks: &[ingest::Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .context("Failed to generate embedding")?;

            records.push(VectorRecord {
                id: chunk.chunk_id.clone(),
                vector,
                text: chunk.text.clone(),
                metadata: ChunkMetadata {
                    source: chunk.source.clone(),
                    page: chunk.page,
                    start_offset: chunk.start_offset,
                },
            });
        }

        self.index
            .upsert(records)
            .await
            .context("Failed to store chunks")?;

        info!(chunks = chunks.len(), "Documents added to vector store");
        Ok(chunks.len())
    }

    /// Drop the whole collection. Safe to call when it does not exist.
    pub async fn reset(&self) -> Result<()> {
        self.index.delete_collection().await
    }

    pub async fn get_stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            chunks: self.index.count().await?,
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct IndexStats {
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Letter-frequency vector; deterministic and good enough for ranking tests.
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingFunction for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingFunction for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
    }

    async fn local_indexer(dir: &std::path::Path) -> Indexer {
        let index = LocalIndex::open(dir, "cyber_rag_docs").await.unwrap();
        Indexer::new(Arc::new(LetterEmbedder), Arc::new(index))
    }

    #[tokio::test]
    async fn test_add_chunks_stores_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = local_indexer(dir.path()).await;
        let chunks = vec![
            ingest::Chunk::new("a.pdf".into(), 3, 1800, "zzz zzz".into()),
            ingest::Chunk::new("b.pdf".into(), 1, 0, "aaa bbb".into()),
        ];

        assert_eq!(indexer.add_chunks(&chunks).await.unwrap(), 2);
        assert_eq!(indexer.get_stats().await.unwrap().chunks, 2);

        let query = LetterEmbedder.embed("zz").await.unwrap();
        let hits = indexer.index.search(&query, 1).await.unwrap();
        assert_eq!(
            hits[0].metadata,
            ChunkMetadata {
                source: "a.pdf".into(),
                page: 3,
                start_offset: 1800,
            }
        );
    }

    #[tokio::test]
    async fn test_reingest_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = local_indexer(dir.path()).await;
        let chunks = vec![ingest::Chunk::new("a.pdf".into(), 1, 0, "text".into())];

        indexer.add_chunks(&chunks).await.unwrap();
        indexer.add_chunks(&chunks).await.unwrap();

        assert_eq!(indexer.get_stats().await.unwrap().chunks, 1);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = local_indexer(dir.path()).await;
        indexer
            .add_chunks(&[ingest::Chunk::new("a.pdf".into(), 1, 0, "text".into())])
            .await
            .unwrap();

        indexer.reset().await.unwrap();
        indexer.reset().await.unwrap();

        assert_eq!(indexer.get_stats().await.unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path(), "docs").await.unwrap();
        let indexer = Indexer::new(Arc::new(FailingEmbedder), Arc::new(index));

        let err = indexer
            .add_chunks(&[ingest::Chunk::new("a.pdf".into(), 1, 0, "text".into())])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("connection refused"));
        assert_eq!(indexer.get_stats().await.unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = local_indexer(dir.path()).await;

        assert_eq!(indexer.add_chunks(&[]).await.unwrap(), 0);
        assert!(!dir.path().join("cyber_rag_docs.json").exists());
    }
}
