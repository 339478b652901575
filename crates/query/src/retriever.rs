use anyhow::{Context, Result};
use std::sync::Arc;

use index::{EmbeddingFunction, ScoredChunk, VectorIndex};

pub const DEFAULT_TOP_K: usize = 5;

/// Nearest-neighbour lookup for a question, no re-ranking.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingFunction>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingFunction>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed query")?;

        self.index
            .search(&query_embedding, self.top_k)
            .await
            .context("Failed to search vector index")
    }
}
