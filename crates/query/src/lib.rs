pub mod citations;
pub mod llm;
pub mod prompt;
pub mod retriever;

pub use citations::{Citation, dedup_citations};
pub use llm::{Generator, OpenRouterLLM, QueryLLM};
pub use retriever::{DEFAULT_TOP_K, Retriever};

use anyhow::{Context, Result};
use index::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Returned without calling the model when retrieval finds nothing.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I do not have enough information in the provided dataset to answer this question.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub trace: QueryTrace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTrace {
    pub chunks_retrieved: usize,
    pub context_size: usize,
    pub generator_called: bool,
}

/// Retrieve, then generate. One pass per question.
pub struct QueryEngine {
    retriever: Retriever,
    llm: Arc<dyn Generator>,
}

impl QueryEngine {
    pub fn new(retriever: Retriever, llm: Arc<dyn Generator>) -> Self {
        Self { retriever, llm }
    }

    pub async fn answer(&self, question: &str) -> Result<QueryResult> {
        // Retrieve
        let context = self.retriever.retrieve(question).await?;
        info!(chunks = context.len(), "Retrieved context");

        // Generate
        let (answer, context_size) = self.generate(question, &context).await?;

        Ok(QueryResult {
            answer,
            citations: dedup_citations(&context),
            trace: QueryTrace {
                chunks_retrieved: context.len(),
                context_size,
                generator_called: !context.is_empty(),
            },
        })
    }

    async fn generate(&self, question: &str, context: &[ScoredChunk]) -> Result<(String, usize)> {
        if context.is_empty() {
            return Ok((INSUFFICIENT_CONTEXT_ANSWER.to_string(), 0));
        }

        let formatted = prompt::format_context(context);
        let system = prompt::build_system_prompt(&formatted);
        debug!(context_chars = formatted.len(), "Calling generator");

        let answer = self
            .llm
            .generate(&system, question)
            .await
            .context("Failed to generate answer")?;

        Ok((answer, formatted.len()))
    }
}
