use index::ScoredChunk;

const SYSTEM_PROMPT: &str = r#"You are a Cybersecurity Assistant.
You must answer the user's question using ONLY the context provided below.
If the answer is not in the context, state that you do not have enough information in the provided dataset.
Do NOT use outside knowledge.
CITE YOUR SOURCES. For every statement, reference the source document name and page number.
Format citations in the text as [Source: filename, Page: page_number].

Context:
{context}
"#;

/// One block per chunk, separated by blank lines.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "Source: {}, Page: {}\nContent: {}",
                chunk.metadata.source, chunk.metadata.page, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_system_prompt(context: &str) -> String {
    SYSTEM_PROMPT.replace("{context}", context)
}
