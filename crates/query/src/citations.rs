use index::ScoredChunk;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub page: u32,
    pub preview: String,
}

impl Citation {
    pub fn from_chunk(chunk: &ScoredChunk) -> Self {
        let head: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
        Self {
            source: chunk.metadata.source.clone(),
            page: chunk.metadata.page,
            preview: format!("{head}..."),
        }
    }
}

/// One citation per (source, page). A later chunk for the same page replaces
/// the earlier preview but keeps the position where the page first appeared.
pub fn dedup_citations(chunks: &[ScoredChunk]) -> Vec<Citation> {
    let mut unique: IndexMap<(String, u32), Citation> = IndexMap::new();

    for chunk in chunks {
        let citation = Citation::from_chunk(chunk);
        unique.insert((citation.source.clone(), citation.page), citation);
    }

    unique.into_values().collect()
}
