use anyhow::{Result, ensure};

use crate::chunk::Chunk;
use crate::document::PageDocument;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

/// Fixed-size sliding window over page text.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        ensure!(config.chunk_size > 0, "chunk size must be positive");
        ensure!(
            config.chunk_overlap < config.chunk_size,
            "chunk overlap ({}) must be smaller than chunk size ({})",
            config.chunk_overlap,
            config.chunk_size
        );
        Ok(Self { config })
    }

    pub fn chunk_pages(&self, pages: &[PageDocument]) -> Vec<Chunk> {
        pages.iter().flat_map(|page| self.chunk_page(page)).collect()
    }

    pub fn chunk_page(&self, page: &PageDocument) -> Vec<Chunk> {
        self.split(&page.text)
            .into_iter()
            .map(|(offset, text)| {
                Chunk::new(page.source.clone(), page.page, offset, text.to_string())
            })
            .collect()
    }

    /// Returns `(character offset, slice)` windows covering `text`.
    fn split<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        // Byte position of every character boundary, including the end of text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = boundaries.len() - 1;

        if len == 0 {
            return Vec::new();
        }

        let stride = self.config.chunk_size - self.config.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(len);
            windows.push((start, &text[boundaries[start]..boundaries[end]]));
            if end == len {
                break;
            }
            start += stride;
        }

        windows
    }
}
