use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub start_offset: usize, // character position within the page text
    pub text: String,
}

impl Chunk {
    pub fn new(source: String, page: u32, start_offset: usize, text: String) -> Self {
        // Generate stable chunk_id from content
        let chunk_id = Self::generate_chunk_id(&source, page, start_offset, &text);

        Self {
            chunk_id,
            source,
            page,
            start_offset,
            text,
        }
    }

    fn generate_chunk_id(source: &str, page: u32, start_offset: usize, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(page.to_string().as_bytes());
        hasher.update(start_offset.to_string().as_bytes());
        hasher.update(text.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    /// Length in characters, the unit the chunker windows over.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
