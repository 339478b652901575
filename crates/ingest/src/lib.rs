pub mod chunk;
pub mod chunker;
pub mod converter;
pub mod docling;
pub mod document;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use converter::{DocumentConverter, PdfTextConverter};
pub use docling::{DoclingConfig, DoclingConverter};
pub use document::{ContentItem, ConvertedDocument, PageDocument, Provenance};
pub use reader::FileReader;

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Dataset directory not found: {0}")]
    DatasetNotFound(PathBuf),
}

/// What happened to one input file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Ingested {
        file: String,
        pages: usize,
        chunks: usize,
    },
    Skipped {
        file: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    /// Page documents produced across all ingested files.
    pub pages: usize,
    pub chunks: usize,
}

impl IngestReport {
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Skipped { file, reason } => Some((file.as_str(), reason.as_str())),
            FileOutcome::Ingested { .. } => None,
        })
    }
}

/// Chunks ready for embedding plus the per-file report that produced them.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub chunks: Vec<Chunk>,
    pub report: IngestReport,
}

/// Converts PDFs into page documents and chunks them.
pub struct DocumentLoader {
    converter: Arc<dyn DocumentConverter>,
    chunker: Chunker,
}

impl DocumentLoader {
    pub fn new(converter: Arc<dyn DocumentConverter>, chunker: Chunker) -> Self {
        Self { converter, chunker }
    }

    /// Convert and split one file.
    pub async fn load_file(&self, path: &Path) -> Result<Vec<PageDocument>> {
        let source = file_name(path);
        let converted = self.converter.convert(path).await?;
        Ok(converted.extract_pages(&source))
    }

    /// Load every PDF in `dir`, one file at a time. A file that fails to
    /// convert is skipped and reported; a missing directory is an error.
    pub async fn load_directory(&self, dir: &Path) -> Result<LoadedBatch> {
        let files = FileReader::list_pdfs(dir)?;
        info!(dir = ?dir, files = files.len(), "Found PDF files");

        let mut batch = LoadedBatch::default();

        for path in files {
            let file = file_name(&path);
            info!(file = %file, "Processing");

            match self.load_file(&path).await {
                Ok(pages) => {
                    let chunks = self.chunker.chunk_pages(&pages);
                    info!(file = %file, pages = pages.len(), chunks = chunks.len(), "Extracted pages");

                    batch.report.pages += pages.len();
                    batch.report.chunks += chunks.len();
                    batch.report.files.push(FileOutcome::Ingested {
                        file,
                        pages: pages.len(),
                        chunks: chunks.len(),
                    });
                    batch.chunks.extend(chunks);
                }
                Err(e) => {
                    warn!(file = %file, error = %e, "Skipping file");
                    batch.report.files.push(FileOutcome::Skipped {
                        file,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            pages = batch.report.pages,
            chunks = batch.report.chunks,
            "Split pages into chunks"
        );

        Ok(batch)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
