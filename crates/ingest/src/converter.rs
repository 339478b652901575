use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;

use crate::document::{ContentItem, ConvertedDocument};

/// Turns a PDF on disk into page-tagged content items.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<ConvertedDocument>;
}

/// Reads the embedded text layer with `pdf-extract`. No OCR, so scanned
/// pages come back empty and are dropped by page extraction.
#[derive(Debug, Clone, Default)]
pub struct PdfTextConverter;

impl PdfTextConverter {
    pub fn new() -> Self {
        Self
    }

    /// pdf-extract separates pages with form feeds.
    fn split_pages(text: &str) -> ConvertedDocument {
        let mut pages = BTreeSet::new();
        let mut items = Vec::new();

        for (i, page_text) in text.split('\x0C').enumerate() {
            let page_no = i as u32 + 1;
            pages.insert(page_no);
            items.push(ContentItem::new(page_text.trim(), &[page_no]));
        }

        // A trailing form feed leaves an empty phantom page behind.
        if text.ends_with('\x0C') && pages.len() > 1 {
            if let Some(last) = pages.pop_last() {
                items.retain(|item| item.prov.iter().all(|p| p.page_no != last));
            }
        }

        ConvertedDocument { pages, items }
    }
}

#[async_trait]
impl DocumentConverter for PdfTextConverter {
    async fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        let bytes = tokio::fs::read(path)
            .await
            .context(format!("Failed to read file: {:?}", path))?;

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .context("PDF extraction task failed")?
            .map_err(|e| anyhow::anyhow!("PDF text extraction failed: {e}"))?;

        Ok(Self::split_pages(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_on_form_feed() {
        let doc = PdfTextConverter::split_pages("page one\x0Cpage two\x0C");

        assert_eq!(doc.pages.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        let pages = doc.extract_pages("a.pdf");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "page two");
    }

    #[test]
    fn test_blank_page_keeps_numbering() {
        let doc = PdfTextConverter::split_pages("intro\x0C  \x0Cappendix");
        let pages = doc.extract_pages("a.pdf");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 3);
    }

    #[test]
    fn test_no_form_feed_is_single_page() {
        let doc = PdfTextConverter::split_pages("just text");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.extract_pages("a.pdf")[0].text, "just text");
    }
}
