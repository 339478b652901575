use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Page-location record attached to a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub page_no: u32,
}

/// One item of converted content (paragraph, heading, list item, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub text: Option<String>,
    pub prov: Vec<Provenance>,
}

impl ContentItem {
    pub fn new(text: impl Into<String>, pages: &[u32]) -> Self {
        Self {
            text: Some(text.into()),
            prov: pages.iter().map(|&page_no| Provenance { page_no }).collect(),
        }
    }
}

/// Output of a document converter: the page set plus every content item in
/// document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertedDocument {
    pub pages: BTreeSet<u32>,
    pub items: Vec<ContentItem>,
}

/// The text of a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDocument {
    pub source: String,
    pub page: u32,
    pub text: String,
}

impl ConvertedDocument {
    /// Group item texts by page. Items are joined with a newline in document
    /// order; pages with nothing but whitespace are dropped.
    pub fn extract_pages(&self, source: &str) -> Vec<PageDocument> {
        let mut pages = Vec::new();

        for &page_no in &self.pages {
            let texts: Vec<&str> = self
                .items
                .iter()
                .filter(|item| item.prov.iter().any(|p| p.page_no == page_no))
                .filter_map(|item| item.text.as_deref())
                .filter(|text| !text.is_empty())
                .collect();

            let text = texts.join("\n");
            if text.trim().is_empty() {
                continue;
            }

            pages.push(PageDocument {
                source: source.to_string(),
                page: page_no,
                text,
            });
        }

        pages
    }
}
