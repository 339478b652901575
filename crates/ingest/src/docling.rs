//! Docling backend: runs the `docling` CLI with EasyOCR and reads back its
//! JSON export.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::converter::DocumentConverter;
use crate::document::{ContentItem, ConvertedDocument, Provenance};

#[derive(Debug, Clone)]
pub struct DoclingConfig {
    /// Path or name of the `docling` executable.
    pub binary: String,
    /// Comma-separated EasyOCR language codes.
    pub ocr_langs: String,
    /// `auto`, `cpu`, `cuda` or `mps`.
    pub device: String,
    /// Parent of the per-file export directories. System temp dir when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for DoclingConfig {
    fn default() -> Self {
        Self {
            binary: "docling".to_string(),
            ocr_langs: "th,en".to_string(),
            device: "auto".to_string(),
            work_dir: None,
        }
    }
}

pub struct DoclingConverter {
    config: DoclingConfig,
}

impl DoclingConverter {
    pub fn new(config: DoclingConfig) -> Self {
        Self { config }
    }

    async fn run_cli(&self, path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let output = Command::new(&self.config.binary)
            .args(["--to", "json", "--ocr-engine", "easyocr"])
            .args(["--ocr-lang", &self.config.ocr_langs])
            .args(["--device", &self.config.device])
            .arg("--output")
            .arg(output_dir)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("Failed to run {}", self.config.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("docling exited with {}: {}", output.status, stderr.trim());
        }

        let stem = path
            .file_stem()
            .context(format!("No file name in {:?}", path))?;
        Ok(output_dir.join(format!("{}.json", stem.to_string_lossy())))
    }
}

#[async_trait]
impl DocumentConverter for DoclingConverter {
    async fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        // Removed on drop, including when the conversion future is cancelled.
        let mut builder = tempfile::Builder::new();
        builder.prefix("docling_");
        let output_dir = match &self.config.work_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .context("Failed to create docling output directory")?;

        let json_path = self.run_cli(path, output_dir.path()).await?;
        debug!(file = ?path, export = ?json_path, "docling conversion finished");
        let json = tokio::fs::read_to_string(&json_path)
            .await
            .context(format!("Failed to read docling export: {:?}", json_path))?;
        parse_docling_json(&json)
    }
}

#[derive(Deserialize)]
struct DoclingDocument {
    body: NodeItem,
    #[serde(default)]
    groups: Vec<NodeItem>,
    #[serde(default)]
    texts: Vec<TextItem>,
    #[serde(default)]
    tables: Vec<NodeItem>,
    #[serde(default)]
    pages: BTreeMap<String, PageItem>,
}

#[derive(Deserialize)]
struct RefItem {
    #[serde(rename = "$ref")]
    cref: String,
}

#[derive(Deserialize)]
struct NodeItem {
    #[serde(default)]
    children: Vec<RefItem>,
}

#[derive(Deserialize)]
struct TextItem {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    prov: Vec<Provenance>,
    #[serde(default)]
    children: Vec<RefItem>,
    #[serde(default)]
    content_layer: Option<String>,
}

#[derive(Deserialize)]
struct PageItem {
    page_no: u32,
}

/// Flatten a Docling export into document-ordered content items.
///
/// Order is the depth-first walk of `body`. Tables carry no text of their own
/// but their children (captions, footnotes) are walked. Pictures are not
/// descended into and furniture (running headers, footers) is left out.
pub fn parse_docling_json(json: &str) -> Result<ConvertedDocument> {
    let doc: DoclingDocument =
        serde_json::from_str(json).context("Failed to parse docling JSON export")?;

    let pages: BTreeSet<u32> = doc.pages.values().map(|p| p.page_no).collect();
    let mut items = Vec::new();
    let mut visited = BTreeSet::new();

    let mut stack: Vec<&str> = doc.body.children.iter().rev().map(|r| r.cref.as_str()).collect();

    while let Some(cref) = stack.pop() {
        if !visited.insert(cref) {
            continue;
        }

        let Some((kind, index)) = parse_ref(cref) else {
            continue;
        };

        let children = match kind {
            "texts" => match doc.texts.get(index) {
                Some(text) => {
                    if text.content_layer.as_deref().is_some_and(|layer| layer != "body") {
                        continue;
                    }
                    items.push(ContentItem {
                        text: text.text.clone(),
                        prov: text.prov.clone(),
                    });
                    &text.children
                }
                None => continue,
            },
            "groups" => match doc.groups.get(index) {
                Some(group) => &group.children,
                None => continue,
            },
            "tables" => match doc.tables.get(index) {
                Some(table) => &table.children,
                None => continue,
            },
            _ => continue,
        };

        stack.extend(children.iter().rev().map(|r| r.cref.as_str()));
    }

    Ok(ConvertedDocument { pages, items })
}

/// `"#/texts/12"` -> `("texts", 12)`
fn parse_ref(cref: &str) -> Option<(&str, usize)> {
    let mut parts = cref.strip_prefix("#/")?.split('/');
    let kind = parts.next()?;
    let index = parts.next()?.parse().ok()?;
    Some((kind, index))
}
