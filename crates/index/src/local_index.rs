//! Vector index kept as one JSON file per collection inside a directory.
//! Search is brute-force cosine similarity over the whole collection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

use crate::store::{ScoredChunk, VectorIndex, VectorRecord, cosine_similarity};

#[derive(Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    records: Vec<VectorRecord>,
}

pub struct LocalIndex {
    path: PathBuf,
    collection_name: String,
    /// `None` while the collection does not exist.
    records: RwLock<Option<BTreeMap<String, VectorRecord>>>,
}

impl LocalIndex {
    /// Open `collection_name` under `dir`, loading it if it was persisted before.
    pub async fn open(dir: &Path, collection_name: &str) -> Result<Self> {
        let path = dir.join(format!("{collection_name}.json"));

        let records = if tokio::fs::try_exists(&path).await? {
            let json = tokio::fs::read_to_string(&path)
                .await
                .context(format!("Failed to read collection: {:?}", path))?;
            let file: CollectionFile = serde_json::from_str(&json)
                .context(format!("Corrupt collection file: {:?}", path))?;
            info!(collection = collection_name, records = file.records.len(), "Loaded collection");
            Some(file.records.into_iter().map(|r| (r.id.clone(), r)).collect())
        } else {
            None
        };

        Ok(Self {
            path,
            collection_name: collection_name.to_string(),
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &BTreeMap<String, VectorRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create index directory: {:?}", parent))?;
        }

        let file = CollectionFile {
            name: self.collection_name.clone(),
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_vec(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .context(format!("Failed to write collection: {:?}", tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(format!("Failed to replace collection: {:?}", self.path))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut guard = self.records.write().await;
        let mut collection = guard.clone().unwrap_or_default();

        for record in records {
            collection.insert(record.id.clone(), record);
        }

        // Memory only changes once the file is on disk.
        self.persist(&collection).await?;
        *guard = Some(collection);
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.records.read().await;
        let Some(collection) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::with_capacity(collection.len());
        for record in collection.values() {
            if record.vector.len() != vector.len() {
                anyhow::bail!(
                    "Query vector has dimension {} but collection {} stores dimension {}",
                    vector.len(),
                    self.collection_name,
                    record.vector.len()
                );
            }
            hits.push(ScoredChunk {
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(vector, &record.vector),
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut guard = self.records.write().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!(collection = %self.collection_name, "Deleted collection"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).context(format!("Failed to delete collection: {:?}", self.path));
            }
        }

        *guard = None;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.as_ref().map_or(0, |c| c.len()))
    }
}
