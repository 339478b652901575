use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub dataset_path: PathBuf,
    pub vector_db_path: PathBuf,
    pub store: StoreConfig,
    pub converter: ConverterConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Local,  // JSON collection under vector_db_path
    Qdrant, // Qdrant REST API
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub collection_name: String,
    pub qdrant_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ConverterKind {
    Docling,
    PdfText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub kind: ConverterKind,
    pub docling_bin: String,
    pub ocr_langs: String,
    pub device: String,
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        base_url: String,
        model: String,
    },
    OpenRouter {
        base_url: String,
        #[serde(skip_serializing)]
        api_key: String,
        model: String,
    },
}

impl LlmConfig {
    pub fn provider(&self) -> &'static str {
        match self {
            LlmConfig::Ollama { .. } => "ollama",
            LlmConfig::OpenRouter { .. } => "openrouter",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "scb10x/llama3.1-typhoon2-8b-instruct:latest";
const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-lite-001";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            dataset_path: PathBuf::from("dataset"),
            vector_db_path: PathBuf::from("chroma_db"),
            store: StoreConfig {
                kind: StoreKind::Local,
                collection_name: "cyber_rag_docs_bge_m3".to_string(),
                qdrant_url: "http://localhost:6333".to_string(),
            },
            converter: ConverterConfig {
                kind: ConverterKind::Docling,
                docling_bin: "docling".to_string(),
                ocr_langs: "th,en".to_string(),
                device: "auto".to_string(),
                work_dir: None,
            },
            embedding: EmbeddingConfig {
                base_url: DEFAULT_OLLAMA_URL.to_string(),
                model: "bge-m3".to_string(),
            },
            llm: LlmConfig::Ollama {
                base_url: DEFAULT_OLLAMA_URL.to_string(),
                model: DEFAULT_OLLAMA_MODEL.to_string(),
            },
            chunking: ChunkingConfig {
                chunk_size: 2000,
                chunk_overlap: 200,
            },
            top_k: 5,
        }
    }
}

impl AppConfig {
    /// Settings from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let store_kind = match var("VECTOR_STORE", "local").to_lowercase().as_str() {
            "local" => StoreKind::Local,
            "qdrant" => StoreKind::Qdrant,
            other => anyhow::bail!("Unknown VECTOR_STORE: {other} (expected local or qdrant)"),
        };

        let converter_kind = match var("CONVERTER", "docling").to_lowercase().as_str() {
            "docling" => ConverterKind::Docling,
            "pdf-text" => ConverterKind::PdfText,
            other => anyhow::bail!("Unknown CONVERTER: {other} (expected docling or pdf-text)"),
        };

        let api_key = lookup("OPENROUTER_API_KEY").unwrap_or_default();
        let default_provider = if api_key.is_empty() { "ollama" } else { "openrouter" };
        let provider = var("LLM_PROVIDER", default_provider).to_lowercase();

        // OpenRouter without a key falls back to the local model.
        let llm = match provider.as_str() {
            "openrouter" if !api_key.is_empty() => LlmConfig::OpenRouter {
                base_url: var("OPENROUTER_BASE_URL", DEFAULT_OPENROUTER_URL),
                api_key,
                model: var("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL),
            },
            "openrouter" | "ollama" => LlmConfig::Ollama {
                base_url: var("OLLAMA_BASE_URL", DEFAULT_OLLAMA_URL),
                model: var("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            },
            other => anyhow::bail!("Unknown LLM_PROVIDER: {other} (expected ollama or openrouter)"),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR", &defaults.bind_addr),
            dataset_path: lookup("DATASET_PATH").map(PathBuf::from).unwrap_or(defaults.dataset_path),
            vector_db_path: lookup("VECTOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.vector_db_path),
            store: StoreConfig {
                kind: store_kind,
                collection_name: var("COLLECTION_NAME", &defaults.store.collection_name),
                qdrant_url: var("QDRANT_URL", &defaults.store.qdrant_url),
            },
            converter: ConverterConfig {
                kind: converter_kind,
                docling_bin: var("DOCLING_BIN", &defaults.converter.docling_bin),
                ocr_langs: var("DOCLING_OCR_LANGS", &defaults.converter.ocr_langs),
                device: var("DOCLING_DEVICE", &defaults.converter.device),
                work_dir: lookup("DOCLING_WORK_DIR").map(PathBuf::from),
            },
            embedding: EmbeddingConfig {
                base_url: var("EMBEDDING_BASE_URL", &defaults.embedding.base_url),
                model: var("EMBEDDING_MODEL", &defaults.embedding.model),
            },
            llm,
            chunking: ChunkingConfig {
                chunk_size: parse_var(&lookup, "CHUNK_SIZE", defaults.chunking.chunk_size)?,
                chunk_overlap: parse_var(&lookup, "CHUNK_OVERLAP", defaults.chunking.chunk_overlap)?,
            },
            top_k: parse_var(&lookup, "TOP_K", defaults.top_k)?,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .context(format!("Invalid value for {key}: {value}")),
        None => Ok(default),
    }
}
