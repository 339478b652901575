mod config;
mod metrics;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, ConverterKind, LlmConfig, StoreKind};
use index::{EmbeddingClient, EmbeddingFunction, IndexStats, Indexer, LocalIndex, QdrantIndex, VectorIndex};
use ingest::{
    Chunker, ChunkerConfig, DoclingConfig, DoclingConverter, DocumentConverter, DocumentLoader,
    IngestError, PdfTextConverter,
};
use metrics::{Metrics, MetricsSnapshot, TimedOperation};
use query::{Citation, Generator, OpenRouterLLM, QueryEngine, QueryLLM, Retriever};

struct AppState {
    dataset_path: PathBuf,
    loader: DocumentLoader,
    indexer: Indexer,
    engine: QueryEngine,
    metrics: Arc<Metrics>,
    /// Ingest and reset are single-writer.
    write_lock: Mutex<()>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct IngestResponse {
    message: String,
    num_documents: usize,
    num_chunks: usize,
    skipped: Vec<SkippedFile>,
}

#[derive(Serialize)]
struct SkippedFile {
    file: String,
    reason: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    citations: Vec<Citation>,
}

#[derive(Serialize)]
struct StatsResponse {
    index: IndexStats,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &anyhow::Error) -> ApiError {
    tracing::error!(status = %status, error = %format!("{error:#}"), "Request failed");
    (
        status,
        Json(ErrorResponse {
            detail: format!("{error:#}"),
        }),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing();

    let state = Arc::new(build_state(&config).await?);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(ingest_documents))
        .route("/reset", post(reset_db))
        .route("/query", post(query_rag))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let converter: Arc<dyn DocumentConverter> = match config.converter.kind {
        ConverterKind::Docling => Arc::new(DoclingConverter::new(DoclingConfig {
            binary: config.converter.docling_bin.clone(),
            ocr_langs: config.converter.ocr_langs.clone(),
            device: config.converter.device.clone(),
            work_dir: config.converter.work_dir.clone(),
        })),
        ConverterKind::PdfText => Arc::new(PdfTextConverter::new()),
    };

    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
    })?;

    let embedder: Arc<dyn EmbeddingFunction> = Arc::new(EmbeddingClient::new(
        config.embedding.base_url.clone(),
        config.embedding.model.clone(),
    ));

    let index: Arc<dyn VectorIndex> = match config.store.kind {
        StoreKind::Local => Arc::new(
            LocalIndex::open(&config.vector_db_path, &config.store.collection_name).await?,
        ),
        StoreKind::Qdrant => Arc::new(QdrantIndex::new(
            config.store.qdrant_url.clone(),
            config.store.collection_name.clone(),
        )),
    };

    let llm: Arc<dyn Generator> = match &config.llm {
        LlmConfig::Ollama { base_url, model } => {
            Arc::new(QueryLLM::new(base_url.clone(), model.clone()))
        }
        LlmConfig::OpenRouter {
            base_url,
            api_key,
            model,
        } => Arc::new(OpenRouterLLM::new(
            base_url.clone(),
            api_key.clone(),
            model.clone(),
        )),
    };

    tracing::info!(
        store = ?config.store.kind,
        converter = ?config.converter.kind,
        llm = config.llm.provider(),
        embedding_model = %config.embedding.model,
        "Pipeline configured"
    );

    Ok(AppState {
        dataset_path: config.dataset_path.clone(),
        loader: DocumentLoader::new(converter, chunker),
        indexer: Indexer::new(embedder.clone(), index.clone()),
        engine: QueryEngine::new(Retriever::new(embedder, index, config.top_k), llm),
        metrics: Metrics::new(),
        write_lock: Mutex::new(()),
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn ingest_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IngestResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let timer = TimedOperation::start();

    let batch = match state.loader.load_directory(&state.dataset_path).await {
        Ok(batch) => batch,
        Err(e) => {
            state.metrics.record_request(false);
            let status = match e.downcast_ref::<IngestError>() {
                Some(IngestError::DatasetNotFound(_)) => StatusCode::NOT_FOUND,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return Err(api_error(status, &e));
        }
    };

    if let Err(e) = state.indexer.add_chunks(&batch.chunks).await {
        state.metrics.record_request(false);
        return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e));
    }

    state.metrics.record_ingest(timer.elapsed(), &batch.report);
    state.metrics.record_request(true);

    let skipped = batch
        .report
        .skipped()
        .map(|(file, reason)| SkippedFile {
            file: file.to_string(),
            reason: reason.to_string(),
        })
        .collect();

    Ok(Json(IngestResponse {
        message: "Ingestion successful".to_string(),
        num_documents: batch.report.pages,
        num_chunks: batch.report.chunks,
        skipped,
    }))
}

async fn reset_db(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;

    state.indexer.reset().await.map_err(|e| {
        state.metrics.record_request(false);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, &e)
    })?;

    state.metrics.record_request(true);
    Ok(Json(MessageResponse {
        message: "Embeddings reset successfully".to_string(),
    }))
}

async fn query_rag(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let timer = TimedOperation::start();

    let result = state.engine.answer(&req.query).await.map_err(|e| {
        state.metrics.record_request(false);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, &e)
    })?;

    state.metrics.record_query(timer.elapsed());
    state.metrics.record_request(true);

    Ok(Json(QueryResponse {
        answer: result.answer,
        citations: result.citations,
    }))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let index = state
        .indexer
        .get_stats()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, &e))?;

    Ok(Json(StatsResponse {
        index,
        metrics: state.metrics.snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingest::{ContentItem, ConvertedDocument};
    use std::path::Path;

    struct OnePageConverter;

    #[async_trait]
    impl DocumentConverter for OnePageConverter {
        async fn convert(&self, path: &Path) -> anyhow::Result<ConvertedDocument> {
            if path.ends_with("broken.pdf") {
                anyhow::bail!("EasyOCR failed to initialise");
            }
            Ok(ConvertedDocument {
                pages: [1].into_iter().collect(),
                items: vec![ContentItem::new("Malware is software designed to harm.", &[1])],
            })
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingFunction for UnitEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct EchoLLM;

    #[async_trait]
    impl Generator for EchoLLM {
        async fn generate(&self, _system: &str, question: &str) -> anyhow::Result<String> {
            Ok(format!("answer to {question} [Source: malware.pdf, Page: 1]"))
        }
    }

    async fn state(dataset: PathBuf, index_dir: &Path) -> Arc<AppState> {
        let embedder: Arc<dyn EmbeddingFunction> = Arc::new(UnitEmbedder);
        let index: Arc<dyn VectorIndex> =
            Arc::new(LocalIndex::open(index_dir, "cyber_rag_docs").await.unwrap());

        Arc::new(AppState {
            dataset_path: dataset,
            loader: DocumentLoader::new(
                Arc::new(OnePageConverter),
                Chunker::new(ChunkerConfig::default()).unwrap(),
            ),
            indexer: Indexer::new(embedder.clone(), index.clone()),
            engine: QueryEngine::new(Retriever::new(embedder, index, 5), Arc::new(EchoLLM)),
            metrics: Metrics::new(),
            write_lock: Mutex::new(()),
        })
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let dataset = tempfile::tempdir().unwrap();
        std::fs::write(dataset.path().join("malware.pdf"), b"%PDF").unwrap();
        std::fs::write(dataset.path().join("broken.pdf"), b"%PDF").unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        let state = state(dataset.path().to_path_buf(), index_dir.path()).await;

        let Json(ingested) = ingest_documents(State(state.clone())).await.unwrap();
        assert_eq!(ingested.num_documents, 1);
        assert_eq!(ingested.num_chunks, 1);
        assert_eq!(ingested.skipped.len(), 1);
        assert_eq!(ingested.skipped[0].file, "broken.pdf");

        let Json(answer) = query_rag(
            State(state.clone()),
            Json(QueryRequest {
                query: "What is malware?".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(answer.answer.starts_with("answer to What is malware?"));
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source, "malware.pdf");

        let Json(stats) = get_stats(State(state)).await.unwrap();
        assert_eq!(stats.index.chunks, 1);
        assert_eq!(stats.metrics.successful_requests, 2);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path().join("dataset"), root.path()).await;

        let (status, Json(body)) = ingest_documents(State(state)).await.err().unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.detail.contains("Dataset directory not found"));
    }

    #[tokio::test]
    async fn test_reset_twice() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path().to_path_buf(), root.path()).await;

        assert!(reset_db(State(state.clone())).await.is_ok());
        assert!(reset_db(State(state)).await.is_ok());
    }

    #[tokio::test]
    async fn test_query_empty_index() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path().to_path_buf(), root.path()).await;

        let Json(answer) = query_rag(
            State(state),
            Json(QueryRequest {
                query: "What is phishing?".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(answer.answer, query::INSUFFICIENT_CONTEXT_ANSWER);
        assert!(answer.citations.is_empty());
    }
}
