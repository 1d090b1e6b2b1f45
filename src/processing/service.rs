//! Ingestion service coordinating extraction, chunking, embedding, and vector store writes.

use crate::{
    config::{BatchPolicy, Config},
    embedding::{EmbeddingClient, build_embedding_client, ensure_batch_shape},
    extraction::{LopdfExtractor, PageExtractor},
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking::TextChunker,
        metadata::{build_metadata, chunk_id, current_timestamp_rfc3339, generate_namespace},
        types::{
            BatchOutcome, ChunkingError, ProcessingError, StageError, StoreHealthSnapshot,
            UploadResult, UploadedFile,
        },
    },
    vector_store::{UpsertRequest, VectorStore, build_vector_store},
};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Abstraction over the ingestion pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Validate every file, then run the pipeline per file according to the batch policy.
    ///
    /// With [`BatchPolicy::FailFast`] the first failing file ends the batch and its error is
    /// returned. With [`BatchPolicy::Isolate`] failures are collected in the outcome.
    async fn ingest_batch(&self, files: Vec<UploadedFile>) -> Result<BatchOutcome, ProcessingError>;

    /// Run the pipeline for a single file.
    async fn ingest_document(&self, file: UploadedFile) -> Result<UploadResult, ProcessingError>;

    /// Probe the vector store. Never fails; problems are reported in the snapshot.
    async fn health(&self) -> StoreHealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

enum Backends {
    Ready {
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    },
    Unavailable(String),
}

/// Runs uploads through extraction, chunking, embedding, and storage.
///
/// The chunker is validated at construction. Embedding and storage backends that cannot be
/// built leave the service in an unavailable state instead of failing the process: uploads
/// report the reason and the health probe shows the store as disconnected.
/// Construct the service once near process start and share it through an `Arc`.
pub struct IngestionService {
    chunker: TextChunker,
    extractor: Arc<dyn PageExtractor>,
    backends: Backends,
    batch_policy: BatchPolicy,
    metrics: Arc<IngestMetrics>,
}

impl IngestionService {
    /// Build the service from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        tracing::info!(
            chunk_size = chunker.chunk_size(),
            chunk_overlap = chunker.chunk_overlap(),
            provider = ?config.embedding_provider,
            backend = ?config.vector_store_backend,
            "Initializing ingestion service"
        );

        let backends = match (build_embedding_client(config), build_vector_store(config)) {
            (Ok(embedder), Ok(store)) => Backends::Ready { embedder, store },
            (Err(error), _) | (_, Err(error)) => {
                tracing::warn!(error = %error, "Backends unavailable; uploads will be rejected");
                Backends::Unavailable(error.to_string())
            }
        };

        Ok(Self {
            chunker,
            extractor: Arc::new(LopdfExtractor::new()),
            backends,
            batch_policy: config.batch_policy,
            metrics: Arc::new(IngestMetrics::new()),
        })
    }

    /// Assemble a service from explicit components.
    pub fn with_components(
        chunker: TextChunker,
        extractor: Arc<dyn PageExtractor>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            chunker,
            extractor,
            backends: Backends::Ready { embedder, store },
            batch_policy: BatchPolicy::default(),
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// A service whose backends could not be initialised.
    pub fn unavailable(chunker: TextChunker, reason: impl Into<String>) -> Self {
        Self {
            chunker,
            extractor: Arc::new(LopdfExtractor::new()),
            backends: Backends::Unavailable(reason.into()),
            batch_policy: BatchPolicy::default(),
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Override the multi-file failure policy.
    pub fn with_batch_policy(mut self, batch_policy: BatchPolicy) -> Self {
        self.batch_policy = batch_policy;
        self
    }

    fn ready_backends(
        &self,
    ) -> Result<(&Arc<dyn EmbeddingClient>, &Arc<dyn VectorStore>), ProcessingError> {
        match &self.backends {
            Backends::Ready { embedder, store } => Ok((embedder, store)),
            Backends::Unavailable(reason) => Err(ProcessingError::Unavailable(reason.clone())),
        }
    }

    /// Validate every file, then process them in submission order.
    pub async fn ingest_batch(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<BatchOutcome, ProcessingError> {
        if files.is_empty() {
            return Err(ProcessingError::EmptyUpload);
        }
        if let Some(file) = files.iter().find(|file| !is_pdf(&file.filename)) {
            return Err(ProcessingError::UnsupportedFileType {
                filename: file.filename.clone(),
            });
        }
        let (embedder, store) = self.ready_backends()?;

        tracing::info!(
            files = files.len(),
            policy = ?self.batch_policy,
            "Processing upload batch"
        );
        let mut outcome = BatchOutcome::default();
        for file in files {
            match self.run_pipeline(file, embedder.as_ref(), store.as_ref()).await {
                Ok(result) => outcome.results.push(result),
                Err(error) => match self.batch_policy {
                    BatchPolicy::FailFast => return Err(error),
                    BatchPolicy::Isolate => outcome.failures.push(error),
                },
            }
        }
        Ok(outcome)
    }

    /// Validate and process a single file.
    pub async fn ingest_document(
        &self,
        file: UploadedFile,
    ) -> Result<UploadResult, ProcessingError> {
        if !is_pdf(&file.filename) {
            return Err(ProcessingError::UnsupportedFileType {
                filename: file.filename,
            });
        }
        let (embedder, store) = self.ready_backends()?;
        self.run_pipeline(file, embedder.as_ref(), store.as_ref())
            .await
    }

    async fn run_pipeline(
        &self,
        file: UploadedFile,
        embedder: &dyn EmbeddingClient,
        store: &dyn VectorStore,
    ) -> Result<UploadResult, ProcessingError> {
        let filename = file.filename.clone();
        let result = self.process_file(file, embedder, store).await;
        match &result {
            Ok(stored) => {
                self.metrics
                    .record_document(stored.chunks_created as u64, stored.vectors_stored as u64);
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(filename = %filename, error = %error, "Document ingestion failed");
            }
        }
        result
    }

    async fn process_file(
        &self,
        file: UploadedFile,
        embedder: &dyn EmbeddingClient,
        store: &dyn VectorStore,
    ) -> Result<UploadResult, ProcessingError> {
        let UploadedFile { filename, bytes } = file;
        tracing::info!(filename = %filename, bytes = bytes.len(), "Processing document");

        let staged = stage_upload(&bytes).map_err(|error| stage_failure(&filename, error))?;
        drop(bytes);
        let extractor = Arc::clone(&self.extractor);
        let path = staged.path().to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&path))
            .await
            .map_err(|error| stage_failure(&filename, error))?
            .map_err(|error| stage_failure(&filename, error))?;
        // The transient file must outlive extraction; it is deleted here.
        drop(staged);

        let chunks = self.chunker.chunk_pages(&pages);
        tracing::debug!(
            filename = %filename,
            pages = pages.len(),
            chunks = chunks.len(),
            "Document chunked"
        );
        if chunks.is_empty() {
            return Err(ProcessingError::NoExtractableText { filename });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder
            .generate_embeddings(texts)
            .await
            .map_err(|error| stage_failure(&filename, error))?;
        ensure_batch_shape(chunks.len(), &vectors)
            .map_err(|error| stage_failure(&filename, error))?;

        let upload_timestamp = current_timestamp_rfc3339();
        let metadata = build_metadata(&filename, &chunks, &upload_timestamp);
        let namespace = generate_namespace(&filename);
        let ids = chunks
            .iter()
            .map(|chunk| chunk_id(&namespace, chunk.chunk_index))
            .collect();

        let vectors_stored = store
            .upsert(UpsertRequest {
                vectors,
                metadata,
                ids,
                namespace: namespace.clone(),
            })
            .await
            .map_err(|error| stage_failure(&filename, error))?;

        tracing::info!(
            filename = %filename,
            namespace = %namespace,
            chunks = chunks.len(),
            vectors_stored,
            "Document stored"
        );

        Ok(UploadResult {
            filename,
            chunks_created: chunks.len(),
            vectors_stored,
            namespace,
        })
    }

    /// Probe the configured vector store.
    pub async fn health(&self) -> StoreHealthSnapshot {
        let store = match &self.backends {
            Backends::Ready { store, .. } => store,
            Backends::Unavailable(reason) => {
                return StoreHealthSnapshot {
                    backend: "unavailable".to_string(),
                    connected: false,
                    error: Some(reason.clone()),
                };
            }
        };

        match store.health_check().await {
            Ok(connected) => StoreHealthSnapshot {
                backend: store.backend_name().to_string(),
                connected,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Vector store health probe failed");
                StoreHealthSnapshot {
                    backend: store.backend_name().to_string(),
                    connected: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl ProcessingApi for IngestionService {
    async fn ingest_batch(&self, files: Vec<UploadedFile>) -> Result<BatchOutcome, ProcessingError> {
        IngestionService::ingest_batch(self, files).await
    }

    async fn ingest_document(&self, file: UploadedFile) -> Result<UploadResult, ProcessingError> {
        IngestionService::ingest_document(self, file).await
    }

    async fn health(&self) -> StoreHealthSnapshot {
        IngestionService::health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestionService::metrics_snapshot(self)
    }
}

/// Case-insensitive `.pdf` suffix check on the client-supplied name.
pub(crate) fn is_pdf(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

fn stage_upload(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix("vectory-")
        .suffix(".pdf")
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

fn stage_failure(filename: &str, source: impl Into<StageError>) -> ProcessingError {
    ProcessingError::Failed {
        filename: filename.to_string(),
        source: source.into(),
    }
}
