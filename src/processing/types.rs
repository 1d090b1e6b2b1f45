//! Core data types and error definitions for the processing pipeline.

use crate::embedding::EmbeddingClientError;
use crate::extraction::ExtractionError;
use crate::vector_store::VectorStoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while configuring the text chunker.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would make every window repeat the previous one.
    #[error("chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Configured window size.
        chunk_size: usize,
        /// Configured overlap.
        chunk_overlap: usize,
    },
}

/// Failure of one pipeline stage while processing a single file.
#[derive(Debug, Error)]
pub enum StageError {
    /// Writing the upload to its transient file failed.
    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),
    /// The PDF could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    ExtractionTask(#[from] tokio::task::JoinError),
    /// The embedding provider failed for the batch.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The vector store rejected or failed the write.
    #[error(transparent)]
    Store(#[from] VectorStoreError),
}

/// Classified outcome of a failed upload, mapped onto HTTP status codes by the API.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The request carried no files.
    #[error("No files uploaded")]
    EmptyUpload,
    /// The file name does not carry the `.pdf` extension.
    #[error("Invalid file type: {filename}. Only PDF files are accepted.")]
    UnsupportedFileType {
        /// Rejected file name.
        filename: String,
    },
    /// The document produced no chunks.
    #[error("No text could be extracted from {filename}")]
    NoExtractableText {
        /// File without extractable text.
        filename: String,
    },
    /// Embedding or storage backends could not be initialised.
    #[error("Service initialization failed: {0}")]
    Unavailable(String),
    /// A pipeline stage failed for one file.
    #[error("Processing failed for {filename}: {source}")]
    Failed {
        /// File being processed.
        filename: String,
        /// Stage failure.
        #[source]
        source: StageError,
    },
}

impl ProcessingError {
    /// File this error is scoped to, if any.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::UnsupportedFileType { filename }
            | Self::NoExtractableText { filename }
            | Self::Failed { filename, .. } => Some(filename),
            Self::EmptyUpload | Self::Unavailable(_) => None,
        }
    }
}

/// A window of page text ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Page the text came from.
    pub page_number: u32,
    /// Position of the chunk within the whole document.
    pub chunk_index: usize,
    /// Trimmed chunk text, never empty.
    pub text: String,
}

/// One file submitted for ingestion.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub filename: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Pair a file name with its contents.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Summary of a successfully stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Original file name.
    pub filename: String,
    /// Number of chunks produced.
    pub chunks_created: usize,
    /// Number of vectors the store reported as written.
    pub vectors_stored: usize,
    /// Namespace holding this upload's vectors.
    pub namespace: String,
}

/// Per-file results of a multi-file upload.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Stored files, in submission order.
    pub results: Vec<UploadResult>,
    /// Failed files, in submission order.
    pub failures: Vec<ProcessingError>,
}

impl BatchOutcome {
    /// Whether every processed file was stored.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reachability snapshot of the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHealthSnapshot {
    /// Name of the configured backend.
    pub backend: String,
    /// Whether the store answered the probe.
    pub connected: bool,
    /// Diagnostic captured when the probe could not run or the service is unavailable.
    pub error: Option<String>,
}
