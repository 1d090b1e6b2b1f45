//! Vector store contract and backends.
//!
//! The ingestion pipeline only sees [`VectorStore`]; backends are picked by
//! [`build_vector_store`] from configuration, so swapping Pinecone for another index never
//! touches orchestration code.

use crate::config::{Config, ConfigError, VectorStoreBackend};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod pinecone;

pub use memory::{MemoryStore, StoredRecord};
pub use pinecone::{PineconeSettings, PineconeStore};

/// Errors returned by vector store backends.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// The request was rejected before any I/O.
    #[error("Invalid upsert request: {0}")]
    InvalidArgument(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The backend's index could not be located.
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),
}

/// Metadata stored next to every chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source file name.
    pub filename: String,
    /// Page the chunk came from.
    pub page_number: u32,
    /// Position of the chunk within its file.
    pub chunk_index: usize,
    /// Upload time shared by every chunk of the file (RFC3339, UTC).
    pub upload_timestamp: String,
    /// Number of chunks produced for the file.
    pub total_chunks: usize,
    /// Chunk text, kept for display without a second fetch.
    pub text: String,
}

/// Positionally aligned vectors, metadata, and ids bound for one namespace.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    /// Embedding vectors.
    pub vectors: Vec<Vec<f32>>,
    /// Metadata for `vectors[i]`.
    pub metadata: Vec<ChunkMetadata>,
    /// Identifier for `vectors[i]`.
    pub ids: Vec<String>,
    /// Namespace isolating this upload.
    pub namespace: String,
}

impl UpsertRequest {
    /// Check the namespace and positional alignment; backends call this before any I/O.
    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.namespace.trim().is_empty() {
            return Err(VectorStoreError::InvalidArgument(
                "namespace must not be empty".to_string(),
            ));
        }
        let vectors = self.vectors.len();
        if self.metadata.len() != vectors || self.ids.len() != vectors {
            return Err(VectorStoreError::InvalidArgument(format!(
                "length mismatch: {vectors} vectors, {} metadata records, {} ids",
                self.metadata.len(),
                self.ids.len()
            )));
        }
        Ok(())
    }

    /// Number of records in the request.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the request carries no records.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Capability set every storage backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write the records and return how many the backend reports as stored.
    ///
    /// `vectors[i]`, `metadata[i]`, and `ids[i]` describe the same record. Blank namespaces and
    /// misaligned inputs are rejected with [`VectorStoreError::InvalidArgument`].
    async fn upsert(&self, request: UpsertRequest) -> Result<usize, VectorStoreError>;

    /// Probe the backend. Ordinary connectivity failures yield `Ok(false)`.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Build the vector store selected by configuration.
pub fn build_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>, ConfigError> {
    match config.vector_store_backend {
        VectorStoreBackend::Pinecone => {
            let api_key = config
                .pinecone_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingVariable("PINECONE_API_KEY".to_string()))?;
            let settings = PineconeSettings {
                api_key,
                index_name: config.pinecone_index_name.clone(),
                index_host: config.pinecone_index_host.clone(),
                control_url: config.pinecone_control_url.clone(),
                timeout: config.http_timeout(),
            };
            let store = PineconeStore::new(settings).map_err(setup_error)?;
            Ok(Arc::new(store))
        }
        VectorStoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Only key problems are attributed to `PINECONE_API_KEY`.
fn setup_error(error: VectorStoreError) -> ConfigError {
    match error {
        VectorStoreError::InvalidArgument(reason) => {
            ConfigError::InvalidValue(format!("PINECONE_API_KEY ({reason})"))
        }
        other => ConfigError::ClientSetup(other.to_string()),
    }
}
