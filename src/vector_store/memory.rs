//! Process-local vector store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ChunkMetadata, UpsertRequest, VectorStore, VectorStoreError};

/// A stored vector with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Metadata written with the vector.
    pub metadata: ChunkMetadata,
}

/// In-memory store keyed by namespace, then record id. Contents vanish on restart.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, HashMap<String, StoredRecord>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `namespace`.
    pub async fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Fetch a stored record.
    pub async fn get(&self, namespace: &str, id: &str) -> Option<StoredRecord> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .and_then(|records| records.get(id))
            .cloned()
    }

    /// Names of all namespaces written so far.
    pub async fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<usize, VectorStoreError> {
        request.validate()?;
        let UpsertRequest {
            vectors,
            metadata,
            ids,
            namespace,
        } = request;

        let mut namespaces = self.namespaces.write().await;
        let records = namespaces.entry(namespace.clone()).or_default();
        let mut written = 0;
        for ((id, vector), metadata) in ids.into_iter().zip(vectors).zip(metadata) {
            records.insert(id, StoredRecord { vector, metadata });
            written += 1;
        }
        tracing::debug!(namespace = %namespace, written, "Stored vectors in memory");
        Ok(written)
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
