use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity since process start.
#[derive(Default)]
pub struct IngestMetrics {
    documents_ingested: AtomicU64,
    chunks_created: AtomicU64,
    vectors_stored: AtomicU64,
    failed_documents: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored document with its chunk and vector counts.
    pub fn record_document(&self, chunks_created: u64, vectors_stored: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_created
            .fetch_add(chunks_created, Ordering::Relaxed);
        self.vectors_stored
            .fetch_add(vectors_stored, Ordering::Relaxed);
    }

    /// Record a document that failed anywhere after validation.
    pub fn record_failure(&self) {
        self.failed_documents.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_created: self.chunks_created.load(Ordering::Relaxed),
            vectors_stored: self.vectors_stored.load(Ordering::Relaxed),
            failed_documents: self.failed_documents.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents whose vectors reached the store.
    pub documents_ingested: u64,
    /// Chunks produced across all stored documents.
    pub chunks_created: u64,
    /// Vectors the store reported as written.
    pub vectors_stored: u64,
    /// Documents that failed after passing file-type validation.
    pub failed_documents: u64,
}
