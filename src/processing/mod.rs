//! Document ingestion pipeline: chunking, metadata, and orchestration.

pub mod chunking;
mod metadata;
mod service;
pub mod types;

pub use chunking::TextChunker;
pub use service::{IngestionService, ProcessingApi};
pub use types::{
    BatchOutcome, Chunk, ChunkingError, ProcessingError, StageError, StoreHealthSnapshot,
    UploadResult, UploadedFile,
};
