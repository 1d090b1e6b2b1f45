//! Namespace, id, and metadata construction for stored chunks.

use crate::vector_store::ChunkMetadata;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::Chunk;

/// Length of the random hex suffix appended to namespaces.
const NAMESPACE_SUFFIX_LEN: usize = 8;

/// Fresh namespace for one upload: `"{filename}-{8 hex chars}"`.
pub(crate) fn generate_namespace(filename: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{filename}-{}", &suffix[..NAMESPACE_SUFFIX_LEN])
}

/// Identifier of a chunk inside its namespace.
pub(crate) fn chunk_id(namespace: &str, chunk_index: usize) -> String {
    format!("{namespace}-chunk-{chunk_index}")
}

/// Current timestamp formatted for metadata storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Build one metadata record per chunk, sharing the upload timestamp.
pub(crate) fn build_metadata(
    filename: &str,
    chunks: &[Chunk],
    upload_timestamp: &str,
) -> Vec<ChunkMetadata> {
    let total_chunks = chunks.len();
    chunks
        .iter()
        .map(|chunk| ChunkMetadata {
            filename: filename.to_string(),
            page_number: chunk.page_number,
            chunk_index: chunk.chunk_index,
            upload_timestamp: upload_timestamp.to_string(),
            total_chunks,
            text: chunk.text.clone(),
        })
        .collect()
}
