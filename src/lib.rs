#![deny(missing_docs)]

//! Core library for the Vectory PDF-to-vector ingestion service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Page-level PDF text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Vector store contract and backends.
pub mod vector_store;
