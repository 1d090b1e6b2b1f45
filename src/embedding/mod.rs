use crate::config::{Config, ConfigError, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod openai;

pub use openai::OpenAiClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// The API key is blank or cannot be sent as a header.
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of inputs sent.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Provider returned vectors of differing lengths within one batch.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the first vector in the batch.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
///
/// Implementations return exactly one vector per input, in input order, all of the same length.
/// An empty input yields an empty output without contacting the provider.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Check the one-to-one, uniform-length contract for a batch of vectors.
pub(crate) fn ensure_batch_shape(
    inputs: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingClientError> {
    if vectors.len() != inputs {
        return Err(EmbeddingClientError::CountMismatch {
            expected: inputs,
            actual: vectors.len(),
        });
    }
    if let Some(first) = vectors.first() {
        let expected = first.len();
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
    }
    Ok(())
}

/// Deterministic offline embedding client that hashes bytes into vector slots.
pub struct HashingClient {
    dimension: usize,
}

impl HashingClient {
    /// Construct a hashing client producing vectors of `dimension` floats.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(
            dimension = self.dimension,
            inputs = texts.len(),
            "Generating local embeddings"
        );

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Build an embedding client suitable for the given configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, ConfigError> {
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingVariable("OPENAI_API_KEY".to_string()))?;
            let client = OpenAiClient::new(
                api_key,
                &config.openai_base_url,
                config.embedding_model.clone(),
                config.embedding_batch_size,
                config.http_timeout(),
            )
            .map_err(setup_error)?;
            Ok(Arc::new(client))
        }
        EmbeddingProvider::Local => Ok(Arc::new(HashingClient::new(config.embedding_dimension))),
    }
}

/// Only key problems are attributed to `OPENAI_API_KEY`.
fn setup_error(error: EmbeddingClientError) -> ConfigError {
    match error {
        EmbeddingClientError::InvalidApiKey(reason) => {
            ConfigError::InvalidValue(format!("OPENAI_API_KEY ({reason})"))
        }
        other => ConfigError::ClientSetup(other.to_string()),
    }
}
