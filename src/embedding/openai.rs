//! OpenAI-compatible embeddings client.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingClient, EmbeddingClientError, ensure_batch_shape};

/// Async embeddings client that talks to OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
}

impl OpenAiClient {
    /// Build a new client. `batch_size` caps the inputs sent per HTTP request and `timeout`
    /// bounds each request.
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(EmbeddingClientError::InvalidApiKey(
                "missing OpenAI API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            EmbeddingClientError::InvalidApiKey("invalid OpenAI API key".to_string())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent("vectory/0.1")
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| {
                EmbeddingClientError::GenerationFailed(format!(
                    "failed to build OpenAI HTTP client: {error}"
                ))
            })?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        tracing::debug!(endpoint = %endpoint, model = %model, batch_size, "Initialized OpenAI embeddings client");

        Ok(Self {
            client,
            endpoint,
            model,
            batch_size: batch_size.max(1),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| EmbeddingClientError::GenerationFailed(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "OpenAI embeddings request failed");
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI embeddings request failed ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to parse OpenAI embedding response: {error}"
            ))
        })?;
        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embed_batch(batch).await?;
            ensure_batch_shape(batch.len(), &embedded)?;
            vectors.extend(embedded);
        }
        ensure_batch_shape(texts.len(), &vectors)?;

        tracing::debug!(
            model = %self.model,
            inputs = texts.len(),
            dimension = vectors.first().map(Vec::len).unwrap_or(0),
            "Generated embeddings"
        );
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
