//! Pinecone REST backend.
//!
//! Data-plane calls go to the index host. When no host is configured it is looked up once
//! through the control plane (`GET /indexes/{name}`) and cached for the life of the store.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{UpsertRequest, VectorStore, VectorStoreError};

/// Pinecone API version pinned for request and response shapes.
const API_VERSION: &str = "2024-07";
/// Records per upsert request; keeps payloads well under the 2 MB request cap.
const UPSERT_BATCH_SIZE: usize = 100;

/// Connection settings for a Pinecone index.
#[derive(Debug, Clone)]
pub struct PineconeSettings {
    /// API key sent as the `Api-Key` header.
    pub api_key: String,
    /// Index name, used to resolve the host.
    pub index_name: String,
    /// Data-plane host; with or without scheme.
    pub index_host: Option<String>,
    /// Control-plane base URL.
    pub control_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

/// [`VectorStore`] backed by a Pinecone index.
pub struct PineconeStore {
    client: Client,
    settings: PineconeSettings,
    host: OnceCell<String>,
}

impl PineconeStore {
    /// Construct a new client. No network calls happen until the first request.
    pub fn new(settings: PineconeSettings) -> Result<Self, VectorStoreError> {
        if settings.api_key.trim().is_empty() {
            return Err(VectorStoreError::InvalidArgument(
                "Pinecone API key must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .user_agent("vectory/0.1")
            .timeout(settings.timeout)
            .build()?;
        tracing::debug!(
            index = %settings.index_name,
            host = ?settings.index_host,
            "Initialized Pinecone HTTP client"
        );
        Ok(Self {
            client,
            settings,
            host: OnceCell::new(),
        })
    }

    async fn index_host(&self) -> Result<&str, VectorStoreError> {
        self.host
            .get_or_try_init(|| async {
                match &self.settings.index_host {
                    Some(host) => normalize_host(host),
                    None => self.describe_index_host().await,
                }
            })
            .await
            .map(String::as_str)
    }

    async fn describe_index_host(&self) -> Result<String, VectorStoreError> {
        let url = format_endpoint(
            &self.settings.control_url,
            &format!("indexes/{}", self.settings.index_name),
        );
        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        let description: IndexDescription = response.json().await?;
        let host = description.host.filter(|host| !host.trim().is_empty()).ok_or_else(|| {
            VectorStoreError::IndexUnavailable(format!(
                "index '{}' has no host yet",
                self.settings.index_name
            ))
        })?;
        tracing::debug!(index = %self.settings.index_name, host = %host, "Resolved Pinecone index host");
        normalize_host(&host)
    }

    async fn describe_index_stats(&self) -> Result<(), VectorStoreError> {
        let host = self.index_host().await?;
        let response = self
            .request(Method::POST, format_endpoint(host, "describe_index_stats"))
            .json(&json!({}))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected_status(response).await)
        }
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.settings.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<usize, VectorStoreError> {
        request.validate()?;
        if request.is_empty() {
            return Ok(0);
        }

        let host = self.index_host().await?;
        let url = format_endpoint(host, "vectors/upsert");
        let UpsertRequest {
            vectors,
            metadata,
            ids,
            namespace,
        } = request;

        let records: Vec<_> = ids
            .into_iter()
            .zip(vectors)
            .zip(metadata)
            .map(|((id, values), metadata)| {
                json!({
                    "id": id,
                    "values": values,
                    "metadata": metadata,
                })
            })
            .collect();

        let mut upserted = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let response = self
                .request(Method::POST, url.clone())
                .json(&json!({ "vectors": batch, "namespace": namespace }))
                .send()
                .await?;
            if !response.status().is_success() {
                let error = unexpected_status(response).await;
                tracing::error!(namespace = %namespace, error = %error, "Pinecone upsert failed");
                return Err(error);
            }
            let body: UpsertResponse = response.json().await?;
            upserted += body.upserted_count;
        }

        tracing::debug!(namespace = %namespace, upserted, "Vectors upserted to Pinecone");
        Ok(upserted)
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        match self.describe_index_stats().await {
            Ok(()) => Ok(true),
            Err(
                error @ (VectorStoreError::Http(_)
                | VectorStoreError::UnexpectedStatus { .. }
                | VectorStoreError::IndexUnavailable(_)),
            ) => {
                tracing::warn!(error = %error, "Pinecone health probe failed");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn backend_name(&self) -> &'static str {
        "pinecone"
    }
}

async fn unexpected_status(response: reqwest::Response) -> VectorStoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    VectorStoreError::UnexpectedStatus { status, body }
}

/// Accept bare hosts (as returned by the control plane) as well as full URLs.
fn normalize_host(host: &str) -> Result<String, VectorStoreError> {
    let trimmed = host.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let mut parsed = Url::parse(&candidate).map_err(|error| {
        VectorStoreError::InvalidArgument(format!("invalid Pinecone host '{host}': {error}"))
    })?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[derive(Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::ChunkMetadata;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn settings(host: Option<String>, control_url: String) -> PineconeSettings {
        PineconeSettings {
            api_key: "pc-test".into(),
            index_name: "vectory".into(),
            index_host: host,
            control_url,
            timeout: Duration::from_secs(5),
        }
    }

    fn request(namespace: &str, count: usize) -> UpsertRequest {
        UpsertRequest {
            vectors: (0..count).map(|i| vec![i as f32, 1.0]).collect(),
            metadata: (0..count)
                .map(|i| ChunkMetadata {
                    filename: "doc.pdf".into(),
                    page_number: 1,
                    chunk_index: i,
                    upload_timestamp: "2025-01-01T00:00:00Z".into(),
                    total_chunks: count,
                    text: format!("chunk {i}"),
                })
                .collect(),
            ids: (0..count).map(|i| format!("{namespace}-chunk-{i}")).collect(),
            namespace: namespace.into(),
        }
    }

    #[test]
    fn normalize_host_adds_scheme_and_trims_slash() {
        assert_eq!(
            normalize_host("idx-abc.svc.pinecone.io").expect("host"),
            "https://idx-abc.svc.pinecone.io/"
        );
        assert_eq!(
            normalize_host("http://127.0.0.1:5080/").expect("host"),
            "http://127.0.0.1:5080/"
        );
    }

    #[tokio::test]
    async fn upsert_posts_records_and_returns_reported_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .header("api-key", "pc-test")
                    .body_contains("\"namespace\":\"doc.pdf-1234abcd\"")
                    .body_contains("\"id\":\"doc.pdf-1234abcd-chunk-1\"");
                then.status(200).json_body(serde_json::json!({ "upsertedCount": 2 }));
            })
            .await;
        let store = PineconeStore::new(settings(Some(server.base_url()), server.base_url()))
            .expect("store");

        let stored = store
            .upsert(request("doc.pdf-1234abcd", 2))
            .await
            .expect("upsert");
        assert_eq!(stored, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upsert_resolves_host_through_control_plane_once() {
        let data_plane = MockServer::start_async().await;
        let control_plane = MockServer::start_async().await;
        let describe = control_plane
            .mock_async({
                let host = data_plane.base_url();
                move |when, then| {
                    when.method(GET).path("/indexes/vectory");
                    then.status(200)
                        .json_body(serde_json::json!({ "name": "vectory", "host": host }));
                }
            })
            .await;
        let upsert = data_plane
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(serde_json::json!({ "upsertedCount": 1 }));
            })
            .await;
        let store =
            PineconeStore::new(settings(None, control_plane.base_url())).expect("store");

        store.upsert(request("ns", 1)).await.expect("first");
        store.upsert(request("ns", 1)).await.expect("second");

        describe.assert_hits_async(1).await;
        upsert.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn upsert_sums_counts_across_sub_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(serde_json::json!({ "upsertedCount": 100 }));
            })
            .await;
        let store = PineconeStore::new(settings(Some(server.base_url()), server.base_url()))
            .expect("store");

        let stored = store.upsert(request("ns", 150)).await.expect("upsert");
        assert_eq!(stored, 200);
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn blank_namespace_is_rejected_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200).json_body(serde_json::json!({ "upsertedCount": 1 }));
            })
            .await;
        let store = PineconeStore::new(settings(Some(server.base_url()), server.base_url()))
            .expect("store");

        let error = store.upsert(request("  ", 1)).await.unwrap_err();
        assert!(matches!(error, VectorStoreError::InvalidArgument(_)));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn upsert_failure_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(400).body("dimension mismatch");
            })
            .await;
        let store = PineconeStore::new(settings(Some(server.base_url()), server.base_url()))
            .expect("store");

        let error = store.upsert(request("ns", 1)).await.unwrap_err();
        assert!(matches!(error, VectorStoreError::UnexpectedStatus { .. }));
        assert!(error.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn health_check_reports_reachability_without_failing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/describe_index_stats");
                then.status(200).json_body(serde_json::json!({ "dimension": 1536 }));
            })
            .await;
        let healthy = PineconeStore::new(settings(Some(server.base_url()), server.base_url()))
            .expect("store");
        assert!(healthy.health_check().await.expect("probe"));

        let unauthorized = MockServer::start_async().await;
        unauthorized
            .mock_async(|when, then| {
                when.method(POST).path("/describe_index_stats");
                then.status(401).body("unauthorized");
            })
            .await;
        let rejected = PineconeStore::new(settings(
            Some(unauthorized.base_url()),
            unauthorized.base_url(),
        ))
        .expect("store");
        assert!(!rejected.health_check().await.expect("probe"));

        let unreachable = PineconeStore::new(settings(
            Some("http://127.0.0.1:9".into()),
            "http://127.0.0.1:9".into(),
        ))
        .expect("store");
        assert!(!unreachable.health_check().await.expect("probe"));
    }

    #[tokio::test]
    async fn stalled_upsert_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vectors/upsert");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(serde_json::json!({ "upsertedCount": 1 }));
            })
            .await;
        let store = PineconeStore::new(PineconeSettings {
            timeout: Duration::from_millis(100),
            ..settings(Some(server.base_url()), server.base_url())
        })
        .expect("store");

        let error = store.upsert(request("ns", 1)).await.unwrap_err();
        assert!(matches!(error, VectorStoreError::Http(ref inner) if inner.is_timeout()));
    }
}
