//! HTTP surface for Vectory.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /` – Service banner.
//! - `GET /api/health` – Vector store reachability. Always answers 200; a failed probe is
//!   reported in the body.
//! - `POST /api/upload` – Multipart upload (field `files`, repeatable) of PDF documents. Each file
//!   is extracted, chunked, embedded, and stored under its own namespace.
//! - `GET /api/metrics` – Ingestion counters since process start.
//!
//! Failures are answered with a JSON body `{"detail": "..."}`.

use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingApi, ProcessingError, UploadResult, UploadedFile};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Largest request body accepted by the upload endpoint.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Multipart field carrying uploaded documents.
const FILES_FIELD: &str = "files";

/// Build the HTTP router exposing the ingestion API surface.
///
/// `allowed_origin` is the browser origin permitted by CORS.
pub fn create_router<S>(service: Arc<S>, allowed_origin: &str) -> Router
where
    S: ProcessingApi + 'static,
{
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health::<S>))
        .route("/api/upload", post(upload_documents::<S>))
        .route("/api/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(trace_layer)
        .layer(cors_layer(allowed_origin))
        .with_state(service)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(error) => {
            tracing::warn!(origin = allowed_origin, error = %error, "Ignoring invalid CORS origin");
            layer
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Vectory API - PDF to Vector Pipeline" }))
}

/// Response body for `GET /api/health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    pinecone_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Report vector store reachability. The endpoint itself never fails.
async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: ProcessingApi,
{
    let snapshot = service.health().await;
    tracing::debug!(
        backend = %snapshot.backend,
        connected = snapshot.connected,
        "Health probe completed"
    );
    Json(HealthResponse {
        status: "ok",
        pinecone_connected: snapshot.connected,
        error: snapshot.error,
    })
}

/// Success response for `POST /api/upload`.
#[derive(Serialize)]
struct UploadResponse {
    /// `false` only when some files failed under the isolating batch policy.
    success: bool,
    /// Number of files stored.
    files_processed: usize,
    /// Per-file results, in submission order.
    results: Vec<UploadResult>,
    /// Per-file failures; present only when non-empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<UploadFailure>,
}

/// One failed file in an isolated batch.
#[derive(Serialize)]
struct UploadFailure {
    filename: Option<String>,
    status: u16,
    detail: String,
}

/// Accept PDF uploads and run each through the ingestion pipeline.
async fn upload_documents<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: ProcessingApi,
{
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            tracing::debug!(field = ?field.name(), "Skipping unexpected multipart field");
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        tracing::debug!(filename = %filename, bytes = bytes.len(), "Received upload");
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }

    let outcome = service.ingest_batch(files).await?;
    let success = outcome.is_success();
    let failures: Vec<UploadFailure> = outcome
        .failures
        .into_iter()
        .map(|error| UploadFailure {
            filename: error.filename().map(str::to_string),
            status: status_for(&error).as_u16(),
            detail: error.to_string(),
        })
        .collect();
    tracing::info!(
        stored = outcome.results.len(),
        failed = failures.len(),
        "Upload request completed"
    );

    Ok(Json(UploadResponse {
        success,
        files_processed: outcome.results.len(),
        results: outcome.results,
        failures,
    }))
}

/// Return the ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// HTTP status used for each classified processing failure.
fn status_for(error: &ProcessingError) -> StatusCode {
    match error {
        ProcessingError::EmptyUpload | ProcessingError::UnsupportedFileType { .. } => {
            StatusCode::BAD_REQUEST
        }
        ProcessingError::NoExtractableText { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProcessingError::Unavailable(_) | ProcessingError::Failed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

enum AppError {
    Processing(ProcessingError),
    Multipart(MultipartError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Processing(error) => (status_for(&error), error.to_string()),
            Self::Multipart(error) => (
                error.status(),
                format!("Failed to read multipart body: {}", error.body_text()),
            ),
        };
        if status.is_server_error() {
            tracing::error!(%status, detail = %detail, "Upload request failed");
        } else {
            tracing::warn!(%status, detail = %detail, "Upload request rejected");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        BatchOutcome, ProcessingApi, ProcessingError, StoreHealthSnapshot, UploadResult,
        UploadedFile,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "vectory-test-boundary";
    const ORIGIN: &str = "http://localhost:3000";

    enum Behavior {
        Store,
        Fail(fn(&str) -> ProcessingError),
        Isolate,
    }

    struct StubProcessingService {
        calls: Mutex<Vec<Vec<UploadedFile>>>,
        behavior: Behavior,
        connected: bool,
    }

    impl StubProcessingService {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                behavior,
                connected: true,
            })
        }

        fn disconnected() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                behavior: Behavior::Store,
                connected: false,
            })
        }

        async fn recorded_calls(&self) -> Vec<Vec<UploadedFile>> {
            self.calls.lock().await.clone()
        }
    }

    fn stored(filename: &str) -> UploadResult {
        UploadResult {
            filename: filename.to_string(),
            chunks_created: 3,
            vectors_stored: 3,
            namespace: format!("{filename}-0badcafe"),
        }
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn ingest_batch(
            &self,
            files: Vec<UploadedFile>,
        ) -> Result<BatchOutcome, ProcessingError> {
            self.calls.lock().await.push(files.clone());
            if files.is_empty() {
                return Err(ProcessingError::EmptyUpload);
            }
            if let Some(file) = files.iter().find(|f| !f.filename.ends_with(".pdf")) {
                return Err(ProcessingError::UnsupportedFileType {
                    filename: file.filename.clone(),
                });
            }
            match &self.behavior {
                Behavior::Store => Ok(BatchOutcome {
                    results: files.iter().map(|f| stored(&f.filename)).collect(),
                    failures: Vec::new(),
                }),
                Behavior::Fail(make) => Err(make(&files[0].filename)),
                Behavior::Isolate => Ok(BatchOutcome {
                    results: vec![stored(&files[0].filename)],
                    failures: files[1..]
                        .iter()
                        .map(|f| ProcessingError::NoExtractableText {
                            filename: f.filename.clone(),
                        })
                        .collect(),
                }),
            }
        }

        async fn ingest_document(
            &self,
            file: UploadedFile,
        ) -> Result<UploadResult, ProcessingError> {
            Ok(stored(&file.filename))
        }

        async fn health(&self) -> StoreHealthSnapshot {
            StoreHealthSnapshot {
                backend: "stub".into(),
                connected: self.connected,
                error: (!self.connected).then(|| "connection refused".to_string()),
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 4,
                chunks_created: 12,
                vectors_stored: 12,
                failed_documents: 1,
            }
        }
    }

    fn multipart_body(parts: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, filename, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn upload_route_forwards_files_in_order() {
        let service = StubProcessingService::new(Behavior::Store);
        let app = create_router(service.clone(), ORIGIN);

        let response = app
            .oneshot(upload_request(&[
                ("files", "a.pdf", "%PDF-a"),
                ("files", "b.pdf", "%PDF-b"),
            ]))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["files_processed"], 2);
        assert_eq!(json["results"][0]["filename"], "a.pdf");
        assert_eq!(json["results"][1]["namespace"], "b.pdf-0badcafe");
        assert_eq!(json["results"][0]["chunks_created"], 3);
        assert!(json.get("failures").is_none());

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].bytes, b"%PDF-a");
        assert_eq!(calls[0][1].filename, "b.pdf");
    }

    #[tokio::test]
    async fn unsupported_file_type_is_a_bad_request() {
        let app = create_router(StubProcessingService::new(Behavior::Store), ORIGIN);

        let response = app
            .oneshot(upload_request(&[("files", "notes.txt", "hello")]))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(
            json["detail"],
            "Invalid file type: notes.txt. Only PDF files are accepted."
        );
    }

    #[tokio::test]
    async fn request_without_files_is_a_bad_request() {
        let service = StubProcessingService::new(Behavior::Store);
        let app = create_router(service.clone(), ORIGIN);

        let response = app
            .oneshot(upload_request(&[("other", "a.pdf", "%PDF")]))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "No files uploaded");
        assert!(service.recorded_calls().await[0].is_empty());
    }

    #[tokio::test]
    async fn processing_failures_map_to_status_codes() {
        let cases: [(fn(&str) -> ProcessingError, StatusCode, &str); 3] = [
            (
                |filename| ProcessingError::NoExtractableText {
                    filename: filename.to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
                "No text could be extracted from scan.pdf",
            ),
            (
                |_| ProcessingError::Unavailable("missing key".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
                "Service initialization failed: missing key",
            ),
            (
                |filename| ProcessingError::Failed {
                    filename: filename.to_string(),
                    source: crate::processing::StageError::Store(
                        crate::vector_store::VectorStoreError::IndexUnavailable("gone".into()),
                    ),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "Processing failed for scan.pdf: Vector index unavailable: gone",
            ),
        ];

        for (make, status, detail) in cases {
            let app = create_router(StubProcessingService::new(Behavior::Fail(make)), ORIGIN);
            let response = app
                .oneshot(upload_request(&[("files", "scan.pdf", "%PDF")]))
                .await
                .expect("router response");
            assert_eq!(response.status(), status);
            assert_eq!(json_body(response).await["detail"], detail);
        }
    }

    #[tokio::test]
    async fn isolated_failures_are_reported_alongside_results() {
        let app = create_router(StubProcessingService::new(Behavior::Isolate), ORIGIN);

        let response = app
            .oneshot(upload_request(&[
                ("files", "good.pdf", "%PDF"),
                ("files", "scan.pdf", "%PDF"),
            ]))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["files_processed"], 1);
        assert_eq!(json["failures"][0]["filename"], "scan.pdf");
        assert_eq!(json["failures"][0]["status"], 422);
        assert_eq!(
            json["failures"][0]["detail"],
            "No text could be extracted from scan.pdf"
        );
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        for (service, connected) in [
            (StubProcessingService::new(Behavior::Store), true),
            (StubProcessingService::disconnected(), false),
        ] {
            let response = create_router(service, ORIGIN)
                .oneshot(
                    Request::builder()
                        .uri("/api/health")
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("router response");
            assert_eq!(response.status(), StatusCode::OK);
            let json = json_body(response).await;
            assert_eq!(json["status"], "ok");
            assert_eq!(json["pinecone_connected"], connected);
            assert_eq!(json.get("error").is_some(), !connected);
        }
    }

    #[tokio::test]
    async fn root_and_metrics_routes_respond() {
        let app = create_router(StubProcessingService::new(Behavior::Store), ORIGIN);
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        assert_eq!(
            json_body(response).await["message"],
            "Vectory API - PDF to Vector Pipeline"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = json_body(response).await;
        assert_eq!(json["documents_ingested"], 4);
        assert_eq!(json["failed_documents"], 1);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = create_router(StubProcessingService::new(Behavior::Store), ORIGIN);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/upload")
                    .header(header::ORIGIN, ORIGIN)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some(ORIGIN)
        );
    }
}
