use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post},
    Router,
};
use routes::{
    bucket::create_bucket,
    documents::{clear_documents, delete_document, get_corpus, list_documents},
    index::{service_info, status},
    liveness::live,
    query::query_documents,
    upload::upload_documents,
};
use tower_http::cors::CorsLayer;

pub mod api_state;
pub mod batch;
pub mod error;
mod routes;
pub mod service;

/// Router for the document and query API.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(service_info))
        .route("/status", get(status))
        .route("/live", get(live))
        .route("/documents", get(list_documents))
        .route("/documents/{id}", delete(delete_document))
        .route("/corpus", get(get_corpus))
        .route(
            "/upload",
            post(upload_documents).layer(DefaultBodyLimit::max(
                app_state.config.upload_max_body_bytes,
            )),
        )
        .route("/query", post(query_documents))
        .route("/clear", post(clear_documents))
        .route("/bucket/create", get(create_bucket))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use common::{
        protocol::{
            ClearResponse, DocumentListResponse, ErrorBody, QueryResponse, StatusResponse,
            UploadResponse,
        },
        storage::store::StorageManager,
        utils::config::{AppConfig, StorageKind},
    };
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use vertex_rag::testing::MockRagEngine;

    use super::*;

    const BOUNDARY: &str = "----rag-test-boundary";

    struct TestApp {
        router: Router,
        state: ApiState,
        engine: Arc<MockRagEngine>,
    }

    fn test_config() -> AppConfig {
        AppConfig {
            project_id: Some("test-project".into()),
            storage: StorageKind::Memory,
            upload_max_files: 3,
            upload_max_file_bytes: 1024,
            ..Default::default()
        }
    }

    fn test_app() -> TestApp {
        test_app_with(&test_config())
    }

    fn test_app_with(config: &AppConfig) -> TestApp {
        let engine = Arc::new(MockRagEngine::new());
        let state = ApiState::with_components(
            config,
            StorageManager::memory("test-bucket"),
            engine.clone(),
        );

        TestApp {
            router: api_routes(&state).with_state(state.clone()),
            state,
            engine,
        }
    }

    fn multipart_body(files: &[(&str, &str)], fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (file_name, contents) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(app: &TestApp, files: &[(&str, &str)], fields: &[(&str, &str)]) -> Response {
        app.router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(files, fields)))
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response")
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn listed_filenames(app: &TestApp) -> Vec<String> {
        let response = send(app, Method::GET, "/documents", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing: DocumentListResponse = json_body(response).await;
        assert_eq!(listing.total_count, listing.documents.len());
        listing.documents.into_iter().map(|d| d.filename).collect()
    }

    #[tokio::test]
    async fn upload_adds_file_to_listing() {
        let app = test_app();

        let response = upload(
            &app,
            &[("notes.txt", "quarterly numbers")],
            &[("description", "q3 notes")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: UploadResponse = json_body(response).await;
        assert_eq!(body.succeeded, 1);
        assert_eq!(body.failed, 0);
        assert!(body.corpus_updated);
        let gcs_path = body.uploaded_files[0].gcs_path.clone().unwrap_or_default();
        assert!(gcs_path.starts_with("memory://test-bucket/documents/"));

        assert_eq!(listed_filenames(&app).await, vec!["notes.txt".to_string()]);
        assert_eq!(app.engine.corpora_created(), 1);
        assert_eq!(app.engine.imports(), 1);

        let stored = app.state.storage.list(Some("documents")).await.expect("list");
        assert_eq!(stored.len(), 1);

        let docs = app.state.registry.list().await;
        assert_eq!(docs[0].description.as_deref(), Some("q3 notes"));
        assert!(docs[0].rag_file.is_some());
    }

    #[tokio::test]
    async fn second_upload_reuses_corpus() {
        let app = test_app();

        upload(&app, &[("a.md", "# a")], &[]).await;
        upload(&app, &[("b.md", "# b")], &[]).await;

        assert_eq!(app.engine.corpora_created(), 1);
        let corpus = app.state.registry.corpus().await.expect("active corpus");
        assert_eq!(corpus.document_count, 2);
    }

    #[tokio::test]
    async fn unsupported_type_rejected_before_network() {
        let app = test_app();

        let response = upload(
            &app,
            &[("ok.txt", "fine"), ("photo.png", "PNG image")],
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.status, "error");
        assert!(body.detail.contains("Unsupported file type: .png"));

        assert_eq!(app.engine.total_calls(), 0);
        assert!(app
            .state
            .storage
            .list(None)
            .await
            .expect("list")
            .is_empty());
        assert!(listed_filenames(&app).await.is_empty());
    }

    #[tokio::test]
    async fn upload_limits_are_enforced_locally() {
        let app = test_app();

        let empty = upload(&app, &[("empty.txt", "")], &[]).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let big = "a".repeat(2048);
        let oversized = upload(&app, &[("big.txt", big.as_str())], &[]).await;
        assert_eq!(oversized.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bad_chunking = upload(
            &app,
            &[("a.txt", "text")],
            &[("chunk_size", "100"), ("chunk_overlap", "100")],
        )
        .await;
        assert_eq!(bad_chunking.status(), StatusCode::BAD_REQUEST);

        let none = upload(&app, &[], &[]).await;
        assert_eq!(none.status(), StatusCode::BAD_REQUEST);

        assert_eq!(app.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn failed_imports_are_not_registered() {
        let app = test_app();
        app.engine.fail_imports(true);

        let response = upload(&app, &[("a.txt", "text")], &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        assert!(listed_filenames(&app).await.is_empty());
        assert!(app
            .state
            .storage
            .list(None)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn invalid_query_parameters_rejected_locally() {
        let app = test_app();
        upload(&app, &[("a.txt", "text")], &[]).await;

        let zero_k = send(
            &app,
            Method::POST,
            "/query",
            Some(json!({ "query": "what?", "top_k": 0 })),
        )
        .await;
        assert_eq!(zero_k.status(), StatusCode::BAD_REQUEST);

        let negative_threshold = send(
            &app,
            Method::POST,
            "/query",
            Some(json!({ "query": "what?", "distance_threshold": -0.1 })),
        )
        .await;
        assert_eq!(negative_threshold.status(), StatusCode::BAD_REQUEST);

        assert_eq!(app.engine.queries(), 0);
    }

    #[tokio::test]
    async fn query_requires_documents() {
        let app = test_app();

        let response = send(&app, Method::POST, "/query", Some(json!({ "query": "hi" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.engine.queries(), 0);
    }

    #[tokio::test]
    async fn query_returns_answer_and_sources() {
        let app = test_app();
        upload(&app, &[("a.txt", "text")], &[]).await;

        let response = send(
            &app,
            Method::POST,
            "/query",
            Some(json!({ "query": "  what? ", "top_k": 5, "system_prompt": "be brief" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: QueryResponse = json_body(response).await;
        assert_eq!(body.query, "what?");
        assert_eq!(body.answer, "[be brief] answer to: what?");
        assert_eq!(body.retrieval_results.len(), 1);
        assert!(body.corpus_used.contains("ragCorpora"));
    }

    #[tokio::test]
    async fn delete_removes_document_from_listing() {
        let app = test_app();
        upload(&app, &[("a.txt", "one"), ("b.txt", "two")], &[]).await;

        let id = app
            .state
            .registry
            .list()
            .await
            .into_iter()
            .find(|d| d.filename == "a.txt")
            .map(|d| d.id)
            .expect("a.txt registered");

        let response = send(&app, Method::DELETE, &format!("/documents/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(listed_filenames(&app).await, vec!["b.txt".to_string()]);
        assert_eq!(app.engine.files_deleted(), 1);

        let again = send(&app, Method::DELETE, &format!("/documents/{id}"), None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clear_empties_listing() {
        let app = test_app();
        upload(&app, &[("a.txt", "one"), ("b.pdf", "%PDF-1.4")], &[]).await;

        let response = send(&app, Method::POST, "/clear", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: ClearResponse = json_body(response).await;
        assert_eq!(body.documents_removed, 2);
        assert_eq!(body.objects_deleted, 2);
        assert!(body.corpus_deleted);

        assert!(listed_filenames(&app).await.is_empty());
        assert!(app.state.registry.corpus().await.is_none());

        let corpus: Value = json_body(send(&app, Method::GET, "/corpus", None).await).await;
        assert_eq!(corpus, json!({ "message": "No active corpus" }));
    }

    #[tokio::test]
    async fn concurrent_first_uploads_share_one_corpus() {
        let app = test_app();

        let (first, second) = tokio::join!(
            upload(&app, &[("a.txt", "one")], &[]),
            upload(&app, &[("b.txt", "two")], &[]),
        );
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);

        assert_eq!(app.engine.corpora_created(), 1);
        let corpus = app.state.registry.corpus().await.expect("active corpus");
        assert_eq!(corpus.document_count, 2);
        assert_eq!(listed_filenames(&app).await.len(), 2);
    }

    #[tokio::test]
    async fn mixed_import_outcome_registers_only_successes() {
        let app = test_app();
        app.engine.fail_imports_matching("rejected");

        let response = upload(
            &app,
            &[("accepted.txt", "good"), ("rejected.txt", "bad")],
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: UploadResponse = json_body(response).await;
        assert_eq!(body.succeeded, 1);
        assert_eq!(body.failed, 1);
        let failed = body
            .uploaded_files
            .iter()
            .find(|f| f.filename == "rejected.txt")
            .expect("failed file reported");
        assert!(failed.error.is_some());
        assert!(failed.id.is_none());

        assert_eq!(listed_filenames(&app).await, vec!["accepted.txt".to_string()]);
        let stored = app.state.storage.list(Some("documents")).await.expect("list");
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn credentials_failure_aborts_upload_with_503() {
        let app = test_app();
        app.engine.reject_credentials(true);

        let response = upload(&app, &[("a.txt", "one"), ("b.txt", "two")], &[]).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.status, "error");
        assert_eq!(app.engine.imports(), 1);
        assert!(listed_filenames(&app).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_query_body_is_a_json_400() {
        let app = test_app();
        upload(&app, &[("a.txt", "text")], &[]).await;

        for body in [
            json!({ "query": "what?", "top_k": 1.5 }),
            json!({ "query": "what?", "top_k": "5" }),
            json!({}),
        ] {
            let response = send(&app, Method::POST, "/query", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let error: ErrorBody = json_body(response).await;
            assert_eq!(error.status, "error");
            assert!(error.detail.starts_with("Invalid request body"));
        }

        let not_json = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = json_body(not_json).await;
        assert_eq!(error.status, "error");

        assert_eq!(app.engine.queries(), 0);
    }

    #[tokio::test]
    async fn query_uses_requested_model() {
        let app = test_app();
        upload(&app, &[("a.txt", "text")], &[]).await;

        let response = send(
            &app,
            Method::POST,
            "/query",
            Some(json!({ "query": "what?", "model": " gemini-1.5-pro " })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: QueryResponse = json_body(response).await;
        assert_eq!(body.answer, "<gemini-1.5-pro> answer to: what?");

        let blank = send(
            &app,
            Method::POST,
            "/query",
            Some(json!({ "query": "what?", "model": "" })),
        )
        .await;
        let body: QueryResponse = json_body(blank).await;
        assert_eq!(body.answer, "answer to: what?");
    }

    #[tokio::test]
    async fn attached_corpus_is_queryable_and_survives_clear() {
        let config = AppConfig {
            rag_corpus: Some("42".into()),
            ..test_config()
        };
        let app = test_app_with(&config);
        let attached = "projects/test-project/locations/us-central1/ragCorpora/42";

        let corpus: Value = json_body(send(&app, Method::GET, "/corpus", None).await).await;
        assert_eq!(corpus["name"], attached);

        let response = send(&app, Method::POST, "/query", Some(json!({ "query": "hi" }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: QueryResponse = json_body(response).await;
        assert_eq!(body.corpus_used, attached);

        upload(&app, &[("a.txt", "one")], &[]).await;
        assert_eq!(app.engine.corpora_created(), 0);
        assert!(app.engine.imported_uris()[0].contains("a.txt"));

        let cleared: ClearResponse =
            json_body(send(&app, Method::POST, "/clear", None).await).await;
        assert_eq!(cleared.documents_removed, 1);
        assert!(!cleared.corpus_deleted);
        assert_eq!(app.engine.corpora_deleted(), 0);

        let corpus = app.state.registry.corpus().await.expect("still attached");
        assert_eq!(corpus.name, attached);
        assert_eq!(corpus.document_count, 0);
    }

    #[tokio::test]
    async fn status_and_liveness_respond() {
        let app = test_app();

        let live = send(&app, Method::GET, "/live", None).await;
        assert_eq!(live.status(), StatusCode::OK);

        let status: StatusResponse = json_body(send(&app, Method::GET, "/status", None).await).await;
        assert_eq!(status.status, "active");
        assert_eq!(status.project_id, "test-project");
        assert_eq!(status.bucket, "test-project-vertex-rag-docs");
        assert_eq!(status.storage, "memory");
        assert_eq!(status.total_documents, 0);
        assert!(status.active_corpus.is_none());

        let bucket: Value =
            json_body(send(&app, Method::GET, "/bucket/create", None).await).await;
        assert_eq!(bucket["status"], "already_exists");

        assert_eq!(app.engine.total_calls(), 0);
    }
}
