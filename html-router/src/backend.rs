use std::time::Duration;

use common::{
    error::AppError,
    protocol::{
        BucketResponse, ClearResponse, CorpusResponse, DeleteResponse, DocumentListResponse,
        ErrorBody, QueryRequest, QueryResponse, StatusResponse, UploadResponse,
    },
    storage::types::document::DocumentKind,
    utils::config::AppConfig,
};
use reqwest::{multipart, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// A file picked in the upload form, ready to forward to the API.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub files: Vec<UploadPart>,
    pub description: Option<String>,
    pub chunk_size: Option<u32>,
    pub chunk_overlap: Option<u32>,
}

/// HTTP client for the JSON API. The UI holds no state of its own.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::new(&config.api_base_url, http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = request.send().await.map_err(|e| {
            warn!("API request failed: {}", e);
            AppError::Upstream(format!(
                "The API at {} is not reachable. Make sure the server is running.",
                self.base_url
            ))
        })?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }
        Err(error_from_response(response).await)
    }

    pub async fn status(&self) -> Result<StatusResponse, AppError> {
        self.send(self.request(Method::GET, "/status")).await
    }

    pub async fn documents(&self) -> Result<DocumentListResponse, AppError> {
        self.send(self.request(Method::GET, "/documents")).await
    }

    pub async fn corpus(&self) -> Result<CorpusResponse, AppError> {
        self.send(self.request(Method::GET, "/corpus")).await
    }

    pub async fn upload(&self, form: UploadForm) -> Result<UploadResponse, AppError> {
        let mut body = multipart::Form::new();
        for file in form.files {
            let mime = DocumentKind::from_file_name(&file.file_name).map_or_else(
                || "application/octet-stream".to_string(),
                |kind| kind.content_type(&file.file_name),
            );
            let part = multipart::Part::bytes(file.data)
                .file_name(file.file_name)
                .mime_str(&mime)?;
            body = body.part("files", part);
        }
        if let Some(description) = form.description {
            body = body.text("description", description);
        }
        if let Some(chunk_size) = form.chunk_size {
            body = body.text("chunk_size", chunk_size.to_string());
        }
        if let Some(chunk_overlap) = form.chunk_overlap {
            body = body.text("chunk_overlap", chunk_overlap.to_string());
        }

        self.send(self.request(Method::POST, "/upload").multipart(body))
            .await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, AppError> {
        self.send(self.request(Method::POST, "/query").json(request))
            .await
    }

    pub async fn delete_document(&self, id: &str) -> Result<DeleteResponse, AppError> {
        let url = document_url(&self.base_url, id)?;
        self.send(self.http.delete(url)).await
    }

    pub async fn clear(&self) -> Result<ClearResponse, AppError> {
        self.send(self.request(Method::POST, "/clear")).await
    }

    pub async fn create_bucket(&self) -> Result<BucketResponse, AppError> {
        self.send(self.request(Method::GET, "/bucket/create")).await
    }
}

/// `{base}/documents/{id}` with the id escaped as a single path segment.
fn document_url(base_url: &str, id: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::InternalError(format!("invalid API base URL {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| AppError::InternalError(format!("API base URL {base_url} cannot hold a path")))?
        .pop_if_empty()
        .push("documents")
        .push(id);
    Ok(url)
}

/// Turns a non-2xx API answer back into the error category it was raised as.
async fn error_from_response(response: Response) -> AppError {
    let status = response.status();
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(e) => {
            debug!("API error without JSON body: {}", e);
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        }
    };

    error_for_status(status, detail)
}

pub fn error_for_status(status: StatusCode, detail: String) -> AppError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(detail)
        }
        StatusCode::NOT_FOUND => AppError::NotFound(detail),
        StatusCode::SERVICE_UNAVAILABLE => AppError::Credentials(detail),
        _ => AppError::Upstream(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_back_to_error_categories() {
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, "Unsupported file type: .png".into()),
            AppError::Validation(msg) if msg.contains(".png")
        ));
        assert!(matches!(
            error_for_status(StatusCode::PAYLOAD_TOO_LARGE, "too big".into()),
            AppError::Validation(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, "gone".into()),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::SERVICE_UNAVAILABLE, "set PROJECT_ID".into()),
            AppError::Credentials(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, "upstream".into()),
            AppError::Upstream(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = BackendClient::new("http://127.0.0.1:8000/", reqwest::Client::new());
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn document_ids_are_escaped_in_paths() {
        let url = document_url("http://127.0.0.1:8000", "abc-123").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/documents/abc-123");

        let url = document_url("http://proxy.local/rag/", "a/b c").unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/rag/documents/a%2Fb%20c");
    }
}
