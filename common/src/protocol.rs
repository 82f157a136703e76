//! JSON bodies exchanged between the API and its clients, the web UI included.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::types::document::{CorpusInfo, DocumentKind, DocumentRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub description: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub project_id: String,
    pub location: String,
    pub bucket: String,
    pub bucket_exists: bool,
    pub storage: String,
    pub generation_model: String,
    pub total_documents: usize,
    pub active_corpus: Option<String>,
}

impl StatusResponse {
    /// Whether project id and bucket are both set.
    pub fn is_configured(&self) -> bool {
        self.project_id != NOT_CONFIGURED && self.bucket != NOT_CONFIGURED
    }
}

pub const NOT_CONFIGURED: &str = "Not configured";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentRecord>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorpusResponse {
    Active(CorpusInfo),
    Inactive { message: String },
}

/// Per-file outcome of an upload request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub id: Option<String>,
    pub filename: String,
    pub file_size: u64,
    pub file_type: DocumentKind,
    pub upload_time: DateTime<Utc>,
    #[serde(default)]
    pub gcs_path: Option<String>,
    pub corpus_updated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DocumentRecord> for UploadedFile {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            filename: record.filename.clone(),
            file_size: record.file_size,
            file_type: record.file_type,
            upload_time: record.upload_time,
            gcs_path: Some(record.gcs_path.clone()),
            corpus_updated: record.corpus_updated,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub uploaded_files: Vec<UploadedFile>,
    pub bucket_created: bool,
    pub corpus_updated: bool,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Signed so that zero and negative values reach validation instead of
    /// failing deserialization.
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub distance_threshold: Option<f64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Generation model for this query; the configured `GEN_MODEL` when absent.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub source_display_name: Option<String>,
    /// Vector distance reported by the retrieval service, when it reports one.
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub retrieval_results: Vec<RetrievedContext>,
    pub corpus_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted_document: String,
    pub storage_deleted: bool,
    pub corpus_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub documents_removed: usize,
    pub objects_deleted: usize,
    pub corpus_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketResponse {
    pub message: String,
    pub bucket_name: String,
    pub created: bool,
    pub status: String,
}

/// Body of every non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn corpus_response_distinguishes_active_and_inactive() {
        let inactive: CorpusResponse =
            serde_json::from_value(json!({ "message": "No active corpus" })).unwrap();
        assert!(matches!(inactive, CorpusResponse::Inactive { .. }));

        let active: CorpusResponse = serde_json::from_value(json!({
            "name": "projects/p/locations/l/ragCorpora/42",
            "display_name": "rag_corpus_20240101_000000",
            "created_time": "2024-01-01T00:00:00Z",
            "document_count": 2
        }))
        .unwrap();
        assert!(matches!(active, CorpusResponse::Active(info) if info.document_count == 2));
    }

    #[test]
    fn query_request_fields_are_optional() {
        let request: QueryRequest = serde_json::from_value(json!({ "query": "hi" })).unwrap();

        assert_eq!(request.query, "hi");
        assert!(request.top_k.is_none());
        assert!(request.distance_threshold.is_none());
    }

    #[test]
    fn status_reports_missing_configuration() {
        let status = StatusResponse {
            status: "active".into(),
            project_id: NOT_CONFIGURED.into(),
            location: "us-central1".into(),
            bucket: NOT_CONFIGURED.into(),
            bucket_exists: false,
            storage: "gcs".into(),
            generation_model: "gemini-2.0-flash-001".into(),
            total_documents: 0,
            active_corpus: None,
        };

        assert!(!status.is_configured());
    }
}
