use common::error::AppError;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

/// A Vertex AI long-running operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationStatus>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    /// Decodes the finished operation's response.
    ///
    /// Must only be called once `done` is set; an operation without a
    /// response decodes from an empty object.
    pub fn into_response<T: DeserializeOwned>(self) -> Result<T, AppError> {
        if let Some(status) = self.error {
            return Err(AppError::Upstream(format!(
                "operation {} failed (code {}): {}",
                self.name, status.code, status.message
            )));
        }
        if !self.done {
            return Err(AppError::InternalError(format!(
                "operation {} is still running",
                self.name
            )));
        }

        let response = self
            .response
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        Ok(serde_json::from_value(response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImportRagFilesResponse, RagCorpus};
    use serde_json::json;

    #[test]
    fn finished_operation_yields_its_response() {
        let op: Operation = serde_json::from_value(json!({
            "name": "projects/p/locations/l/operations/1",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.cloud.aiplatform.v1.RagCorpus",
                "name": "projects/p/locations/l/ragCorpora/7",
                "displayName": "rag_corpus_20240101_000000"
            }
        }))
        .unwrap();

        let corpus: RagCorpus = op.into_response().unwrap();
        assert_eq!(corpus.name, "projects/p/locations/l/ragCorpora/7");
    }

    #[test]
    fn failed_operation_is_an_upstream_error() {
        let op: Operation = serde_json::from_value(json!({
            "name": "projects/p/locations/l/operations/2",
            "done": true,
            "error": { "code": 9, "message": "quota exceeded" }
        }))
        .unwrap();

        let result = op.into_response::<RagCorpus>();
        assert!(matches!(result, Err(AppError::Upstream(msg)) if msg.contains("quota exceeded")));
    }

    #[test]
    fn running_operation_cannot_be_decoded() {
        let op: Operation =
            serde_json::from_value(json!({ "name": "projects/p/locations/l/operations/3" }))
                .unwrap();

        assert!(!op.done);
        assert!(op.into_response::<ImportRagFilesResponse>().is_err());
    }

    #[test]
    fn done_without_response_decodes_defaults() {
        let op: Operation = serde_json::from_value(json!({
            "name": "projects/p/locations/l/operations/4",
            "done": true
        }))
        .unwrap();

        let counts: ImportRagFilesResponse = op.into_response().unwrap();
        assert_eq!(counts.imported_rag_files_count, 0);
    }
}
