use std::path::{Path, PathBuf};

use bytes::Bytes;
use common::{protocol::UploadedFile, utils::request_limits::validate_upload_file};
use tracing::{info, warn};

use crate::{
    api_state::ApiState,
    error::ApiError,
    service::{IncomingFile, UploadOptions},
};

/// A file left out of the ingest run before anything was uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub uploaded: Vec<UploadedFile>,
    pub skipped: Vec<SkippedFile>,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Uploads every supported file directly inside `folder`, in file name order
/// and in batches no larger than one `/upload` request may carry.
///
/// Files the upload endpoint would reject are skipped up front so one bad
/// file cannot sink its whole batch. A batch in which nothing imported is
/// counted as failed and the run moves on; missing credentials stop it.
pub async fn ingest_folder(
    state: &ApiState,
    folder: &Path,
    options: UploadOptions,
) -> Result<IngestSummary, ApiError> {
    let mut summary = IngestSummary::default();
    let mut pending = Vec::new();

    for path in folder_entries(folder).await? {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            summary.skipped.push(SkippedFile {
                path,
                reason: "file name is not valid UTF-8".to_string(),
            });
            continue;
        };

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), "Could not read file: {}", e);
                summary.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Err(e) = validate_upload_file(&state.config, &file_name, data.len()) {
            summary.skipped.push(SkippedFile {
                path,
                reason: e.message().to_string(),
            });
            continue;
        }

        pending.push(IncomingFile {
            file_name,
            data: Bytes::from(data),
        });
    }

    info!(
        folder = %folder.display(),
        files = pending.len(),
        skipped = summary.skipped.len(),
        "Starting folder ingest"
    );

    let batch_size = state.config.upload_max_files.max(1);
    let mut pending = pending.into_iter().peekable();
    while pending.peek().is_some() {
        let batch: Vec<_> = pending.by_ref().take(batch_size).collect();
        let batch_len = batch.len();
        summary.batches = summary.batches.saturating_add(1);

        match state.upload_documents(batch, options.clone()).await {
            Ok(response) => {
                summary.succeeded = summary.succeeded.saturating_add(response.succeeded);
                summary.failed = summary.failed.saturating_add(response.failed);
                summary.uploaded.extend(response.uploaded_files);
            }
            Err(ApiError::Unavailable(msg)) => return Err(ApiError::Unavailable(msg)),
            Err(e) => {
                warn!(batch = summary.batches, "Batch failed: {}", e);
                summary.failed = summary.failed.saturating_add(batch_len);
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        batches = summary.batches,
        "Folder ingest finished"
    );
    Ok(summary)
}

/// Regular files directly inside `folder`, sorted by path.
async fn folder_entries(folder: &Path) -> Result<Vec<PathBuf>, ApiError> {
    let unreadable = |e: std::io::Error| {
        ApiError::ValidationError(format!("Cannot read folder {}: {e}", folder.display()))
    };

    let mut entries = tokio::fs::read_dir(folder).await.map_err(unreadable)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        if entry.file_type().await.map_err(unreadable)?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use common::{
        storage::store::StorageManager,
        utils::config::{AppConfig, StorageKind},
    };
    use vertex_rag::testing::MockRagEngine;

    use super::*;

    fn state(engine: Arc<MockRagEngine>) -> ApiState {
        let config = AppConfig {
            project_id: Some("test-project".into()),
            storage: StorageKind::Memory,
            upload_max_files: 2,
            upload_max_file_bytes: 64,
            ..Default::default()
        };
        ApiState::with_components(&config, StorageManager::memory("test-bucket"), engine)
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn folder_is_uploaded_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.txt", "a.md", "b.txt"] {
            write(dir.path(), name, "some text");
        }
        write(dir.path(), "photo.png", "not a document");
        write(dir.path(), "huge.txt", &"x".repeat(65));
        write(dir.path(), "empty.md", "");
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "inner.txt", "ignored");

        let engine = Arc::new(MockRagEngine::new());
        let state = state(Arc::clone(&engine));

        let summary = ingest_folder(&state, dir.path(), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.batches, 2);
        assert_eq!(engine.corpora_created(), 1);

        let uploaded: Vec<_> = summary.uploaded.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(uploaded, ["a.md", "b.txt", "c.txt"]);

        let mut skipped: Vec<_> = summary
            .skipped
            .iter()
            .filter_map(|s| s.path.file_name()?.to_str())
            .collect();
        skipped.sort_unstable();
        assert_eq!(skipped, ["empty.md", "huge.txt", "photo.png"]);

        assert_eq!(state.registry.len().await, 3);
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write(dir.path(), name, "some text");
        }

        let engine = Arc::new(MockRagEngine::new());
        engine.fail_imports_matching("a.txt");
        engine.fail_imports_matching("b.txt");
        let state = state(Arc::clone(&engine));

        let summary = ingest_folder(&state, dir.path(), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(state.registry.len().await, 1);
    }

    #[tokio::test]
    async fn credential_failure_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            write(dir.path(), name, "some text");
        }

        let engine = Arc::new(MockRagEngine::new());
        engine.reject_credentials(true);
        let state = state(Arc::clone(&engine));

        let result = ingest_folder(&state, dir.path(), UploadOptions::default()).await;

        assert!(matches!(result, Err(ApiError::Unavailable(_))));
        assert_eq!(engine.imports(), 1);
    }

    #[tokio::test]
    async fn missing_folder_is_reported() {
        let engine = Arc::new(MockRagEngine::new());
        let state = state(Arc::clone(&engine));

        let result = ingest_folder(&state, Path::new("/nonexistent/docs"), UploadOptions::default()).await;

        assert!(matches!(result, Err(ApiError::ValidationError(msg)) if msg.contains("/nonexistent/docs")));
        assert_eq!(engine.total_calls(), 0);
    }
}
