use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    error::AppError, protocol::RetrievedContext, storage::types::document::CorpusInfo,
    utils::request_limits::RetrievalParams,
};

use crate::engine::{ChunkingOptions, GenerationOptions, ImportOutcome, RagEngine};

/// In-process stand-in for the managed RAG service.
///
/// Every trait call bumps a counter so tests can assert that a request was
/// rejected before anything remote was touched.
#[derive(Default)]
pub struct MockRagEngine {
    corpora_created: AtomicUsize,
    imports: AtomicUsize,
    queries: AtomicUsize,
    files_deleted: AtomicUsize,
    corpora_deleted: AtomicUsize,
    fail_imports: AtomicBool,
    failing_uris: Mutex<Vec<String>>,
    reject_credentials: AtomicBool,
    imported_uris: Mutex<Vec<String>>,
}

impl MockRagEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent import report one failed file.
    pub fn fail_imports(&self, fail: bool) {
        self.fail_imports.store(fail, Ordering::SeqCst);
    }

    /// Imports whose source URI contains `fragment` report one failed file.
    pub fn fail_imports_matching(&self, fragment: &str) {
        if let Ok(mut failing) = self.failing_uris.lock() {
            failing.push(fragment.to_string());
        }
    }

    /// Makes imports fail as if the access token had been revoked.
    pub fn reject_credentials(&self, reject: bool) {
        self.reject_credentials.store(reject, Ordering::SeqCst);
    }

    fn import_fails(&self, source_uri: &str) -> bool {
        self.fail_imports.load(Ordering::SeqCst)
            || self
                .failing_uris
                .lock()
                .map(|failing| failing.iter().any(|fragment| source_uri.contains(fragment.as_str())))
                .unwrap_or(false)
    }

    pub fn corpora_created(&self) -> usize {
        self.corpora_created.load(Ordering::SeqCst)
    }

    pub fn imports(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn files_deleted(&self) -> usize {
        self.files_deleted.load(Ordering::SeqCst)
    }

    pub fn corpora_deleted(&self) -> usize {
        self.corpora_deleted.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.corpora_created()
            + self.imports()
            + self.queries()
            + self.files_deleted()
            + self.corpora_deleted()
    }

    pub fn imported_uris(&self) -> Vec<String> {
        self.imported_uris
            .lock()
            .map(|uris| uris.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RagEngine for MockRagEngine {
    async fn create_corpus(&self, display_name: &str) -> Result<CorpusInfo, AppError> {
        let n = self.corpora_created.fetch_add(1, Ordering::SeqCst) + 1;
        // Corpus creation is a long-running operation upstream; give racing
        // callers a chance to interleave.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(CorpusInfo {
            name: format!("projects/test/locations/us-central1/ragCorpora/{n}"),
            display_name: display_name.to_string(),
            created_time: Utc::now(),
            document_count: 0,
        })
    }

    async fn import_file(
        &self,
        corpus: &str,
        source_uri: &str,
        _chunking: ChunkingOptions,
    ) -> Result<ImportOutcome, AppError> {
        let n = self.imports.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(AppError::Credentials("access token revoked".to_string()));
        }
        if self.import_fails(source_uri) {
            return Ok(ImportOutcome {
                failed: 1,
                ..Default::default()
            });
        }

        if let Ok(mut uris) = self.imported_uris.lock() {
            uris.push(source_uri.to_string());
        }
        Ok(ImportOutcome {
            imported: 1,
            failed: 0,
            skipped: 0,
            rag_file: Some(format!("{corpus}/ragFiles/{n}")),
        })
    }

    async fn retrieve_contexts(
        &self,
        _corpus: &str,
        query: &str,
        params: RetrievalParams,
    ) -> Result<Vec<RetrievedContext>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let uris = self.imported_uris();
        Ok(uris
            .into_iter()
            .take(params.top_k as usize)
            .map(|uri| RetrievedContext {
                text: format!("context for {query}"),
                source: uri,
                source_display_name: None,
                distance: Some(0.1),
            })
            .collect())
    }

    async fn generate_answer(
        &self,
        _corpus: &str,
        query: &str,
        _params: RetrievalParams,
        options: GenerationOptions<'_>,
    ) -> Result<String, AppError> {
        let mut answer = String::new();
        if let Some(model) = options.model {
            answer.push_str(&format!("<{model}> "));
        }
        if let Some(prompt) = options.system_prompt {
            answer.push_str(&format!("[{prompt}] "));
        }
        answer.push_str(&format!("answer to: {query}"));
        Ok(answer)
    }

    async fn delete_file(&self, _rag_file: &str) -> Result<(), AppError> {
        self.files_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_corpus(&self, _corpus: &str) -> Result<(), AppError> {
        self.corpora_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
