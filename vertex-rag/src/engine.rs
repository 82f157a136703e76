use async_trait::async_trait;
use common::{
    error::AppError, protocol::RetrievedContext, storage::types::document::CorpusInfo,
    utils::request_limits::RetrievalParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
}

/// What the import operation reported for one source URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Resource name of the resulting RAG file, when it could be looked up.
    pub rag_file: Option<String>,
}

impl ImportOutcome {
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Per-request knobs for answer generation. `None` falls back to the
/// configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions<'a> {
    pub system_prompt: Option<&'a str>,
    /// Model id (`gemini-2.0-flash-001`) or full model resource name.
    pub model: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub contexts: Vec<RetrievedContext>,
}

/// The managed retrieval-augmented-generation service.
///
/// Everything behind this trait (chunking, embedding, indexing, search and
/// answer synthesis) happens remotely.
#[async_trait]
pub trait RagEngine: Send + Sync {
    async fn create_corpus(&self, display_name: &str) -> Result<CorpusInfo, AppError>;

    async fn import_file(
        &self,
        corpus: &str,
        source_uri: &str,
        chunking: ChunkingOptions,
    ) -> Result<ImportOutcome, AppError>;

    async fn retrieve_contexts(
        &self,
        corpus: &str,
        query: &str,
        params: RetrievalParams,
    ) -> Result<Vec<RetrievedContext>, AppError>;

    async fn generate_answer(
        &self,
        corpus: &str,
        query: &str,
        params: RetrievalParams,
        options: GenerationOptions<'_>,
    ) -> Result<String, AppError>;

    async fn delete_file(&self, rag_file: &str) -> Result<(), AppError>;

    async fn delete_corpus(&self, corpus: &str) -> Result<(), AppError>;

    /// Runs retrieval and grounded generation side by side.
    async fn answer_query(
        &self,
        corpus: &str,
        query: &str,
        params: RetrievalParams,
        options: GenerationOptions<'_>,
    ) -> Result<RagAnswer, AppError> {
        let (contexts, answer) = tokio::try_join!(
            self.retrieve_contexts(corpus, query, params),
            self.generate_answer(corpus, query, params, options)
        )?;

        Ok(RagAnswer { answer, contexts })
    }
}
