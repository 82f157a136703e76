use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    error::AppError,
    protocol::RetrievedContext,
    storage::types::document::CorpusInfo,
    utils::{
        config::AppConfig,
        gcp_auth::{TokenProvider, CREDENTIALS_HINT},
        request_limits::RetrievalParams,
    },
};
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    engine::{ChunkingOptions, GenerationOptions, ImportOutcome, RagEngine},
    operations::Operation,
    types::{
        Content, CreateCorpusRequest, FixedLengthChunking, GcsSource, GenerateContentRequest,
        GenerateContentResponse, ImportRagFilesConfig, ImportRagFilesRequest,
        ImportRagFilesResponse, ListRagFilesResponse, RagContext, RagCorpus,
        RagEmbeddingModelConfig, RagFileChunkingConfig, RagFileTransformationConfig, RagQuery,
        RagResource, RagRetrievalConfig, Retrieval, RetrievalFilter, RetrieveContextsRequest,
        RetrieveContextsResponse, Tool, VectorDbConfig, VertexPredictionEndpoint, VertexRagStore,
    },
};

const LIST_PAGE_SIZE: &str = "100";

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// REST client for the Vertex AI RAG Engine and Gemini `generateContent`.
#[derive(Clone)]
pub struct VertexRagClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    base_url: String,
    parent: Option<String>,
    embedding_model: String,
    gen_model: String,
    max_embedding_requests_per_min: u32,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl VertexRagClient {
    pub fn new(config: &AppConfig, http: reqwest::Client, tokens: TokenProvider) -> Self {
        Self {
            http,
            tokens,
            base_url: format!("https://{}-aiplatform.googleapis.com/v1", config.location),
            parent: config.vertex_parent(),
            embedding_model: config.embedding_model.clone(),
            gen_model: config.gen_model.clone(),
            max_embedding_requests_per_min: config.max_embedding_requests_per_min,
            poll_interval: Duration::from_millis(config.operation_poll_interval_ms),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
        }
    }

    /// Points the client at another API root, e.g. a regional proxy.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parent(&self) -> Result<&str, AppError> {
        self.parent
            .as_deref()
            .ok_or_else(|| AppError::Credentials(CREDENTIALS_HINT.to_string()))
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_url)
    }

    /// Fully qualified embedding endpoint for the configured publisher model.
    fn embedding_endpoint(&self, parent: &str) -> String {
        if self.embedding_model.starts_with("projects/") {
            self.embedding_model.clone()
        } else {
            format!("{parent}/{}", self.embedding_model)
        }
    }

    /// Resource name of the generation model, the configured one unless the
    /// request names another.
    fn model_resource(&self, parent: &str, requested: Option<&str>) -> String {
        let model = requested
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(&self.gen_model);

        if model.starts_with("projects/") {
            model.to_string()
        } else {
            format!("{parent}/publishers/google/models/{model}")
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    /// Polls the operation until it reports `done` or the timeout passes.
    async fn wait_for(&self, mut operation: Operation) -> Result<Operation, AppError> {
        let deadline = Instant::now() + self.operation_timeout;

        while !operation.done {
            if Instant::now() >= deadline {
                return Err(AppError::Upstream(format!(
                    "operation {} did not finish within {}s",
                    operation.name,
                    self.operation_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            debug!(operation = %operation.name, "Polling operation");
            operation = self
                .send_json(self.http.get(self.url(&operation.name)))
                .await?;
        }

        Ok(operation)
    }

    /// Finds the RAG file imported from `source_uri`, walking every page of
    /// the corpus file list. The most recent match wins.
    async fn find_rag_file(&self, corpus: &str, source_uri: &str) -> Result<Option<String>, AppError> {
        let mut page_token: Option<String> = None;
        let mut found = None;

        loop {
            let mut request = self
                .http
                .get(self.url(&format!("{corpus}/ragFiles")))
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListRagFilesResponse = self.send_json(request).await?;
            for file in page.rag_files {
                let matches = file
                    .gcs_source
                    .as_ref()
                    .is_some_and(|source| source.uris.iter().any(|uri| uri == source_uri));
                if matches {
                    found = Some(file.name);
                }
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(found)
    }

    fn retrieval_config(params: RetrievalParams) -> RagRetrievalConfig {
        RagRetrievalConfig {
            top_k: params.top_k,
            filter: RetrievalFilter {
                vector_distance_threshold: params.distance_threshold,
            },
        }
    }
}

#[async_trait]
impl RagEngine for VertexRagClient {
    #[instrument(skip(self))]
    async fn create_corpus(&self, display_name: &str) -> Result<CorpusInfo, AppError> {
        let parent = self.parent()?;
        let body = CreateCorpusRequest {
            display_name: display_name.to_string(),
            vector_db_config: VectorDbConfig {
                rag_embedding_model_config: RagEmbeddingModelConfig {
                    vertex_prediction_endpoint: VertexPredictionEndpoint {
                        endpoint: self.embedding_endpoint(parent),
                    },
                },
            },
        };

        let operation: Operation = self
            .send_json(
                self.http
                    .post(self.url(&format!("{parent}/ragCorpora")))
                    .json(&body),
            )
            .await?;
        let corpus: RagCorpus = self.wait_for(operation).await?.into_response()?;

        info!(corpus = %corpus.name, "Created RAG corpus");
        Ok(CorpusInfo {
            name: corpus.name,
            display_name: corpus
                .display_name
                .unwrap_or_else(|| display_name.to_string()),
            created_time: Utc::now(),
            document_count: 0,
        })
    }

    #[instrument(skip(self))]
    async fn import_file(
        &self,
        corpus: &str,
        source_uri: &str,
        chunking: ChunkingOptions,
    ) -> Result<ImportOutcome, AppError> {
        let body = ImportRagFilesRequest {
            import_rag_files_config: ImportRagFilesConfig {
                gcs_source: GcsSource {
                    uris: vec![source_uri.to_string()],
                },
                rag_file_transformation_config: RagFileTransformationConfig {
                    rag_file_chunking_config: RagFileChunkingConfig {
                        fixed_length_chunking: FixedLengthChunking {
                            chunk_size: chunking.chunk_size,
                            chunk_overlap: chunking.chunk_overlap,
                        },
                    },
                },
                max_embedding_requests_per_min: self.max_embedding_requests_per_min,
            },
        };

        let operation: Operation = self
            .send_json(
                self.http
                    .post(self.url(&format!("{corpus}/ragFiles:import")))
                    .json(&body),
            )
            .await?;
        let counts: ImportRagFilesResponse = self.wait_for(operation).await?.into_response()?;

        let rag_file = match self.find_rag_file(corpus, source_uri).await {
            Ok(name) => name,
            Err(e) => {
                warn!(source_uri, "Imported file could not be looked up: {}", e);
                None
            }
        };

        Ok(ImportOutcome {
            imported: counts.imported_rag_files_count,
            failed: counts.failed_rag_files_count,
            skipped: counts.skipped_rag_files_count,
            rag_file,
        })
    }

    #[instrument(skip(self, query))]
    async fn retrieve_contexts(
        &self,
        corpus: &str,
        query: &str,
        params: RetrievalParams,
    ) -> Result<Vec<RetrievedContext>, AppError> {
        let parent = self.parent()?;
        let body = RetrieveContextsRequest {
            vertex_rag_store: VertexRagStore {
                rag_resources: vec![RagResource {
                    rag_corpus: corpus.to_string(),
                }],
                rag_retrieval_config: None,
            },
            query: RagQuery {
                text: query.to_string(),
                rag_retrieval_config: Self::retrieval_config(params),
            },
        };

        let response: RetrieveContextsResponse = self
            .send_json(
                self.http
                    .post(self.url(&format!("{parent}:retrieveContexts")))
                    .json(&body),
            )
            .await?;

        Ok(response
            .contexts
            .map(|c| c.contexts)
            .unwrap_or_default()
            .into_iter()
            .map(into_retrieved_context)
            .collect())
    }

    #[instrument(skip(self, query, options), fields(model = options.model))]
    async fn generate_answer(
        &self,
        corpus: &str,
        query: &str,
        params: RetrievalParams,
        options: GenerationOptions<'_>,
    ) -> Result<String, AppError> {
        let parent = self.parent()?;
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(query)],
            system_instruction: options
                .system_prompt
                .map(str::trim)
                .filter(|prompt| !prompt.is_empty())
                .map(Content::system_text),
            tools: vec![Tool {
                retrieval: Retrieval {
                    vertex_rag_store: VertexRagStore {
                        rag_resources: vec![RagResource {
                            rag_corpus: corpus.to_string(),
                        }],
                        rag_retrieval_config: Some(Self::retrieval_config(params)),
                    },
                },
            }],
        };

        let response: GenerateContentResponse = self
            .send_json(
                self.http
                    .post(self.url(&format!(
                        "{}:generateContent",
                        self.model_resource(parent, options.model)
                    )))
                    .json(&body),
            )
            .await?;

        response.text().ok_or_else(|| {
            let reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            AppError::Upstream(format!("model returned no answer ({reason})"))
        })
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, rag_file: &str) -> Result<(), AppError> {
        let operation: Operation = self.send_json(self.http.delete(self.url(rag_file))).await?;
        self.wait_for(operation).await?.into_response::<serde_json::Value>()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_corpus(&self, corpus: &str) -> Result<(), AppError> {
        let operation: Operation = self
            .send_json(
                self.http
                    .delete(self.url(corpus))
                    .query(&[("force", "true")]),
            )
            .await?;
        self.wait_for(operation).await?.into_response::<serde_json::Value>()?;
        info!(corpus, "Deleted RAG corpus");
        Ok(())
    }
}

fn into_retrieved_context(context: RagContext) -> RetrievedContext {
    RetrievedContext {
        text: context.text.unwrap_or_default(),
        source: context
            .source_uri
            .unwrap_or_else(|| "Unknown".to_string()),
        source_display_name: context.source_display_name,
        distance: context.distance.or(context.score),
    }
}

/// Maps a non-2xx Google API response onto the error categories the API exposes.
pub fn classify_failure(status: StatusCode, body: &str) -> AppError {
    let (message, google_status) = serde_json::from_str::<GoogleErrorEnvelope>(body)
        .map(|envelope| (envelope.error.message, envelope.error.status))
        .unwrap_or_else(|_| (body.trim().to_string(), None));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(%status, "Google API rejected credentials: {}", message);
            AppError::Credentials(format!("{CREDENTIALS_HINT} ({message})"))
        }
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::Upstream(format!(
            "{status} {}: {message}",
            google_status.as_deref().unwrap_or("")
        )),
    }
}
