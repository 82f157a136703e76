use bytes::Bytes;
use chrono::Utc;
use common::{
    error::AppError,
    protocol::{
        BucketResponse, ClearResponse, DeleteResponse, QueryRequest, QueryResponse,
        StatusResponse, UploadResponse, UploadedFile, NOT_CONFIGURED,
    },
    storage::{
        store::document_object_key,
        types::document::{CorpusInfo, DocumentKind, DocumentRecord},
    },
    utils::request_limits::{validate_query, validate_upload_file, validate_upload_request},
};
use futures::future::join_all;
use tracing::{debug, info, warn};
use vertex_rag::{ChunkingOptions, GenerationOptions};

use crate::{
    api_state::{attached_corpus_info, ApiState},
    error::ApiError,
};

/// One file taken off the multipart body.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub description: Option<String>,
    pub chunk_size: Option<u32>,
    pub chunk_overlap: Option<u32>,
}

impl ApiState {
    pub async fn status(&self) -> StatusResponse {
        let bucket_exists = match self.storage.bucket_exists().await {
            Ok(exists) => exists,
            Err(e) => {
                debug!("Bucket lookup failed: {}", e);
                false
            }
        };

        StatusResponse {
            status: "active".to_string(),
            project_id: self
                .config
                .project_id()
                .unwrap_or(NOT_CONFIGURED)
                .to_string(),
            location: self.config.location.clone(),
            bucket: self
                .config
                .bucket_name()
                .unwrap_or_else(|| NOT_CONFIGURED.to_string()),
            bucket_exists,
            storage: self.storage.backend_kind().as_str().to_string(),
            generation_model: self.config.gen_model.clone(),
            total_documents: self.registry.len().await,
            active_corpus: self.registry.corpus().await.map(|c| c.name),
        }
    }

    pub async fn ensure_bucket(&self) -> Result<BucketResponse, ApiError> {
        let bucket_name = self.storage.bucket_name().to_string();
        let created = self.storage.ensure_bucket().await?;

        let (message, status) = if created {
            (format!("Bucket {bucket_name} created"), "created")
        } else {
            (format!("Bucket {bucket_name} already exists"), "already_exists")
        };

        Ok(BucketResponse {
            message,
            bucket_name,
            created,
            status: status.to_string(),
        })
    }

    /// Returns the active corpus, creating it on first use.
    ///
    /// The slot stays locked while the corpus is created so that concurrent
    /// first uploads share one corpus.
    async fn ensure_corpus(&self) -> Result<CorpusInfo, AppError> {
        let mut slot = self.registry.corpus_slot().await;
        if let Some(corpus) = slot.as_ref() {
            return Ok(corpus.clone());
        }

        let display_name = format!(
            "{}_{}",
            self.config.corpus_display_name,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let corpus = self.rag.create_corpus(&display_name).await?;
        *slot = Some(corpus.clone());
        Ok(corpus)
    }

    pub async fn upload_documents(
        &self,
        files: Vec<IncomingFile>,
        options: UploadOptions,
    ) -> Result<UploadResponse, ApiError> {
        let chunking = ChunkingOptions {
            chunk_size: options.chunk_size.unwrap_or(self.config.chunk_size),
            chunk_overlap: options.chunk_overlap.unwrap_or(self.config.chunk_overlap),
        };

        // Everything local is checked before the bucket or corpus is touched.
        validate_upload_request(
            &self.config,
            files.len(),
            chunking.chunk_size,
            chunking.chunk_overlap,
        )?;
        let kinds = files
            .iter()
            .map(|file| validate_upload_file(&self.config, &file.file_name, file.data.len()))
            .collect::<Result<Vec<_>, _>>()?;

        let description = options
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        info!(
            file_count = files.len(),
            chunk_size = chunking.chunk_size,
            chunk_overlap = chunking.chunk_overlap,
            "Received upload request"
        );

        let bucket_created = self.storage.ensure_bucket().await?;
        let corpus = self.ensure_corpus().await?;

        let total = files.len();
        let mut uploaded_files = Vec::with_capacity(total);
        let mut succeeded = 0_usize;

        for (file, kind) in files.into_iter().zip(kinds) {
            let file_name = file.file_name.clone();
            let file_size = file.data.len() as u64;

            match self
                .store_and_import(&corpus, file, kind, description.clone(), chunking)
                .await
            {
                Ok(record) => {
                    info!(document_id = %record.id, file_name = %record.filename, "Document imported");
                    uploaded_files.push(UploadedFile::from(&record));
                    self.registry.insert(record).await;
                    succeeded = succeeded.saturating_add(1);
                }
                Err(AppError::Credentials(msg)) => return Err(ApiError::Unavailable(msg)),
                Err(e) => {
                    warn!(file_name = %file_name, "Upload failed: {}", e);
                    uploaded_files.push(UploadedFile {
                        id: None,
                        filename: file_name,
                        file_size,
                        file_type: kind,
                        upload_time: Utc::now(),
                        gcs_path: None,
                        corpus_updated: false,
                        error: Some(failure_message(&e)),
                    });
                }
            }
        }

        let failed = total.saturating_sub(succeeded);
        if succeeded == 0 {
            return Err(ApiError::Upstream(format!(
                "None of the {total} file(s) could be uploaded and imported"
            )));
        }

        let message = if failed == 0 {
            format!("Successfully uploaded {succeeded} file(s)")
        } else {
            format!("Uploaded {succeeded} of {total} file(s)")
        };

        Ok(UploadResponse {
            message,
            uploaded_files,
            bucket_created,
            corpus_updated: true,
            succeeded,
            failed,
        })
    }

    async fn store_and_import(
        &self,
        corpus: &CorpusInfo,
        file: IncomingFile,
        kind: DocumentKind,
        description: Option<String>,
        chunking: ChunkingOptions,
    ) -> Result<DocumentRecord, AppError> {
        let object_key = document_object_key(&file.file_name, Utc::now());
        let content_type = kind.content_type(&file.file_name);
        let file_size = file.data.len() as u64;

        self.storage
            .put(&object_key, file.data, &content_type)
            .await?;
        let source_uri = self.storage.object_uri(&object_key);

        let imported = match self
            .rag
            .import_file(&corpus.name, &source_uri, chunking)
            .await
        {
            Ok(outcome) if outcome.is_success() => Ok(outcome),
            Ok(outcome) => Err(AppError::Upstream(format!(
                "import of {source_uri} reported {} failed file(s)",
                outcome.failed
            ))),
            Err(e) => Err(e),
        };

        let outcome = match imported {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&object_key).await {
                    warn!(object_key = %object_key, "Could not remove object after failed import: {}", cleanup);
                }
                return Err(e);
            }
        };

        let mut record = DocumentRecord::new(
            file.file_name,
            file_size,
            kind,
            object_key,
            source_uri,
            description,
        );
        record.corpus_updated = true;
        record.rag_file = outcome.rag_file;
        Ok(record)
    }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ApiError> {
        let params = validate_query(
            &request.query,
            request.top_k.unwrap_or_else(|| i64::from(self.config.top_k)),
            request
                .distance_threshold
                .unwrap_or(self.config.distance_threshold),
        )?;

        // An attached corpus already holds documents this process never saw.
        let corpus = match self.registry.corpus().await {
            Some(corpus) if self.is_attached(&corpus) || !self.registry.is_empty().await => {
                corpus
            }
            _ => {
                return Err(ApiError::ValidationError(
                    "No documents uploaded yet. Upload documents before querying.".to_string(),
                ))
            }
        };

        let query = request.query.trim();
        let options = GenerationOptions {
            system_prompt: request.system_prompt.as_deref(),
            model: request
                .model
                .as_deref()
                .map(str::trim)
                .filter(|model| !model.is_empty()),
        };
        info!(
            top_k = params.top_k,
            distance_threshold = params.distance_threshold,
            corpus = %corpus.name,
            model = options.model.unwrap_or(&self.config.gen_model),
            "Running query"
        );

        let answer = self
            .rag
            .answer_query(&corpus.name, query, params, options)
            .await?;

        Ok(QueryResponse {
            query: query.to_string(),
            answer: answer.answer,
            retrieval_results: answer.contexts,
            corpus_used: corpus.name,
        })
    }

    pub async fn delete_document(&self, id: &str) -> Result<DeleteResponse, ApiError> {
        let record = self
            .registry
            .remove(id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;

        let storage_deleted = match self.storage.delete(&record.object_key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(object_key = %record.object_key, "Could not delete object: {}", e);
                false
            }
        };

        let corpus_deleted = match record.rag_file.as_deref() {
            Some(rag_file) => match self.rag.delete_file(rag_file).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(rag_file, "Could not delete RAG file: {}", e);
                    false
                }
            },
            None => false,
        };

        info!(document_id = %record.id, storage_deleted, corpus_deleted, "Document deleted");
        Ok(DeleteResponse {
            message: format!("Document {} deleted successfully", record.filename),
            deleted_document: record.filename,
            storage_deleted,
            corpus_deleted,
        })
    }

    pub async fn clear_documents(&self) -> ClearResponse {
        let (documents, corpus) = self.registry.clear().await;

        let deletions = join_all(
            documents
                .iter()
                .map(|doc| self.storage.delete(&doc.object_key)),
        )
        .await;
        let objects_deleted = deletions
            .into_iter()
            .zip(&documents)
            .filter(|(result, doc)| match result {
                Ok(()) => true,
                Err(e) => {
                    warn!(object_key = %doc.object_key, "Could not delete object: {}", e);
                    false
                }
            })
            .count();

        let corpus_deleted = match corpus {
            Some(corpus) if self.is_attached(&corpus) => {
                // Not ours to delete. It stays attached for later uploads.
                *self.registry.corpus_slot().await = Some(attached_corpus_info(&corpus.name));
                false
            }
            Some(corpus) => match self.rag.delete_corpus(&corpus.name).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(corpus = %corpus.name, "Could not delete corpus: {}", e);
                    false
                }
            },
            None => false,
        };

        info!(
            documents_removed = documents.len(),
            objects_deleted, corpus_deleted, "Cleared documents"
        );
        ClearResponse {
            message: format!("Cleared {} document(s)", documents.len()),
            documents_removed: documents.len(),
            objects_deleted,
            corpus_deleted,
        }
    }
}

fn failure_message(err: &AppError) -> String {
    match err {
        AppError::Storage(_) => "Failed to store the file in the bucket".to_string(),
        AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
        _ => "Failed to import the file into the RAG corpus".to_string(),
    }
}
