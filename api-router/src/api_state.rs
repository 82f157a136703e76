use std::{sync::Arc, time::Duration};

use chrono::Utc;
use common::{
    error::AppError,
    storage::{
        bucket::GcsBucketAdmin, registry::DocumentRegistry, store::StorageManager,
        types::document::CorpusInfo,
    },
    utils::{
        config::{AppConfig, StorageKind},
        gcp_auth::TokenProvider,
    },
};
use tracing::info;
use vertex_rag::{RagEngine, VertexRagClient};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub storage: StorageManager,
    pub registry: DocumentRegistry,
    pub rag: Arc<dyn RagEngine>,
    /// Corpus named by `RAG_CORPUS`. It belongs to someone else, so it is
    /// queried and imported into but never deleted.
    pub attached_corpus: Option<String>,
}

impl ApiState {
    /// Wires the GCS bucket admin, object storage and the Vertex client from
    /// configuration. Nothing is contacted yet.
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest_client(config)?;
        let tokens = TokenProvider::from_config(config);

        let admin = matches!(config.storage, StorageKind::Gcs)
            .then(|| GcsBucketAdmin::new(config, http.clone(), tokens.clone()));
        let storage = StorageManager::new(config, admin).await?;
        let rag = Arc::new(VertexRagClient::new(config, http, tokens));

        Ok(Self::with_components(config, storage, rag))
    }

    pub fn with_components(
        config: &AppConfig,
        storage: StorageManager,
        rag: Arc<dyn RagEngine>,
    ) -> Self {
        let attached_corpus = config.attached_corpus();
        let registry = match attached_corpus.as_deref() {
            Some(name) => {
                info!(corpus = name, "Attaching to existing corpus");
                DocumentRegistry::with_corpus(attached_corpus_info(name))
            }
            None => DocumentRegistry::new(),
        };

        Self {
            config: config.clone(),
            storage,
            registry,
            rag,
            attached_corpus,
        }
    }

    pub fn is_attached(&self, corpus: &CorpusInfo) -> bool {
        self.attached_corpus.as_deref() == Some(corpus.name.as_str())
    }
}

pub(crate) fn attached_corpus_info(name: &str) -> CorpusInfo {
    CorpusInfo {
        name: name.to_string(),
        display_name: name.rsplit('/').next().unwrap_or(name).to_string(),
        created_time: Utc::now(),
        document_count: 0,
    }
}

fn reqwest_client(config: &AppConfig) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?)
}
