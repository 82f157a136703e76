use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Google Cloud Storage bucket, the only backend the RAG service can import from.
    Gcs,
    Local,
    Memory,
}

impl StorageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gcs => "gcs",
            Self::Local => "local",
            Self::Memory => "memory",
        }
    }
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Gcs
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub gcs_bucket: Option<String>,
    #[serde(default = "default_gen_model")]
    pub gen_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_corpus_display_name")]
    pub corpus_display_name: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_max_embedding_requests_per_min")]
    pub max_embedding_requests_per_min: u32,
    #[serde(default)]
    pub gcp_access_token: Option<String>,
    /// Service account key file, same variable the Google client libraries read.
    #[serde(default)]
    pub google_application_credentials: Option<String>,
    /// Existing corpus to attach to at startup, either a full resource name
    /// or the numeric id under the configured project and location.
    #[serde(default)]
    pub rag_corpus: Option<String>,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_ui_port")]
    pub ui_port: u16,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_upload_max_files")]
    pub upload_max_files: usize,
    #[serde(default = "default_upload_max_file_bytes")]
    pub upload_max_file_bytes: usize,
    #[serde(default = "default_upload_max_body_bytes")]
    pub upload_max_body_bytes: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_operation_poll_interval_ms")]
    pub operation_poll_interval_ms: u64,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_gen_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_embedding_model() -> String {
    "publishers/google/models/text-embedding-005".to_string()
}

fn default_corpus_display_name() -> String {
    "rag_corpus".to_string()
}

const fn default_chunk_size() -> u32 {
    1024
}

const fn default_chunk_overlap() -> u32 {
    200
}

const fn default_top_k() -> u32 {
    3
}

const fn default_distance_threshold() -> f64 {
    0.5
}

const fn default_max_embedding_requests_per_min() -> u32 {
    1000
}

const fn default_http_port() -> u16 {
    8000
}

const fn default_ui_port() -> u16 {
    8501
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

const fn default_upload_max_files() -> usize {
    20
}

const fn default_upload_max_file_bytes() -> usize {
    25 * 1024 * 1024
}

const fn default_upload_max_body_bytes() -> usize {
    200 * 1024 * 1024
}

const fn default_http_timeout_secs() -> u64 {
    120
}

const fn default_operation_poll_interval_ms() -> u64 {
    2000
}

const fn default_operation_timeout_secs() -> u64 {
    900
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            gcs_bucket: None,
            gen_model: default_gen_model(),
            embedding_model: default_embedding_model(),
            corpus_display_name: default_corpus_display_name(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            distance_threshold: default_distance_threshold(),
            max_embedding_requests_per_min: default_max_embedding_requests_per_min(),
            gcp_access_token: None,
            google_application_credentials: None,
            rag_corpus: None,
            http_port: default_http_port(),
            ui_port: default_ui_port(),
            api_base_url: default_api_base_url(),
            storage: default_storage_kind(),
            data_dir: default_data_dir(),
            upload_max_files: default_upload_max_files(),
            upload_max_file_bytes: default_upload_max_file_bytes(),
            upload_max_body_bytes: default_upload_max_body_bytes(),
            http_timeout_secs: default_http_timeout_secs(),
            operation_poll_interval_ms: default_operation_poll_interval_ms(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Bucket used for uploads. Falls back to `{project_id}-vertex-rag-docs`
    /// when no bucket is configured explicitly.
    pub fn bucket_name(&self) -> Option<String> {
        self.gcs_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .map(String::from)
            .or_else(|| {
                self.project_id()
                    .map(|project| format!("{project}-vertex-rag-docs"))
            })
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id
            .as_deref()
            .map(str::trim)
            .filter(|project| !project.is_empty())
    }

    /// `projects/{project}/locations/{location}`, the parent of every Vertex resource.
    pub fn vertex_parent(&self) -> Option<String> {
        self.project_id()
            .map(|project| format!("projects/{project}/locations/{}", self.location))
    }

    /// Full resource name of the corpus configured through `RAG_CORPUS`.
    /// A bare id needs a project to be expanded.
    pub fn attached_corpus(&self) -> Option<String> {
        let corpus = self
            .rag_corpus
            .as_deref()
            .map(str::trim)
            .filter(|corpus| !corpus.is_empty())?;

        if corpus.starts_with("projects/") {
            Some(corpus.to_string())
        } else {
            self.vertex_parent()
                .map(|parent| format!("{parent}/ragCorpora/{corpus}"))
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
