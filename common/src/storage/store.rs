use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    path::Path as ObjPath, Attribute, Attributes, ObjectStore, PutOptions, PutPayload,
};
use tracing::debug;

use super::bucket::GcsBucketAdmin;
use crate::{
    error::AppError,
    utils::{
        config::{AppConfig, StorageKind},
        gcp_auth::CREDENTIALS_HINT,
    },
};

pub type DynStore = Arc<dyn ObjectStore>;

/// Prefix every uploaded document is stored under.
pub const DOCUMENTS_PREFIX: &str = "documents";

/// Object storage for uploaded documents.
///
/// With the `gcs` backend objects land in the configured bucket, which is the
/// only place the RAG import can read from. `local` and `memory` exist for
/// development and tests and never touch the network.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    bucket: String,
    local_base: Option<PathBuf>,
    admin: Option<GcsBucketAdmin>,
}

impl StorageManager {
    /// Create a StorageManager from configuration. `admin` is only consulted
    /// for the `gcs` backend.
    pub async fn new(cfg: &AppConfig, admin: Option<GcsBucketAdmin>) -> Result<Self, AppError> {
        let backend_kind = cfg.storage.clone();
        let bucket = cfg
            .bucket_name()
            .unwrap_or_else(|| backend_kind.as_str().to_string());

        let (store, local_base): (DynStore, Option<PathBuf>) = match backend_kind {
            StorageKind::Gcs => {
                if cfg.bucket_name().is_none() {
                    return Err(AppError::Credentials(CREDENTIALS_HINT.to_string()));
                }
                let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&bucket);
                if let Some(path) = cfg
                    .google_application_credentials
                    .as_deref()
                    .map(str::trim)
                    .filter(|path| !path.is_empty())
                {
                    builder = builder.with_service_account_path(path);
                }
                let store = builder.build()?;
                (Arc::new(store), None)
            }
            StorageKind::Local => {
                let base = resolve_base_dir(cfg);
                tokio::fs::create_dir_all(&base).await?;
                let store = LocalFileSystem::new_with_prefix(base.clone())?;
                (Arc::new(store), Some(base))
            }
            StorageKind::Memory => (Arc::new(InMemory::new()), None),
        };

        Ok(Self {
            store,
            backend_kind,
            bucket,
            local_base,
            admin,
        })
    }

    /// Create a StorageManager around an existing backend, mainly for tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind, bucket: &str) -> Self {
        Self {
            store,
            backend_kind,
            bucket: bucket.to_string(),
            local_base: None,
            admin: None,
        }
    }

    pub fn memory(bucket: &str) -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory, bucket)
    }

    pub const fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// URI the RAG import reads the object from, e.g. `gs://bucket/documents/x.pdf`.
    pub fn object_uri(&self, location: &str) -> String {
        match self.backend_kind {
            StorageKind::Gcs => format!("gs://{}/{location}", self.bucket),
            StorageKind::Local => self.local_base.as_ref().map_or_else(
                || format!("file://{location}"),
                |base| format!("file://{}", base.join(location).display()),
            ),
            StorageKind::Memory => format!("memory://{}/{location}", self.bucket),
        }
    }

    /// Store bytes at the specified location.
    pub async fn put(
        &self,
        location: &str,
        data: Bytes,
        content_type: &str,
    ) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = PutPayload::from_bytes(data);

        // Only the GCS backend stores object attributes.
        if matches!(self.backend_kind, StorageKind::Gcs) {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            let opts = PutOptions {
                attributes,
                ..PutOptions::default()
            };
            self.store.put_opts(&path, payload, opts).await.map(|_| ())
        } else {
            self.store.put(&path, payload).await.map(|_| ())
        }
    }

    /// Retrieve bytes from the specified location.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Delete a single object. Missing objects are not an error.
    pub async fn delete(&self, location: &str) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        let prefix_path = prefix.map(ObjPath::from);
        self.store.list(prefix_path.as_ref()).try_collect().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }

    pub async fn bucket_exists(&self) -> Result<bool, AppError> {
        match (&self.backend_kind, &self.admin) {
            (StorageKind::Gcs, Some(admin)) => admin.exists(&self.bucket).await,
            (StorageKind::Gcs, None) => Err(AppError::InternalError(
                "no bucket admin configured for gcs storage".to_string(),
            )),
            _ => Ok(true),
        }
    }

    /// Makes sure the bucket exists. Returns `true` only when it was created
    /// by this call.
    pub async fn ensure_bucket(&self) -> Result<bool, AppError> {
        match (&self.backend_kind, &self.admin) {
            (StorageKind::Gcs, Some(admin)) => {
                if admin.exists(&self.bucket).await? {
                    debug!(bucket = %self.bucket, "Bucket already exists");
                    return Ok(false);
                }
                admin.create(&self.bucket).await
            }
            (StorageKind::Gcs, None) => Err(AppError::InternalError(
                "no bucket admin configured for gcs storage".to_string(),
            )),
            _ => Ok(false),
        }
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

/// `documents/{YYYYmmdd_HHMMSS}_{file_name}` with the file name sanitized.
pub fn document_object_key(file_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "{DOCUMENTS_PREFIX}/{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        sanitize_file_name(file_name)
    )
}

/// Replaces anything outside `[A-Za-z0-9_-]` in the stem with underscores and
/// keeps the last extension, so names cannot escape the documents prefix.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let clean = |part: &str| -> String {
        part.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}.{}", clean(stem), clean(ext)),
        _ => clean(base),
    }
}
