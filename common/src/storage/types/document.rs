use std::{fmt, path::Path, str::FromStr};

use chrono::{DateTime, Utc};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File formats the managed RAG import accepts from this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
    Md,
}

impl DocumentKind {
    pub const ALL: [Self; 4] = [Self::Pdf, Self::Docx, Self::Txt, Self::Md];

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Md => "md",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Txt => "TXT",
            Self::Md => "MD",
        }
    }

    /// Resolves the kind from a file name's extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        ext.parse().ok()
    }

    pub fn content_type(self, file_name: &str) -> String {
        match self {
            Self::Md => "text/markdown".to_string(),
            _ => from_path(file_name)
                .first_or(mime::APPLICATION_OCTET_STREAM)
                .to_string(),
        }
    }

    /// `.pdf, .docx, .txt, .md`
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!(".{}", kind.extension()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            "md" => Ok(Self::Md),
            other => Err(format!("unsupported document kind: {other}")),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub file_size: u64,
    pub file_type: DocumentKind,
    pub content_type: String,
    pub upload_time: DateTime<Utc>,
    pub gcs_path: String,
    pub object_key: String,
    #[serde(default)]
    pub description: Option<String>,
    pub corpus_updated: bool,
    /// Resource name the RAG service gave the imported file, when it could be resolved.
    #[serde(default)]
    pub rag_file: Option<String>,
}

impl DocumentRecord {
    pub fn new(
        filename: impl Into<String>,
        file_size: u64,
        file_type: DocumentKind,
        object_key: impl Into<String>,
        gcs_path: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let filename = filename.into();
        Self {
            id: Uuid::new_v4().to_string(),
            content_type: file_type.content_type(&filename),
            filename,
            file_size,
            file_type,
            upload_time: Utc::now(),
            gcs_path: gcs_path.into(),
            object_key: object_key.into(),
            description,
            corpus_updated: false,
            rag_file: None,
        }
    }
}

/// The corpus this process is currently importing into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusInfo {
    pub name: String,
    pub display_name: String,
    pub created_time: DateTime<Utc>,
    pub document_count: usize,
}
