use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::types::document::{CorpusInfo, DocumentRecord};

/// In-memory list of uploaded documents plus the active corpus slot.
///
/// Nothing here is persisted: after a restart the bucket and the corpus still
/// hold the files but this process no longer knows about them.
#[derive(Clone, Default)]
pub struct DocumentRegistry {
    documents: Arc<RwLock<Vec<DocumentRecord>>>,
    corpus: Arc<Mutex<Option<CorpusInfo>>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `corpus` already in the slot, for corpora that exist
    /// before this process does.
    pub fn with_corpus(corpus: CorpusInfo) -> Self {
        Self {
            documents: Arc::default(),
            corpus: Arc::new(Mutex::new(Some(corpus))),
        }
    }

    pub async fn list(&self) -> Vec<DocumentRecord> {
        self.documents.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.documents
            .read()
            .await
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
    }

    /// Appends the record and bumps the active corpus document count.
    pub async fn insert(&self, record: DocumentRecord) {
        self.documents.write().await.push(record);
        if let Some(corpus) = self.corpus.lock().await.as_mut() {
            corpus.document_count = corpus.document_count.saturating_add(1);
        }
    }

    pub async fn remove(&self, id: &str) -> Option<DocumentRecord> {
        let removed = {
            let mut documents = self.documents.write().await;
            let index = documents.iter().position(|doc| doc.id == id)?;
            documents.remove(index)
        };

        if let Some(corpus) = self.corpus.lock().await.as_mut() {
            corpus.document_count = corpus.document_count.saturating_sub(1);
        }
        Some(removed)
    }

    /// Empties the list and forgets the active corpus, returning both.
    pub async fn clear(&self) -> (Vec<DocumentRecord>, Option<CorpusInfo>) {
        let documents = std::mem::take(&mut *self.documents.write().await);
        let corpus = self.corpus.lock().await.take();
        (documents, corpus)
    }

    pub async fn corpus(&self) -> Option<CorpusInfo> {
        self.corpus.lock().await.clone()
    }

    /// Locks the corpus slot. Holding the guard across corpus creation keeps
    /// concurrent first uploads from creating more than one corpus.
    pub async fn corpus_slot(&self) -> MutexGuard<'_, Option<CorpusInfo>> {
        self.corpus.lock().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::storage::types::document::DocumentKind;

    fn record(name: &str) -> DocumentRecord {
        DocumentRecord::new(
            name,
            10,
            DocumentKind::Txt,
            format!("documents/{name}"),
            format!("gs://bucket/documents/{name}"),
            None,
        )
    }

    fn corpus() -> CorpusInfo {
        CorpusInfo {
            name: "projects/p/locations/l/ragCorpora/1".into(),
            display_name: "rag_corpus_test".into(),
            created_time: Utc::now(),
            document_count: 0,
        }
    }

    #[tokio::test]
    async fn insert_and_remove_track_corpus_count() {
        let registry = DocumentRegistry::new();
        *registry.corpus_slot().await = Some(corpus());

        let first = record("a.txt");
        let first_id = first.id.clone();
        registry.insert(first).await;
        registry.insert(record("b.txt")).await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.corpus().await.unwrap().document_count, 2);

        let removed = registry.remove(&first_id).await.unwrap();
        assert_eq!(removed.filename, "a.txt");
        assert!(registry.get(&first_id).await.is_none());
        assert_eq!(registry.corpus().await.unwrap().document_count, 1);
    }

    #[tokio::test]
    async fn removing_unknown_id_changes_nothing() {
        let registry = DocumentRegistry::new();
        registry.insert(record("a.txt")).await;

        assert!(registry.remove("missing").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn clear_drains_documents_and_corpus() {
        let registry = DocumentRegistry::new();
        *registry.corpus_slot().await = Some(corpus());
        registry.insert(record("a.txt")).await;

        let (documents, corpus) = registry.clear().await;

        assert_eq!(documents.len(), 1);
        assert!(corpus.is_some());
        assert!(registry.is_empty().await);
        assert!(registry.corpus().await.is_none());
    }

    #[tokio::test]
    async fn preloaded_corpus_is_active_without_documents() {
        let registry = DocumentRegistry::with_corpus(corpus());

        assert!(registry.is_empty().await);
        assert_eq!(
            registry.corpus().await.map(|c| c.name).as_deref(),
            Some("projects/p/locations/l/ragCorpora/1")
        );
    }
}
