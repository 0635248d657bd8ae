//! Retrieval orchestration: managed vector search with a brute-force fallback

mod search;

pub use search::{cosine_similarity, rank_passages};

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, ManagedVectorSearch, PassageStore, VectorSearchQuery};
use crate::types::RetrievedPassage;

/// Selects a search path and normalizes its results
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    managed: Option<Arc<dyn ManagedVectorSearch>>,
    store: Arc<dyn PassageStore>,
    over_fetch: usize,
}

impl Retriever {
    /// Create a retriever over a passage store, without managed search
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn PassageStore>) -> Self {
        Self {
            embedder,
            managed: None,
            store,
            over_fetch: 5,
        }
    }

    /// Prefer a managed vector index, falling back to the store scan
    pub fn with_managed(mut self, managed: Arc<dyn ManagedVectorSearch>) -> Self {
        self.managed = Some(managed);
        self
    }

    /// Set the candidate multiplier for managed queries
    pub fn with_over_fetch(mut self, over_fetch: usize) -> Self {
        self.over_fetch = over_fetch.max(1);
        self
    }

    /// Embedding provider used for queries
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Passage store behind the fallback path
    pub fn store(&self) -> &Arc<dyn PassageStore> {
        &self.store
    }

    /// Managed search backend, if configured
    pub fn managed(&self) -> Option<&Arc<dyn ManagedVectorSearch>> {
        self.managed.as_ref()
    }

    /// Retrieve up to `top_k` passages for a query, most relevant first
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let top_k = top_k.max(1);

        let Some(managed) = &self.managed else {
            return self
                .fallback(query, top_k)
                .await
                .map_err(|e| Error::Retrieval {
                    managed: "not configured".to_string(),
                    fallback: e.to_string(),
                });
        };

        let managed_error = match self.managed_search(managed.as_ref(), query, top_k).await {
            Ok(passages) if !passages.is_empty() => {
                tracing::debug!(
                    "Managed search via {} returned {} passages",
                    managed.name(),
                    passages.len()
                );
                return Ok(passages);
            }
            Ok(_) => match self.store.count().await {
                Ok(0) => {
                    tracing::info!("Passage store is empty, nothing to retrieve");
                    return Ok(Vec::new());
                }
                Ok(count) => {
                    tracing::warn!(
                        "Managed search returned no results over {} stored passages, \
                         check index {}; falling back to brute force",
                        count,
                        managed.index_name()
                    );
                    "empty result over a non-empty store".to_string()
                }
                Err(e) => {
                    tracing::warn!(
                        "Managed search returned no results and the store count failed ({}); \
                         falling back to brute force",
                        e
                    );
                    format!("empty result, store count failed: {}", e)
                }
            },
            Err(e) => {
                tracing::warn!("Managed search failed, falling back to brute force: {}", e);
                e.to_string()
            }
        };

        self.fallback(query, top_k)
            .await
            .map_err(|e| Error::Retrieval {
                managed: managed_error,
                fallback: e.to_string(),
            })
    }

    async fn managed_search(
        &self,
        managed: &dyn ManagedVectorSearch,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let query_vector = self.embedder.embed(query).await?;
        let request = VectorSearchQuery {
            index_name: managed.index_name().to_string(),
            path: managed.embedding_path().to_string(),
            query_vector,
            num_candidates: top_k * self.over_fetch,
            limit: top_k,
        };

        let records = managed.vector_search(&request).await?;
        let mut passages = Vec::with_capacity(records.len());
        for record in records {
            match RetrievedPassage::from_record(record) {
                Some(passage) => passages.push(passage),
                None => tracing::warn!("Skipping search hit without an identifier"),
            }
        }
        passages.truncate(top_k);
        Ok(passages)
    }

    async fn fallback(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let query_vector = self.embedder.embed(query).await?;
        self.brute_force(&query_vector, top_k).await
    }

    /// Exact cosine ranking over a full store scan
    pub async fn brute_force(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let stored = self.store.scan().await?;
        tracing::debug!(
            "Brute-force scan of {} passages from {}",
            stored.len(),
            self.store.name()
        );
        Ok(rank_passages(query_vector, stored, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::providers::local::SqlitePassageStore;
    use crate::types::{PassageId, PassageRecord, StoredPassage};

    /// Maps known words onto fixed axes
    struct KeywordEmbedder {
        calls: Mutex<usize>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            *self.calls.lock() += 1;
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("python") { 1.0 } else { 0.0 },
                if text.contains("learning") { 1.0 } else { 0.0 },
                0.1,
            ])
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    enum ManagedBehavior {
        Fail,
        Empty,
        Hits(Vec<PassageRecord>),
    }

    struct StubManaged {
        behavior: ManagedBehavior,
        last_query: Mutex<Option<VectorSearchQuery>>,
    }

    impl StubManaged {
        fn new(behavior: ManagedBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                last_query: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ManagedVectorSearch for StubManaged {
        async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<PassageRecord>> {
            *self.last_query.lock() = Some(query.clone());
            match &self.behavior {
                ManagedBehavior::Fail => Err(Error::vector_search("index unavailable")),
                ManagedBehavior::Empty => Ok(Vec::new()),
                ManagedBehavior::Hits(records) => Ok(records.clone()),
            }
        }

        fn index_name(&self) -> &str {
            "vector_index"
        }

        fn embedding_path(&self) -> &str {
            "embedding"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl PassageStore for BrokenStore {
        async fn scan(&self) -> Result<Vec<StoredPassage>> {
            Err(Error::store("connection refused"))
        }

        async fn count(&self) -> Result<usize> {
            Err(Error::store("connection refused"))
        }

        async fn replace_all(&self, _passages: &[StoredPassage]) -> Result<usize> {
            Err(Error::store("connection refused"))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    async fn seeded_store() -> Arc<SqlitePassageStore> {
        let store = SqlitePassageStore::in_memory().unwrap();
        store
            .replace_all(&[
                StoredPassage::new(0, "Python was created by Guido van Rossum.", "doc_1", vec![1.0, 0.0, 0.1]),
                StoredPassage::new(1, "Machine learning learns from data.", "doc_2", vec![0.0, 1.0, 0.1]),
                StoredPassage::new(2, "Discord bots automate servers.", "doc_3", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_brute_force_without_managed() {
        let retriever = Retriever::new(Arc::new(KeywordEmbedder::new()), seeded_store().await);
        let passages = retriever.retrieve("Who created Python?", 2).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].source, "doc_1");
        assert!(passages[0].score > passages[1].score);
    }

    #[tokio::test]
    async fn test_managed_hits_are_normalized() {
        let managed = StubManaged::new(ManagedBehavior::Hits(vec![
            PassageRecord {
                id: Some(PassageId::from(7)),
                text: None,
                source: None,
                score: Some(0.9),
            },
            PassageRecord {
                text: Some("no id".to_string()),
                ..Default::default()
            },
        ]));
        let retriever = Retriever::new(Arc::new(KeywordEmbedder::new()), seeded_store().await)
            .with_managed(managed.clone())
            .with_over_fetch(5);

        let passages = retriever.retrieve("python", 3).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].source, "doc_7");
        assert_eq!(passages[0].text, "");

        let query = managed.last_query.lock().clone().unwrap();
        assert_eq!(query.limit, 3);
        assert_eq!(query.num_candidates, 15);
        assert_eq!(query.index_name, "vector_index");
    }

    #[tokio::test]
    async fn test_falls_back_when_managed_fails() {
        let embedder = Arc::new(KeywordEmbedder::new());
        let retriever = Retriever::new(embedder.clone(), seeded_store().await)
            .with_managed(StubManaged::new(ManagedBehavior::Fail));

        let passages = retriever.retrieve("machine learning", 1).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].source, "doc_2");
        // One embedding for the managed attempt, one for the fallback.
        assert_eq!(*embedder.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_when_managed_is_empty_over_full_store() {
        let retriever = Retriever::new(Arc::new(KeywordEmbedder::new()), seeded_store().await)
            .with_managed(StubManaged::new(ManagedBehavior::Empty));

        let passages = retriever.retrieve("python", 1).await.unwrap();
        assert_eq!(passages[0].source, "doc_1");
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = Arc::new(SqlitePassageStore::in_memory().unwrap());
        let retriever = Retriever::new(Arc::new(KeywordEmbedder::new()), store)
            .with_managed(StubManaged::new(ManagedBehavior::Empty));

        assert!(retriever.retrieve("python", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_reports_both_causes() {
        let retriever = Retriever::new(Arc::new(KeywordEmbedder::new()), Arc::new(BrokenStore))
            .with_managed(StubManaged::new(ManagedBehavior::Fail));

        match retriever.retrieve("python", 3).await {
            Err(Error::Retrieval { managed, fallback }) => {
                assert!(managed.contains("index unavailable"));
                assert!(fallback.contains("connection refused"));
            }
            other => panic!("expected retrieval error, got {:?}", other),
        }
    }
}
