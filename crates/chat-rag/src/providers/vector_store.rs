//! Managed vector search trait

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::PassageRecord;

/// Approximate nearest-neighbour query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchQuery {
    /// Search index name
    #[serde(rename = "index")]
    pub index_name: String,
    /// Field holding the stored embedding
    pub path: String,
    /// Query embedding
    pub query_vector: Vec<f32>,
    /// Candidates the index considers before truncating to `limit`
    pub num_candidates: usize,
    /// Maximum results
    pub limit: usize,
}

/// Trait for managed approximate similarity search
///
/// A failing call is recoverable: the retriever falls back to a brute-force scan.
///
/// Implementations:
/// - `AtlasStore`: MongoDB Atlas `$vectorSearch` aggregation
#[async_trait]
pub trait ManagedVectorSearch: Send + Sync {
    /// Run a vector query, returning `{id, text, source, score}` records
    async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<PassageRecord>>;

    /// Index name queries should target
    fn index_name(&self) -> &str;

    /// Field holding the stored embedding
    fn embedding_path(&self) -> &str;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
