//! Passage store trait for full scans and bulk writes

use async_trait::async_trait;

use crate::error::Result;
use crate::types::StoredPassage;

/// Trait for the passage store behind the brute-force search path
///
/// Implementations:
/// - `SqlitePassageStore`: Local SQLite file
/// - `AtlasStore`: MongoDB Atlas collection
#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Enumerate every stored passage with its embedding, in store order
    ///
    /// Records that cannot be decoded are skipped, not reported as errors.
    async fn scan(&self) -> Result<Vec<StoredPassage>>;

    /// Number of stored passages
    async fn count(&self) -> Result<usize>;

    /// Replace the whole store contents, returning the number of passages written
    async fn replace_all(&self, passages: &[StoredPassage]) -> Result<usize>;

    /// Check if the store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.count().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
