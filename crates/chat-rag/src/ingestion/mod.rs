//! Passage ingestion: chunk plain-text files, embed, replace the store contents

mod chunker;

pub use chunker::TextChunker;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, PassageStore};
use crate::types::StoredPassage;

/// File extensions read by [`Ingestor::ingest_paths`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Files read
    pub files: usize,
    /// Passages written to the store
    pub passages: usize,
}

/// Loads passages into a passage store
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn PassageStore>,
    chunker: TextChunker,
}

impl Ingestor {
    /// Create an ingestor with the default chunker
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn PassageStore>) -> Self {
        Self {
            embedder,
            store,
            chunker: TextChunker::default(),
        }
    }

    /// Use a custom chunker for file ingestion
    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Embed `texts` and replace the store with them
    ///
    /// Passage ids are `0..n` and sources `doc_1..doc_n`, in input order.
    pub async fn ingest_texts(&self, texts: &[String]) -> Result<usize> {
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let passages: Vec<StoredPassage> = texts
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| {
                StoredPassage::new(i, text.clone(), format!("doc_{}", i + 1), embedding)
            })
            .collect();

        let written = self.store.replace_all(&passages).await?;
        tracing::info!("Ingested {} passages into {}", written, self.store.name());
        Ok(written)
    }

    /// Read, chunk and ingest every supported file under `paths`
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let files = collect_files(paths)?;
        if files.is_empty() {
            return Err(Error::InvalidRequest(
                "No .txt or .md files found in the given paths".to_string(),
            ));
        }

        let mut texts = Vec::new();
        for file in &files {
            let content = tokio::fs::read_to_string(file).await?;
            let chunks = self.chunker.chunk(&content);
            tracing::debug!("{}: {} chunks", file.display(), chunks.len());
            texts.extend(chunks);
        }

        let passages = self.ingest_texts(&texts).await?;
        Ok(IngestReport {
            files: files.len(),
            passages,
        })
    }
}

/// Expand directories and keep supported files, sorted for stable ids
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            if is_supported(path) {
                files.push(path.clone());
            } else {
                tracing::warn!("Skipping unsupported file {}", path.display());
            }
        } else {
            return Err(Error::InvalidRequest(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::providers::local::SqlitePassageStore;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    #[tokio::test]
    async fn test_ingest_texts_assigns_ids_and_sources() {
        let store = Arc::new(SqlitePassageStore::in_memory().unwrap());
        let ingestor = Ingestor::new(Arc::new(LengthEmbedder), store.clone());

        let texts = vec![
            "Python is a high-level programming language.".to_string(),
            "Machine learning is a subset of AI.".to_string(),
        ];
        assert_eq!(ingestor.ingest_texts(&texts).await.unwrap(), 2);

        let stored = store.scan().await.unwrap();
        assert_eq!(stored[0].id.as_str(), "0");
        assert_eq!(stored[0].source.as_deref(), Some("doc_1"));
        assert_eq!(stored[1].id.as_str(), "1");
        assert_eq!(stored[1].source.as_deref(), Some("doc_2"));

        // Re-ingesting replaces rather than appends.
        ingestor.ingest_texts(&texts[..1]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_paths_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Python was created by Guido van Rossum in 1991.").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.md"), "Discord bots automate servers.").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let store = Arc::new(SqlitePassageStore::in_memory().unwrap());
        let ingestor = Ingestor::new(Arc::new(LengthEmbedder), store.clone());

        let report = ingestor
            .ingest_paths(&[dir.path().to_path_buf()])
            .await
            .unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.passages, 2);
        assert_eq!(store.scan().await.unwrap()[0].text.as_deref(), Some("Python was created by Guido van Rossum in 1991."));
    }

    #[tokio::test]
    async fn test_missing_path_is_rejected() {
        let store = Arc::new(SqlitePassageStore::in_memory().unwrap());
        let ingestor = Ingestor::new(Arc::new(LengthEmbedder), store);

        let result = ingestor
            .ingest_paths(&[PathBuf::from("/definitely/not/here")])
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
