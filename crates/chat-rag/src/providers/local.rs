//! Local passage store backed by SQLite
//!
//! Holds `{id, text, source, embedding}` records for the brute-force search path.
//! Embeddings are stored as JSON arrays.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{PassageId, StoredPassage};

use super::passage_store::PassageStore;

/// SQLite-backed passage store
pub struct SqlitePassageStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePassageStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::store(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS passages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                text TEXT,
                source TEXT,
                embedding TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::store(format!("Failed to migrate passage store: {}", e)))?;

        Ok(())
    }

    fn scan_blocking(conn: &Connection) -> Result<Vec<StoredPassage>> {
        let mut stmt =
            conn.prepare("SELECT id, text, source, embedding FROM passages ORDER BY seq")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut passages = Vec::new();
        for row in rows {
            let (id, text, source, embedding_json) = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping unreadable passage row: {}", e);
                    continue;
                }
            };

            match serde_json::from_str::<Vec<f32>>(&embedding_json) {
                Ok(embedding) => passages.push(StoredPassage {
                    id: PassageId::new(id),
                    text,
                    source,
                    embedding,
                }),
                Err(e) => tracing::warn!("Skipping passage {} with bad embedding: {}", id, e),
            }
        }

        Ok(passages)
    }

    fn replace_blocking(conn: &mut Connection, passages: &[StoredPassage]) -> Result<usize> {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM passages", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO passages (id, text, source, embedding) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for passage in passages {
                let embedding = serde_json::to_string(&passage.embedding)?;
                stmt.execute(params![
                    passage.id.as_str(),
                    passage.text,
                    passage.source,
                    embedding
                ])?;
            }
        }
        tx.commit()?;
        Ok(passages.len())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl PassageStore for SqlitePassageStore {
    async fn scan(&self) -> Result<Vec<StoredPassage>> {
        self.with_conn(|conn| Self::scan_blocking(conn)).await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn replace_all(&self, passages: &[StoredPassage]) -> Result<usize> {
        let passages = passages.to_vec();
        let written = self
            .with_conn(move |conn| Self::replace_blocking(conn, &passages))
            .await?;
        tracing::info!("Replaced passage store contents with {} passages", written);
        Ok(written)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.count().await.is_ok())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_and_scan_preserves_order() {
        let store = SqlitePassageStore::in_memory().unwrap();
        assert!(store.is_empty().await.unwrap());

        let passages = vec![
            StoredPassage::new(0, "first", "doc_1", vec![1.0, 0.0]),
            StoredPassage::new(1, "second", "doc_2", vec![0.0, 1.0]),
        ];
        assert_eq!(store.replace_all(&passages).await.unwrap(), 2);

        let scanned = store.scan().await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].id.as_str(), "0");
        assert_eq!(scanned[1].source.as_deref(), Some("doc_2"));
        assert_eq!(scanned[1].embedding, vec![0.0, 1.0]);

        // A second replace drops the old contents.
        let replacement = vec![StoredPassage::new(9, "only", "doc_9", vec![0.5, 0.5])];
        store.replace_all(&replacement).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_skips_malformed_embedding() {
        let store = SqlitePassageStore::in_memory().unwrap();
        store
            .replace_all(&[StoredPassage::new(1, "good", "doc_1", vec![1.0])])
            .await
            .unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO passages (id, text, source, embedding) VALUES ('2', 'bad', NULL, 'not-json')",
                [],
            )
            .unwrap();
        }

        let scanned = store.scan().await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("passages.db");
        {
            let store = SqlitePassageStore::new(&path).unwrap();
            store
                .replace_all(&[StoredPassage::new(1, "kept", "doc_1", vec![1.0, 2.0])])
                .await
                .unwrap();
        }
        let reopened = SqlitePassageStore::new(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
