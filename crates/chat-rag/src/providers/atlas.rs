//! MongoDB Atlas provider through the official driver
//!
//! Serves both seams: `$vectorSearch` aggregation for managed search and
//! plain `find`/`delete_many`/`insert_many` for the passage store.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Cursor};
use serde_json::Value;
use std::time::Duration;

use crate::config::AtlasConfig;
use crate::error::{Error, Result};
use crate::types::{PassageId, PassageRecord, StoredPassage};

use super::passage_store::PassageStore;
use super::vector_store::{ManagedVectorSearch, VectorSearchQuery};

/// Atlas collection handle
pub struct AtlasStore {
    client: Client,
    collection: Collection<Document>,
    index_name: String,
    embedding_path: String,
}

impl AtlasStore {
    /// Connect to the configured cluster
    ///
    /// The driver connects lazily; a bad URI fails here, an unreachable cluster
    /// fails on the first operation after the server selection timeout.
    pub async fn connect(config: &AtlasConfig) -> Result<Self> {
        if config.uri.trim().is_empty() {
            return Err(Error::Config("Atlas uri is not set".to_string()));
        }

        let mut options = ClientOptions::parse(config.uri.as_str())
            .await
            .map_err(|e| Error::Config(format!("Invalid Atlas uri: {}", e)))?;
        options.app_name = Some("chat-rag".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(config.timeout_secs));

        let client = Client::with_options(options)
            .map_err(|e| Error::Config(format!("Failed to create MongoDB client: {}", e)))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self {
            client,
            collection,
            index_name: config.index_name.clone(),
            embedding_path: config.embedding_path.clone(),
        })
    }

    /// Aggregation pipeline for a vector query
    fn search_pipeline(query: &VectorSearchQuery) -> Result<Vec<Document>> {
        let stage = bson::to_document(query)
            .map_err(|e| Error::vector_search(format!("Failed to encode query: {}", e)))?;

        Ok(vec![
            doc! { "$vectorSearch": stage },
            doc! {
                "$project": {
                    "_id": 1,
                    "text": 1,
                    "source": 1,
                    "score": { "$meta": "vectorSearchScore" }
                }
            },
        ])
    }

    fn record_from_document(doc: &Value) -> PassageRecord {
        PassageRecord {
            id: doc.get("_id").and_then(PassageId::from_json),
            text: doc.get("text").and_then(Value::as_str).map(str::to_string),
            source: doc.get("source").and_then(Value::as_str).map(str::to_string),
            score: doc.get("score").and_then(json_number).map(|s| s as f32),
        }
    }

    fn stored_from_document(doc: &Value, embedding_path: &str) -> Option<StoredPassage> {
        let id = doc.get("_id").and_then(PassageId::from_json)?;
        let embedding = doc
            .get(embedding_path)
            .and_then(Value::as_array)?
            .iter()
            .map(|v| json_number(v).map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()?;

        Some(StoredPassage {
            id,
            text: doc.get("text").and_then(Value::as_str).map(str::to_string),
            source: doc.get("source").and_then(Value::as_str).map(str::to_string),
            embedding,
        })
    }

    fn document_from_stored(passage: &StoredPassage, embedding_path: &str) -> Document {
        // Integer ids are written back as numbers.
        let id = match passage.id.as_str().parse::<i64>() {
            Ok(n) => Bson::Int64(n),
            Err(_) => Bson::String(passage.id.as_str().to_string()),
        };

        let mut doc = doc! {
            "_id": id,
            "text": passage.text.clone(),
            "source": passage.source.clone(),
        };
        doc.insert(
            embedding_path,
            passage
                .embedding
                .iter()
                .map(|v| Bson::Double(f64::from(*v)))
                .collect::<Vec<_>>(),
        );
        doc
    }
}

/// Drain a cursor into relaxed extended JSON documents
async fn collect_json<W>(mut cursor: Cursor<Document>, wrap: W) -> Result<Vec<Value>>
where
    W: Fn(String) -> Error,
{
    let mut documents = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| wrap(format!("Cursor failed: {}", e)))?
    {
        let doc = cursor
            .deserialize_current()
            .map_err(|e| wrap(format!("Failed to decode document: {}", e)))?;
        documents.push(Bson::Document(doc).into_relaxed_extjson());
    }
    Ok(documents)
}

/// Read a number from plain or extended JSON
fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => ["$numberDouble", "$numberInt", "$numberLong", "$numberDecimal"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .and_then(|s| s.parse().ok()),
        _ => None,
    }
}

#[async_trait]
impl ManagedVectorSearch for AtlasStore {
    async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<PassageRecord>> {
        let pipeline = Self::search_pipeline(query)?;
        let cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| Error::vector_search(format!("$vectorSearch failed: {}", e)))?;
        let documents = collect_json(cursor, Error::VectorSearch).await?;

        tracing::debug!(
            "Atlas $vectorSearch on {} returned {} documents",
            self.index_name,
            documents.len()
        );

        Ok(documents.iter().map(Self::record_from_document).collect())
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn embedding_path(&self) -> &str {
        &self.embedding_path
    }

    async fn health_check(&self) -> Result<bool> {
        PassageStore::health_check(self).await
    }

    fn name(&self) -> &str {
        "atlas"
    }
}

#[async_trait]
impl PassageStore for AtlasStore {
    async fn scan(&self) -> Result<Vec<StoredPassage>> {
        let mut projection = doc! { "_id": 1, "text": 1, "source": 1 };
        projection.insert(self.embedding_path.as_str(), 1);

        let cursor = self
            .collection
            .find(doc! {})
            .projection(projection)
            .await
            .map_err(|e| Error::store(format!("find failed: {}", e)))?;
        let documents = collect_json(cursor, Error::Store).await?;

        let mut passages = Vec::with_capacity(documents.len());
        for doc in &documents {
            match Self::stored_from_document(doc, &self.embedding_path) {
                Some(passage) => passages.push(passage),
                None => tracing::warn!(
                    "Skipping malformed document {}",
                    doc.get("_id").map(|v| v.to_string()).unwrap_or_default()
                ),
            }
        }

        Ok(passages)
    }

    async fn count(&self) -> Result<usize> {
        let n = self
            .collection
            .count_documents(doc! {})
            .await
            .map_err(|e| Error::store(format!("count_documents failed: {}", e)))?;
        Ok(n as usize)
    }

    async fn replace_all(&self, passages: &[StoredPassage]) -> Result<usize> {
        self.collection
            .delete_many(doc! {})
            .await
            .map_err(|e| Error::store(format!("delete_many failed: {}", e)))?;

        if passages.is_empty() {
            return Ok(0);
        }

        let documents: Vec<Document> = passages
            .iter()
            .map(|p| Self::document_from_stored(p, &self.embedding_path))
            .collect();

        let inserted = self
            .collection
            .insert_many(documents)
            .await
            .map_err(|e| Error::store(format!("insert_many failed: {}", e)))?;

        tracing::info!(
            "Inserted {} documents into {}",
            inserted.inserted_ids.len(),
            self.collection.namespace()
        );

        Ok(inserted.inserted_ids.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .is_ok())
    }

    fn name(&self) -> &str {
        "atlas"
    }
}
