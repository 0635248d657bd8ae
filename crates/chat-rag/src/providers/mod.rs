//! Provider abstractions for embeddings, generation, managed search and passage storage
//!
//! Trait-based seams let the pipeline switch between local (Ollama + SQLite)
//! and managed (Azure OpenAI + MongoDB Atlas) backends.

pub mod atlas;
pub mod azure;
pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod passage_store;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{GenerationClient, GenerationParams};
pub use passage_store::PassageStore;
pub use vector_store::{ManagedVectorSearch, VectorSearchQuery};
