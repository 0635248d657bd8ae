//! Core types for the chat RAG pipeline

pub mod passage;
pub mod result;

pub use passage::{PassageId, PassageRecord, RetrievedPassage, StoredPassage};
pub use result::{AskRequest, PipelineResult};
