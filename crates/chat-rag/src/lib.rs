//! chat-rag: Conversational question answering over a passage store with source citations
//!
//! This crate retrieves passages through a managed vector search (with a brute-force
//! cosine fallback over the passage store), assembles a bounded context, and asks an
//! LLM for an answer that cites `[source:...]` tags. Conversations keep a bounded turn
//! history that enriches follow-up questions.

pub mod cache;
pub mod config;
pub mod conversation;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use conversation::{ConversationHistory, ConversationSession, ConversationTurn, Role};
pub use error::{Error, Result};
pub use pipeline::RagPipeline;
pub use retrieval::Retriever;
pub use types::{
    passage::{PassageId, PassageRecord, RetrievedPassage, StoredPassage},
    result::{AskRequest, PipelineResult},
};
