//! Request and result types for one pipeline invocation

use serde::{Deserialize, Serialize};

use super::passage::RetrievedPassage;

/// Outcome of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The question as sent to retrieval and generation (enriched in chat turns)
    pub question: String,
    /// Generated answer, or a `[LLM_ERROR]` placeholder
    pub answer: String,
    /// Retrieved passages in relevance order
    pub docs: Vec<RetrievedPassage>,
    /// Source tags the answer actually cites, in retrieval order
    pub sources: Vec<String>,
    /// Context block handed to the generator
    pub context: String,
    /// True when `answer` is a degraded placeholder
    #[serde(default)]
    pub generation_failed: bool,
    /// True when served from the answer cache
    #[serde(default)]
    pub cached: bool,
}

/// Stateless question request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question to answer
    pub question: String,
    /// Passages to retrieve (configured default when absent)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AskRequest {
    /// Create a new request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
        }
    }

    /// Set the number of passages to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}
