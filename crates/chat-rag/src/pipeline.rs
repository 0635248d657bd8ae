//! End-to-end question answering: retrieve, assemble, generate, cite

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::AnswerCache;
use crate::config::{GenerationBackend, RagConfig, StoreBackend};
use crate::conversation::{enrich, ConversationSession};
use crate::error::{Error, Result};
use crate::generation::{build_user_prompt, extract_used_sources, ContextAssembler, SYSTEM_PROMPT};
use crate::ingestion::{IngestReport, Ingestor, TextChunker};
use crate::providers::atlas::AtlasStore;
use crate::providers::azure::AzureOpenAiClient;
use crate::providers::local::SqlitePassageStore;
use crate::providers::ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
use crate::providers::{GenerationClient, GenerationParams, PassageStore};
use crate::retrieval::Retriever;
use crate::types::PipelineResult;

/// Marker prefix of a degraded answer
pub const LLM_ERROR_PREFIX: &str = "[LLM_ERROR]";

/// The retrieval-and-grounding pipeline
pub struct RagPipeline {
    retriever: Retriever,
    generator: Option<Arc<dyn GenerationClient>>,
    params: GenerationParams,
    assembler: ContextAssembler,
    top_k: usize,
    max_turns: usize,
    cache: Option<AnswerCache>,
    chunker: TextChunker,
}

impl RagPipeline {
    /// Create a pipeline around a retriever, with default parameters and no generator
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever,
            generator: None,
            params: GenerationParams::default(),
            assembler: ContextAssembler::default(),
            top_k: 3,
            max_turns: 6,
            cache: None,
            chunker: TextChunker::default(),
        }
    }

    /// Build every provider from configuration
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let ollama = Arc::new(OllamaClient::new(&config.llm, config.embeddings.max_retries)?);
        let embedder = Arc::new(OllamaEmbedder::from_client(ollama.clone(), &config.embeddings));

        let retriever = match config.store.backend {
            StoreBackend::Sqlite => {
                let store = SqlitePassageStore::new(&config.store.sqlite_path)?;
                tracing::info!(
                    "Using SQLite passage store at {}",
                    config.store.sqlite_path.display()
                );
                Retriever::new(embedder, Arc::new(store))
            }
            StoreBackend::Atlas => {
                let atlas_config = config.store.atlas.as_ref().ok_or_else(|| {
                    Error::Config("Atlas store selected but store.atlas is missing".to_string())
                })?;
                let atlas = Arc::new(AtlasStore::connect(atlas_config).await?);
                tracing::info!(
                    "Using Atlas collection {}.{} with index {}",
                    atlas_config.database,
                    atlas_config.collection,
                    atlas_config.index_name
                );
                Retriever::new(embedder, atlas.clone()).with_managed(atlas)
            }
        }
        .with_over_fetch(config.retrieval.over_fetch);

        let generator: Option<Arc<dyn GenerationClient>> = match config.llm.backend {
            GenerationBackend::Ollama => Some(Arc::new(OllamaLlm::from_client(
                ollama,
                config.llm.generate_model.clone(),
            ))),
            GenerationBackend::Azure => {
                let azure = config.llm.azure.as_ref().ok_or_else(|| {
                    Error::Config("Azure backend selected but llm.azure is missing".to_string())
                })?;
                Some(Arc::new(AzureOpenAiClient::new(azure, config.llm.timeout_secs)?))
            }
            GenerationBackend::None => {
                tracing::warn!("No generation backend configured, answers are unavailable");
                None
            }
        };

        let mut pipeline = Self::new(retriever)
            .with_params(GenerationParams {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            })
            .with_assembler(ContextAssembler::new(
                config.retrieval.per_doc_chars,
                config.retrieval.lookahead_chars,
            ))
            .with_top_k(config.retrieval.top_k)
            .with_max_turns(config.conversation.max_turns)
            .with_chunker(
                TextChunker::new(config.ingestion.chunk_size, config.ingestion.chunk_overlap)
                    .with_min_size(config.ingestion.min_chunk_size),
            );

        if let Some(generator) = generator {
            pipeline = pipeline.with_generator(generator);
        }
        if config.cache.enabled {
            pipeline = pipeline.with_cache(AnswerCache::new(
                config.cache.capacity,
                config.cache.ttl_secs,
            ));
        }

        Ok(pipeline)
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_cache(mut self, cache: AnswerCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn store(&self) -> &Arc<dyn PassageStore> {
        self.retriever.store()
    }

    pub fn generator(&self) -> Option<&Arc<dyn GenerationClient>> {
        self.generator.as_ref()
    }

    pub fn cache(&self) -> Option<&AnswerCache> {
        self.cache.as_ref()
    }

    /// Ingestor writing into this pipeline's store
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.retriever.embedder().clone(), self.store().clone())
            .with_chunker(self.chunker.clone())
    }

    /// Replace the store with `texts`; cached answers are discarded
    pub async fn ingest_texts(&self, texts: &[String]) -> Result<usize> {
        let written = self.ingestor().ingest_texts(texts).await;
        self.invalidate_cache();
        written
    }

    /// Replace the store with chunks of the files under `paths`; cached answers are discarded
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let report = self.ingestor().ingest_paths(paths).await;
        self.invalidate_cache();
        report
    }

    // A failed replace may still have deleted the old contents.
    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Answer one question without conversation state
    ///
    /// A failed generation call yields a degraded answer rather than an error;
    /// only retrieval failure or a missing generator is reported as `Err`.
    pub async fn run(&self, question: &str, top_k: Option<usize>) -> Result<PipelineResult> {
        let generator = self.generator.as_ref().ok_or(Error::GenerationUnavailable)?;
        let top_k = top_k.unwrap_or(self.top_k).max(1);

        // Cached answers were produced with the configured passage count.
        let cache = self.cache.as_ref().filter(|_| top_k == self.top_k);
        if let Some(hit) = cache.and_then(|c| c.get(question)) {
            return Ok(hit);
        }

        let docs = self.retriever.retrieve(question, top_k).await?;
        tracing::debug!("Retrieved {} passages", docs.len());

        let context = self.assembler.build(&docs);
        let user_prompt = build_user_prompt(&context, question);

        let (answer, generation_failed) = match generator
            .generate(SYSTEM_PROMPT, &user_prompt, self.params)
            .await
        {
            Ok(answer) => (answer, false),
            Err(e) => {
                tracing::warn!("Generation via {} failed: {}", generator.name(), e);
                (format!("{} {}", LLM_ERROR_PREFIX, e), true)
            }
        };

        let sources = extract_used_sources(&answer, &docs);

        let result = PipelineResult {
            question: question.to_string(),
            answer,
            docs,
            sources,
            context,
            generation_failed,
            cached: false,
        };

        if let Some(cache) = cache {
            cache.put(question, &result);
        }

        Ok(result)
    }

    /// Run one conversational turn against a session
    ///
    /// The user turn is recorded before enrichment and the answer after
    /// generation. When the turn fails outright the user turn is withdrawn.
    pub async fn chat_turn(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
        top_k: Option<usize>,
    ) -> Result<PipelineResult> {
        session.history.push_user(user_text);
        let enriched = enrich(&session.history, user_text, self.max_turns);

        match self.run(&enriched, top_k).await {
            Ok(result) => {
                session.history.push_assistant(result.answer.clone());
                Ok(result)
            }
            Err(e) => {
                session.history.pop_last();
                Err(e)
            }
        }
    }
}
