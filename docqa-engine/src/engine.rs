//! The question-answering engine: ingestion, retrieval, and answering tied
//! together over the session registry.
//!
//! [`QaEngine`] is the crate's front door. Ingesting a document chunks and
//! embeds it, builds a fresh index, and binds it to a session; asking a
//! question retrieves context from that session's index and runs the
//! generation controller against the chat backend. All state lives in the
//! registry, so one engine serves many concurrent sessions.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use docqa_context::{TextChunker, assemble_context, clean_text};
use docqa_embed::EmbeddingProvider;

use crate::error::{EngineError, Result};
use crate::generation::{
    ChatModel, GenerationAttempt, GenerationController, GenerationError, GenerationOutcome,
    GenerationResult,
};
use crate::index::{DistanceMetric, VectorIndex};
use crate::language::Language;
use crate::retriever::{RetrievalResult, Retriever};
use crate::session::{ChatMessage, Role, SessionRegistry};

/// Tunables for the engine. Defaults match the typical document QA setup:
/// 500-character chunks with 50 characters of overlap, top-3 retrieval, and
/// two generation attempts.
#[derive(Debug, Clone)]
pub struct QaEngineConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub metric: DistanceMetric,
    pub max_attempts: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Idle time after which a session may be evicted. `None` disables
    /// eviction.
    pub session_ttl: Option<chrono::Duration>,
}

impl Default for QaEngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            top_k: 3,
            metric: DistanceMetric::SquaredL2,
            max_attempts: 2,
            temperature: 0.7,
            max_tokens: 1024,
            session_ttl: None,
        }
    }
}

impl QaEngineConfig {
    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_generation(mut self, max_attempts: usize, temperature: f32) -> Self {
        self.max_attempts = max_attempts;
        self.temperature = temperature;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }
}

/// What ingestion produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub session_id: Uuid,
    pub document_name: String,
    pub chunk_count: usize,
    pub embedding_dimension: usize,
}

/// A full answer with its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct AskReport {
    pub session_id: Uuid,
    pub answer: String,
    pub outcome: GenerationOutcome,
    pub language: Language,
    pub attempts: Vec<GenerationAttempt>,
    /// The passages the answer was grounded on, ranked.
    pub sources: Vec<RetrievalResult>,
}

/// Session-scoped document question answering.
pub struct QaEngine {
    config: QaEngineConfig,
    chunker: TextChunker,
    provider: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
    controller: GenerationController,
    registry: SessionRegistry,
}

impl QaEngine {
    pub fn new(
        config: QaEngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        if config.top_k == 0 {
            return Err(EngineError::config("top_k must be greater than 0"));
        }
        let chunker = TextChunker::new(config.chunk_size, config.overlap)
            .map_err(|e| EngineError::config(e.to_string()))?;
        let controller =
            GenerationController::new(config.max_attempts, config.temperature, config.max_tokens);
        let registry = SessionRegistry::new(config.session_ttl);

        Ok(Self {
            config,
            chunker,
            provider,
            model,
            controller,
            registry,
        })
    }

    /// The session registry, for lifecycle operations beyond ingest/ask.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &QaEngineConfig {
        &self.config
    }

    async fn build_index(&self, text: &str) -> Result<(VectorIndex, usize)> {
        let cleaned = clean_text(text);
        let chunks = self.chunker.chunk(&cleaned);
        if chunks.is_empty() {
            return Err(EngineError::invalid_input(
                "document produced no chunks after cleaning",
            ));
        }

        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        let chunk_count = texts.len();

        let embedded = self
            .provider
            .embed_texts(&texts)
            .await
            .map_err(EngineError::retrieval)?;

        let mut index = VectorIndex::new(self.config.metric);
        index.build(embedded.embeddings, texts)?;

        Ok((index, chunk_count))
    }

    /// Ingest a document into a brand-new session.
    pub async fn ingest_document(
        &self,
        text: &str,
        document_name: &str,
    ) -> Result<IngestReport> {
        let (index, chunk_count) = self.build_index(text).await?;
        let embedding_dimension = index.dimension();

        let session_id = self.registry.create();
        self.registry.bind_index(session_id, Arc::new(index))?;
        self.registry.set_document_name(session_id, document_name)?;

        info!(
            "Ingested '{document_name}' into session {session_id}: \
             {chunk_count} chunks at dimension {embedding_dimension}"
        );

        Ok(IngestReport {
            session_id,
            document_name: document_name.to_string(),
            chunk_count,
            embedding_dimension,
        })
    }

    /// Replace an existing session's document.
    ///
    /// The new index is built completely before it is bound, so concurrent
    /// questions see either the old document or the new one, never a partial
    /// index. Chat history is preserved.
    pub async fn reingest_document(
        &self,
        session_id: Uuid,
        text: &str,
        document_name: &str,
    ) -> Result<IngestReport> {
        // Fail fast on unknown sessions before paying for embedding.
        self.registry.get(session_id)?;

        let (index, chunk_count) = self.build_index(text).await?;
        let embedding_dimension = index.dimension();

        self.registry.bind_index(session_id, Arc::new(index))?;
        self.registry.set_document_name(session_id, document_name)?;

        info!(
            "Re-ingested '{document_name}' into session {session_id}: \
             {chunk_count} chunks"
        );

        Ok(IngestReport {
            session_id,
            document_name: document_name.to_string(),
            chunk_count,
            embedding_dimension,
        })
    }

    /// Answer `question` from the session's document in `language`.
    ///
    /// The question and the answer are appended to the session's chat
    /// history, and the session's preferred language is updated. If no
    /// relevant passages are found the engine answers directly with a
    /// localized insufficient-context message and never calls the chat
    /// backend.
    pub async fn ask(
        &self,
        session_id: Uuid,
        question: &str,
        language: Language,
    ) -> Result<AskReport> {
        let session = self.registry.get(session_id)?;
        let index = session.index.ok_or(EngineError::NotBuilt)?;

        let retriever = Retriever::new(Arc::clone(&self.provider), index);
        let sources = retriever.retrieve(question, self.config.top_k).await?;

        let result = if sources.is_empty() {
            GenerationResult {
                answer: crate::generation::insufficient_context_message(language).to_string(),
                outcome: GenerationOutcome::Fallback,
                language,
                attempts: Vec::new(),
            }
        } else {
            let passages: Vec<String> = sources.iter().map(|s| s.text.clone()).collect();
            let context = assemble_context(&passages);

            self.controller
                .answer(self.model.as_ref(), question, &context, &passages, language)
                .await
                .map_err(|err| match err {
                    GenerationError::EmptyPrompt => {
                        EngineError::invalid_input("question must not be empty")
                    }
                    other => EngineError::retrieval(other),
                })?
        };

        self.registry
            .append_message(session_id, ChatMessage::new(Role::User, question))?;
        self.registry
            .append_message(session_id, ChatMessage::new(Role::Assistant, &result.answer))?;
        self.registry.set_language(session_id, language)?;

        Ok(AskReport {
            session_id,
            answer: result.answer,
            outcome: result.outcome,
            language,
            attempts: result.attempts,
            sources,
        })
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete_session(&self, session_id: Uuid) -> bool {
        self.registry.delete(session_id)
    }

    /// Evict sessions idle past the configured TTL.
    pub fn evict_expired_sessions(&self) -> usize {
        self.registry.evict_expired()
    }
}
