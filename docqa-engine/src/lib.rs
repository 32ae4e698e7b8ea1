//! # docqa-engine
//!
//! Session-scoped question answering over user documents. Each uploaded
//! document lives in its own session with its own vector index; questions
//! are answered by retrieving the closest passages and running a
//! language-constrained generation loop against a chat backend.
//!
//! ## Architecture
//!
//! - [`index`]: flat in-memory vector index with exact nearest-neighbor
//!   search under squared L2 or cosine distance
//! - [`retriever`]: embeds queries and turns index hits into ranked,
//!   scored passages
//! - [`language`]: script-share language detection and validation for
//!   English, Hindi, and Marathi answers
//! - [`generation`]: the retry/fallback loop around a [`ChatModel`]
//! - [`session`]: per-document conversation state and the registry
//! - [`engine`]: the [`QaEngine`] facade tying everything together
//!
//! Embeddings come from a [`docqa_embed::EmbeddingProvider`]; chunking and
//! context assembly come from [`docqa_context`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use docqa_embed::{EmbedConfig, FastEmbedProvider};
//! use docqa_engine::{HttpChatModel, Language, QaEngine, QaEngineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let model = Arc::new(HttpChatModel::new(
//!     "https://api.deepseek.com/v1",
//!     std::env::var("DEEPSEEK_API_KEY")?,
//!     "deepseek-chat",
//! )?);
//!
//! let engine = QaEngine::new(QaEngineConfig::default(), provider, model)?;
//!
//! let report = engine.ingest_document("...document text...", "notes.pdf").await?;
//! let answer = engine
//!     .ask(report.session_id, "What is this document about?", Language::En)
//!     .await?;
//! println!("{}", answer.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! Retrieval is deterministic: identical queries against an unchanged index
//! return identical ranked results. Answering is total: backend failures
//! produce a deterministic context-based fallback, never an error.

pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod language;
pub mod retriever;
pub mod session;
pub mod testing;

pub use engine::{AskReport, IngestReport, QaEngine, QaEngineConfig};
pub use error::{EngineError, Result};
pub use generation::{
    ChatModel, GenerationAttempt, GenerationController, GenerationError, GenerationOutcome,
    GenerationResult, HttpChatModel,
};
pub use index::{DistanceMetric, SearchHit, VectorIndex};
pub use language::{Detection, Language, detect, strict_instruction, validate};
pub use retriever::{DEFAULT_CONTEXT_SEPARATOR, RetrievalResult, Retriever};
pub use session::{ChatMessage, Role, Session, SessionRegistry, SessionSummary};
