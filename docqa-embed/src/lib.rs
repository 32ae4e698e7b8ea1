//! # docqa-embed
//!
//! Text embedding generation for document question answering, backed by local
//! ONNX models via FastEmbed. Async-first, with a provider trait so callers
//! never depend on a concrete model.
//!
//! ## Features
//!
//! - **Local ONNX Models**: embeddings without external API calls
//! - **Model Caching**: initialized models are cached globally and reused
//! - **Half-Precision**: memory-efficient f16 vectors, L2-normalized
//! - **Validation**: fixed-dimension contract checked on every batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use docqa_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! Dimension mismatches and configuration errors are structural and propagate
//! immediately; they are never retried.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
