//! Error types for the question-answering engine

use uuid::Uuid;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error type for indexing, retrieval, and session operations.
///
/// Structural failures (empty index, shape or dimension mismatches, bad
/// configuration) indicate a programming or configuration defect and
/// propagate immediately. Input and lookup failures are reported to the
/// caller without touching session state. Generation-side failures never
/// appear here: they are absorbed by the fallback path and live in
/// [`GenerationError`](crate::generation::GenerationError).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Chunking or index parameters are invalid; the caller must fix its
    /// configuration.
    #[error("Invalid engine configuration: {message}")]
    Config { message: String },

    /// Empty or invalid caller input. The session is preserved.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A vector's dimension deviates from the index's fixed dimension,
    /// indicating an embedder/index version mismatch.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector and text collections have different lengths.
    #[error("Shape mismatch: {vectors} vectors but {texts} texts")]
    ShapeMismatch { vectors: usize, texts: usize },

    /// An index was built from empty inputs.
    #[error("Cannot build an index from empty inputs")]
    EmptyIndex,

    /// The index was searched before being built.
    #[error("Index searched before build")]
    NotBuilt,

    /// An underlying embedding or index failure during retrieval.
    #[error("Retrieval failed: {source}")]
    Retrieval {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The referenced session does not exist (or has expired).
    #[error("Session not found: {id}")]
    SessionNotFound { id: Uuid },

    /// Index persistence failed.
    #[error("Persistence error: {source}")]
    Persistence {
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Create a configuration error with a custom message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-input error with a custom message.
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap an underlying failure as a retrieval error.
    pub fn retrieval<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Retrieval {
            source: Box::new(source),
        }
    }
}

impl From<docqa_context::ContextError> for EngineError {
    fn from(err: docqa_context::ContextError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
