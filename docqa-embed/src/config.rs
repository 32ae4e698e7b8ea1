//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};

/// Configuration for embedding models.
///
/// Only built-in fastembed models are supported; the model is addressed by a
/// short name and resolved to a concrete ONNX model at provider
/// initialization. The configuration serializes deterministically, which the
/// provider uses to key its global model cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration for the named model.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            batch_size: 16,
            normalize: true,
        }
    }

    /// The default lightweight model: all-MiniLM-L6-v2, 384 dimensions.
    pub fn minilm_l6() -> Self {
        Self::new("all-MiniLM-L6-v2")
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured name to a fastembed built-in model.
    ///
    /// Fails with [`EmbedError::InvalidConfig`] for unknown names so a typo
    /// in deployment configuration surfaces at startup, not at first query.
    pub fn embedding_model(&self) -> Result<EmbeddingModel> {
        match self.model_name.as_str() {
            "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            other => Err(EmbedError::invalid_config(format!(
                "unknown embedding model: {other}"
            ))),
        }
    }

    /// Validate the configuration without loading the model.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        self.embedding_model().map(|_| ())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::minilm_l6()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name(), "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 16);
        assert!(config.normalize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let config = EmbedConfig::new("bge-small-en-v1.5")
            .with_batch_size(64)
            .with_normalize(false);

        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let config = EmbedConfig::new("not-a-real-model");
        assert!(matches!(
            config.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = EmbedConfig::default().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }
}
