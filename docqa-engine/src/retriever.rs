//! Query-to-passages retrieval over a session's vector index.
//!
//! The retriever owns nothing durable: it borrows an embedding provider and a
//! snapshot of the session's index, embeds the query, and converts raw search
//! hits into ranked [`RetrievalResult`]s. Because it reads an immutable index
//! snapshot, identical queries against an unchanged index always produce
//! identical results.

use crate::error::{EngineError, Result};
use crate::index::VectorIndex;
use docqa_embed::EmbeddingProvider;
use serde::Serialize;
use std::sync::Arc;

/// Default separator between passages in [`Retriever::build_context`].
pub const DEFAULT_CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// One ranked retrieval hit.
///
/// `score = 1 / (1 + distance)`, so score decreases strictly as distance
/// grows and stays within `(0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    /// The retrieved chunk text.
    pub text: String,
    /// Distance from the query under the index metric. Non-negative.
    pub distance: f32,
    /// Similarity score derived from the distance.
    pub score: f32,
    /// 1-based rank by ascending distance.
    pub rank: usize,
}

/// Turns a query into ranked passages via the embedding provider and index.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { provider, index }
    }

    /// Retrieve the `k` passages closest to `query`, ranked by ascending
    /// distance.
    ///
    /// Fails with [`EngineError::InvalidInput`] for an empty query or
    /// non-positive `k`; underlying embedding or index failures are wrapped
    /// in [`EngineError::Retrieval`].
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(EngineError::invalid_input("query must not be empty"));
        }
        if k == 0 {
            return Err(EngineError::invalid_input("k must be greater than 0"));
        }

        let query_vector = self
            .provider
            .embed_text(query)
            .await
            .map_err(EngineError::retrieval)?;

        // The flat scan is CPU-bound and grows with the document; keep it
        // off the async worker threads like the embedding step.
        let index = Arc::clone(&self.index);
        let hits = tokio::task::spawn_blocking(move || index.search(&query_vector, k))
            .await
            .map_err(EngineError::retrieval)?
            .map_err(|err| match err {
                // Structural errors keep their identity; they indicate
                // defects, not transient retrieval trouble.
                EngineError::DimensionMismatch { .. } | EngineError::NotBuilt => err,
                other => EngineError::retrieval(other),
            })?;

        tracing::debug!("Retrieved {} passages for query", hits.len());

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RetrievalResult {
                score: 1.0 / (1.0 + hit.distance),
                text: hit.text,
                distance: hit.distance,
                rank: i + 1,
            })
            .collect())
    }

    /// Retrieve passages and join their texts with `separator`.
    ///
    /// Returns an empty string when nothing was retrieved.
    pub async fn build_context(&self, query: &str, k: usize, separator: &str) -> Result<String> {
        let results = self.retrieve(query, k).await?;
        if results.is_empty() {
            return Ok(String::new());
        }
        Ok(results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(separator))
    }
}
