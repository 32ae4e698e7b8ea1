//! Flat in-memory vector index with k-nearest-neighbor search.
//!
//! One index holds the embeddings for one document: it is built wholesale
//! from the full set of chunk vectors and never mutated incrementally. On
//! re-upload the owning session builds a fresh index and swaps it in, so
//! in-flight searches keep reading a consistent snapshot.
//!
//! Vectors are stored half-precision (f16) to keep per-session memory small;
//! distances are computed in f32.

use crate::error::{EngineError, Result};
use half::f16;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Distance metric used for nearest-neighbor search.
///
/// A closed set: the metric is chosen at construction time and fixed for the
/// index's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean (L2) distance.
    #[default]
    SquaredL2,
    /// Cosine distance, `1 - cosine_similarity`.
    Cosine,
}

impl DistanceMetric {
    fn distance(&self, a: &[f16], b: &[f16]) -> f32 {
        match self {
            DistanceMetric::SquaredL2 => squared_l2(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

/// A single nearest-neighbor search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Distance from the query under the index's metric. Non-negative.
    pub distance: f32,
    /// The stored chunk text at this position.
    pub text: String,
}

/// Flat vector index over one document's chunk embeddings.
///
/// Invariants: vector count equals text count; all vectors share one
/// dimension. Violations are rejected at [`build`](Self::build) time.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metric: DistanceMetric,
    dimension: usize,
    vectors: Vec<Vec<f16>>,
    texts: Vec<String>,
}

impl VectorIndex {
    /// Create an empty, unbuilt index with the given metric.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimension: 0,
            vectors: Vec::new(),
            texts: Vec::new(),
        }
    }

    /// Replace the index contents wholesale.
    ///
    /// Fails with [`EngineError::EmptyIndex`] for empty inputs,
    /// [`EngineError::ShapeMismatch`] when vector and text counts differ, and
    /// [`EngineError::DimensionMismatch`] when vectors disagree on dimension.
    pub fn build(&mut self, vectors: Vec<Vec<f16>>, texts: Vec<String>) -> Result<()> {
        if vectors.is_empty() || texts.is_empty() {
            return Err(EngineError::EmptyIndex);
        }
        if vectors.len() != texts.len() {
            return Err(EngineError::ShapeMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }

        let dimension = vectors[0].len();
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(EngineError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        self.dimension = dimension;
        self.vectors = vectors;
        self.texts = texts;

        tracing::debug!(
            "Built index with {} vectors of dimension {}",
            self.vectors.len(),
            self.dimension
        );
        Ok(())
    }

    /// Find the `k` stored vectors closest to `query`.
    ///
    /// Returns at most `min(k, size)` hits ordered by ascending distance;
    /// ties keep insertion order. Fails with [`EngineError::NotBuilt`] if the
    /// index is empty and [`EngineError::DimensionMismatch`] if the query's
    /// dimension deviates from the stored vectors'.
    pub fn search(&self, query: &[f16], k: usize) -> Result<Vec<SearchHit>> {
        if self.vectors.is_empty() {
            return Err(EngineError::NotBuilt);
        }
        if k == 0 {
            return Err(EngineError::invalid_input("k must be greater than 0"));
        }
        if query.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (self.metric.distance(query, vector), position))
            .collect();

        // Stable sort preserves insertion order among equal distances.
        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k.min(self.vectors.len()));

        Ok(hits
            .into_iter()
            .map(|(distance, position)| SearchHit {
                distance,
                text: self.texts[position].clone(),
            })
            .collect())
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        self.vectors.len()
    }

    /// Dimension of the stored vectors; 0 before the index is built.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The metric this index searches with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Write the index to disk as JSON (vectors widened to f32).
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = IndexSnapshot {
            metric: self.metric,
            dimension: self.dimension,
            vectors: self
                .vectors
                .iter()
                .map(|v| v.iter().map(|x| x.to_f32()).collect())
                .collect(),
            texts: self.texts.clone(),
        };
        let file = std::fs::File::create(path)
            .map_err(|e| EngineError::Persistence { source: e.into() })?;
        serde_json::to_writer(std::io::BufWriter::new(file), &snapshot)
            .map_err(|e| EngineError::Persistence { source: e.into() })?;
        Ok(())
    }

    /// Load an index previously written with [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            std::fs::File::open(path).map_err(|e| EngineError::Persistence { source: e.into() })?;
        let snapshot: IndexSnapshot = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| EngineError::Persistence { source: e.into() })?;

        let mut index = Self::new(snapshot.metric);
        let vectors = snapshot
            .vectors
            .into_iter()
            .map(|v| v.into_iter().map(f16::from_f32).collect())
            .collect();
        index.build(vectors, snapshot.texts)?;
        Ok(index)
    }
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    metric: DistanceMetric,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    texts: Vec<String>,
}

fn squared_l2(a: &[f16], b: &[f16]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x.to_f32() - y.to_f32();
            d * d
        })
        .sum()
}

fn cosine_distance(a: &[f16], b: &[f16]) -> f32 {
    let dot: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| x.to_f32() * y.to_f32())
        .sum();
    let norm_a: f32 = a.iter().map(|x| x.to_f32().powi(2)).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x.to_f32().powi(2)).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec16(values: &[f32]) -> Vec<f16> {
        values.iter().map(|&v| f16::from_f32(v)).collect()
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new(DistanceMetric::SquaredL2);
        index
            .build(
                vec![
                    vec16(&[0.0, 0.0]),
                    vec16(&[1.0, 0.0]),
                    vec16(&[0.0, 2.0]),
                ],
                vec!["origin".into(), "right".into(), "up".into()],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_build_validates_inputs() {
        let mut index = VectorIndex::new(DistanceMetric::default());

        assert!(matches!(
            index.build(vec![], vec![]),
            Err(EngineError::EmptyIndex)
        ));
        assert!(matches!(
            index.build(vec![vec16(&[1.0])], vec![]),
            Err(EngineError::EmptyIndex)
        ));
        assert!(matches!(
            index.build(
                vec![vec16(&[1.0]), vec16(&[2.0])],
                vec!["only one".into()]
            ),
            Err(EngineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            index.build(
                vec![vec16(&[1.0, 2.0]), vec16(&[3.0])],
                vec!["a".into(), "b".into()]
            ),
            Err(EngineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_search_before_build_fails() {
        let index = VectorIndex::new(DistanceMetric::default());
        assert!(matches!(
            index.search(&vec16(&[0.0]), 3),
            Err(EngineError::NotBuilt)
        ));
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let index = sample_index();
        let hits = index.search(&vec16(&[0.1, 0.0]), 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "origin");
        assert_eq!(hits[1].text, "right");
        assert_eq!(hits[2].text, "up");
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_search_truncates_to_index_size() {
        let index = sample_index();
        let hits = index.search(&vec16(&[0.0, 0.0]), 10).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_tie_break_keeps_insertion_order() {
        let mut index = VectorIndex::new(DistanceMetric::SquaredL2);
        index
            .build(
                vec![vec16(&[1.0, 0.0]), vec16(&[-1.0, 0.0]), vec16(&[0.0, 1.0])],
                vec!["first".into(), "second".into(), "third".into()],
            )
            .unwrap();

        // All three are equidistant from the origin.
        let hits = index.search(&vec16(&[0.0, 0.0]), 3).unwrap();
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "second");
        assert_eq!(hits[2].text, "third");
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = sample_index();
        assert!(matches!(
            index.search(&vec16(&[0.0, 0.0, 0.0]), 1),
            Err(EngineError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_cosine_metric() {
        let mut index = VectorIndex::new(DistanceMetric::Cosine);
        index
            .build(
                vec![vec16(&[1.0, 0.0]), vec16(&[0.0, 1.0])],
                vec!["parallel".into(), "orthogonal".into()],
            )
            .unwrap();

        let hits = index.search(&vec16(&[2.0, 0.0]), 2).unwrap();
        assert_eq!(hits[0].text, "parallel");
        assert!(hits[0].distance < 1e-3);
        assert!((hits[1].distance - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rebuild_replaces_wholesale() {
        let mut index = sample_index();
        index
            .build(vec![vec16(&[5.0, 5.0])], vec!["replacement".into()])
            .unwrap();

        assert_eq!(index.size(), 1);
        let hits = index.search(&vec16(&[0.0, 0.0]), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "replacement");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.size(), 3);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.metric(), DistanceMetric::SquaredL2);

        let hits = loaded.search(&vec16(&[0.9, 0.0]), 1).unwrap();
        assert_eq!(hits[0].text, "right");
    }
}
