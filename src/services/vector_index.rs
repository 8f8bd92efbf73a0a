//! Exact nearest-neighbor index over passage embeddings.
//!
//! Distances are squared Euclidean (L2) over the raw vectors, for both build
//! and query. The index holds exactly one generation of entries; `build`
//! replaces it wholesale and invalidates every id handed out before.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::IndexError;
use crate::models::Passage;

/// A passage matched by a query, with its distance to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Dense id within the generation that produced this hit.
    pub id: usize,
    pub passage: Passage,
    pub distance: f32,
}

/// One immutable population of (vector, passage) entries with ids `0..N`.
#[derive(Debug)]
pub struct IndexGeneration {
    number: u64,
    vectors: Array2<f32>,
    passages: Vec<Passage>,
}

impl IndexGeneration {
    fn new(
        number: u64,
        dimension: usize,
        entries: Vec<(Vec<f32>, Passage)>,
    ) -> Result<Self, IndexError> {
        if entries.is_empty() {
            return Err(IndexError::EmptyInput);
        }

        let mut flat = Vec::with_capacity(entries.len() * dimension);
        let mut passages = Vec::with_capacity(entries.len());
        for (vector, passage) in entries {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            flat.extend(vector);
            passages.push(passage);
        }

        let vectors = Array2::from_shape_vec((passages.len(), dimension), flat).map_err(|_| {
            IndexError::DimensionMismatch {
                expected: dimension,
                actual: 0,
            }
        })?;

        Ok(Self {
            number,
            vectors,
            passages,
        })
    }

    /// Monotonic build counter of the owning index.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Entries in id order, for carrying them into the next build.
    pub fn entries(&self) -> impl Iterator<Item = (Vec<f32>, &Passage)> + '_ {
        self.vectors
            .axis_iter(Axis(0))
            .map(|row| row.to_vec())
            .zip(self.passages.iter())
    }

    /// The `min(k, N)` closest entries, ascending by distance then by id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let distances = (&self.vectors - &query)
            .mapv(|d| d * d)
            .sum_axis(Axis(1));

        let mut ranked: Vec<(usize, f32)> = distances.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k.min(self.len()));

        Ok(ranked
            .into_iter()
            .map(|(id, distance)| SearchHit {
                id,
                passage: self.passages[id].clone(),
                distance,
            })
            .collect())
    }
}

/// Holder of the current index generation for one embedding dimension.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    builds: u64,
    current: Option<Arc<IndexGeneration>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            builds: 0,
            current: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Replace the current generation with `entries`, assigning ids in input order.
    pub fn build(
        &mut self,
        entries: Vec<(Vec<f32>, Passage)>,
    ) -> Result<Arc<IndexGeneration>, IndexError> {
        let generation = Arc::new(self.prepare(entries)?);
        self.install(Arc::clone(&generation));
        Ok(generation)
    }

    /// Build a generation without installing it.
    pub fn prepare(&self, entries: Vec<(Vec<f32>, Passage)>) -> Result<IndexGeneration, IndexError> {
        IndexGeneration::new(self.builds + 1, self.dimension, entries)
    }

    /// Make a prepared generation current.
    pub fn install(&mut self, generation: Arc<IndexGeneration>) {
        self.builds = self.builds.max(generation.number());
        self.current = Some(generation);
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.current
            .as_ref()
            .ok_or(IndexError::IndexNotBuilt)?
            .search(query, k)
    }

    /// Snapshot of the current generation, if any.
    pub fn generation(&self) -> Option<Arc<IndexGeneration>> {
        self.current.clone()
    }

    pub fn is_built(&self) -> bool {
        self.current.is_some()
    }

    pub fn len(&self) -> usize {
        self.current.as_ref().map_or(0, |g| g.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
