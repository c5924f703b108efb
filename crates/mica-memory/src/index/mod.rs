//! Vector index: embedded segments with cosine nearest-neighbor queries.

pub mod json_file;
pub mod memory;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::document::Segment;

pub use json_file::JsonFileIndex;
pub use memory::InMemoryIndex;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A segment stored with its embedding and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub segment: Segment,
    pub vector: Vec<f32>,
    pub source_id: String,
    /// Position within the owning source.
    pub chunk_index: usize,
}

/// One query result. `(source_id, chunk_index)` is the lookup key into the
/// index; the segment text rides along for prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub source_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// Cosine similarity in `[-1, 1]`, higher is more similar.
    pub score: f32,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage for embedded segments with nearest-neighbor queries.
///
/// Implementations serialize `insert`/`delete` against `query` so a reader
/// never observes a partially replaced source.
pub trait VectorIndex: Send + Sync {
    /// Replace all records for `source_id` with the given batch
    /// (delete-then-insert; re-indexing is idempotent).
    ///
    /// The first non-empty batch establishes the index dimensionality;
    /// vectors of any other length fail with
    /// [`IndexError::DimensionMismatch`] and leave the index unchanged.
    fn insert(
        &self,
        source_id: &str,
        records: Vec<(Segment, Vec<f32>)>,
    ) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Remove all records for `source_id`; returns whether anything was
    /// removed.
    fn delete(&self, source_id: &str) -> BoxFuture<'_, Result<bool, IndexError>>;

    /// Top-`top_k` records by descending cosine similarity, excluding scores
    /// below `min_score`. Ties break ascending by `chunk_index`, then
    /// `source_id`. An empty index yields an empty result.
    fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        min_score: f32,
    ) -> BoxFuture<'_, Result<Vec<ScoredMatch>, IndexError>>;

    /// Record count per source.
    fn list_sources(&self) -> BoxFuture<'_, Result<BTreeMap<String, usize>, IndexError>>;
}
