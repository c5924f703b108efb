use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{IndexError, IndexedRecord, ScoredMatch, VectorIndex};
use crate::document::Segment;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Backend-agnostic index contents; both stores wrap this behind a lock.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct IndexState {
    pub(crate) dimension: Option<usize>,
    pub(crate) sources: BTreeMap<String, Vec<IndexedRecord>>,
}

impl IndexState {
    /// Replace-by-source insert. Validates dimensions before touching
    /// anything, so a failed call leaves the index unchanged.
    pub(crate) fn insert(
        &mut self,
        source_id: &str,
        records: Vec<(Segment, Vec<f32>)>,
    ) -> Result<(), IndexError> {
        if let Some((_, first_vector)) = records.first() {
            let expected = self.dimension.unwrap_or(first_vector.len());
            for (_, vector) in &records {
                if vector.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }
            self.dimension = Some(expected);
        }

        self.sources.remove(source_id);
        if !records.is_empty() {
            let built = records
                .into_iter()
                .enumerate()
                .map(|(i, (segment, vector))| IndexedRecord {
                    segment,
                    vector,
                    source_id: source_id.to_owned(),
                    chunk_index: i,
                })
                .collect();
            self.sources.insert(source_id.to_owned(), built);
        }
        if self.sources.is_empty() {
            // A fully cleared index may be re-populated with a different
            // embedding model.
            self.dimension = None;
        }
        Ok(())
    }

    pub(crate) fn delete(&mut self, source_id: &str) -> bool {
        let removed = self.sources.remove(source_id).is_some();
        if self.sources.is_empty() {
            self.dimension = None;
        }
        removed
    }

    pub(crate) fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredMatch>, IndexError> {
        if self.sources.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension
            && vector.len() != expected
        {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let mut matches: Vec<ScoredMatch> = self
            .sources
            .values()
            .flatten()
            .map(|record| ScoredMatch {
                source_id: record.source_id.clone(),
                chunk_index: record.chunk_index,
                text: record.segment.text.clone(),
                score: cosine_similarity(&record.vector, vector),
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    pub(crate) fn source_counts(&self) -> BTreeMap<String, usize> {
        self.sources
            .iter()
            .map(|(source, records)| (source.clone(), records.len()))
            .collect()
    }
}

/// In-memory vector index, the default backend.
pub struct InMemoryIndex {
    state: RwLock<IndexState>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex").finish_non_exhaustive()
    }
}

impl VectorIndex for InMemoryIndex {
    fn insert(
        &self,
        source_id: &str,
        records: Vec<(Segment, Vec<f32>)>,
    ) -> BoxFuture<'_, Result<(), IndexError>> {
        let source_id = source_id.to_owned();
        Box::pin(async move {
            let mut state = self
                .state
                .write()
                .map_err(|e| IndexError::Lock(e.to_string()))?;
            state.insert(&source_id, records)
        })
    }

    fn delete(&self, source_id: &str) -> BoxFuture<'_, Result<bool, IndexError>> {
        let source_id = source_id.to_owned();
        Box::pin(async move {
            let mut state = self
                .state
                .write()
                .map_err(|e| IndexError::Lock(e.to_string()))?;
            Ok(state.delete(&source_id))
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        min_score: f32,
    ) -> BoxFuture<'_, Result<Vec<ScoredMatch>, IndexError>> {
        Box::pin(async move {
            let state = self
                .state
                .read()
                .map_err(|e| IndexError::Lock(e.to_string()))?;
            state.query(&vector, top_k, min_score)
        })
    }

    fn list_sources(&self) -> BoxFuture<'_, Result<BTreeMap<String, usize>, IndexError>> {
        Box::pin(async move {
            let state = self
                .state
                .read()
                .map_err(|e| IndexError::Lock(e.to_string()))?;
            Ok(state.source_counts())
        })
    }
}
