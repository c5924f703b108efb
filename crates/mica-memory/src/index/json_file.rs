use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::RwLock;

use super::memory::IndexState;
use super::{IndexError, ScoredMatch, VectorIndex};
use crate::document::Segment;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector index persisted to a single JSON file.
///
/// The whole index is held in memory; every mutation rewrites the file via a
/// temp file + rename so a crash never leaves a half-written index behind.
/// Suited to the scale this crate targets (one user's documents), not to a
/// production corpus.
pub struct JsonFileIndex {
    path: PathBuf,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for JsonFileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JsonFileIndex {
    /// Open an index file, or start empty when the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexState::default(),
            Err(e) => return Err(IndexError::Io(e)),
        };
        tracing::debug!(path = %path.display(), "opened index file");
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize under the read lock, then write outside it.
    fn snapshot(&self) -> Result<Vec<u8>, IndexError> {
        let state = self
            .state
            .read()
            .map_err(|e| IndexError::Lock(e.to_string()))?;
        Ok(serde_json::to_vec(&*state)?)
    }

    async fn persist(&self) -> Result<(), IndexError> {
        let bytes = self.snapshot()?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl VectorIndex for JsonFileIndex {
    fn insert(
        &self,
        source_id: &str,
        records: Vec<(Segment, Vec<f32>)>,
    ) -> BoxFuture<'_, Result<(), IndexError>> {
        let source_id = source_id.to_owned();
        Box::pin(async move {
            {
                let mut state = self
                    .state
                    .write()
                    .map_err(|e| IndexError::Lock(e.to_string()))?;
                state.insert(&source_id, records)?;
            }
            self.persist().await
        })
    }

    fn delete(&self, source_id: &str) -> BoxFuture<'_, Result<bool, IndexError>> {
        let source_id = source_id.to_owned();
        Box::pin(async move {
            let removed = {
                let mut state = self
                    .state
                    .write()
                    .map_err(|e| IndexError::Lock(e.to_string()))?;
                state.delete(&source_id)
            };
            if removed {
                self.persist().await?;
            }
            Ok(removed)
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
