//! Exact nearest-neighbour index persisted as a single JSON file.
//!
//! Queries are a brute-force scan over every entry. That is exact, simple and
//! fast enough below roughly 100k chunks; corpora beyond that should use an
//! approximate index instead.
//!
//! The file is replaced atomically: the new index is written to a temporary
//! file next to the target, flushed to disk and renamed over it, so a crash
//! mid-write leaves the previous index readable.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use docqa_core::{DocqaError, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::document::{Chunk, SearchResult};

/// Version written to and required from persisted indexes.
pub const FORMAT_VERSION: u32 = 1;

/// Similarity metric, fixed when the index is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine similarity. A zero vector scores 0.0 against everything.
    #[default]
    Cosine,
    /// Negative Euclidean distance, so that higher is still closer.
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }

    /// Score `b` against `a`. Higher is more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => {
                -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = DocqaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(DocqaError::Configuration(format!(
                "unknown metric '{other}' (expected cosine or euclidean)"
            ))),
        }
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Embedded chunks plus the model and metric they were built with.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunk, Metric, VectorIndex};
/// # fn chunk(id: &str) -> Chunk {
/// #     Chunk { id: id.into(), document_id: "d".into(), index: 0, text: id.into(),
/// #             start: 0, overlap: 0, metadata: Default::default() }
/// # }
///
/// let index = VectorIndex::build(
///     "text-embedding-3-small",
///     Metric::Cosine,
///     vec![(chunk("a"), vec![1.0, 0.0]), (chunk("b"), vec![0.0, 1.0])],
/// )
/// .unwrap();
/// let hits = index.query(&[1.0, 0.1], 1).unwrap();
/// assert_eq!(hits[0].chunk.id, "a");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    format_version: u32,
    model_id: String,
    metric: Metric,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from scratch. Entry order is preserved and decides ties.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if there are no entries, a vector
    /// is empty, dimensions differ or a component is not finite.
    pub fn build(
        model_id: impl Into<String>,
        metric: Metric,
        entries: impl IntoIterator<Item = (Chunk, Vec<f32>)>,
    ) -> Result<Self> {
        let entries: Vec<IndexEntry> =
            entries.into_iter().map(|(chunk, vector)| IndexEntry { vector, chunk }).collect();
        let dimensions = entries.first().map(|e| e.vector.len()).ok_or_else(|| {
            DocqaError::Configuration("cannot build an index without entries".into())
        })?;
        if dimensions == 0 {
            return Err(DocqaError::Configuration("embedding vectors are empty".into()));
        }
        for entry in &entries {
            if entry.vector.len() != dimensions {
                return Err(DocqaError::Configuration(format!(
                    "chunk '{}' has {} dimensions, expected {dimensions}",
                    entry.chunk.id,
                    entry.vector.len()
                )));
            }
            if entry.vector.iter().any(|v| !v.is_finite()) {
                return Err(DocqaError::Configuration(format!(
                    "chunk '{}' has a non-finite embedding component",
                    entry.chunk.id
                )));
            }
        }

        Ok(Self {
            format_version: FORMAT_VERSION,
            model_id: model_id.into(),
            metric,
            dimensions,
            entries,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Fail with [`DocqaError::ModelMismatch`] unless `model_id` built this index.
    pub fn ensure_model(&self, model_id: &str) -> Result<()> {
        if self.model_id != model_id {
            return Err(DocqaError::ModelMismatch {
                expected: self.model_id.clone(),
                actual: model_id.to_string(),
            });
        }
        Ok(())
    }

    /// Return the `k` best entries for `vector`, best first.
    ///
    /// Equal scores keep insertion order. `k == 0` gives an empty result and
    /// `k` larger than the index gives every entry.
    ///
    /// # Errors
    ///
    /// - [`DocqaError::ModelMismatch`] if `vector` has the wrong dimensionality
    /// - [`DocqaError::Configuration`] if it has a non-finite component
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if vector.len() != self.dimensions {
            return Err(DocqaError::ModelMismatch {
                expected: format!("{} dimensions ({})", self.dimensions, self.model_id),
                actual: format!("{} dimensions", vector.len()),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(DocqaError::Configuration(
                "query vector has a non-finite component".into(),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, self.metric.score(&entry.vector, vector)))
            .collect();
        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.entries[i].chunk.clone(), score })
            .collect())
    }

    /// Atomically replace the file at `path` with this index.
    ///
    /// Missing parent directories are created.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let storage =
            |e: std::io::Error| DocqaError::Storage(format!("failed to write {}: {e}", path.display()));

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(storage)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(storage)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self).map_err(|e| {
                DocqaError::Storage(format!("failed to serialize index: {e}"))
            })?;
            writer.flush().map_err(storage)?;
        }
        tmp.as_file().sync_all().map_err(storage)?;
        tmp.persist(path).map_err(|e| storage(e.error))?;

        debug!(path = %path.display(), entries = self.len(), "persisted index");
        Ok(())
    }

    /// Read an index written by [`persist`](VectorIndex::persist).
    ///
    /// # Errors
    ///
    /// - [`DocqaError::NotFound`] if nothing exists at `path`
    /// - [`DocqaError::Storage`] if the file is unreadable, corrupt or was
    ///   written in another format version
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                DocqaError::NotFound(format!("no index at {}", path.display()))
            }
            _ => DocqaError::Storage(format!("failed to read {}: {e}", path.display())),
        })?;

        let index: VectorIndex = serde_json::from_slice(&bytes).map_err(|e| {
            DocqaError::Storage(format!("corrupt index at {}: {e}", path.display()))
        })?;
        if index.format_version != FORMAT_VERSION {
            return Err(DocqaError::Storage(format!(
                "index at {} has format version {}, expected {FORMAT_VERSION}",
                path.display(),
                index.format_version
            )));
        }
        if index.entries.iter().any(|e| e.vector.len() != index.dimensions) {
            return Err(DocqaError::Storage(format!(
                "corrupt index at {}: inconsistent dimensions",
                path.display()
            )));
        }

        debug!(path = %path.display(), entries = index.len(), "loaded index");
        Ok(index)
    }
}
