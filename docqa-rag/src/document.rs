//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document, usually the file name.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A contiguous piece of a [`Document`]'s text.
///
/// `start` and `overlap` are measured in characters. The first `overlap`
/// characters of `text` repeat the tail of the previous chunk of the same
/// document, so dropping them and concatenating recovers the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `{document_id}_{index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset of `text` within the document.
    pub start: usize,
    /// Characters shared with the previous chunk.
    pub overlap: usize,
    /// Metadata inherited from the parent document plus `chunk_index`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// The part of the text not already covered by the previous chunk.
    pub fn fresh_text(&self) -> &str {
        let skip = self.text.char_indices().nth(self.overlap).map_or(self.text.len(), |(i, _)| i);
        &self.text[skip..]
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
