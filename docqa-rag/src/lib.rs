//! # docqa-rag
//!
//! Retrieval-augmented question answering over local documents.
//!
//! ## Overview
//!
//! - [`loader`]: PDF, text and Markdown files into [`Document`]s
//! - [`chunking`]: [`FixedSizeChunker`] and [`RecursiveChunker`]
//! - [`index`]: [`VectorIndex`], an exact index persisted as one JSON file
//! - [`retriever`] and [`synthesizer`]: question → context → [`Answer`]
//! - [`pipeline`]: [`RagPipeline`] tying the above to a
//!   [`ModelProvider`](docqa_core::ModelProvider)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{RagConfig, RagPipeline, load_documents};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(2_000).chunk_overlap(200).build()?)
//!     .provider(provider)
//!     .build()?;
//!
//! let report = pipeline.ingest(&load_documents(&["manual.pdf".into()]).await?).await?;
//! let answer = pipeline.ask("How do I reset the device?").await?;
//! if answer.not_in_context {
//!     println!("The documents do not say.");
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, reassemble};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use index::{FORMAT_VERSION, Metric, VectorIndex};
pub use loader::{load_bytes, load_document, load_documents};
pub use pipeline::{DEFAULT_INDEX_PATH, IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use synthesizer::{Answer, DEFAULT_TEMPLATE, NOT_IN_CONTEXT, Synthesizer, is_not_in_context};
