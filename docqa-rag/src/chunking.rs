//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] splits into fixed character windows with overlap
//! - [`RecursiveChunker`] prefers paragraph, line, sentence and word boundaries
//!
//! Sizes are counted in Unicode scalar values, so a chunk never ends inside a
//! multi-byte character. Both chunkers are lossless: [`reassemble`] turns
//! their output back into the original text.

use docqa_core::{DocqaError, Result};

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Lazily split a document.
    ///
    /// Every call starts again from the beginning of the text, and an empty
    /// document yields nothing.
    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a>;

    /// Split a document into a `Vec`.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.chunks(document).collect()
    }
}

/// Concatenate chunks of one document after dropping their overlap.
pub fn reassemble<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    chunks.into_iter().map(Chunk::fresh_text).collect()
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(DocqaError::Configuration("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(DocqaError::Configuration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn make_chunk(document: &Document, index: usize, text: &str, start: usize, overlap: usize) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), index.to_string());
    Chunk {
        id: format!("{}_{index}", document.id),
        document_id: document.id.clone(),
        index,
        text: text.to_string(),
        start,
        overlap,
        metadata,
    }
}

/// Byte length of the first `chars` characters of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(4, 1).unwrap();
/// let texts: Vec<String> =
///     chunker.chunks(&Document::new("d", "abcdefghij")).map(|c| c.text).collect();
/// assert_eq!(texts, ["abcd", "defg", "ghij"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

struct FixedWindows<'a> {
    document: &'a Document,
    size: usize,
    step: usize,
    overlap: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
    done: bool,
}

impl Iterator for FixedWindows<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let text = &self.document.text;
        if self.done || self.byte_pos >= text.len() {
            return None;
        }

        let rest = &text[self.byte_pos..];
        let end = byte_offset(rest, self.size);
        let overlap = if self.index == 0 { 0 } else { self.overlap };
        let chunk = make_chunk(self.document, self.index, &rest[..end], self.char_pos, overlap);

        // A window that reaches the end is the last one; another step would
        // only repeat its tail.
        if end == rest.len() {
            self.done = true;
        } else {
            self.byte_pos += byte_offset(rest, self.step);
            self.char_pos += self.step;
        }
        self.index += 1;
        Some(chunk)
    }
}

impl Chunker for FixedSizeChunker {
    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        Box::new(FixedWindows {
            document,
            size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            overlap: self.chunk_overlap,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
            done: false,
        })
    }
}

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits text at the coarsest natural boundary that keeps pieces small.
///
/// The text is cut at paragraph breaks; any piece still longer than
/// `chunk_size` is cut at line breaks, then sentence ends, then spaces, and
/// finally at plain character positions. Separators stay attached to the
/// piece they end. Pieces are then merged greedily up to `chunk_size`, and
/// each new chunk starts with as many trailing pieces of the previous one as
/// fit in `chunk_overlap` characters.
///
/// Piece boundaries are found when iteration starts; chunk text is built on
/// demand.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, Document, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(10, 4).unwrap();
/// let texts: Vec<String> = chunker
///     .chunks(&Document::new("d", "one two three four five"))
///     .map(|c| c.text)
///     .collect();
/// assert_eq!(texts, ["one two ", "two three ", "four five"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Collect byte ranges of pieces no longer than `size` characters.
fn split_pieces(
    text: &str,
    offset: usize,
    separators: &[&str],
    size: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if text.is_empty() {
        return;
    }
    if text.chars().count() <= size {
        out.push((offset, offset + text.len()));
        return;
    }

    match separators.split_first() {
        Some((separator, rest)) => {
            let mut pos = 0;
            for segment in split_keeping_separator(text, separator) {
                split_pieces(segment, offset + pos, rest, size, out);
                pos += segment.len();
            }
        }
        None => {
            let mut pos = 0;
            while pos < text.len() {
                let end = pos + byte_offset(&text[pos..], size);
                out.push((offset + pos, offset + end));
                pos = end;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
    char_start: usize,
}

struct MergedPieces<'a> {
    document: &'a Document,
    pieces: Vec<Piece>,
    size: usize,
    overlap: usize,
    carry: usize,
    next: usize,
    index: usize,
}

impl Iterator for MergedPieces<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next >= self.pieces.len() {
            return None;
        }

        // pieces[carry..next] were emitted last time and may be repeated.
        let incoming = self.pieces[self.next].chars;
        let mut first = self.carry;
        let mut carried: usize = self.pieces[first..self.next].iter().map(|p| p.chars).sum();
        while first < self.next && carried + incoming > self.size {
            carried -= self.pieces[first].chars;
            first += 1;
        }

        let mut len = carried;
        let mut end = self.next;
        while end < self.pieces.len() && len + self.pieces[end].chars <= self.size {
            len += self.pieces[end].chars;
            end += 1;
        }

        let head = self.pieces[first];
        let tail = self.pieces[end - 1];
        let chunk = make_chunk(
            self.document,
            self.index,
            &self.document.text[head.start..tail.end],
            head.char_start,
            carried,
        );

        let mut carry = end;
        let mut kept = 0;
        while carry > first && kept + self.pieces[carry - 1].chars <= self.overlap {
            carry -= 1;
            kept += self.pieces[carry].chars;
        }

        self.carry = carry;
        self.next = end;
        self.index += 1;
        Some(chunk)
    }
}

impl Chunker for RecursiveChunker {
    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        let mut spans = Vec::new();
        split_pieces(&document.text, 0, &SEPARATORS, self.chunk_size, &mut spans);

        let mut char_start = 0;
        let pieces = spans
            .into_iter()
            .map(|(start, end)| {
                let chars = document.text[start..end].chars().count();
                let piece = Piece { start, end, chars, char_start };
                char_start += chars;
                piece
            })
            .collect();

        Box::new(MergedPieces {
            document,
            pieces,
            size: self.chunk_size,
            overlap: self.chunk_overlap,
            carry: 0,
            next: 0,
            index: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use docqa_core::ErrorKind;

    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn fixed_windows_step_by_size_minus_overlap() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&Document::new("doc", "abcdefghijk"));
        assert_eq!(texts(&chunks), ["abcd", "defg", "ghij", "jk"]);
        assert_eq!(chunks.iter().map(|c| c.start).collect::<Vec<_>>(), [0, 3, 6, 9]);
        assert_eq!(chunks.iter().map(|c| c.overlap).collect::<Vec<_>>(), [0, 1, 1, 1]);
        assert_eq!(chunks[2].id, "doc_2");
        assert_eq!(chunks[2].metadata.get("chunk_index").map(String::as_str), Some("2"));
    }

    #[test]
    fn fixed_windows_count_characters_not_bytes() {
        let chunker = FixedSizeChunker::new(3, 0).unwrap();
        let chunks = chunker.chunk(&Document::new("doc", "héllo wörld"));
        assert_eq!(texts(&chunks), ["hél", "lo ", "wör", "ld"]);
    }

    #[test]
    fn last_full_window_ends_the_sequence() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&Document::new("doc", "abcdefghij"));
        assert_eq!(texts(&chunks), ["abcd", "defg", "ghij"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let doc = Document::new("doc", "");
        assert!(FixedSizeChunker::new(10, 2).unwrap().chunk(&doc).is_empty());
        assert!(RecursiveChunker::new(10, 2).unwrap().chunk(&doc).is_empty());
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        for (size, overlap) in [(10, 10), (10, 11), (0, 0)] {
            let err = FixedSizeChunker::new(size, overlap).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            let err = RecursiveChunker::new(size, overlap).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn recursive_prefers_paragraphs() {
        let chunker = RecursiveChunker::new(8, 0).unwrap();
        let chunks = chunker.chunk(&Document::new("doc", "aaaa\n\nbbbb\n\ncccc"));
        assert_eq!(texts(&chunks), ["aaaa\n\n", "bbbb\n\n", "cccc"]);
    }

    #[test]
    fn recursive_carries_whole_words_as_overlap() {
        let chunker = RecursiveChunker::new(10, 4).unwrap();
        let doc = Document::new("doc", "one two three four five");
        let chunks = chunker.chunk(&doc);
        assert_eq!(texts(&chunks), ["one two ", "two three ", "four five"]);
        assert_eq!(chunks.iter().map(|c| c.overlap).collect::<Vec<_>>(), [0, 4, 0]);
        assert_eq!(chunks.iter().map(|c| c.start).collect::<Vec<_>>(), [0, 4, 14]);
        assert_eq!(reassemble(&chunks), doc.text);
    }

    #[test]
    fn recursive_hard_splits_long_words() {
        let chunker = RecursiveChunker::new(3, 0).unwrap();
        let chunks = chunker.chunk(&Document::new("doc", "abcdefg"));
        assert_eq!(texts(&chunks), ["abc", "def", "g"]);
    }

    #[test]
    fn chunks_restart_from_the_beginning() {
        let chunker = RecursiveChunker::new(5, 1).unwrap();
        let doc = Document::new("doc", "alpha beta gamma delta");
        let first: Vec<Chunk> = chunker.chunks(&doc).collect();
        let second: Vec<Chunk> = chunker.chunks(&doc).collect();
        assert_eq!(first, second);
    }
}
