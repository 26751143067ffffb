//! Recursive character splitting of raw documents into bounded chunks.
//!
//! Splitting prefers natural boundaries (paragraph, then line, then word)
//! and only falls back to hard character cuts for unbroken runs longer
//! than the chunk size. Consecutive chunks from one document overlap by up
//! to `chunk_overlap` characters so context survives chunk boundaries.

use crate::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::types::Document;

/// Boundary preference order; the empty fallback is a hard character cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Bounded text segment cut from one source document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub source_id: String,
    /// Zero-based position of this chunk within its document.
    pub chunk_index: usize,
    pub text: String,
}

/// Splitter configuration. All sizes are Unicode scalar counts, never byte
/// offsets, so multi-byte text cannot be cut mid-character.
#[derive(Clone, Copy, Debug)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl RecursiveSplitter {
    /// Creates a splitter. `chunk_overlap` is clamped below `chunk_size`
    /// so a chunk can never consist purely of carried-over text.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits every document, tagging each chunk with its source id and
    /// position. Whitespace-only chunks are dropped.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            for (chunk_index, text) in self
                .split_text(&document.text)
                .into_iter()
                .filter(|piece| !piece.trim().is_empty())
                .enumerate()
            {
                chunks.push(Chunk {
                    source_id: document.source_id.clone(),
                    chunk_index,
                    text,
                });
            }
        }
        chunks
    }

    /// Splits raw text into segments of at most `chunk_size` characters.
    ///
    /// With zero overlap the segments concatenate back to the input
    /// exactly; with overlap, each segment starts with the tail carried
    /// from its predecessor. Deterministic for a given input.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let pieces = self.atomic_pieces(text, &SEPARATORS);
        self.merge_pieces(pieces)
    }

    /// Recursively cuts `text` into pieces of at most `chunk_size`
    /// characters whose concatenation equals `text`. Separators stay
    /// attached to the piece they terminate.
    fn atomic_pieces<'a>(&self, text: &'a str, separators: &[&str]) -> Vec<&'a str> {
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text];
        }
        let Some((separator, narrower)) = separators.split_first() else {
            return hard_cut(text, self.chunk_size);
        };
        let parts = split_keeping(text, separator);
        if parts.len() == 1 {
            return self.atomic_pieces(text, narrower);
        }
        let mut pieces = Vec::new();
        for part in parts {
            if char_len(part) <= self.chunk_size {
                pieces.push(part);
            } else {
                pieces.extend(self.atomic_pieces(part, narrower));
            }
        }
        pieces
    }

    /// Greedily packs pieces into chunks, carrying a bounded tail of the
    /// previous chunk forward as overlap.
    fn merge_pieces(&self, pieces: Vec<&str>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            if !current.is_empty() && current_len + piece_len > self.chunk_size {
                chunks.push(current.concat());
                let (kept, kept_len) = self.overlap_tail(&current);
                current = kept;
                current_len = kept_len;
                // A large next piece leaves no room for the overlap.
                if current_len + piece_len > self.chunk_size {
                    current.clear();
                    current_len = 0;
                }
            }
            current.push(piece);
            current_len += piece_len;
        }

        if !current.is_empty() {
            chunks.push(current.concat());
        }
        chunks
    }

    fn overlap_tail<'a>(&self, pieces: &[&'a str]) -> (Vec<&'a str>, usize) {
        let mut kept = Vec::new();
        let mut kept_len = 0usize;
        for piece in pieces.iter().rev() {
            let piece_len = char_len(piece);
            if kept_len + piece_len > self.chunk_overlap {
                break;
            }
            kept.push(*piece);
            kept_len += piece_len;
        }
        kept.reverse();
        (kept, kept_len)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits `text` at every occurrence of `separator`, keeping the separator
/// as the suffix of the piece it terminates.
fn split_keeping<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(separator) {
        let end = cursor + found + separator.len();
        parts.push(&text[start..end]);
        start = end;
        cursor = end;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

/// Last resort for unbroken runs: cut every `size` characters on char
/// boundaries.
fn hard_cut(text: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == size {
            pieces.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
