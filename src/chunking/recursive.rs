//! Recursive character splitting.
//!
//! Splits on the coarsest separator present in the text (paragraphs, then
//! lines, sentences, words and finally single characters), recursing into any
//! piece that is still too long, and merges small pieces back together up to
//! the chunk size with a trailing window carried over as overlap.

use super::char_len;
use crate::error::{Result, VidqaError};
use crate::vector_store::Document;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Separators in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// Splits text into overlapping chunks of bounded character length.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a chunker. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(VidqaError::Config("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(VidqaError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator hierarchy.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunk strings, in source order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split text into documents carrying `chunk_index`, `start_index` and,
    /// when given, `source` metadata.
    pub fn split(&self, text: &str, source: Option<&str>) -> Vec<Document> {
        let chunks = self.split_text(text);
        let mut documents = Vec::with_capacity(chunks.len());
        // Byte offset and byte length of the previous chunk.
        let mut previous: Option<(usize, usize)> = None;

        for (index, content) in chunks.into_iter().enumerate() {
            let mut metadata = Map::new();
            if let Some(source) = source {
                metadata.insert("source".to_string(), Value::from(source));
            }
            metadata.insert("chunk_index".to_string(), Value::from(index));

            // The next chunk can start no earlier than the previous one and no
            // earlier than its trailing overlap window.
            let search_from = match previous {
                Some((start, len)) => chars_before(text, start + len, self.chunk_overlap).max(start),
                None => 0,
            };
            let byte_start = match text[search_from..].find(content.as_str()) {
                Some(offset) => search_from + offset,
                None => {
                    warn!("Chunk {} not found after byte {}, searching from the start", index, search_from);
                    text.find(content.as_str()).unwrap_or(search_from)
                }
            };
            metadata.insert(
                "start_index".to_string(),
                Value::from(char_len(&text[..byte_start])),
            );
            previous = Some((byte_start, content.len()));

            documents.push(Document::new(content, metadata));
        }

        debug!("Split {} characters into {} chunks", char_len(text), documents.len());
        documents
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }

        final_chunks
    }

    /// Greedily merge consecutive pieces into chunks no longer than `chunk_size`.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !window.is_empty() {
                    push_joined(&mut docs, &window);

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_joined(&mut docs, &window);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Byte offset `n` characters before byte `end`, clamped to the start of the text.
fn chars_before(text: &str, end: usize, n: usize) -> usize {
    if n == 0 {
        return end;
    }
    text[..end]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}

/// Split on `separator`, keeping it at the end of each preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator)
            .filter(|piece| !piece.is_empty())
            .collect()
    }
}
