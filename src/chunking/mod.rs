//! Text chunking for breaking transcripts into retrievable passages.

mod recursive;

pub use recursive::{RecursiveChunker, DEFAULT_SEPARATORS};

/// Character count of a string, the unit all chunk sizes are measured in.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
