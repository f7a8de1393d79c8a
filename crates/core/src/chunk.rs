//! Token-bounded, overlapping text windows

use crate::{CoreError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Word runs, digit runs, and single punctuation marks each count as a token
const TOKEN_PATTERN: &str = r"\w+|[^\w\s]";

/// One window of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the window within its document
    pub index: usize,
    /// Original text spanned by the window's tokens
    pub content: String,
    pub token_count: usize,
}

/// Splits text into windows of `chunk_size` tokens where each window after
/// the first repeats the last `chunk_overlap` tokens of its predecessor.
#[derive(Debug, Clone)]
pub struct TokenSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    token: Regex,
}

impl TokenSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoreError::InvalidChunking("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(CoreError::InvalidChunking(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        let token = Regex::new(TOKEN_PATTERN)
            .map_err(|e| CoreError::InvalidChunking(format!("token pattern: {}", e)))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            token,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Number of tokens in `text`
    pub fn count_tokens(&self, text: &str) -> usize {
        self.token.find_iter(text).count()
    }

    /// Split `text` into ordered windows. Text without tokens yields none.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let spans: Vec<(usize, usize)> = self
            .token
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < spans.len() {
            let end = (start + self.chunk_size).min(spans.len());
            chunks.push(Chunk {
                index: chunks.len(),
                content: text[spans[start].0..spans[end - 1].1].to_string(),
                token_count: end - start,
            });
            if end == spans.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_splitter() -> TokenSplitter {
        TokenSplitter::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP).unwrap()
    }

    #[test]
    fn test_windows_overlap() {
        let splitter = TokenSplitter::new(4, 2).unwrap();
        let chunks = splitter.split("a b c d e f g");

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a b c d", "c d e f", "e f g"]);
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[2].token_count, 3);
    }

    #[test]
    fn test_window_repeats_predecessor_tail() {
        let splitter = TokenSplitter::new(10, 3).unwrap();
        let text = (0..57).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = splitter.split(&text);

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].content.split(' ').collect();
            let next: Vec<&str> = pair[1].content.split(' ').collect();
            assert_eq!(&prev[prev.len() - 3..], &next[..3]);
        }
        assert!(chunks.last().unwrap().content.ends_with("w56"));
    }

    #[test]
    fn test_punctuation_counts_as_tokens() {
        let splitter = default_splitter();
        assert_eq!(splitter.count_tokens("Hello, world!"), 4);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = default_splitter();
        let chunks = splitter.split("  John Doe works at Acme.  ");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "John Doe works at Acme.");
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(default_splitter().split(" \n\t ").is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(TokenSplitter::new(0, 0).is_err());
        assert!(TokenSplitter::new(10, 10).is_err());
        assert!(TokenSplitter::new(10, 9).is_ok());
    }
}
