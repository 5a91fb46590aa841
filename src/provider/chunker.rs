//! Text cleaning and chunking for paper summaries.
//!
//! Summaries are split with a recursive character splitter: the text is cut on
//! the coarsest separator present (blank line, then newline, then space, then
//! individual characters), pieces are merged greedily up to `chunk_size`
//! characters, and consecutive chunks share up to `chunk_overlap` characters of
//! trailing context.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use super::{ProviderError, ProviderResult};

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// Header lines of extracted PDF text; each rule matches whole lines only
static PREAMBLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:(?:authors?|affiliations?|keywords?)[ \t]*:.*|abstract[ \t]*[:.]?[ \t]*)$\n?")
        .expect("preamble regex is valid")
});
static REFERENCES_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^[ \t]*(?:references|bibliography)[ \t]*:?[ \t]*$.*")
        .expect("references regex is valid")
});
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex is valid"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex is valid")
});
static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("citation regex is valid"));
static INTRODUCTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:\d+\.?|[IVX]+\.)?[ \t]*introduction[ \t]*$\n?")
        .expect("introduction regex is valid")
});

/// Strip boilerplate that hurts retrieval from text extracted out of a paper.
///
/// Removes `Authors:`/`Affiliations:`/`Keywords:` lines and a bare `Abstract`
/// heading, everything from a `References` heading on, URLs, e-mail
/// addresses, `[n]` citation markers and an `Introduction` heading, then
/// trims. Only whole heading lines are dropped, so prose that merely uses
/// these words is kept.
pub fn clean_text(text: &str) -> String {
    let text = REFERENCES_SECTION.replace(text, "");
    let text = PREAMBLE_LINE.replace_all(&text, "");
    let text = URL.replace_all(&text, "");
    let text = EMAIL.replace_all(&text, "");
    let text = CITATION_MARKER.replace_all(&text, "");
    let text = INTRODUCTION_HEADING.replace_all(&text, "");
    text.trim().to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Recursive character text splitter.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextChunker {
    /// Create a chunker with the given size and overlap (in characters).
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` if `chunk_size` is zero or the
    /// overlap is not smaller than the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> ProviderResult<Self> {
        if chunk_size == 0 {
            return Err(ProviderError::ConfigError("chunk size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ProviderError::ConfigError(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()));
        let (separator, remaining): (&str, &[String]) = match position {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &[]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily join pieces into chunks, carrying up to `chunk_overlap`
    /// characters of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        // characters in `window` joined by `separator`
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                while total > self.chunk_overlap
                    || (total > 0 && total + len + separator_len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let joiner = if window.is_empty() { 0 } else { separator_len };
                    total -= char_len(front) + joiner;
                }
            }

            let joiner = if window.is_empty() { 0 } else { separator_len };
            window.push_back(piece);
            total += len + joiner;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
