//! Recursive character chunking of page text.
//!
//! Each page is split on the coarsest separator that occurs in it (paragraph break, line
//! break, sentence end, space, and finally individual characters). Pieces that still exceed the
//! budget are split again with the finer separators; the remaining pieces are greedily merged
//! back into windows of at most `chunk_size` characters, carrying up to `chunk_overlap`
//! characters of trailing context into the next window.
//!
//! Lengths are measured in Unicode scalar values, so multibyte text is never cut mid-character.

use crate::extraction::PageText;

use super::types::{Chunk, ChunkingError};

/// Separators tried in order, from coarsest to finest. The empty separator splits into
/// characters and guarantees termination.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Splits page text into overlapping windows of bounded length.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Build a chunker, rejecting budgets that cannot produce sensible windows.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters carried over between adjacent chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk every page, numbering chunks with one counter across the whole document.
    ///
    /// No chunk spans two pages. An empty page list yields an empty chunk list.
    pub fn chunk_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                let chunk_index = chunks.len();
                chunks.push(Chunk {
                    page_number: page.page_number,
                    chunk_index,
                    text,
                });
            }
        }
        chunks
    }

    /// Split a single text into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut output = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                output.extend(self.merge_pieces(std::mem::take(&mut fitting)));
            }
            if finer.is_empty() {
                output.push(piece);
            } else {
                output.extend(self.split_recursive(&piece, finer));
            }
        }

        if !fitting.is_empty() {
            output.extend(self.merge_pieces(fitting));
        }
        output
    }

    /// Greedily pack pieces into windows, keeping a tail of at most `chunk_overlap` characters.
    fn merge_pieces(&self, pieces: Vec<String>) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(&piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        total,
                        chunk_size = self.chunk_size,
                        "Created a chunk longer than the configured size"
                    );
                }
                push_window(&mut windows, &current);

                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size)
                {
                    let (_, dropped) = current.remove(0);
                    total -= dropped;
                }
            }
            total += len;
            current.push((piece, len));
        }

        push_window(&mut windows, &current);
        windows
    }
}

/// Pick the first separator present in `text`; the empty separator always matches.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (idx, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator.as_str(), &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[idx + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator` without losing text.
///
/// Leading punctuation of the separator (the `.` of `". "`) closes the preceding piece; the
/// whitespace that follows opens the next one.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let whitespace_tail = separator.trim_start_matches(|c: char| !c.is_whitespace());
    let closing = separator.len() - whitespace_tail.len();

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        let cut = index + closing;
        pieces.push(text[start..cut].to_string());
        start = cut;
    }
    pieces.push(text[start..].to_string());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn push_window(windows: &mut Vec<String>, current: &[(String, usize)]) {
    let joined: String = current.iter().map(|(piece, _)| piece.as_str()).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
