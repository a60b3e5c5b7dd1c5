//! Token-window chunking of extracted pages.
//!
//! Chunks are produced page by page with an overlapping sliding window over
//! the page's tokens. Every chunk carries the section it falls under and a
//! `chunk_id` that is a pure function of its position and text, so
//! re-indexing the same document reproduces the same ids.

use anyhow::Result;
use std::sync::Arc;

use papercite_core::config::ChunkingConfig;
use papercite_core::types::{source_file_name, Chunk, Page, UNKNOWN_SECTION};

use crate::pages::{normalize_text, strip_outline_number};
use crate::tokenize::TokenCodec;

const CHUNK_ID_HEX_LEN: usize = 12;
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// Digest of the chunk's identity fields, truncated to 12 lowercase hex chars.
pub fn chunk_id(source_path: &str, page_number: u32, section_name: &str, chunk_index: usize, text: &str) -> String {
    let page = page_number.to_string();
    let index = chunk_index.to_string();
    let mut hasher = blake3::Hasher::new();
    for field in [source_path, page.as_str(), section_name, index.as_str(), text] {
        hasher.update(field.as_bytes());
        hasher.update(FIELD_SEPARATOR);
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..CHUNK_ID_HEX_LEN].to_string()
}

/// Section label carried from page to page.
///
/// A page with headings switches to its first one (top of page wins); a page
/// without headings inherits the previous label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTracker {
    current: String,
}

impl Default for SectionTracker {
    fn default() -> Self {
        Self { current: UNKNOWN_SECTION.to_string() }
    }
}

impl SectionTracker {
    #[must_use]
    pub fn advance(self, heading_candidates: &[String]) -> Self {
        match heading_candidates.first() {
            Some(first) => Self { current: first.clone() },
            None => self,
        }
    }

    /// Current label with any outline number removed.
    pub fn label(&self) -> String {
        strip_outline_number(&self.current)
    }
}

/// Half-open token ranges for one page of `len` tokens.
///
/// A non-final window shorter than `min_chunk_tokens` is stretched to
/// `min_chunk_tokens`, which can exceed `chunk_tokens` when the minimum is the
/// larger of the two. Requires `chunk_overlap_tokens < chunk_tokens`.
pub fn window_bounds(
    len: usize,
    chunk_tokens: usize,
    chunk_overlap_tokens: usize,
    min_chunk_tokens: usize,
) -> Vec<(usize, usize)> {
    let mut windows = Vec::new();
    let mut start = 0usize;
    while start < len {
        let mut end = (start + chunk_tokens).min(len);
        if end - start < min_chunk_tokens && end != len {
            end = (start + min_chunk_tokens).min(len);
        }
        windows.push((start, end));
        if end == len {
            break;
        }
        start = end.saturating_sub(chunk_overlap_tokens);
    }
    windows
}

pub struct Chunker {
    codec: Arc<dyn TokenCodec>,
    config: ChunkingConfig,
}

impl Chunker {
    /// Rejects configurations whose window would never advance.
    pub fn new(codec: Arc<dyn TokenCodec>, config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { codec, config })
    }

    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    /// Chunk one document's pages in order.
    ///
    /// Blank pages yield nothing; `chunk_index` keeps counting across pages.
    pub fn chunk_pages(&self, pages: &[Page]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut section = SectionTracker::default();
        for page in pages {
            section = section.advance(&page.heading_candidates);
            let section_name = section.label();
            let before = chunks.len();
            self.chunk_page(page, &section_name, &mut chunks)?;
            tracing::debug!(
                source = %page.source_path,
                page = page.page_number,
                section = %section_name,
                chunks = chunks.len() - before,
                "chunked page"
            );
        }
        Ok(chunks)
    }

    fn chunk_page(&self, page: &Page, section_name: &str, out: &mut Vec<Chunk>) -> Result<()> {
        let text = normalize_text(&page.text);
        if text.is_empty() {
            return Ok(());
        }
        let tokens = self.codec.encode(&text)?;
        let source_file = source_file_name(&page.source_path);
        let windows = window_bounds(
            tokens.len(),
            self.config.chunk_tokens,
            self.config.chunk_overlap_tokens,
            self.config.min_chunk_tokens,
        );
        for (start, end) in windows {
            let window_text = self.codec.decode(&tokens[start..end])?;
            let window_text = window_text.trim();
            if window_text.is_empty() {
                continue;
            }
            let chunk_index = out.len();
            out.push(Chunk {
                chunk_id: chunk_id(&page.source_path, page.page_number, section_name, chunk_index, window_text),
                text: window_text.to_string(),
                source_file: source_file.clone(),
                source_path: page.source_path.clone(),
                page_number: page.page_number,
                section_name: section_name.to_string(),
                chunk_index,
            });
        }
        Ok(())
    }
}

/// Functional form of [`Chunker::chunk_pages`] with explicit parameters.
pub fn chunk_pages(
    pages: &[Page],
    codec: Arc<dyn TokenCodec>,
    chunk_tokens: usize,
    chunk_overlap_tokens: usize,
    min_chunk_tokens: usize,
) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig {
        chunk_tokens,
        chunk_overlap_tokens,
        min_chunk_tokens,
        tokenizer: codec.name().to_string(),
    };
    Chunker::new(codec, config)?.chunk_pages(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_and_cover_the_sequence() {
        let w = window_bounds(500, 100, 30, 50);
        assert_eq!(w.first(), Some(&(0, 100)));
        assert_eq!(w[1], (70, 170));
        assert_eq!(w.last().map(|&(_, e)| e), Some(500));
        for pair in w.windows(2) {
            assert!(pair[1].0 < pair[0].1, "consecutive windows overlap");
            assert!(pair[1].0 > pair[0].0, "start advances");
        }
    }

    #[test]
    fn short_sequence_is_one_window() {
        assert_eq!(window_bounds(7, 100, 30, 50), vec![(0, 7)]);
        assert!(window_bounds(0, 100, 30, 50).is_empty());
    }

    #[test]
    fn window_below_minimum_is_stretched_past_chunk_size() {
        // chunk_tokens < min_chunk_tokens: internal windows grow to the minimum.
        let w = window_bounds(100, 20, 5, 30);
        assert_eq!(w[0], (0, 30));
        assert_eq!(w[1], (25, 55));
        assert_eq!(w.last().map(|&(_, e)| e), Some(100));
    }

    #[test]
    fn section_tracker_carries_and_switches() {
        let s = SectionTracker::default();
        assert_eq!(s.label(), UNKNOWN_SECTION);
        let s = s.advance(&["2 Methods".to_string(), "2.1 Data".to_string()]);
        assert_eq!(s.label(), "Methods");
        let s = s.advance(&[]);
        assert_eq!(s.label(), "Methods");
    }
}
