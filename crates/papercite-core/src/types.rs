//! Domain types shared by the chunker, the retriever and the answer pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub type ChunkId = String;

/// Label used for chunks that precede the first detected heading.
pub const UNKNOWN_SECTION: &str = "Unknown";

/// One page of extracted text, as produced by the extraction step.
///
/// - `source_path`: path of the originating document
/// - `page_number`: 1-indexed page position
/// - `text`: extracted page text
/// - `heading_candidates`: lines that look like headings, in page order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub source_path: String,
    pub page_number: u32,
    pub text: String,
    pub heading_candidates: Vec<String>,
}

/// A token-bounded slice of a page, addressable by `chunk_id`.
///
/// `chunk_index` runs across the whole document and is never reset per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub text: String,
    pub source_file: String,
    pub source_path: String,
    pub page_number: u32,
    pub section_name: String,
    pub chunk_index: usize,
}

/// Final path component of `source_path`, falling back to the whole string.
pub fn source_file_name(source_path: &str) -> String {
    Path::new(source_path)
        .file_name()
        .map_or_else(|| source_path.to_string(), |n| n.to_string_lossy().to_string())
}

/// A chunk returned for a single query together with its similarity proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub chunk_id: ChunkId,
    pub text: String,
    pub source_file: String,
    pub page_number: u32,
    pub section_name: String,
    pub similarity: f32,
}

impl RetrievedItem {
    pub fn from_chunk(chunk: Chunk, similarity: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            text: chunk.text,
            source_file: chunk.source_file,
            page_number: chunk.page_number,
            section_name: chunk.section_name,
            similarity,
        }
    }
}

/// Answer strategy selected from question intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Qa,
    Compare,
    MethodCard,
    ClaimVerify,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Qa => "qa",
            Mode::Compare => "compare",
            Mode::MethodCard => "method_card",
            Mode::ClaimVerify => "claim_verify",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub mode: Mode,
}

/// A `[chunk_id p.N]` marker found in generated text.
///
/// The id may not belong to any retrieved chunk; resolution happens later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationMarker {
    pub chunk_id: ChunkId,
    pub page_number: u32,
}

/// A retrieved chunk that the answer cites, with its exact original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedChunk {
    pub chunk_id: ChunkId,
    pub source_file: String,
    pub page_number: u32,
    pub section_name: String,
    pub text: String,
}

impl From<&RetrievedItem> for CitedChunk {
    fn from(item: &RetrievedItem) -> Self {
        Self {
            chunk_id: item.chunk_id.clone(),
            source_file: item.source_file.clone(),
            page_number: item.page_number,
            section_name: item.section_name.clone(),
            text: item.text.clone(),
        }
    }
}

/// Structured result of answering one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub mode: Mode,
    pub answer_text: String,
    pub abstained: bool,
    pub retrieved: Vec<RetrievedItem>,
    pub cited_chunks: Vec<CitedChunk>,
}

impl AnswerResult {
    /// True when abstention and citations agree: an abstained result cites
    /// nothing, and an answered result cites at least one retrieved chunk and
    /// only retrieved chunks.
    pub fn upholds_grounding(&self) -> bool {
        if self.abstained {
            return self.cited_chunks.is_empty();
        }
        !self.cited_chunks.is_empty()
            && self
                .cited_chunks
                .iter()
                .all(|c| self.retrieved.iter().any(|r| r.chunk_id == c.chunk_id))
    }
}
