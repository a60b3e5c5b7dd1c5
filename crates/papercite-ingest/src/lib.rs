//! Page loading and deterministic chunking.

pub mod chunker;
pub mod pages;
pub mod tokenize;

pub use chunker::{chunk_id, chunk_pages, Chunker, SectionTracker};
pub use pages::{detect_headings, discover_documents, is_heading_candidate, load_pages, pages_from_text};
pub use tokenize::{codec_from_name, Cl100kCodec, HfTokenizerCodec, TokenCodec};
