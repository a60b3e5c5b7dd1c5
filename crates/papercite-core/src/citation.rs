//! In-text citation markers: `[<12 hex chars> p.<page>]`.
//!
//! The grammar is a stable contract with downstream tooling that parses
//! logged answers, so `format` always emits the canonical single-space form.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{ChunkId, CitationMarker};

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(?P<chunk_id>[0-9a-f]{12}) +p\.(?P<page>[0-9]+)\]").expect("citation pattern compiles")
    })
}

pub fn format_citation(chunk_id: &str, page_number: u32) -> String {
    format!("[{chunk_id} p.{page_number}]")
}

/// Every well-formed marker in `text`, left to right, duplicates included.
///
/// Near-misses (wrong id length, uppercase hex, missing page, a page number
/// that does not fit in `u32`) are skipped rather than reported.
pub fn parse_citations(text: &str) -> Vec<CitationMarker> {
    marker_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let page_number = caps["page"].parse::<u32>().ok()?;
            Some(CitationMarker { chunk_id: caps["chunk_id"].to_string(), page_number })
        })
        .collect()
}

/// Distinct chunk ids in order of first appearance.
pub fn unique_ids(markers: &[CitationMarker]) -> Vec<ChunkId> {
    let mut seen = HashSet::new();
    markers
        .iter()
        .filter(|m| seen.insert(m.chunk_id.as_str()))
        .map(|m| m.chunk_id.clone())
        .collect()
}
