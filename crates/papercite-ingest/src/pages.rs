//! Pre-extracted page text: normalization, heading candidates and loading.
//!
//! Text extraction from PDF happens upstream. This module reads its output
//! as plain-text files with one page per form feed (`\x0c`), the layout
//! produced by `pdftotext`.

use anyhow::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use papercite_core::config::HeadingRules;
use papercite_core::types::Page;

const PAGE_BREAK: char = '\x0c';
const HEADING_PUNCTUATION: &[char] = &['[', ']', '(', ')', '{', '}', ';'];

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+(\.\d+)*)\s+(.+)$").expect("numbered heading pattern compiles"))
}

fn all_caps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9 \-,:]{6,}$").expect("all-caps heading pattern compiles"))
}

/// `\r\n` and lone `\r` become `\n`; surrounding whitespace is stripped.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Drop a leading outline number: `"2.1 Related Work"` -> `"Related Work"`.
pub fn strip_outline_number(heading: &str) -> String {
    let trimmed = heading.trim();
    match numbered_re().captures(trimmed) {
        Some(caps) => caps[3].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Numbered, all-caps, or mostly capitalized short lines without bracket
/// punctuation are heading candidates.
pub fn is_heading_candidate(line: &str, rules: &HeadingRules) -> bool {
    let s = line.trim();
    let len = s.chars().count();
    if len < rules.min_len || len > rules.max_len {
        return false;
    }
    if rules.require_no_period && s.ends_with('.') {
        return false;
    }
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() > rules.max_words {
        return false;
    }
    if numbered_re().is_match(s) || all_caps_re().is_match(s) {
        return true;
    }
    let upper_starts = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count();
    let ratio = upper_starts as f32 / words.len().max(1) as f32;
    ratio >= 0.6 && !s.contains(HEADING_PUNCTUATION)
}

pub fn detect_headings(text: &str, rules: &HeadingRules) -> Vec<String> {
    text.split('\n')
        .filter(|line| is_heading_candidate(line, rules))
        .map(|line| line.trim().to_string())
        .collect()
}

/// Split one document's text into pages on form feeds.
///
/// A single empty segment after a trailing form feed is not a page. Other
/// empty pages are kept so page numbering matches the source.
pub fn pages_from_text(source_path: &str, text: &str, rules: &HeadingRules) -> Vec<Page> {
    let mut raw: Vec<&str> = text.split(PAGE_BREAK).collect();
    if raw.len() > 1 && raw.last().is_some_and(|p| p.trim().is_empty()) {
        raw.pop();
    }
    raw.into_iter()
        .zip(1u32..)
        .map(|(page_text, page_number)| {
            let text = normalize_text(page_text);
            let heading_candidates = detect_headings(&text, rules);
            Page { source_path: source_path.to_string(), page_number, text, heading_candidates }
        })
        .collect()
}

pub fn load_pages(path: &Path, rules: &HeadingRules) -> Result<Vec<Page>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => String::from_utf8_lossy(&fs::read(path)?).to_string(),
    };
    Ok(pages_from_text(&path.to_string_lossy(), &content, rules))
}

/// All `.txt` files under `root`, sorted for a deterministic indexing order.
pub fn discover_documents(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_numbers_are_stripped() {
        assert_eq!(strip_outline_number("2.1 Related Work"), "Related Work");
        assert_eq!(strip_outline_number("  3 Methods "), "Methods");
        assert_eq!(strip_outline_number("Abstract"), "Abstract");
    }

    #[test]
    fn crlf_is_normalized() {
        assert_eq!(normalize_text("  a\r\nb\rc \n"), "a\nb\nc");
    }
}
