//! Keyword router from question text to answer mode.
//!
//! Rules are checked in priority order and the first match wins. Verification
//! sits above comparison so that "verify the comparison between A and B" is
//! treated as a claim check.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{Mode, Route};

struct Rule {
    mode: Mode,
    pattern: Regex,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                Mode::ClaimVerify,
                r"(?i)\b(verify|is it true|does the paper claim|evidence for|support the claim|refute)\b",
            ),
            (Mode::Compare, r"(?i)\b(compare|vs\.?|versus|difference|differences|similarities)\b"),
            (
                Mode::MethodCard,
                r"(?i)\b(method card|summarize method|architecture|pipeline|training objective)\b",
            ),
        ]
        .into_iter()
        .map(|(mode, src)| Rule { mode, pattern: Regex::new(src).expect("router pattern compiles") })
        .collect()
    })
}

pub fn route(question: &str) -> Route {
    let q = question.trim();
    let mode = rules()
        .iter()
        .find(|rule| rule.pattern.is_match(q))
        .map_or(Mode::Qa, |rule| rule.mode);
    Route { mode }
}
