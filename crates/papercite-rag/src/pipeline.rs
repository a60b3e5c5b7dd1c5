//! Question answering with enforced grounding.
//!
//! route -> retrieve -> (abstain | generate) -> (grounded | abstain). An
//! answer is returned verbatim only when it cites at least one retrieved
//! chunk; everything else collapses to the fixed abstention sentence.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use papercite_core::citation::{parse_citations, unique_ids};
use papercite_core::config::PromptConfig;
use papercite_core::router::route;
use papercite_core::traits::LanguageModel;
use papercite_core::types::{AnswerResult, CitedChunk, Mode, RetrievedItem};

use crate::prompts::{build_context, PromptPack};
use crate::retrieval::Retriever;

pub const ABSTENTION_SENTENCE: &str = "I cannot find evidence in the provided papers to answer that.";

/// How a question was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Retrieval found nothing above the similarity floor; no generation call.
    AbstainedNoEvidence,
    Grounded,
    /// The model answered without citing retrieved evidence, or abstained itself.
    AbstainedUngrounded,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::AbstainedNoEvidence => "abstained_no_evidence",
            Outcome::Grounded => "grounded",
            Outcome::AbstainedUngrounded => "abstained_ungrounded",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn abstained(mode: Mode, retrieved: Vec<RetrievedItem>) -> AnswerResult {
    AnswerResult {
        mode,
        answer_text: ABSTENTION_SENTENCE.to_string(),
        abstained: true,
        retrieved,
        cited_chunks: Vec::new(),
    }
}

/// Resolve the citations in `response` against `retrieved` and decide.
///
/// Unknown ids are dropped. Resolved chunks keep first-citation order. A
/// response that is the abstention sentence (modulo surrounding whitespace)
/// is an abstention regardless of anything else.
pub fn ground(mode: Mode, response: &str, retrieved: Vec<RetrievedItem>) -> (AnswerResult, Outcome) {
    if response.trim() == ABSTENTION_SENTENCE {
        return (abstained(mode, retrieved), Outcome::AbstainedUngrounded);
    }
    let by_id: HashMap<&str, &RetrievedItem> = retrieved.iter().map(|r| (r.chunk_id.as_str(), r)).rev().collect();
    let cited_chunks: Vec<CitedChunk> = unique_ids(&parse_citations(response))
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|r| CitedChunk::from(*r)))
        .collect();
    if cited_chunks.is_empty() {
        return (abstained(mode, retrieved), Outcome::AbstainedUngrounded);
    }
    let result = AnswerResult { mode, answer_text: response.to_string(), abstained: false, retrieved, cited_chunks };
    (result, Outcome::Grounded)
}

pub struct AnswerPipeline {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    prompts: PromptPack,
    max_context_chunks: usize,
}

impl AnswerPipeline {
    pub fn new(retriever: Retriever, llm: Arc<dyn LanguageModel>, config: &PromptConfig) -> Self {
        Self { retriever, llm, prompts: PromptPack::default(), max_context_chunks: config.max_context_chunks }
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptPack) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn answer(&self, question: &str) -> Result<AnswerResult> {
        Ok(self.answer_with_outcome(question)?.0)
    }

    /// Collaborator errors propagate unchanged; nothing is retried.
    pub fn answer_with_outcome(&self, question: &str) -> Result<(AnswerResult, Outcome)> {
        let mode = route(question).mode;
        let retrieved = self.retriever.retrieve(question)?;

        let (result, outcome) = if self.retriever.should_abstain(&retrieved) {
            (abstained(mode, retrieved), Outcome::AbstainedNoEvidence)
        } else {
            let context = build_context(&retrieved, self.max_context_chunks);
            let prompt = self.prompts.render(mode, &context, question);
            let response = self.llm.complete(&prompt)?;
            ground(mode, &response, retrieved)
        };

        tracing::info!(
            mode = %mode,
            outcome = %outcome,
            retrieved = result.retrieved.len(),
            cited = result.cited_chunks.len(),
            "answered question"
        );
        Ok((result, outcome))
    }
}
