//! Prompt templates, one per answer mode, and context rendering.

use papercite_core::types::{Mode, RetrievedItem};

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";
const CHUNK_SEPARATOR: &str = "\n---\n";

const RULES: &str = r#"You are a research assistant answering questions about machine learning papers.

Follow these rules exactly:

1. Evidence: use only the context chunks below. If they do not support an answer, reply with exactly:
   "I cannot find evidence in the provided papers to answer that."
2. Citations: cite every claim as [chunk_id p.N], using the 12-character hex id and page shown in the chunk header.
   Example: [3f9a0c12b7de p.4]
3. Math: wrap all math in dollar signs, $...$ inline and $$...$$ for display, e.g. $\alpha$, $\frac{a}{b}$.

Be concise and technical.
"#;

const QA_TASK: &str = r#"
Task: answer the question using only the context.

Context chunks:
{context}

Question:
{question}

Answer with citations.
"#;

const COMPARE_TASK: &str = r#"
Task: compare the two papers or approaches the question refers to. If it does not name two, pick the two most relevant in the context and say which.

Context chunks:
{context}

Question:
{question}

Output format:
- Paper A: title if available, 1-2 sentences, citations
- Paper B: title if available, 1-2 sentences, citations
- Similarities: bullets with citations
- Differences: bullets with citations
- When to prefer A vs B: bullets with citations
"#;

const METHOD_CARD_TASK: &str = r#"
Task: extract a method card for the most relevant paper in the context.

Context chunks:
{context}

Question:
{question}

Output valid JSON only:
{
  "paper_title": "...",
  "problem": "...",
  "key_idea": "...",
  "model_or_algorithm": "...",
  "training_objective": "...",
  "data": "...",
  "evaluation_metrics": "...",
  "limitations": "...",
  "notable_hyperparams": ["..."],
  "citations": {
    "problem": ["[3f9a0c12b7de p.4]"]
  }
}
Give every field its own list under "citations", using chunk ids from the context. A field without evidence is null with an empty citation list.
"#;

const CLAIM_VERIFY_TASK: &str = r#"
Task: check the claim against the context. The verdict is one of SUPPORTED, REFUTED, NOT_ENOUGH_EVIDENCE.

Context chunks:
{context}

Claim:
{question}

Output format:
Verdict: <SUPPORTED|REFUTED|NOT_ENOUGH_EVIDENCE>
Rationale: 2-5 sentences, each followed by citations. Do not speculate when the verdict is NOT_ENOUGH_EVIDENCE.
"#;

/// Templates containing `{context}` and `{question}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    pub qa: String,
    pub compare: String,
    pub method_card: String,
    pub claim_verify: String,
}

impl Default for PromptPack {
    fn default() -> Self {
        Self {
            qa: format!("{RULES}{QA_TASK}"),
            compare: format!("{RULES}{COMPARE_TASK}"),
            method_card: format!("{RULES}{METHOD_CARD_TASK}"),
            claim_verify: format!("{RULES}{CLAIM_VERIFY_TASK}"),
        }
    }
}

impl PromptPack {
    pub fn template(&self, mode: Mode) -> &str {
        match mode {
            Mode::Qa => &self.qa,
            Mode::Compare => &self.compare,
            Mode::MethodCard => &self.method_card,
            Mode::ClaimVerify => &self.claim_verify,
        }
    }

    pub fn render(&self, mode: Mode, context: &str, question: &str) -> String {
        fill_slots(self.template(mode), context, question)
    }
}

/// Single pass over the template, so slot text inside the context or the
/// question is never expanded.
fn fill_slots(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Header-plus-text blocks for the first `max_chunks` items.
pub fn build_context(items: &[RetrievedItem], max_chunks: usize) -> String {
    items
        .iter()
        .take(max_chunks)
        .map(|r| {
            format!(
                "CHUNK {} | file={} | page={} | section={}\n{}\n",
                r.chunk_id, r.source_file, r.page_number, r.section_name, r.text
            )
        })
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}
