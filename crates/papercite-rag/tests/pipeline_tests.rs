use std::sync::{Arc, Mutex};

use papercite_core::config::{PromptConfig, RetrievalConfig};
use papercite_core::traits::{LanguageModel, VectorStore};
use papercite_core::types::{Chunk, Mode, RetrievedItem};
use papercite_rag::{
    ground, retrieve, should_abstain, AnswerPipeline, Outcome, Retriever, ABSTENTION_SENTENCE,
};
use proptest::prelude::*;

/// Store double: fixed distances for plain search, fixed picks for MMR.
struct FixedStore {
    hits: Vec<(Chunk, f32)>,
    mmr_picks: Vec<Chunk>,
}

impl VectorStore for FixedStore {
    fn add(&self, chunks: &[Chunk]) -> anyhow::Result<usize> {
        Ok(chunks.len())
    }

    fn similarity_search_with_distance(&self, _query: &str, k: usize) -> anyhow::Result<Vec<(Chunk, f32)>> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    fn max_marginal_relevance_search(
        &self,
        _q: &str,
        k: usize,
        _fetch_k: usize,
        _l: f32,
    ) -> anyhow::Result<Vec<Chunk>> {
        Ok(self.mmr_picks.iter().take(k).cloned().collect())
    }
}

/// Model double returning a canned reply and recording every prompt.
struct ScriptedModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

struct FailingModel;

impl LanguageModel for FailingModel {
    fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("upstream timeout")
    }
}

fn chunk(id: &str, page: u32, text: &str) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        text: text.to_string(),
        source_file: "paper.pdf".to_string(),
        source_path: "/corpus/paper.pdf".to_string(),
        page_number: page,
        section_name: "Results".to_string(),
        chunk_index: page as usize,
    }
}

const A: &str = "aaaaaaaaaaa1";
const B: &str = "bbbbbbbbbbb2";
const C: &str = "ccccccccccc3";

fn three_hits() -> Vec<(Chunk, f32)> {
    vec![
        (chunk(A, 1, "Accuracy improves by 4 points."), 0.1),
        (chunk(B, 2, "Training uses AdamW with warmup."), 0.4),
        (chunk(C, 3, "Ablations remove the gating layer."), 0.9),
    ]
}

fn plain_config(min_similarity: f32) -> RetrievalConfig {
    RetrievalConfig { k: 3, use_mmr: false, fetch_k: 3, lambda_mult: 0.5, min_similarity }
}

fn pipeline(hits: Vec<(Chunk, f32)>, config: RetrievalConfig, llm: Arc<dyn LanguageModel>) -> AnswerPipeline {
    let store = Arc::new(FixedStore { hits, mmr_picks: Vec::new() });
    AnswerPipeline::new(Retriever::new(store, config), llm, &PromptConfig::default())
}

#[test]
fn zero_candidates_abstain_without_generation() -> anyhow::Result<()> {
    let model = ScriptedModel::new(&format!("Answer [{A} p.1]"));
    let p = pipeline(Vec::new(), plain_config(0.0), model.clone());

    let (result, outcome) = p.answer_with_outcome("What is the accuracy?")?;
    assert_eq!(outcome, Outcome::AbstainedNoEvidence);
    assert!(result.abstained);
    assert_eq!(result.answer_text, ABSTENTION_SENTENCE);
    assert!(result.cited_chunks.is_empty());
    assert!(model.calls().is_empty(), "no generation call");
    Ok(())
}

#[test]
fn weak_evidence_abstains_before_generation() -> anyhow::Result<()> {
    let model = ScriptedModel::new(&format!("Answer [{A} p.1]"));
    // best similarity is 1 / 1.1 ~= 0.909
    let p = pipeline(three_hits(), plain_config(0.95), model.clone());

    let (result, outcome) = p.answer_with_outcome("What is the accuracy?")?;
    assert_eq!(outcome, Outcome::AbstainedNoEvidence);
    assert_eq!(result.retrieved.len(), 3, "retrieved evidence is still reported");
    assert!(result.upholds_grounding());
    assert!(model.calls().is_empty());
    Ok(())
}

#[test]
fn cited_answer_is_grounded_and_returned_verbatim() -> anyhow::Result<()> {
    let reply = format!("Training uses AdamW [{B} p.2]. Accuracy rose [{A} p.1], see also [{B} p.2].");
    let model = ScriptedModel::new(&reply);
    let p = pipeline(three_hits(), plain_config(0.25), model.clone());

    let (result, outcome) = p.answer_with_outcome("How was the model trained?")?;
    assert_eq!(outcome, Outcome::Grounded);
    assert!(!result.abstained);
    assert_eq!(result.answer_text, reply);
    let ids: Vec<&str> = result.cited_chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec![B, A], "first-citation order, deduplicated");
    assert_eq!(result.cited_chunks[0].text, "Training uses AdamW with warmup.");
    assert_eq!(result.cited_chunks[0].page_number, 2);
    assert!(result.upholds_grounding());
    assert_eq!(model.calls().len(), 1);
    Ok(())
}

#[test]
fn uncited_answer_becomes_abstention() -> anyhow::Result<()> {
    let model = ScriptedModel::new("The accuracy improves by four points.");
    let p = pipeline(three_hits(), plain_config(0.25), model);

    let (result, outcome) = p.answer_with_outcome("What is the accuracy?")?;
    assert_eq!(outcome, Outcome::AbstainedUngrounded);
    assert!(result.abstained);
    assert_eq!(result.answer_text, ABSTENTION_SENTENCE);
    assert!(result.cited_chunks.is_empty());
    Ok(())
}

#[test]
fn unknown_ids_are_dropped() {
    let retrieved: Vec<RetrievedItem> =
        three_hits().into_iter().map(|(c, d)| RetrievedItem::from_chunk(c, 1.0 / (1.0 + d))).collect();

    let (only_unknown, outcome) = ground(Mode::Qa, "Claim [0123456789ab p.9].", retrieved.clone());
    assert_eq!(outcome, Outcome::AbstainedUngrounded);
    assert!(only_unknown.cited_chunks.is_empty());

    let (mixed, outcome) = ground(Mode::Qa, &format!("Claim [0123456789ab p.9] and [{C} p.3]."), retrieved);
    assert_eq!(outcome, Outcome::Grounded);
    assert_eq!(mixed.cited_chunks.len(), 1);
    assert_eq!(mixed.cited_chunks[0].chunk_id, C);
}

#[test]
fn model_abstention_sentence_is_respected() -> anyhow::Result<()> {
    let model = ScriptedModel::new(&format!("  {ABSTENTION_SENTENCE}\n"));
    let p = pipeline(three_hits(), plain_config(0.25), model);

    let (result, outcome) = p.answer_with_outcome("What is the accuracy?")?;
    assert!(result.abstained);
    assert_eq!(outcome, Outcome::AbstainedUngrounded);
    assert_eq!(result.answer_text, ABSTENTION_SENTENCE);
    assert!(result.cited_chunks.is_empty());
    Ok(())
}

#[test]
fn mode_selects_template_and_context_is_capped() -> anyhow::Result<()> {
    let model = ScriptedModel::new(&format!("Verdict: SUPPORTED\nRationale: yes [{C} p.3]."));
    let store = Arc::new(FixedStore { hits: three_hits(), mmr_picks: Vec::new() });
    let p = AnswerPipeline::new(
        Retriever::new(store, plain_config(0.25)),
        model.clone(),
        &PromptConfig { max_context_chunks: 2 },
    );

    let (result, outcome) = p.answer_with_outcome("Is it true that accuracy improves?")?;
    assert_eq!(result.mode, Mode::ClaimVerify);

    let prompts = model.calls();
    let prompt = &prompts[0];
    assert!(prompt.contains("Verdict: <SUPPORTED|REFUTED|NOT_ENOUGH_EVIDENCE>"));
    assert!(prompt.contains(&format!("CHUNK {A} | file=paper.pdf | page=1 | section=Results")));
    assert!(prompt.contains(&format!("CHUNK {B} |")));
    assert!(!prompt.contains(&format!("CHUNK {C} |")), "third chunk is outside the context window");
    assert!(prompt.contains("Is it true that accuracy improves?"));

    // Citations resolve against everything retrieved, not only the context window.
    assert_eq!(outcome, Outcome::Grounded);
    assert_eq!(result.cited_chunks[0].chunk_id, C);
    Ok(())
}

#[test]
fn generation_errors_propagate() {
    let p = pipeline(three_hits(), plain_config(0.25), Arc::new(FailingModel));
    let err = p.answer("What is the accuracy?").unwrap_err();
    assert!(err.to_string().contains("upstream timeout"));
}

#[test]
fn plain_retrieval_keeps_store_order() -> anyhow::Result<()> {
    let store = FixedStore { hits: three_hits(), mmr_picks: Vec::new() };
    let items = retrieve(&store, "q", 2, false, 10, 0.5)?;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].chunk_id, A);
    assert!((items[0].similarity - 1.0 / 1.1).abs() < 1e-6);
    assert!(items[0].similarity > items[1].similarity);
    Ok(())
}

#[test]
fn diversified_retrieval_reattaches_candidate_similarity() -> anyhow::Result<()> {
    let outsider = chunk("dddddddddddd", 7, "Not in the candidate pool.");
    let store = FixedStore {
        hits: three_hits(),
        mmr_picks: vec![chunk(C, 3, "Ablations remove the gating layer."), chunk(A, 1, "x"), outsider],
    };
    let items = retrieve(&store, "q", 3, true, 3, 0.5)?;
    let ids: Vec<&str> = items.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(ids, vec![C, A, "dddddddddddd"], "MMR selection order is kept");
    assert!((items[0].similarity - 1.0 / 1.9).abs() < 1e-6);
    assert!((items[1].similarity - 1.0 / 1.1).abs() < 1e-6);
    assert_eq!(items[2].similarity, 0.0, "pick outside the pool falls back to 0.0");
    Ok(())
}

#[test]
fn every_outcome_upholds_grounding() -> anyhow::Result<()> {
    let replies = [
        format!("Yes [{A} p.1]"),
        "No citations here.".to_string(),
        ABSTENTION_SENTENCE.to_string(),
        "[ffffffffffff p.1]".to_string(),
    ];
    for reply in replies {
        let p = pipeline(three_hits(), plain_config(0.25), ScriptedModel::new(&reply));
        assert!(p.answer("What is the accuracy?")?.upholds_grounding(), "reply: {reply}");
    }
    let p = pipeline(Vec::new(), plain_config(0.25), ScriptedModel::new("x"));
    assert!(p.answer("anything")?.upholds_grounding());
    Ok(())
}

fn items_with(similarities: &[f32]) -> Vec<RetrievedItem> {
    similarities
        .iter()
        .enumerate()
        .map(|(i, &s)| RetrievedItem::from_chunk(chunk(&format!("{i:012x}"), 1, "t"), s))
        .collect()
}

#[test]
fn empty_retrieval_always_abstains() {
    for floor in [0.0, 0.25, 1.0] {
        assert!(should_abstain(&[], floor));
    }
}

proptest! {
    #[test]
    fn raising_the_floor_only_adds_abstentions(sims in prop::collection::vec(0.01f32..=1.0, 1..8),
                                               lo in 0.0f32..=1.0, bump in 0.0f32..=1.0) {
        let items = items_with(&sims);
        let hi = (lo + bump).min(1.0);
        if !should_abstain(&items, hi) {
            prop_assert!(!should_abstain(&items, lo));
        }
        let best = sims.iter().copied().fold(0.0f32, f32::max);
        prop_assert!(!should_abstain(&items, best));
        if best < 1.0 {
            prop_assert!(should_abstain(&items, (best + 1e-3).min(1.0)) || best + 1e-3 > 1.0);
        }
    }
}
