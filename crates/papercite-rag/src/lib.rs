//! Retrieval, prompting and grounding enforcement for paper Q&A.

pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;

pub use llm::{language_model_from_config, OpenAiChat};
pub use pipeline::{ground, AnswerPipeline, Outcome, ABSTENTION_SENTENCE};
pub use prompts::{build_context, PromptPack};
pub use retrieval::{distance_to_similarity, retrieve, should_abstain, Retriever};
