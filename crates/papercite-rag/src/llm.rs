//! OpenAI-compatible chat-completions client behind `LanguageModel`.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use papercite_core::config::{LlmConfig, LlmProvider, OPENAI_API_KEY_ENV};
use papercite_core::traits::LanguageModel;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV)
            .map_err(|_| anyhow!("{OPENAI_API_KEY_ENV} is not set"))?;
        Self::new(api_key, config)
    }
}

impl LanguageModel for OpenAiChat {
    /// One user message, no retries.
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [ChatMessage { role: "user", content: prompt }],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("chat completion returned {status}: {body}"));
        }
        let body: ChatResponse = response.json().context("decoding chat completion")?;
        tracing::debug!(model = %self.model, "chat completion received");
        reply_text(body)
    }
}

/// Text of the first choice; a null `content` reads as empty text.
fn reply_text(body: ChatResponse) -> Result<String> {
    let choice = body.choices.into_iter().next().ok_or_else(|| anyhow!("chat completion has no choices"))?;
    Ok(choice.message.content.unwrap_or_default())
}

pub fn language_model_from_config(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider {
        LlmProvider::Openai => Ok(Arc::new(OpenAiChat::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).expect("fixture decodes")
    }

    #[test]
    fn first_choice_content_is_returned() {
        let b = body(json!({
            "id": "chatcmpl-1",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "Yes [0123456789ab p.2]."},
                    "finish_reason": "stop"
                },
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
            ]
        }));
        assert_eq!(reply_text(b).expect("reply"), "Yes [0123456789ab p.2].");
    }

    #[test]
    fn null_content_is_empty_text() {
        let b = body(json!({"choices": [{"message": {"role": "assistant", "content": null}}]}));
        assert_eq!(reply_text(b).expect("reply"), "");
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(reply_text(body(json!({"choices": []}))).is_err());
    }
}
