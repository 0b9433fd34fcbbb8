//! DeepSeek-compatible chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signalscout_common::ScoutError;
use tracing::debug;

use crate::traits::ChatModel;

pub struct DeepSeekClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
    temperature: f64,
}

impl DeepSeekClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.3,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for DeepSeekClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ScoutError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            stream: false,
        };

        debug!(model = %self.model, "Chat completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoutError::Llm(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::Llm(format!("API error ({status}): {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::Llm(format!("malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ScoutError::Llm("empty response".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Strip a markdown code fence from a model response, if present. Models
/// routinely wrap JSON in ```json fences despite instructions not to.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(inner) = trimmed.strip_prefix("```json") {
        return inner.split("```").next().unwrap_or(inner).trim();
    }
    if let Some(inner) = trimmed.strip_prefix("```") {
        return inner.split("```").next().unwrap_or(inner).trim();
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"score\": 12}\n```";
        assert_eq!(strip_code_fences(raw), "{\"score\": 12}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n[1, 2]\n```";
        assert_eq!(strip_code_fences(raw), "[1, 2]");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
