use anyhow::{Context, Result};
use async_trait::async_trait;
use flight_harness_core::Message;
use serde_json::{json, Value};

use super::{api_key, http_client, send_with_retry, ReasoningEngine};
use crate::config::ReasoningConfig;
use crate::context::PromptContext;
use crate::prompt::render_system_prompt;

const DEFAULT_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Calls `POST {url}/messages`. Reads `ANTHROPIC_API_KEY`.
pub struct AnthropicEngine {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicEngine {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("reasoning.model required for anthropic")?;
        Ok(Self {
            client: http_client(config)?,
            api_key: api_key("ANTHROPIC_API_KEY")?,
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ReasoningEngine for AnthropicEngine {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn answer(
        &self,
        history: &[Message],
        context: &PromptContext,
        instructions: Option<&str>,
    ) -> Result<String> {
        let system = render_system_prompt(instructions, context);
        let body = request_body(
            &self.model,
            self.max_tokens,
            self.temperature,
            &system,
            history,
        );
        let endpoint = format!("{}/messages", self.url.trim_end_matches('/'));

        let json = send_with_retry("Anthropic", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
        })
        .await?;

        parse_response(&json)
    }
}

fn request_body(
    model: &str,
    max_tokens: u32,
    temperature: f32,
    system: &str,
    history: &[Message],
) -> Value {
    let messages: Vec<Value> = history
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": temperature,
        "system": system,
        "messages": messages,
    })
}

/// Concatenate the text blocks of a messages API response.
fn parse_response(json: &Value) -> Result<String> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Anthropic response: missing content array"))?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        anyhow::bail!("Invalid Anthropic response: no text content");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_is_top_level() {
        let body = request_body("claude-3-5-sonnet-20241022", 4096, 0.7, "SYS", &[Message::user("hi")]);
        assert_eq!(body["system"], "SYS");
        assert_eq!(body["max_tokens"], 4096);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_parse_text_blocks() {
        let json = json!({"content": [
            {"type": "text", "text": "Battery "},
            {"type": "text", "text": "peaked at 65C."}
        ]});
        assert_eq!(parse_response(&json).unwrap(), "Battery peaked at 65C.");
        assert!(parse_response(&json!({"content": []})).is_err());
        assert!(parse_response(&json!({})).is_err());
    }
}
