use anyhow::{Context, Result};
use async_trait::async_trait;
use flight_harness_core::Message;
use serde_json::{json, Value};

use super::{api_key, http_client, send_with_retry, ReasoningEngine};
use crate::config::ReasoningConfig;
use crate::context::PromptContext;
use crate::prompt::render_system_prompt;

const DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Calls `POST {url}/chat/completions`. Reads `OPENAI_API_KEY`.
pub struct OpenAIEngine {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    max_retries: u32,
    temperature: f32,
}

impl OpenAIEngine {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("reasoning.model required for openai")?;
        Ok(Self {
            client: http_client(config)?,
            api_key: api_key("OPENAI_API_KEY")?,
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            max_retries: config.max_retries,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ReasoningEngine for OpenAIEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn answer(
        &self,
        history: &[Message],
        context: &PromptContext,
        instructions: Option<&str>,
    ) -> Result<String> {
        let system = render_system_prompt(instructions, context);
        let body = request_body(&self.model, self.temperature, &system, history);
        let endpoint = format!("{}/chat/completions", self.url.trim_end_matches('/'));

        let json = send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        parse_response(&json)
    }
}

fn request_body(model: &str, temperature: f32, system: &str, history: &[Message]) -> Value {
    let mut messages = vec![json!({"role": "system", "content": system})];
    messages.extend(
        history
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
    );
    json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
    })
}

fn parse_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}
