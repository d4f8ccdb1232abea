//! Reasoning-engine abstraction and providers.
//!
//! A [`ReasoningEngine`] turns conversation history plus assembled context
//! into answer text. Providers:
//!
//! - **[`DisabledEngine`]**: always errors; used when no provider is configured.
//! - **[`OpenAIEngine`]**: OpenAI chat completions API.
//! - **[`AnthropicEngine`]**: Anthropic messages API.
//!
//! Use [`create_engine`] to pick one from `[reasoning]` configuration:
//!
//! ```rust,no_run
//! # use flight_harness::config::ReasoningConfig;
//! # use flight_harness::reasoning::create_engine;
//! let engine = create_engine(&ReasoningConfig::default()).unwrap();
//! assert_eq!(engine.name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! Both HTTP providers share [`send_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod anthropic;
mod openai;

pub use anthropic::AnthropicEngine;
pub use openai::OpenAIEngine;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use flight_harness_core::Message;
use tracing::warn;

use crate::config::ReasoningConfig;
use crate::context::PromptContext;

/// Produces answer text for a conversational turn.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Provider identifier (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Answer the last user message in `history`.
    ///
    /// `instructions` is the per-turn base prompt; providers fold it and
    /// `context` into their system prompt.
    async fn answer(
        &self,
        history: &[Message],
        context: &PromptContext,
        instructions: Option<&str>,
    ) -> Result<String>;
}

/// Engine used when `reasoning.provider = "disabled"`.
pub struct DisabledEngine;

#[async_trait]
impl ReasoningEngine for DisabledEngine {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn answer(
        &self,
        _history: &[Message],
        _context: &PromptContext,
        _instructions: Option<&str>,
    ) -> Result<String> {
        bail!("Reasoning provider is disabled. Set [reasoning] provider in the config file.")
    }
}

/// Build the engine named by `config.provider`.
///
/// # Errors
///
/// Returns an error for an unknown provider, a missing model, or a
/// missing API key environment variable.
pub fn create_engine(config: &ReasoningConfig) -> Result<Arc<dyn ReasoningEngine>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEngine)),
        "openai" => Ok(Arc::new(OpenAIEngine::new(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicEngine::new(config)?)),
        other => bail!("Unknown reasoning provider: {}", other),
    }
}

pub(crate) fn http_client(config: &ReasoningConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

pub(crate) fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", var),
    }
}

/// Send a JSON request built by `build`, retrying transient failures.
pub(crate) async fn send_with_retry<F>(
    provider: &str,
    max_retries: u32,
    mut build: F,
) -> Result<serde_json::Value>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(provider, attempt, delay_secs = delay.as_secs(), "retrying reasoning request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        provider,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", provider, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", provider)))
}
