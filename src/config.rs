//! TOML configuration.
//!
//! Every table is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [reasoning]
//! provider = "anthropic"          # disabled | openai | anthropic
//! model = "claude-3-5-sonnet-20241022"
//! timeout_secs = 60
//!
//! [retrieval]
//! max_context_messages = 1000
//! prompt_sample_size = 10
//!
//! [anomaly]
//! battery_temp_high = 60.0
//! gps_fix_lost = 0
//! rc_rssi_low = 50.0
//! status_severity_min = 4
//!
//! [upload]
//! allowed_extensions = [".jsonl", ".ndjson"]
//! max_bytes = 268435456
//! ```

use anyhow::{Context, Result};
use flight_harness_core::AnomalyThresholds;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub anomaly: AnomalyThresholds,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override for the provider API (proxies, compatible servers).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ReasoningConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Hard cap on telemetry records attached to one turn.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    /// Records quoted verbatim in the instructions.
    #[serde(default = "default_prompt_sample_size")]
    pub prompt_sample_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_messages: default_max_context_messages(),
            prompt_sample_size: default_prompt_sample_size(),
        }
    }
}

fn default_max_context_messages() -> usize {
    1000
}
fn default_prompt_sample_size() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl UploadConfig {
    /// Whether `filename` ends with one of the allowed extensions (case-insensitive).
    pub fn accepts(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

fn default_allowed_extensions() -> Vec<String> {
    vec![".jsonl".to_string(), ".ndjson".to_string()]
}
fn default_max_bytes() -> usize {
    256 * 1024 * 1024
}

impl Config {
    /// Configuration with every default applied and no reasoning provider.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            reasoning: ReasoningConfig::default(),
            retrieval: RetrievalConfig::default(),
            anomaly: AnomalyThresholds::default(),
            upload: UploadConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.max_context_messages == 0 {
            anyhow::bail!("retrieval.max_context_messages must be >= 1");
        }

        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            anyhow::bail!("reasoning.temperature must be in [0.0, 2.0]");
        }

        match self.reasoning.provider.as_str() {
            "disabled" | "openai" | "anthropic" => {}
            other => anyhow::bail!(
                "Unknown reasoning provider: '{}'. Must be disabled, openai, or anthropic.",
                other
            ),
        }

        if self.reasoning.is_enabled() && self.reasoning.model.is_none() {
            anyhow::bail!(
                "reasoning.model must be specified when provider is '{}'",
                self.reasoning.provider
            );
        }

        if self.upload.allowed_extensions.is_empty() {
            anyhow::bail!("upload.allowed_extensions must not be empty");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
