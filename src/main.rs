//! # Flight Harness CLI (`fh`)
//!
//! ## Usage
//!
//! ```bash
//! fh --config ./config/fh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fh serve` | Start the HTTP API server |
//! | `fh analyze <path>` | Print the summary and anomaly summary of a local log |
//! | `fh ask <path> "<question>"` | Ask one question about a local log |
//! | `fh check-config` | Validate the configuration file |
//!
//! Logging goes to stderr; set `RUST_LOG` (e.g. `RUST_LOG=flight_harness=debug`)
//! to change the default `info` level.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use flight_harness::config::{self, Config};
use flight_harness::harness::Harness;
use flight_harness::parser::{JsonLinesParser, LogParser};
use flight_harness::server;
use flight_harness_core::{summarize, Query, Summary};

/// Flight Harness: conversational analysis of UAV flight telemetry.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fh",
    about = "Flight Harness: conversational analysis of UAV flight telemetry",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Decode a local flight log and print its summaries as JSON.
    ///
    /// Runs without a config file; `[anomaly]` thresholds are applied
    /// when one is present.
    Analyze {
        /// Path to a JSON-lines flight log.
        path: PathBuf,
    },

    /// Ask one question about a local flight log.
    Ask {
        /// Path to a JSON-lines flight log.
        path: PathBuf,
        /// The question.
        question: String,
    },

    /// Parse and validate the configuration file.
    CheckConfig,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { path } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            analyze(&cfg, &path)?;
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Ask { path, question } => {
            let cfg = config::load_config(&cli.config)?;
            ask(&cfg, &path, question).await?;
        }
        Commands::CheckConfig => {
            let cfg = config::load_config(&cli.config)?;
            println!("Config OK: {}", cli.config.display());
            println!("  bind:       {}", cfg.server.bind);
            println!(
                "  reasoning:  {} ({})",
                cfg.reasoning.provider,
                cfg.reasoning.model.as_deref().unwrap_or("no model")
            );
            println!(
                "  retrieval:  max {} records, {} quoted",
                cfg.retrieval.max_context_messages, cfg.retrieval.prompt_sample_size
            );
            println!(
                "  upload:     {} (max {} bytes)",
                cfg.upload.allowed_extensions.join(", "),
                cfg.upload.max_bytes
            );
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn analyze(cfg: &Config, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = JsonLinesParser.parse(&bytes);

    let name = file_name(path);
    let report = serde_json::json!({
        "summary": Summary::compute(&name, Some(name.as_str()), &parsed.messages),
        "anomaly_summary": summarize(&parsed.messages, &cfg.anomaly),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ask(cfg: &Config, path: &Path, question: String) -> Result<()> {
    let harness = Harness::from_config(cfg)?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let upload = harness
        .ingestor
        .upload(&file_name(path), &bytes, None)
        .await?;
    if !upload.is_accepted() {
        bail!("{}", upload.message);
    }

    let result = harness
        .chat
        .process_query(Query::new(question).with_file(upload.file_id))
        .await?;

    println!("{}", result.answer);
    if let Some(q) = result.clarification_question {
        println!();
        println!("Clarification needed: {}", q);
    }
    Ok(())
}
