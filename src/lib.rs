//! # Flight Harness
//!
//! Conversational analysis of UAV flight telemetry.
//!
//! Flight logs are uploaded, decoded into ordered telemetry records, and
//! summarized. Questions about a log are answered by a reasoning engine
//! that sees a cached summary, heuristic anomaly findings, and the slice of
//! records relevant to the question.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │  Upload    │──▶│  LogParser   │──▶│ FlightLogStore  │
//! │ (HTTP/CLI) │   │  (JSONL)     │   │   (in-memory)   │
//! └────────────┘   └──────────────┘   └────────┬────────┘
//!                                              │
//!                ┌─────────────────────────────┤
//!                ▼                             ▼
//!        ┌───────────────┐            ┌────────────────┐
//!        │ Summary cache │            │ Anomaly cache  │
//!        └───────┬───────┘            └───────┬────────┘
//!                └────────────┬───────────────┘
//!                             ▼
//!                   ┌───────────────────┐    ┌──────────────────┐
//!   Query ─────────▶│ ChatOrchestrator  │───▶│ ReasoningEngine  │
//!                   └───────────────────┘    └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`cache`] | Per-key single-flight cache |
//! | [`telemetry`] | Telemetry queries and the summary cache |
//! | [`anomaly`] | Cached anomaly summaries |
//! | [`context`] | Prompt context and telemetry slice for a turn |
//! | [`conversation`] | Conversation lifecycle and turn locks |
//! | [`prompt`] | Instructions and system prompt text |
//! | [`reasoning`] | Reasoning-engine trait and providers |
//! | [`chat`] | Query orchestration |
//! | [`parser`] | Flight-log decoding |
//! | [`ingest`] | Upload flow |
//! | [`harness`] | Service wiring |
//! | [`server`] | HTTP API server |
//!
//! Pure models and heuristics live in the `flight-harness-core` crate.

pub mod anomaly;
pub mod cache;
pub mod chat;
pub mod config;
pub mod context;
pub mod conversation;
pub mod harness;
pub mod ingest;
pub mod parser;
pub mod prompt;
pub mod reasoning;
pub mod server;
pub mod telemetry;
