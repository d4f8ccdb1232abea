//! # Flight Harness Core
//!
//! Pure telemetry-analysis logic for Flight Harness: record models,
//! descriptive summaries, heuristic anomaly detection, question-to-type
//! inference, conversation state, and the storage traits.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. Caching,
//! reasoning-engine calls, and process wiring live in the `flight-harness`
//! app crate.

pub mod anomaly;
pub mod conversation;
pub mod intent;
pub mod models;
pub mod query;
pub mod store;
pub mod summary;

pub use anomaly::{summarize, AnomalySummary, AnomalyThresholds};
pub use conversation::{Conversation, Message, Role};
pub use intent::infer_message_types;
pub use models::{FlightLog, FlightLogInfo, FlightLogMetadata, TelemetryMessage};
pub use query::{Query, QueryResult, ValidationError};
pub use summary::{Summary, TimeRange};
