//! Process wiring.
//!
//! [`Harness`] owns one instance of every service, built from [`Config`].
//! The HTTP server and the CLI both work through it. Stores, parser, and
//! reasoning engine are injectable for tests and embedding binaries.

use std::sync::Arc;

use anyhow::Result;
use flight_harness_core::store::memory::{InMemoryConversationStore, InMemoryFlightLogStore};
use flight_harness_core::store::{ConversationStore, FlightLogStore};

use crate::anomaly::AnomalyService;
use crate::chat::ChatOrchestrator;
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::conversation::ConversationService;
use crate::ingest::FlightLogIngestor;
use crate::parser::{JsonLinesParser, LogParser};
use crate::reasoning::{create_engine, ReasoningEngine};
use crate::telemetry::TelemetryService;

#[derive(Clone)]
pub struct Harness {
    pub config: Arc<Config>,
    pub telemetry: Arc<TelemetryService>,
    pub anomalies: Arc<AnomalyService>,
    pub context: Arc<ContextAssembler>,
    pub conversations: Arc<ConversationService>,
    pub ingestor: Arc<FlightLogIngestor>,
    pub chat: Arc<ChatOrchestrator>,
}

impl Harness {
    /// In-memory stores, JSON-lines parser, and the configured engine.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = create_engine(&config.reasoning)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Like [`from_config`](Self::from_config) with a caller-supplied engine.
    pub fn with_engine(config: &Config, engine: Arc<dyn ReasoningEngine>) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemoryFlightLogStore::new()),
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(JsonLinesParser),
            engine,
        )
    }

    pub fn with_parts(
        config: &Config,
        flight_logs: Arc<dyn FlightLogStore>,
        conversation_store: Arc<dyn ConversationStore>,
        parser: Arc<dyn LogParser>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        let config = Arc::new(config.clone());
        let telemetry = Arc::new(TelemetryService::new(flight_logs.clone()));
        let anomalies = Arc::new(AnomalyService::new(config.anomaly.clone()));
        let context = Arc::new(ContextAssembler::new(
            telemetry.clone(),
            anomalies.clone(),
            config.retrieval.max_context_messages,
        ));
        let conversations = Arc::new(ConversationService::new(conversation_store));
        let ingestor = Arc::new(FlightLogIngestor::new(
            flight_logs,
            telemetry.clone(),
            anomalies.clone(),
            parser,
            config.upload.clone(),
        ));
        let chat = Arc::new(ChatOrchestrator::new(
            conversations.clone(),
            context.clone(),
            engine,
            config.retrieval.prompt_sample_size,
        ));

        Self {
            config,
            telemetry,
            anomalies,
            context,
            conversations,
            ingestor,
            chat,
        }
    }
}
