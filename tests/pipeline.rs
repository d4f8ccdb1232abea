//! End-to-end turns through the harness with a scripted reasoning engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flight_harness::chat::{ChatError, INVALID_QUESTION_ANSWER};
use flight_harness::config::Config;
use flight_harness::context::PromptContext;
use flight_harness::harness::Harness;
use flight_harness::reasoning::ReasoningEngine;
use flight_harness_core::anomaly::AnomalyStatus;
use flight_harness_core::{Message, Query, Role};
use serde_json::json;

struct Call {
    history: Vec<Message>,
    context: PromptContext,
    instructions: String,
}

struct ScriptedEngine {
    reply: Mutex<String>,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedEngine {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply.to_string()),
            fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn answer(
        &self,
        history: &[Message],
        context: &PromptContext,
        instructions: Option<&str>,
    ) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(Call {
            history: history.to_vec(),
            context: context.clone(),
            instructions: instructions.unwrap_or_default().to_string(),
        });
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("provider unavailable");
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

fn harness(engine: &Arc<ScriptedEngine>) -> Harness {
    Harness::with_engine(&Config::minimal(), engine.clone())
}

fn jsonl(records: &[serde_json::Value]) -> Vec<u8> {
    let mut out = String::new();
    for r in records {
        out.push_str(&r.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

fn sample_log() -> Vec<u8> {
    jsonl(&[
        json!({"timestamp": 10.0, "message_type": "BATTERY_STATUS", "data": {"temperature": 65}}),
        json!({"timestamp": 12.0, "message_type": "GPS_RAW_INT", "data": {"fix_type": 0, "alt": 120500}}),
        json!({"timestamp": 13.0, "message_type": "ATTITUDE", "data": {"roll": 0.02}}),
    ])
}

async fn upload(h: &Harness, body: &[u8]) -> String {
    let out = h.ingestor.upload("flight.jsonl", body, None).await.unwrap();
    assert!(out.is_accepted(), "upload rejected: {}", out.message);
    out.file_id
}

#[tokio::test]
async fn test_turn_on_bound_log() {
    let engine = ScriptedEngine::new("Max altitude was 120.5 m; battery peaked at 65C.");
    let h = harness(&engine);
    let file_id = upload(&h, &sample_log()).await;

    let result = h
        .chat
        .process_query(
            Query::new("What was the max altitude and battery temp?").with_file(file_id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(result.confidence, 0.8);
    assert!(!result.requires_clarification);
    assert_eq!(result.sources, vec![format!("Flight log: {}", file_id)]);

    let calls = engine.calls.lock().unwrap();
    let call = &calls[0];
    assert_eq!(call.history.len(), 1);
    assert_eq!(call.history[0].role, Role::User);

    let summary = call.context.summary.as_ref().unwrap();
    assert_eq!(summary.total_messages, 3);
    assert_eq!(summary.filename.as_deref(), Some("flight.jsonl"));
    let anomaly = call.context.anomaly_summary.as_ref().unwrap();
    assert_eq!(anomaly.status, AnomalyStatus::Ok);
    assert_eq!(anomaly.counts.battery_temp_high, 1);
    assert_eq!(anomaly.counts.gps_loss, 1);

    // GPS_RAW_INT and BATTERY_STATUS match; ATTITUDE does not.
    assert!(call
        .instructions
        .contains("Sample telemetry available (total 2 messages):"));
    assert!(!call.instructions.contains("- ATTITUDE:"));
    drop(calls);

    let stored = h
        .conversations
        .get(&result.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[1].role, Role::Assistant);
    assert_eq!(stored.file_id.as_deref(), Some(file_id.as_str()));
}

#[tokio::test]
async fn test_follow_up_sees_history() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);
    let file_id = upload(&h, &sample_log()).await;

    let first = h
        .chat
        .process_query(Query::new("battery?").with_file(file_id))
        .await
        .unwrap();
    let second = h
        .chat
        .process_query(Query::new("and gps?").with_conversation(first.conversation_id.clone()))
        .await
        .unwrap();
    assert_eq!(second.conversation_id, first.conversation_id);

    let calls = engine.calls.lock().unwrap();
    assert_eq!(calls[1].history.len(), 3);
    assert_eq!(calls[1].history[2].content, "and gps?");
    // The binding carries over even though the follow-up named no file.
    assert!(calls[1].context.summary.is_some());
    drop(calls);

    let stored = h
        .conversations
        .get(&first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.messages.len(), 4);
}

#[tokio::test]
async fn test_engine_failure_commits_nothing() {
    let engine = ScriptedEngine::new("first answer");
    let h = harness(&engine);

    let first = h
        .chat
        .process_query(Query::new("hello"))
        .await
        .unwrap();

    engine.fail.store(true, Ordering::SeqCst);
    let err = h
        .chat
        .process_query(Query::new("still there?").with_conversation(first.conversation_id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Upstream(_)));

    let stored = h
        .conversations
        .get(&first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[1].content, "first answer");
}

#[tokio::test]
async fn test_invalid_question_touches_nothing() {
    let engine = ScriptedEngine::new("unused");
    let h = harness(&engine);

    let result = h.chat.process_query(Query::new("   ")).await.unwrap();
    assert_eq!(result.answer, INVALID_QUESTION_ANSWER);
    assert_eq!(result.confidence, 0.0);
    assert!(uuid::Uuid::parse_str(&result.conversation_id).is_ok());
    assert_eq!(engine.call_count(), 0);
    assert!(h
        .conversations
        .get(&result.conversation_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_clarification_request() {
    let engine = ScriptedEngine::new("I'm not sure. Could you clarify the time range? Thanks.");
    let h = harness(&engine);

    let result = h
        .chat
        .process_query(Query::new("was it stable?"))
        .await
        .unwrap();
    assert!(result.requires_clarification);
    assert_eq!(result.confidence, 0.5);
    assert_eq!(
        result.clarification_question.as_deref(),
        Some("Could you clarify the time range?")
    );
    assert!(result.sources.is_empty());

    engine.set_reply("It was stable.");
    let result = h
        .chat
        .process_query(Query::new("was it stable?"))
        .await
        .unwrap();
    assert!(!result.requires_clarification);
    assert!(result.clarification_question.is_none());
}

#[tokio::test]
async fn test_unmatched_question_gets_capped_full_sequence() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);
    let records: Vec<_> = (0..1500)
        .map(|i| json!({"timestamp": i as f64, "message_type": "ATTITUDE", "data": {"roll": 0.0}}))
        .collect();
    let file_id = upload(&h, &jsonl(&records)).await;

    h.chat
        .process_query(Query::new("hello").with_file(file_id))
        .await
        .unwrap();

    let calls = engine.calls.lock().unwrap();
    assert!(calls[0]
        .instructions
        .contains("Sample telemetry available (total 1000 messages):"));
    assert_eq!(calls[0].instructions.matches("- ATTITUDE:").count(), 10);
}

#[tokio::test]
async fn test_unknown_file_degrades_to_empty_context() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);

    let result = h
        .chat
        .process_query(Query::new("altitude?").with_file("no-such-file"))
        .await
        .unwrap();
    assert_eq!(result.sources, vec!["Flight log: no-such-file".to_string()]);

    let calls = engine.calls.lock().unwrap();
    assert!(calls[0].context.is_empty());
    assert!(!calls[0].instructions.contains("Sample telemetry"));
}

#[tokio::test]
async fn test_deleted_log_drops_cached_summary() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);
    let file_id = upload(&h, &sample_log()).await;

    assert!(h.telemetry.get_summary(&file_id).await.unwrap().is_some());
    assert!(h.ingestor.delete(&file_id).await.unwrap());
    assert!(h.telemetry.get_summary(&file_id).await.unwrap().is_none());

    let ctx = h.context.build_prompt_context(&file_id).await.unwrap();
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn test_concurrent_turns_on_one_conversation_are_serialized() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);
    let first = h.chat.process_query(Query::new("start")).await.unwrap();
    let id = first.conversation_id;

    let (a, b) = tokio::join!(
        h.chat
            .process_query(Query::new("one").with_conversation(id.clone())),
        h.chat
            .process_query(Query::new("two").with_conversation(id.clone())),
    );
    a.unwrap();
    b.unwrap();

    let stored = h.conversations.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 6);
}

#[tokio::test]
async fn test_delete_during_turn_is_not_undone() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);
    let first = h.chat.process_query(Query::new("start")).await.unwrap();
    let id = first.conversation_id;

    engine.delay_ms.store(100, Ordering::SeqCst);
    let turn = {
        let chat = h.chat.clone();
        let id = id.clone();
        tokio::spawn(async move {
            chat.process_query(Query::new("slow").with_conversation(id))
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert!(h.conversations.delete(&id).await.unwrap());
    let answered = turn.await.unwrap().unwrap();
    assert_eq!(answered.conversation_id, id);
    assert!(h.conversations.get(&id).await.unwrap().is_none());
    assert_eq!(h.conversations.active_locks(), 0);
}

#[tokio::test]
async fn test_unknown_conversation_ids_leave_no_locks() {
    let engine = ScriptedEngine::new("ok");
    let h = harness(&engine);

    for i in 0..200 {
        let result = h
            .chat
            .process_query(Query::new("hi").with_conversation(format!("stale-{}", i)))
            .await
            .unwrap();
        assert_ne!(result.conversation_id, format!("stale-{}", i));
    }
    assert_eq!(h.conversations.active_locks(), 0);
}
