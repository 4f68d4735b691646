//! Session event to client JSON mapping.

use base64::prelude::*;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::core::realtime::SessionEvent;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Convert a session event into the flat `{type, ...}` object sent to the
/// browser client.
pub fn serialize_event(event: &SessionEvent) -> Value {
    let mut out = Map::new();
    out.insert("type".to_string(), Value::from(event.kind()));

    match event {
        SessionEvent::AgentStart { agent } | SessionEvent::AgentEnd { agent } => {
            out.insert("agent".to_string(), Value::from(agent.as_str()));
        }
        SessionEvent::Handoff { from, to } => {
            out.insert("from".to_string(), Value::from(from.as_str()));
            out.insert("to".to_string(), Value::from(to.as_str()));
        }
        SessionEvent::ToolStart { tool, .. } => {
            out.insert("tool".to_string(), Value::from(tool.as_str()));
        }
        SessionEvent::ToolEnd { tool, output, .. } => {
            out.insert("tool".to_string(), Value::from(tool.as_str()));
            out.insert("output".to_string(), Value::from(stringify_output(output)));
        }
        SessionEvent::Audio { audio, .. } => {
            out.insert("audio".to_string(), Value::from(BASE64_STANDARD.encode(audio)));
        }
        SessionEvent::HistoryUpdated { history } => {
            let history = serde_json::to_value(history).unwrap_or_else(|e| {
                warn!("Failed to serialize history: {}", e);
                Value::Array(Vec::new())
            });
            out.insert("history".to_string(), history);
        }
        SessionEvent::GuardrailTripped {
            guardrail_results, ..
        } => {
            let results = guardrail_results
                .iter()
                .map(|result| json!({ "name": result.name }))
                .collect();
            out.insert("guardrail_results".to_string(), Value::Array(results));
        }
        SessionEvent::RawModelEvent { data } => {
            out.insert(
                "raw_model_event".to_string(),
                json!({ "type": data.event_type }),
            );
        }
        SessionEvent::Error { error } => {
            let message = error.as_deref().unwrap_or(UNKNOWN_ERROR);
            out.insert("error".to_string(), Value::from(message));
        }
        SessionEvent::AudioInterrupted { .. }
        | SessionEvent::AudioEnd { .. }
        | SessionEvent::HistoryAdded { .. }
        | SessionEvent::InputAudioTimeoutTriggered => {}
    }

    Value::Object(out)
}

/// Strings pass through unchanged; anything else becomes its JSON text.
fn stringify_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
