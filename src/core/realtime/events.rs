//! Events produced by a realtime session.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single event yielded by a realtime session's event stream.
///
/// Each variant carries only the fields relevant to it. Events are consumed
/// and serialized for the client, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An agent started producing a response
    AgentStart {
        /// Agent name
        agent: String,
    },
    /// An agent finished its response
    AgentEnd {
        /// Agent name
        agent: String,
    },
    /// Control moved from one agent to another
    Handoff {
        /// Agent handing off
        from: String,
        /// Agent receiving control
        to: String,
    },
    /// A tool call started
    ToolStart {
        /// Agent that called the tool
        agent: String,
        /// Tool name
        tool: String,
        /// Raw JSON arguments
        arguments: String,
    },
    /// A tool call finished
    ToolEnd {
        /// Agent that called the tool
        agent: String,
        /// Tool name
        tool: String,
        /// Tool output
        output: serde_json::Value,
    },
    /// A chunk of assistant audio (PCM16)
    Audio {
        /// Raw audio bytes
        audio: Bytes,
        /// Conversation item the audio belongs to
        item_id: String,
        /// Content index within the item
        content_index: u32,
    },
    /// Assistant audio was interrupted by user speech
    AudioInterrupted {
        /// Item that was playing, when known
        item_id: Option<String>,
    },
    /// Assistant audio for an item is complete
    AudioEnd {
        /// Conversation item
        item_id: String,
        /// Content index within the item
        content_index: u32,
    },
    /// The conversation history changed
    HistoryUpdated {
        /// Full history after the change
        history: Vec<HistoryItem>,
    },
    /// An item was appended to the conversation history
    HistoryAdded {
        /// The new item
        item: HistoryItem,
    },
    /// An output guardrail tripped
    GuardrailTripped {
        /// Guardrails that triggered
        guardrail_results: Vec<GuardrailResult>,
        /// Text that tripped them
        message: String,
    },
    /// A raw event from the underlying model transport
    RawModelEvent {
        /// The raw event
        data: RawModelEvent,
    },
    /// The session reported an error
    Error {
        /// Error description, if the session supplied one
        error: Option<String>,
    },
    /// Server-side VAD idle timeout fired
    InputAudioTimeoutTriggered,
}

impl SessionEvent {
    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::AgentStart { .. } => "agent_start",
            SessionEvent::AgentEnd { .. } => "agent_end",
            SessionEvent::Handoff { .. } => "handoff",
            SessionEvent::ToolStart { .. } => "tool_start",
            SessionEvent::ToolEnd { .. } => "tool_end",
            SessionEvent::Audio { .. } => "audio",
            SessionEvent::AudioInterrupted { .. } => "audio_interrupted",
            SessionEvent::AudioEnd { .. } => "audio_end",
            SessionEvent::HistoryUpdated { .. } => "history_updated",
            SessionEvent::HistoryAdded { .. } => "history_added",
            SessionEvent::GuardrailTripped { .. } => "guardrail_tripped",
            SessionEvent::RawModelEvent { .. } => "raw_model_event",
            SessionEvent::Error { .. } => "error",
            SessionEvent::InputAudioTimeoutTriggered => "input_audio_timeout_triggered",
        }
    }
}

/// A raw transport event.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelEvent {
    /// Event type as named by the transport (e.g. `response.created`)
    pub event_type: String,
    /// Full event payload
    pub payload: serde_json::Value,
}

/// Result of one tripped guardrail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    /// Guardrail name
    pub name: String,
    /// Extra detail reported by the guardrail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_info: Option<serde_json::Value>,
}

// =============================================================================
// History
// =============================================================================

/// One conversation item as tracked by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Item ID
    pub item_id: String,
    /// Item type (`message`, `function_call`, `function_call_output`)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Role for message items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Item status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Content parts for message items
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<HistoryContent>,
    /// Function name for call items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Call ID for call and call-output items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function arguments for call items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for call-output items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// One content part of a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryContent {
    /// Content type (`input_text`, `input_audio`, `text`, `audio`)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Transcript of audio content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}
