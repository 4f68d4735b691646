//! Base traits and types for realtime conversational sessions.
//!
//! This module defines the seams between the bridge and the realtime runtime:
//! a [`SessionFactory`] opens sessions, each yielding a [`RealtimeSession`]
//! handle for audio input, a [`SessionEvents`] stream and a [`ScopeToken`]
//! that tears the session down.
//!
//! # Audio Format
//!
//! Audio handed to `send_audio` is PCM 16-bit signed little-endian.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::SessionEvent;
use super::openai::{DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE, PCM16_AUDIO_FORMAT};
use super::scope::ScopeToken;
use crate::core::tools::ToolError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Session is not connected
    #[error("Not connected")]
    NotConnected,

    /// A tool invoked by the session failed
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

impl RealtimeError {
    /// Whether this error means the user has not linked the third-party
    /// account a tool needs.
    pub fn is_account_not_linked(&self) -> bool {
        matches!(self, RealtimeError::Tool(ToolError::AccountNotLinked { .. }))
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetectionConfig {
    /// Server-side voice activity detection
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio included before detected speech, in ms
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence that ends a turn, in ms
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic turn detection
    SemanticVad {
        /// Eagerness (`low`, `medium`, `high`, `auto`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// Fixed configuration every session is opened with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for the provider
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Output voice
    pub voice: String,
    /// Enabled response modalities
    pub modalities: Vec<String>,
    /// Input audio format
    pub input_audio_format: String,
    /// Output audio format
    pub output_audio_format: String,
    /// Model used to transcribe user audio, if transcription is enabled
    pub input_audio_transcription: Option<String>,
    /// Turn detection mode
    pub turn_detection: Option<TurnDetectionConfig>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_REALTIME_VOICE.to_string(),
            modalities: vec!["text".to_string(), "audio".to_string()],
            input_audio_format: PCM16_AUDIO_FORMAT.to_string(),
            output_audio_format: PCM16_AUDIO_FORMAT.to_string(),
            input_audio_transcription: Some("whisper-1".to_string()),
            turn_detection: Some(TurnDetectionConfig::default()),
            temperature: None,
        }
    }
}

// =============================================================================
// Session Contract
// =============================================================================

/// Sender half of a session event stream.
pub type SessionEventSender = mpsc::Sender<RealtimeResult<SessionEvent>>;

/// Asynchronous stream of session events.
///
/// An `Err` item is a failure raised while producing events; the stream may
/// continue afterwards. `None` means the session ended.
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::Receiver<RealtimeResult<SessionEvent>>,
}

impl SessionEvents {
    /// Create a bounded event channel.
    pub fn channel(capacity: usize) -> (SessionEventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> Option<RealtimeResult<SessionEvent>> {
        self.rx.recv().await
    }
}

/// Handle to a live realtime conversation.
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Append PCM16 audio to the session's input.
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()>;

    /// Name of the agent currently in control.
    fn current_agent(&self) -> String;
}

/// A freshly opened session.
pub struct OpenedSession {
    /// Audio input handle
    pub handle: Arc<dyn RealtimeSession>,
    /// Event stream
    pub events: SessionEvents,
    /// Teardown scope
    pub scope: ScopeToken,
}

/// Opens realtime sessions with a fixed configuration.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a new session. May block on network I/O.
    async fn open(&self) -> RealtimeResult<OpenedSession>;
}

/// Boxed factory type used by the application state.
pub type BoxedSessionFactory = Arc<dyn SessionFactory>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_fixed_session_setup() {
        let config = RealtimeConfig::default();
        assert_eq!(config.model, "gpt-4o-realtime-preview");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.modalities, vec!["text", "audio"]);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = RealtimeConfig {
            api_key: "sk-secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_account_not_linked_classification() {
        let linked = RealtimeError::from(ToolError::AccountNotLinked {
            app: "SLACK".to_string(),
            owner_id: "slack_persona".to_string(),
        });
        assert!(linked.is_account_not_linked());

        let other = RealtimeError::from(ToolError::Execution("boom".to_string()));
        assert!(!other.is_account_not_linked());
        assert!(!RealtimeError::NotConnected.is_account_not_linked());
    }

    #[test]
    fn test_turn_detection_serialization() {
        let json = serde_json::to_value(TurnDetectionConfig::default()).unwrap();
        assert_eq!(json["type"], "server_vad");
    }

    #[tokio::test]
    async fn test_session_events_channel() {
        let (tx, mut events) = SessionEvents::channel(4);
        tx.send(Ok(SessionEvent::InputAudioTimeoutTriggered))
            .await
            .unwrap();
        drop(tx);

        assert!(matches!(
            events.next().await,
            Some(Ok(SessionEvent::InputAudioTimeoutTriggered))
        ));
        assert!(events.next().await.is_none());
    }
}
