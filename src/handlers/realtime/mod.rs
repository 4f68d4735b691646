//! Browser-facing realtime WebSocket handler
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **audio**: `{"type": "audio", "data": [int16, ...]}`. Other types are ignored.
//!
//! ## Server → Client
//!
//! One JSON text frame per session event, tagged by `type`: `agent_start`,
//! `agent_end`, `handoff`, `tool_start`, `tool_end`, `audio` (base64 PCM16),
//! `audio_interrupted`, `audio_end`, `history_updated`, `history_added`,
//! `guardrail_tripped`, `raw_model_event`, `error`.

mod handler;
pub mod messages;

pub use handler::ws_handler;
pub use messages::ClientMessage;
