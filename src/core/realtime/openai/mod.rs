//! OpenAI Realtime API module.
//!
//! # Features
//!
//! - Bidirectional audio streaming
//! - Input transcription and server-side VAD
//! - Function calling with agent handoffs
//! - Output guardrails over assistant transcripts
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod config;
mod messages;
mod session;

pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, PCM16_AUDIO_FORMAT, realtime_voice_or_default,
};
pub use messages::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolDef};
pub use session::{OpenAIRealtimeFactory, OpenAIRealtimeSession};
