//! Realtime conversational session module.
//!
//! A [`SessionFactory`] opens sessions against a realtime model. Each opened
//! session hands back an audio input handle, an event stream and a
//! [`ScopeToken`] whose release tears down every task the session spawned.
//!
//! # Supported Providers
//!
//! - **OpenAI Realtime API** - Full duplex audio with GPT-4o

mod base;
mod events;
pub mod openai;
mod scope;

pub use base::{
    BoxedSessionFactory, OpenedSession, RealtimeConfig, RealtimeError, RealtimeResult,
    RealtimeSession, SessionEventSender, SessionEvents, SessionFactory, TurnDetectionConfig,
};
pub use events::{
    GuardrailResult, HistoryContent, HistoryItem, RawModelEvent, SessionEvent,
};
pub use openai::{OpenAIRealtimeFactory, OpenAIRealtimeSession};
pub use scope::ScopeToken;
