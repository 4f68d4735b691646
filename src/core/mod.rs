pub mod agents;
pub mod audio_gate;
pub mod bridge;
pub mod realtime;
pub mod tools;

pub use audio_gate::{AudioGate, DEFAULT_SILENCE_THRESHOLD};
pub use bridge::{BridgePhase, OutboundFrame, RealtimeBridge, SessionRegistry, serialize_event};
pub use realtime::{
    BoxedSessionFactory, OpenAIRealtimeFactory, RealtimeConfig, RealtimeError, RealtimeResult,
    RealtimeSession, ScopeToken, SessionEvent, SessionEvents, SessionFactory,
};
