//! Bridge between browser connections and realtime sessions.
//!
//! - [`SessionRegistry`] tracks live sessions by client session id
//! - [`RealtimeBridge`] opens sessions and relays their events
//! - [`serialize_event`] maps session events to client JSON

mod manager;
mod registry;
mod serializer;

pub use manager::{BridgePhase, DEFAULT_LINK_ACCOUNT_URL, RealtimeBridge};
pub use registry::{SessionEntry, SessionRegistry};
pub use serializer::serialize_event;

/// Frame queued for the client socket's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// JSON text frame
    Event(serde_json::Value),
    /// Close the socket
    Close,
}
