//! Per-connection bridge between a client socket and a realtime session.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::OutboundFrame;
use super::registry::SessionRegistry;
use super::serializer::serialize_event;
use crate::core::realtime::{
    BoxedSessionFactory, OpenedSession, RealtimeError, RealtimeResult, SessionEvents,
};
use crate::core::tools::ToolError;

/// Default page where users link third-party accounts.
pub const DEFAULT_LINK_ACCOUNT_URL: &str = "https://platform.aci.dev/linked-accounts";

/// Lifecycle phase of one bridged connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgePhase::Connecting => "connecting",
            BridgePhase::Active => "active",
            BridgePhase::Closing => "closing",
            BridgePhase::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Opens sessions for client connections and relays their events.
pub struct RealtimeBridge {
    factory: BoxedSessionFactory,
    registry: SessionRegistry,
    link_account_url: String,
}

impl fmt::Debug for RealtimeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeBridge")
            .field("sessions", &self.registry.len())
            .field("link_account_url", &self.link_account_url)
            .finish()
    }
}

impl RealtimeBridge {
    pub fn new(factory: BoxedSessionFactory, link_account_url: impl Into<String>) -> Self {
        Self {
            factory,
            registry: SessionRegistry::new(),
            link_account_url: link_account_url.into(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a session for `key` and start relaying its events to `connection`.
    ///
    /// On error nothing is registered. A session already registered under
    /// `key` is released and its client connection told to close before the
    /// new one is registered. Returns the entry id to pass to
    /// [`RealtimeBridge::send_audio`] and [`RealtimeBridge::disconnect`].
    pub async fn connect(
        &self,
        key: &str,
        connection: mpsc::Sender<OutboundFrame>,
    ) -> RealtimeResult<u64> {
        debug!(session_id = %key, phase = %BridgePhase::Connecting, "Opening realtime session");

        let OpenedSession {
            handle,
            events,
            mut scope,
        } = self.factory.open().await.inspect_err(|e| {
            error!(session_id = %key, "Failed to open realtime session: {}", e);
        })?;

        if let Some(previous) = self.registry.take(key) {
            info!(session_id = %key, entry_id = previous.id(), "Superseding previous session for reused key");
            previous.supersede().await;
        }

        let forwarder = EventForwarder {
            key: key.to_string(),
            connection: connection.clone(),
            link_account_url: self.link_account_url.clone(),
        };
        scope.attach(tokio::spawn(forwarder.run(events, scope.token())));

        let (entry_id, displaced) = self.registry.register(key, handle, scope, connection);
        if let Some(previous) = displaced {
            warn!(session_id = %key, entry_id = previous.id(), "Concurrent connect displaced a session");
            previous.supersede().await;
        }

        info!(session_id = %key, entry_id, phase = %BridgePhase::Active, "Realtime session active");
        Ok(entry_id)
    }

    /// Forward gated audio to the session registered as `entry_id` under `key`.
    ///
    /// Returns `Ok(false)` when that entry is gone or was superseded; the
    /// audio is dropped.
    pub async fn send_audio(&self, key: &str, entry_id: u64, audio: Bytes) -> RealtimeResult<bool> {
        let Some(handle) = self.registry.lookup(key, entry_id) else {
            return Ok(false);
        };
        handle.send_audio(audio).await?;
        Ok(true)
    }

    /// Release the session registered by a connection.
    ///
    /// Only the entry created for `entry_id` is released, so a superseded
    /// connection cannot tear down its successor.
    pub async fn disconnect(&self, key: &str, entry_id: u64) -> bool {
        debug!(session_id = %key, entry_id, phase = %BridgePhase::Closing, "Releasing realtime session");
        let released = self.registry.release_entry(key, entry_id).await;
        info!(session_id = %key, entry_id, released, phase = %BridgePhase::Closed, "Realtime session closed");
        released
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}

/// Relays one session's events to its client connection.
struct EventForwarder {
    key: String,
    connection: mpsc::Sender<OutboundFrame>,
    link_account_url: String,
}

impl EventForwarder {
    async fn run(self, mut events: SessionEvents, cancel: CancellationToken) {
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = events.next() => item,
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!(session_id = %self.key, "Realtime session error: {}", e);
                    if let Some(message) = self.remediation_message(&e) {
                        self.send_remediation(message, &cancel).await;
                    }
                    break;
                }
                None => {
                    debug!(session_id = %self.key, "Realtime event stream ended");
                    break;
                }
            };

            let frame = OutboundFrame::Event(serialize_event(&event));
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = self.connection.send(frame) => sent,
            };
            if sent.is_err() {
                debug!(session_id = %self.key, "Client connection closed, stopping relay");
                break;
            }
        }
    }

    fn remediation_message(&self, err: &RealtimeError) -> Option<String> {
        match err {
            RealtimeError::Tool(ToolError::AccountNotLinked { app, .. }) => Some(format!(
                "Your {} account is not linked. Link it at {} and try again.",
                app, self.link_account_url
            )),
            _ => None,
        }
    }

    async fn send_remediation(&self, message: String, cancel: &CancellationToken) {
        let frame = OutboundFrame::Event(serde_json::json!({
            "type": "error",
            "error": message,
        }));
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = self.connection.send(frame) => sent,
        };
        if let Err(e) = sent {
            warn!(session_id = %self.key, "Failed to send account link notice: {}", e);
        }
    }
}
