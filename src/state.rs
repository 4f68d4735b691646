//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::agents::{BlockedPhraseGuardrail, OutputGuardrail, build_agent_graph};
use crate::core::audio_gate::AudioGate;
use crate::core::bridge::RealtimeBridge;
use crate::core::realtime::{BoxedSessionFactory, OpenAIRealtimeFactory, RealtimeResult};
use crate::core::tools::AciClient;

/// Reasons a WebSocket connection is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("Server at capacity. Please try again later.")]
    GlobalLimitReached,
    #[error("Too many connections from your IP address.")]
    PerIpLimitReached,
}

impl IntoResponse for ConnectionLimitError {
    fn into_response(self) -> Response {
        let status = match self {
            ConnectionLimitError::GlobalLimitReached => StatusCode::SERVICE_UNAVAILABLE,
            ConnectionLimitError::PerIpLimitReached => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub bridge: Arc<RealtimeBridge>,
    pub audio_gate: AudioGate,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("bridge", &self.bridge)
            .field("audio_gate", &self.audio_gate)
            .field("ws_connections", &self.ws_connection_count())
            .finish()
    }
}

impl AppState {
    /// Build the agent graph and the OpenAI session factory from `config`.
    pub async fn new(config: ServerConfig) -> RealtimeResult<Arc<Self>> {
        let aci = match config.aci_api_key.as_deref() {
            Some(key) => {
                let client = AciClient::new(key, config.aci_base_url.as_str())?;
                info!(base_url = %client.base_url(), "Tool catalog configured");
                Some(Arc::new(client))
            }
            None => None,
        };

        let mut guardrails: Vec<Arc<dyn OutputGuardrail>> = Vec::new();
        let blocked = BlockedPhraseGuardrail::new(&config.output_blocked_phrases);
        if !blocked.is_empty() {
            guardrails.push(Arc::new(blocked));
        }

        let root = build_agent_graph(aci, &config.linked_accounts(), guardrails).await;
        info!(
            agent = %root.name(),
            handoffs = root.handoffs().len(),
            "Agent graph ready"
        );

        let mut factory = OpenAIRealtimeFactory::new(config.realtime_config(), root)?;
        if let Some(url) = &config.realtime_url {
            factory = factory.with_url(url.clone());
        }

        Ok(Self::with_factory(config, Arc::new(factory)))
    }

    /// Build state around an existing session factory.
    pub fn with_factory(config: ServerConfig, factory: BoxedSessionFactory) -> Arc<Self> {
        let bridge = RealtimeBridge::new(factory, config.aci_link_account_url.clone());
        let audio_gate = AudioGate::new(config.audio_silence_threshold);
        Arc::new(Self {
            config,
            bridge: Arc::new(bridge),
            audio_gate,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max = self.config.max_websocket_connections.unwrap_or(usize::MAX);
        self.ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        let mut count = self.ip_connections.entry(ip).or_insert(0);
        if *count >= self.config.max_connections_per_ip {
            drop(count);
            self.ip_connections.remove_if(&ip, |_, c| *c == 0);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *count += 1;
        Ok(())
    }

    /// Return a slot reserved by [`AppState::try_acquire_connection`].
    pub fn release_connection(&self, ip: IpAddr) {
        if self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .is_err()
        {
            warn!(%ip, "Connection released with no connections tracked");
        }

        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, c| *c == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}
