//! OpenAI Realtime session runtime.
//!
//! [`OpenAIRealtimeFactory`] opens one WebSocket per session and spawns a
//! driver task that translates server events into [`SessionEvent`]s, runs the
//! current agent's tools and performs handoffs between agents.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::OPENAI_REALTIME_URL;
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ServerEvent, SessionConfig, ToolDef,
};
use crate::core::agents::{RealtimeAgent, run_output_guardrails};
use crate::core::realtime::base::{
    OpenedSession, RealtimeConfig, RealtimeError, RealtimeResult, RealtimeSession,
    SessionEventSender, SessionEvents, SessionFactory,
};
use crate::core::realtime::events::{HistoryItem, RawModelEvent, SessionEvent};
use crate::core::realtime::scope::ScopeToken;
use crate::core::tools::ToolResult;

/// Capacity of the outgoing client-event channel.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Factory
// =============================================================================

/// Opens OpenAI Realtime sessions that start at a fixed agent.
pub struct OpenAIRealtimeFactory {
    config: RealtimeConfig,
    starting_agent: Arc<RealtimeAgent>,
    url: String,
}

impl OpenAIRealtimeFactory {
    /// Create a factory. Fails when no API key is configured.
    pub fn new(config: RealtimeConfig, starting_agent: Arc<RealtimeAgent>) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "OpenAI API key is required".to_string(),
            ));
        }
        Ok(Self {
            config,
            starting_agent,
            url: OPENAI_REALTIME_URL.to_string(),
        })
    }

    /// Override the realtime endpoint (without the `model` query parameter).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn build_ws_url(&self) -> RealtimeResult<String> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid URL: {}", e)))?;
        url.query_pairs_mut().append_pair("model", &self.config.model);
        Ok(url.to_string())
    }
}

impl std::fmt::Debug for OpenAIRealtimeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIRealtimeFactory")
            .field("model", &self.config.model)
            .field("voice", &self.config.voice)
            .field("url", &self.url)
            .field("starting_agent", &self.starting_agent.name())
            .finish()
    }
}

#[async_trait]
impl SessionFactory for OpenAIRealtimeFactory {
    async fn open(&self) -> RealtimeResult<OpenedSession> {
        let url = self.build_ws_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.config.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, ws_stream) = ws_stream.split();

        let initial = ClientEvent::SessionUpdate {
            session: session_config(&self.config, &self.starting_agent),
        };
        let json = serde_json::to_string(&initial)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        ws_sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, events) = SessionEvents::channel(EVENT_CHANNEL_CAPACITY);
        let current_agent = Arc::new(RwLock::new(self.starting_agent.name().to_string()));

        let mut scope = ScopeToken::new();
        let driver = SessionDriver {
            config: self.config.clone(),
            agent: self.starting_agent.clone(),
            current_agent: current_agent.clone(),
            events: event_tx,
            history: Vec::new(),
            playing_item: None,
            function_names: HashMap::new(),
        };
        scope.attach(tokio::spawn(run_driver(
            driver,
            ws_sink,
            ws_stream,
            outgoing_rx,
            scope.token(),
        )));

        let handle = OpenAIRealtimeSession {
            outgoing: outgoing_tx,
            current_agent,
        };

        Ok(OpenedSession {
            handle: Arc::new(handle),
            events,
            scope,
        })
    }
}

fn session_config(config: &RealtimeConfig, agent: &RealtimeAgent) -> SessionConfig {
    let tools: Vec<ToolDef> = agent
        .function_definitions()
        .into_iter()
        .map(ToolDef::from)
        .collect();
    let has_tools = !tools.is_empty();

    SessionConfig {
        modalities: Some(config.modalities.clone()),
        instructions: Some(agent.instructions().to_string()),
        voice: Some(config.voice.clone()),
        input_audio_format: Some(config.input_audio_format.clone()),
        output_audio_format: Some(config.output_audio_format.clone()),
        input_audio_transcription: config
            .input_audio_transcription
            .clone()
            .map(|model| InputAudioTranscription { model }),
        turn_detection: config.turn_detection.clone(),
        tools: Some(tools),
        tool_choice: has_tools.then(|| "auto".to_string()),
        temperature: config.temperature,
    }
}

// =============================================================================
// Session Handle
// =============================================================================

/// Handle to a live OpenAI Realtime session.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeSession {
    outgoing: mpsc::Sender<ClientEvent>,
    current_agent: Arc<RwLock<String>>,
}

#[async_trait]
impl RealtimeSession for OpenAIRealtimeSession {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.outgoing
            .send(ClientEvent::audio_append(&audio))
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    fn current_agent(&self) -> String {
        self.current_agent.read().clone()
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Result of a tool call run off the driver loop.
struct ToolOutcome {
    call_id: String,
    agent: String,
    tool: String,
    result: ToolResult<String>,
}

/// Per-session state owned by the driver task.
struct SessionDriver {
    config: RealtimeConfig,
    agent: Arc<RealtimeAgent>,
    current_agent: Arc<RwLock<String>>,
    events: SessionEventSender,
    history: Vec<HistoryItem>,
    /// Item whose audio is currently streaming to the client
    playing_item: Option<String>,
    /// call_id -> function name, from `response.output_item.added`
    function_names: HashMap<String, String>,
}

async fn run_driver<S, R>(
    mut driver: SessionDriver,
    mut ws_sink: S,
    mut ws_stream: R,
    mut outgoing_rx: mpsc::Receiver<ClientEvent>,
    cancel: CancellationToken,
) where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut tools: JoinSet<ToolOutcome> = JoinSet::new();

    loop {
        let replies = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Realtime session cancelled, closing WebSocket");
                if let Err(e) = ws_sink.send(Message::Close(None)).await {
                    debug!("Failed to send close frame: {}", e);
                }
                break;
            }

            Some(event) = outgoing_rx.recv() => vec![event],

            msg = ws_stream.next() => match msg {
                Some(Ok(Message::Text(text))) => driver.handle_text(text.as_str(), &mut tools).await,
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Realtime WebSocket closed by server");
                    driver
                        .fail(RealtimeError::ConnectionFailed(
                            "Realtime connection closed by server".to_string(),
                        ))
                        .await;
                    break;
                }
                Some(Err(e)) => {
                    error!("Realtime WebSocket error: {}", e);
                    driver.fail(RealtimeError::WebSocketError(e.to_string())).await;
                    break;
                }
                Some(Ok(_)) => continue,
            },

            Some(joined) = tools.join_next() => match joined {
                Ok(outcome) => driver.handle_tool_outcome(outcome).await,
                Err(e) => {
                    warn!("Tool task failed: {}", e);
                    continue;
                }
            },
        };

        let mut send_failed = false;
        for reply in replies {
            let json = match serde_json::to_string(&reply) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize client event: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                error!("Failed to send WebSocket message: {}", e);
                send_failed = true;
                break;
            }
        }
        if send_failed {
            driver
                .fail(RealtimeError::WebSocketError(
                    "Failed to send to realtime API".to_string(),
                ))
                .await;
            break;
        }
    }

    tools.abort_all();
}

impl SessionDriver {
    async fn emit(&self, event: SessionEvent) {
        if self.events.send(Ok(event)).await.is_err() {
            debug!("Session event receiver dropped");
        }
    }

    async fn fail(&self, err: RealtimeError) {
        if self.events.send(Err(err)).await.is_err() {
            debug!("Session event receiver dropped");
        }
    }

    fn agent_name(&self) -> String {
        self.agent.name().to_string()
    }

    async fn handle_text(
        &mut self,
        text: &str,
        tools: &mut JoinSet<ToolOutcome>,
    ) -> Vec<ClientEvent> {
        let payload: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse server message: {}", e);
                return Vec::new();
            }
        };
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let parsed = serde_json::from_value::<ServerEvent>(payload.clone());
        self.emit(SessionEvent::RawModelEvent {
            data: RawModelEvent {
                event_type: event_type.clone(),
                payload,
            },
        })
        .await;

        match parsed {
            Ok(event) => self.handle_server_event(event, tools).await,
            Err(e) => {
                warn!(event_type = %event_type, "Failed to decode server event: {}", e);
                Vec::new()
            }
        }
    }

    async fn handle_server_event(
        &mut self,
        event: ServerEvent,
        tools: &mut JoinSet<ToolOutcome>,
    ) -> Vec<ClientEvent> {
        match event {
            ServerEvent::Error { error } => {
                warn!("Realtime API error: {}", error);
                self.emit(SessionEvent::Error {
                    error: Some(error.to_string()),
                })
                .await;
            }

            ServerEvent::SessionCreated { session } => {
                info!(realtime_session_id = %session.id, "Realtime session created");
            }

            ServerEvent::SessionUpdated { session } => {
                debug!(realtime_session_id = %session.id, "Realtime session updated");
            }

            ServerEvent::SpeechStarted { .. } => {
                if let Some(item_id) = self.playing_item.take() {
                    self.emit(SessionEvent::AudioInterrupted {
                        item_id: Some(item_id),
                    })
                    .await;
                    return vec![ClientEvent::ResponseCancel];
                }
            }

            ServerEvent::SpeechStopped { .. } => {}

            ServerEvent::InputAudioTimeoutTriggered { .. } => {
                self.emit(SessionEvent::InputAudioTimeoutTriggered).await;
            }

            ServerEvent::ConversationItemCreated { item } => {
                if let Some(history_item) = item.to_history_item() {
                    self.history.push(history_item.clone());
                    self.emit(SessionEvent::HistoryAdded { item: history_item })
                        .await;
                }
            }

            ServerEvent::TranscriptionCompleted {
                item_id,
                content_index,
                transcript,
            } => {
                if let Some(item) = self.history.iter_mut().find(|i| i.item_id == item_id)
                    && let Some(part) = item.content.get_mut(content_index as usize)
                {
                    part.transcript = Some(transcript);
                }
                self.emit_history().await;
            }

            ServerEvent::ConversationItemDeleted { item_id } => {
                self.history.retain(|i| i.item_id != item_id);
                self.emit_history().await;
            }

            ServerEvent::ResponseCreated { .. } => {
                self.emit(SessionEvent::AgentStart {
                    agent: self.agent_name(),
                })
                .await;
            }

            ServerEvent::ResponseDone { response } => {
                debug!(response_id = %response.id, status = ?response.status, "Response done");
                self.playing_item = None;
                self.emit(SessionEvent::AgentEnd {
                    agent: self.agent_name(),
                })
                .await;
            }

            ServerEvent::OutputItemAdded { item } => {
                if let (Some(call_id), Some(name)) = (&item.call_id, &item.name) {
                    self.function_names.insert(call_id.clone(), name.clone());
                }
            }

            ServerEvent::OutputItemDone { item } => {
                self.upsert_history(&item);
                self.emit_history().await;
            }

            ServerEvent::TextDone { item_id, text } => {
                return self.check_guardrails(&item_id, &text).await;
            }

            ServerEvent::AudioTranscriptDone {
                item_id,
                content_index,
                transcript,
            } => {
                if let Some(item) = self.history.iter_mut().find(|i| i.item_id == item_id)
                    && let Some(part) = item.content.get_mut(content_index as usize)
                {
                    part.transcript = Some(transcript.clone());
                }
                self.emit_history().await;
                return self.check_guardrails(&item_id, &transcript).await;
            }

            ServerEvent::AudioDelta {
                item_id,
                content_index,
                delta,
            } => match ServerEvent::decode_audio_delta(&delta) {
                Ok(audio) => {
                    self.playing_item = Some(item_id.clone());
                    self.emit(SessionEvent::Audio {
                        audio: Bytes::from(audio),
                        item_id,
                        content_index,
                    })
                    .await;
                }
                Err(e) => warn!("Failed to decode audio delta: {}", e),
            },

            ServerEvent::AudioDone {
                item_id,
                content_index,
            } => {
                self.playing_item = None;
                self.emit(SessionEvent::AudioEnd {
                    item_id,
                    content_index,
                })
                .await;
            }

            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                let name = name.or_else(|| self.function_names.remove(&call_id));
                return self.handle_function_call(call_id, name, arguments, tools).await;
            }

            ServerEvent::Unknown => {}
        }

        Vec::new()
    }

    async fn handle_function_call(
        &mut self,
        call_id: String,
        name: Option<String>,
        arguments: String,
        tools: &mut JoinSet<ToolOutcome>,
    ) -> Vec<ClientEvent> {
        let Some(name) = name else {
            warn!(call_id = %call_id, "Function call without a name");
            return vec![
                ClientEvent::function_output(call_id, error_output("Unknown function")),
                ClientEvent::ResponseCreate,
            ];
        };

        if let Some(target) = self.agent.find_handoff(&name) {
            let from = self.agent_name();
            let to = target.name().to_string();
            info!(from = %from, to = %to, "Agent handoff");

            self.agent = target;
            *self.current_agent.write() = to.clone();
            self.emit(SessionEvent::Handoff {
                from,
                to: to.clone(),
            })
            .await;

            return vec![
                ClientEvent::SessionUpdate {
                    session: session_config(&self.config, &self.agent),
                },
                ClientEvent::function_output(
                    call_id,
                    serde_json::json!({ "assistant": to }).to_string(),
                ),
                ClientEvent::ResponseCreate,
            ];
        }

        let Some(tool) = self.agent.find_tool(&name) else {
            warn!(tool = %name, agent = %self.agent.name(), "Model called an unknown tool");
            return vec![
                ClientEvent::function_output(
                    call_id,
                    error_output(&format!("Unknown tool: {}", name)),
                ),
                ClientEvent::ResponseCreate,
            ];
        };

        let agent = self.agent_name();
        self.emit(SessionEvent::ToolStart {
            agent: agent.clone(),
            tool: name.clone(),
            arguments: arguments.clone(),
        })
        .await;

        tools.spawn(async move {
            let result = tool.invoke(&arguments).await;
            ToolOutcome {
                call_id,
                agent,
                tool: name,
                result,
            }
        });

        Vec::new()
    }

    async fn handle_tool_outcome(&mut self, outcome: ToolOutcome) -> Vec<ClientEvent> {
        let ToolOutcome {
            call_id,
            agent,
            tool,
            result,
        } = outcome;

        match result {
            Ok(output) => {
                debug!(tool = %tool, "Tool call completed");
                self.emit(SessionEvent::ToolEnd {
                    agent,
                    tool,
                    output: Value::String(output.clone()),
                })
                .await;
                vec![
                    ClientEvent::function_output(call_id, output),
                    ClientEvent::ResponseCreate,
                ]
            }
            Err(e) => {
                warn!(tool = %tool, "Tool call failed: {}", e);
                let output = error_output(&e.to_string());
                self.fail(RealtimeError::from(e)).await;
                vec![
                    ClientEvent::function_output(call_id, output),
                    ClientEvent::ResponseCreate,
                ]
            }
        }
    }

    async fn check_guardrails(&self, item_id: &str, text: &str) -> Vec<ClientEvent> {
        let tripped = run_output_guardrails(self.agent.output_guardrails(), self.agent.name(), text);
        if tripped.is_empty() {
            return Vec::new();
        }

        warn!(item_id = %item_id, guardrails = tripped.len(), "Output guardrail tripped");
        self.emit(SessionEvent::GuardrailTripped {
            guardrail_results: tripped,
            message: text.to_string(),
        })
        .await;
        vec![ClientEvent::ResponseCancel]
    }

    fn upsert_history(&mut self, item: &ConversationItem) {
        let Some(updated) = item.to_history_item() else {
            return;
        };
        match self
            .history
            .iter_mut()
            .find(|i| i.item_id == updated.item_id)
        {
            Some(existing) => *existing = updated,
            None => self.history.push(updated),
        }
    }

    async fn emit_history(&self) {
        self.emit(SessionEvent::HistoryUpdated {
            history: self.history.clone(),
        })
        .await;
    }
}

fn error_output(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_requires_api_key() {
        let agent = Arc::new(RealtimeAgent::new("Assistant", "Be helpful."));
        let result = OpenAIRealtimeFactory::new(RealtimeConfig::default(), agent);
        assert!(matches!(
            result,
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_ws_url_includes_model() {
        let agent = Arc::new(RealtimeAgent::new("Assistant", "Be helpful."));
        let config = RealtimeConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        let factory = OpenAIRealtimeFactory::new(config, agent).unwrap();
        assert_eq!(
            factory.build_ws_url().unwrap(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );

        let custom = factory.with_url("ws://127.0.0.1:9000/realtime");
        assert_eq!(
            custom.build_ws_url().unwrap(),
            "ws://127.0.0.1:9000/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_session_config_advertises_handoffs() {
        let specialist = Arc::new(RealtimeAgent::new("Slack Assistant", "Slack help."));
        let root = RealtimeAgent::new("Assistant", "Triage.").with_handoffs(vec![specialist]);

        let session = session_config(&RealtimeConfig::default(), &root);
        let tools = session.tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "transfer_to_slack_assistant");
        assert_eq!(session.tool_choice.as_deref(), Some("auto"));
        assert_eq!(session.instructions.as_deref(), Some("Triage."));
        assert_eq!(session.voice.as_deref(), Some("alloy"));
    }

    #[test]
    fn test_session_config_without_tools() {
        let agent = RealtimeAgent::new("Assistant", "Be helpful.");
        let session = session_config(&RealtimeConfig::default(), &agent);
        assert!(session.tool_choice.is_none());
        assert_eq!(
            session.input_audio_transcription.map(|t| t.model).as_deref(),
            Some("whisper-1")
        );
    }
}
