//! End-to-end tests over a real listener: HTTP routes and the WebSocket bridge.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use voice_relay_gateway::core::audio_gate::pack_pcm16_le;
use voice_relay_gateway::core::realtime::SessionEvent;
use voice_relay_gateway::{ServerConfig, routes, state::AppState};

mod mock_session;

use mock_session::{Recorder, ScriptedFactory};

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    recorder: Arc<Recorder>,
    _static_dir: TempDir,
}

async fn start_server() -> TestServer {
    let static_dir = TempDir::new().unwrap();
    std::fs::write(
        static_dir.path().join("index.html"),
        "<html><body>voice relay</body></html>",
    )
    .unwrap();
    std::fs::write(static_dir.path().join("app.js"), "console.log('ready');").unwrap();

    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.static_dir = static_dir.path().to_path_buf();

    let (factory, recorder) = ScriptedFactory::new();
    let state = AppState::with_factory(config, factory);
    let app = routes::create_app_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        recorder,
        _static_dir: static_dir,
    }
}

/// Poll until `check` holds or two seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    check()
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[tokio::test]
async fn test_health_reports_active_sessions() {
    let server = start_server().await;

    let body: Value = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({ "status": "OK", "active_sessions": 0 }));
}

#[tokio::test]
async fn test_serves_client_page_and_assets() {
    let server = start_server().await;

    let index = reqwest::get(format!("http://{}/", server.addr)).await.unwrap();
    assert_eq!(index.status(), 200);
    assert!(index.text().await.unwrap().contains("voice relay"));

    let asset = reqwest::get(format!("http://{}/app.js", server.addr))
        .await
        .unwrap();
    assert_eq!(asset.status(), 200);
    assert_eq!(asset.text().await.unwrap(), "console.log('ready');");

    let missing = reqwest::get(format!("http://{}/missing.js", server.addr))
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].is_string());
}

// =============================================================================
// WebSocket bridge
// =============================================================================

#[tokio::test]
async fn test_websocket_round_trip() {
    let server = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws/session-1", server.addr))
        .await
        .unwrap();

    let recorder = server.recorder.clone();
    assert!(eventually(|| recorder.opened() == 1).await);
    assert_eq!(server.state.bridge.active_sessions(), 1);
    assert_eq!(server.state.ws_connection_count(), 1);

    // Silent frame is gated, voiced frame is forwarded, other types ignored
    let silent = json!({ "type": "audio", "data": [0, 0, 0, 0, 0, 0, 0, 0, 0, 7] });
    let voiced = json!({ "type": "audio", "data": [100, -200, 300, 0] });
    let other = json!({ "type": "text", "text": "hello" });
    for frame in [silent, other, voiced] {
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    }
    ws.send(Message::Text("not json".into())).await.unwrap();

    assert!(eventually(|| recorder.audio().len() == 1).await);
    assert_eq!(recorder.audio()[0], pack_pcm16_le(&[100, -200, 300, 0]));

    recorder
        .latest_sender()
        .send(Ok(SessionEvent::ToolEnd {
            agent: "Github Assistant".to_string(),
            tool: "GITHUB__LIST_ISSUES".to_string(),
            output: json!(42),
        }))
        .await
        .unwrap();

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "tool_end");
    assert_eq!(frame["tool"], "GITHUB__LIST_ISSUES");
    assert_eq!(frame["output"], "42");

    ws.close(None).await.unwrap();

    let state = server.state.clone();
    assert!(eventually(|| state.bridge.active_sessions() == 0).await);
    assert!(eventually(|| recorder.released() == 1).await);
    assert!(eventually(|| state.ws_connection_count() == 0).await);
}

#[tokio::test]
async fn test_setup_failure_closes_socket() {
    let server = start_server().await;
    server.recorder.fail_next_opens(true);

    let (mut ws, _) = connect_async(format!("ws://{}/ws/session-2", server.addr))
        .await
        .unwrap();

    let closed = timeout(Duration::from_secs(2), async {
        while let Some(msg) = ws.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let state = server.state.clone();
    assert_eq!(state.bridge.active_sessions(), 0);
    assert!(eventually(|| state.ws_connection_count() == 0).await);
}

#[tokio::test]
async fn test_reconnect_with_same_id_replaces_session() {
    let server = start_server().await;
    let url = format!("ws://{}/ws/shared", server.addr);

    let (mut first, _) = connect_async(url.as_str()).await.unwrap();
    let recorder = server.recorder.clone();
    assert!(eventually(|| recorder.opened() == 1).await);

    let (_second, _) = connect_async(url.as_str()).await.unwrap();
    assert!(eventually(|| recorder.opened() == 2).await);
    assert!(eventually(|| recorder.released() == 1).await);

    // The superseded socket is closed by the server
    let closed = timeout(Duration::from_secs(2), async {
        while let Some(msg) = first.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                return true;
            }
        }
        false
    })
    .await;
    assert!(matches!(closed, Ok(true)));

    // Its teardown leaves the new session in place
    drop(first);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(server.state.bridge.active_sessions(), 1);
    assert_eq!(recorder.released(), 1);
}
