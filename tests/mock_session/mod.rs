//! Scripted realtime session factory shared by integration tests.
//!
//! Sessions record the audio they receive tagged with the order they were
//! opened in (starting at 1), hand their event senders to the test and count
//! scope releases.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use voice_relay_gateway::core::realtime::{
    OpenedSession, RealtimeError, RealtimeResult, RealtimeSession, ScopeToken, SessionEventSender,
    SessionEvents, SessionFactory,
};

#[derive(Default)]
pub struct Recorder {
    audio: Mutex<Vec<(usize, Bytes)>>,
    senders: Mutex<Vec<SessionEventSender>>,
    opened: AtomicUsize,
    released: AtomicUsize,
    fail_open: AtomicBool,
}

impl Recorder {
    pub fn audio(&self) -> Vec<Bytes> {
        self.audio
            .lock()
            .unwrap()
            .iter()
            .map(|(_, audio)| audio.clone())
            .collect()
    }

    /// Audio received by the `session`-th opened session.
    pub fn audio_for(&self, session: usize) -> Vec<Bytes> {
        self.audio
            .lock()
            .unwrap()
            .iter()
            .filter(|(index, _)| *index == session)
            .map(|(_, audio)| audio.clone())
            .collect()
    }

    /// Event sender of the most recently opened session.
    pub fn latest_sender(&self) -> SessionEventSender {
        self.senders
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session opened")
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn fail_next_opens(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }
}

struct ScriptedSession {
    index: usize,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl RealtimeSession for ScriptedSession {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.recorder.audio.lock().unwrap().push((self.index, audio));
        Ok(())
    }

    fn current_agent(&self) -> String {
        "Assistant".to_string()
    }
}

pub struct ScriptedFactory {
    recorder: Arc<Recorder>,
}

impl ScriptedFactory {
    pub fn new() -> (Arc<Self>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let factory = Arc::new(Self {
            recorder: recorder.clone(),
        });
        (factory, recorder)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> RealtimeResult<OpenedSession> {
        if self.recorder.fail_open.load(Ordering::SeqCst) {
            return Err(RealtimeError::ConnectionFailed(
                "upstream refused".to_string(),
            ));
        }
        let index = self.recorder.opened.fetch_add(1, Ordering::SeqCst) + 1;

        let (tx, events) = SessionEvents::channel(16);
        self.recorder.senders.lock().unwrap().push(tx);

        let mut scope = ScopeToken::new();
        let cancel = scope.token();
        let recorder = self.recorder.clone();
        scope.attach(tokio::spawn(async move {
            cancel.cancelled().await;
            recorder.released.fetch_add(1, Ordering::SeqCst);
        }));

        Ok(OpenedSession {
            handle: Arc::new(ScriptedSession {
                index,
                recorder: self.recorder.clone(),
            }),
            events,
            scope,
        })
    }
}
