//! Concrete `OutputChannel`/`AssistantHandle` implementations registered
//! into the session registry when a session's WebSocket connects
//! (§6.5: the assistant-collaborator interface is out-of-scope
//! internals from the core's point of view — this is the stub that
//! satisfies it for this repo).

use async_trait::async_trait;
use cl_domain::error::Result;
use cl_sessions::{AssistantHandle, OutputChannel};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Wraps a session's outbound WebSocket channel. `send_event` never
/// blocks indefinitely: the channel is bounded and a full channel means
/// the client isn't reading fast enough, which we treat as a dropped
/// send rather than stalling the event handler task.
pub struct WsOutputChannel {
    tx: mpsc::Sender<Value>,
}

impl WsOutputChannel {
    pub fn new(tx: mpsc::Sender<Value>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OutputChannel for WsOutputChannel {
    async fn send_event(&self, kind: &str, payload: Value) -> Result<()> {
        let frame = json!({ "event": kind, "data": payload });
        self.tx
            .send(frame)
            .await
            .map_err(|_| cl_domain::error::Error::Other("session transport closed".into()))
    }
}

/// Logs assistant system-message injections. The real LLM/voice
/// assistant this would route to lives outside this core (§6.5); until
/// one is wired in, this is the visible record of what would have been
/// said.
pub struct LoggingAssistantHandle {
    session_id: String,
}

impl LoggingAssistantHandle {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into() }
    }
}

#[async_trait]
impl AssistantHandle for LoggingAssistantHandle {
    async fn inject_system_message(&self, text: String) {
        tracing::info!(session_id = %self.session_id, message = %text, "assistant system message");
    }
}
