//! Process-wide registry of recipe sessions (§4.4). An explicit owned
//! value passed into the transport layer — not a module-level singleton
//! (Design Notes item 2).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cl_domain::error::{Error, Result};
use cl_domain::event::EventSink;
use cl_domain::recipe::Recipe;
use cl_engine::{spawn_engine, EngineHandle};
use parking_lot::RwLock;
use serde_json::Value;

/// A handle to the voice/LLM assistant for one session, used to inject
/// system-role messages (§6.5). The core does not care how this routes
/// to the model.
#[async_trait]
pub trait AssistantHandle: Send + Sync {
    async fn inject_system_message(&self, text: String);
}

/// The outbound UI channel for one session: `control`, `timer_list`,
/// `recipe_state`, `session_info`, `recipe_message`, `recipe_error`,
/// `manager_system`.
#[async_trait]
pub trait OutputChannel: Send + Sync {
    async fn send_event(&self, kind: &str, payload: Value) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct KitchenTimerState {
    pub running: bool,
    pub seconds: i64,
}

struct SessionEntry {
    engine: Option<EngineHandle>,
    recipe_id: Option<String>,
    recipe_payload: Option<Value>,
    assistant: Option<Arc<dyn AssistantHandle>>,
    output_channel: Option<Arc<dyn OutputChannel>>,
    kitchen_timer: KitchenTimerState,
}

impl Default for SessionEntry {
    fn default() -> Self {
        SessionEntry {
            engine: None,
            recipe_id: None,
            recipe_payload: None,
            assistant: None,
            output_channel: None,
            kitchen_timer: KitchenTimerState::default(),
        }
    }
}

/// Registry keyed by session id. Lookups/inserts/removes are
/// concurrency-safe; each session's own state is otherwise only ever
/// mutated by the worker handling that session's transport stream.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) the engine for a session. If an engine
    /// already exists it is stopped first and awaited to completion
    /// before the new one is installed (I8).
    pub async fn create(
        &self,
        session_id: &str,
        recipe: Recipe,
        sink: Arc<dyn EventSink>,
    ) -> EngineHandle {
        let prior = {
            let mut sessions = self.sessions.write();
            let entry = sessions.entry(session_id.to_string()).or_default();
            entry.engine.take()
        };
        if let Some(old_engine) = prior {
            tracing::warn!(session_id, "session already exists, stopping old engine");
            let _ = old_engine.stop().await;
        }

        let engine = spawn_engine(recipe, sink);
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.engine = Some(engine.clone());
        engine
    }

    pub fn get(&self, session_id: &str) -> Option<EngineHandle> {
        self.sessions.read().get(session_id).and_then(|e| e.engine.clone())
    }

    pub fn set_session_recipe(&self, session_id: &str, recipe_id: Option<String>) {
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.recipe_id = recipe_id;
    }

    pub fn get_session_recipe(&self, session_id: &str) -> Option<String> {
        self.sessions.read().get(session_id).and_then(|e| e.recipe_id.clone())
    }

    pub fn set_session_recipe_payload(&self, session_id: &str, payload: Option<Value>) {
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.recipe_payload = payload;
    }

    pub fn get_session_recipe_payload(&self, session_id: &str) -> Option<Value> {
        self.sessions
            .read()
            .get(session_id)
            .and_then(|e| e.recipe_payload.clone())
    }

    pub fn register_assistant(&self, session_id: &str, assistant: Arc<dyn AssistantHandle>) {
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.assistant = Some(assistant);
    }

    pub fn get_assistant(&self, session_id: &str) -> Option<Arc<dyn AssistantHandle>> {
        self.sessions.read().get(session_id).and_then(|e| e.assistant.clone())
    }

    pub fn register_output_channel(&self, session_id: &str, channel: Arc<dyn OutputChannel>) {
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.output_channel = Some(channel);
    }

    pub fn get_output_channel(&self, session_id: &str) -> Option<Arc<dyn OutputChannel>> {
        self.sessions
            .read()
            .get(session_id)
            .and_then(|e| e.output_channel.clone())
    }

    /// Forwards a typed control event through the session's output
    /// channel. Fails with `NoOutputChannel` if none is registered.
    pub async fn send_control_event(&self, session_id: &str, action: &str, data: Option<Value>) -> Result<()> {
        let channel = self
            .get_output_channel(session_id)
            .ok_or_else(|| Error::NoOutputChannel(session_id.to_string()))?;

        let mut payload = serde_json::json!({ "action": action });
        if let Some(data) = data {
            payload["data"] = data;
        }
        channel.send_event("control", payload).await
    }

    pub fn set_kitchen_timer_state(&self, session_id: &str, running: bool, seconds: Option<i64>) {
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.kitchen_timer.running = running;
        if let Some(seconds) = seconds {
            entry.kitchen_timer.seconds = seconds;
        }
    }

    pub fn get_kitchen_timer_state(&self, session_id: &str) -> KitchenTimerState {
        self.sessions
            .read()
            .get(session_id)
            .map(|e| e.kitchen_timer.clone())
            .unwrap_or_default()
    }

    /// Removes every entry for a session and stops its engine. Safe to
    /// call more than once.
    pub async fn cleanup(&self, session_id: &str) {
        let entry = self.sessions.write().remove(session_id);
        if let Some(entry) = entry {
            if let Some(engine) = entry.engine {
                let _ = engine.stop().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::event::RecordingSink;

    fn sample_recipe() -> Recipe {
        Recipe::from_json_str(
            r#"{"recipe": {"id": "r1", "title": "Toast"}, "steps": [
                {"id": "a", "descr": "toast it", "type": "immediate"}
            ]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_replaces_and_stops_prior_engine() {
        let registry = SessionRegistry::new();
        let sink: Arc<dyn EventSink> = Arc::new(RecordingSink::new());

        let first = registry.create("s1", sample_recipe(), sink.clone()).await;
        first.start().await.unwrap();

        let second = registry.create("s1", sample_recipe(), sink).await;
        second.start().await.unwrap();

        // The prior engine was stopped: its actor task is gone, so any
        // further call against it fails rather than silently succeeding.
        assert!(first.get_state().await.is_err());
        assert!(second.get_state().await.is_ok());
    }

    #[tokio::test]
    async fn send_control_event_fails_without_channel() {
        let registry = SessionRegistry::new();
        let err = registry.send_control_event("ghost", "timer_start", None).await;
        assert!(matches!(err, Err(Error::NoOutputChannel(_))));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let registry = SessionRegistry::new();
        let sink: Arc<dyn EventSink> = Arc::new(RecordingSink::new());
        registry.create("s1", sample_recipe(), sink).await;
        registry.cleanup("s1").await;
        registry.cleanup("s1").await;
        assert!(registry.get("s1").is_none());
    }
}
