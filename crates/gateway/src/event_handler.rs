//! Translates engine events into outbound UI events and assistant nudges
//! (§4.6). Runs as its own task per session so the engine actor's
//! `EventSink::emit` never blocks on transport or assistant I/O — it
//! just drops the event onto an unbounded channel this task drains.

use std::sync::Arc;

use cl_domain::event::{Event, EventKind, EventSink};
use cl_engine::EngineHandle;
use cl_sessions::SessionRegistry;
use serde_json::json;
use tokio::sync::mpsc;

/// `EventSink` half: cheap, non-blocking, handed to `spawn_engine`.
pub struct SessionEventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink for SessionEventSink {
    fn emit(&self, event: Event) {
        // The receiver may already be gone if the session tore down
        // between the engine emitting and this call; that's fine.
        let _ = self.tx.send(event);
    }
}

/// Builds an unregistered sink/receiver pair. The sink is handed to
/// `spawn_engine` (via `SessionRegistry::create`); the receiver is
/// handed to `spawn_drain` once the resulting `EngineHandle` is known
/// (the handle only exists after the engine is spawned, so the two
/// halves are built separately rather than in one call).
pub fn channel() -> (Arc<SessionEventSink>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(SessionEventSink { tx }), rx)
}

/// Spawns the task that drains `rx`, translating each event for
/// `session_id` until the sink (and the engine holding it) is dropped.
pub fn spawn_drain(
    session_id: String,
    sessions: Arc<SessionRegistry>,
    engine: EngineHandle,
    mut rx: mpsc::UnboundedReceiver<Event>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_event(&session_id, &sessions, &engine, event).await;
        }
    });
}

async fn handle_event(session_id: &str, sessions: &SessionRegistry, engine: &EngineHandle, event: Event) {
    if let Err(e) = translate_to_ui(session_id, sessions, engine, &event.kind).await {
        tracing::warn!(session_id, error = %e, "failed to forward event to UI, dropping");
    }
    nudge_assistant(session_id, sessions, &event.kind).await;
}

async fn translate_to_ui(
    session_id: &str,
    sessions: &SessionRegistry,
    engine: &EngineHandle,
    kind: &EventKind,
) -> cl_domain::error::Result<()> {
    match kind {
        EventKind::StepStart { step_id, .. } => {
            send_recipe_state(session_id, sessions, engine).await?;
            sessions
                .send_control_event(session_id, "focus_step", Some(json!({ "step_id": step_id })))
                .await
        }
        EventKind::StepCompleted { .. }
        | EventKind::StepReady { .. }
        | EventKind::AllCompleted { .. }
        | EventKind::TimerSet { .. } => send_recipe_state(session_id, sessions, engine).await,
        EventKind::TimerListUpdate { count } => {
            send_recipe_state(session_id, sessions, engine).await?;
            let timers = engine.get_state().await.map(|s| {
                s.steps
                    .into_iter()
                    .filter_map(|s| s.timer.map(|t| json!({ "step_id": s.id, "remaining_secs": t.remaining_secs })))
                    .collect::<Vec<_>>()
            });
            let channel = sessions
                .get_output_channel(session_id)
                .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
            channel
                .send_event("timer_list", json!({ "timers": timers.unwrap_or_default(), "count": count }))
                .await
        }
        EventKind::TimerStarted { timer_id, step_id, duration_secs, label } => {
            sessions
                .send_control_event(
                    session_id,
                    "timer_start",
                    Some(json!({
                        "timer_id": timer_id,
                        "step_id": step_id,
                        "duration_secs": duration_secs,
                        "label": label,
                    })),
                )
                .await
        }
        EventKind::TimerCancelled { timer_id, step_id, label, remaining_secs } => {
            sessions
                .send_control_event(
                    session_id,
                    "timer_cancel",
                    Some(json!({
                        "timer_id": timer_id,
                        "step_id": step_id,
                        "label": label,
                        "remaining_secs": remaining_secs,
                    })),
                )
                .await
        }
        EventKind::TimerDone { step_id, descr, requires_confirm } => {
            let channel = sessions
                .get_output_channel(session_id)
                .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
            channel
                .send_event(
                    "manager_system",
                    json!({ "type": "timer_done", "step_id": step_id, "descr": descr, "requires_confirm": requires_confirm }),
                )
                .await
        }
        EventKind::ReminderTick { step_id } => {
            let channel = sessions
                .get_output_channel(session_id)
                .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
            channel
                .send_event("manager_system", json!({ "type": "reminder_tick", "step_id": step_id }))
                .await
        }
        EventKind::Message { message } => {
            let channel = sessions
                .get_output_channel(session_id)
                .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
            channel.send_event("recipe_message", json!({ "message": message })).await
        }
        EventKind::Error { msg } => {
            let channel = sessions
                .get_output_channel(session_id)
                .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
            channel.send_event("recipe_error", json!({ "message": msg })).await
        }
    }
}

async fn send_recipe_state(session_id: &str, sessions: &SessionRegistry, engine: &EngineHandle) -> cl_domain::error::Result<()> {
    let state = engine.get_state().await?;
    let channel = sessions
        .get_output_channel(session_id)
        .ok_or_else(|| cl_domain::error::Error::NoOutputChannel(session_id.to_string()))?;
    channel.send_event("recipe_state", serde_json::to_value(&state)?).await
}

async fn nudge_assistant(session_id: &str, sessions: &SessionRegistry, kind: &EventKind) {
    let Some(assistant) = sessions.get_assistant(session_id) else {
        return;
    };
    match kind {
        EventKind::TimerDone { descr, requires_confirm: true, .. } => {
            assistant
                .inject_system_message(format!(
                    "The timer for \"{descr}\" is done. Let the user know and ask them to confirm the step."
                ))
                .await;
        }
        EventKind::TimerDone { descr, requires_confirm: false, .. } => {
            assistant
                .inject_system_message(format!(
                    "(system) \"{descr}\"'s timer finished and the step auto-completed."
                ))
                .await;
        }
        EventKind::ReminderTick { step_id } => {
            assistant
                .inject_system_message(format!("Gently remind the user about step \"{step_id}\"."))
                .await;
        }
        EventKind::AllCompleted { recipe_title } => {
            assistant
                .inject_system_message(format!(
                    "The recipe \"{recipe_title}\" is complete. Give the user a warm closing line."
                ))
                .await;
        }
        _ => {}
    }
}
