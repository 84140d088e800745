//! REST surface for UI-originated actions (§4.7, §6.3). These routes
//! drive the same engine operations the tool layer does, but are
//! addressed by exact path ids rather than fuzzy description matching,
//! and every outcome is also relayed to the assistant as a system
//! message so its next turn reflects what the UI just did.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cl_domain::error::Error;
use cl_domain::recipe::StepStatus;
use cl_engine::RecipeSnapshot;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmBody {
    #[serde(default)]
    pub force_cancel_timer: bool,
}

fn map_engine_error(e: Error) -> (StatusCode, Json<Value>) {
    let status = match &e {
        Error::SessionNotFound(_)
        | Error::RecipeNotLoaded
        | Error::RecipeNotFound(_)
        | Error::StepNotFound(_)
        | Error::TimerNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

async fn snapshot_and_message(state: &AppState, session_id: &str, message: String) -> impl IntoResponse {
    let Some(handle) = state.sessions.get(session_id) else {
        return map_engine_error(Error::SessionNotFound(session_id.to_string())).into_response();
    };
    match handle.get_state().await {
        Ok(state) => (StatusCode::OK, Json(json!({ "state": state, "message": message }))).into_response(),
        Err(e) => map_engine_error(e).into_response(),
    }
}

/// `POST /sessions/{session_id}/steps/{step_id}/confirm`
pub async fn confirm_step(
    State(state): State<AppState>,
    Path((session_id, step_id)): Path<(String, String)>,
    body: Option<Json<ConfirmBody>>,
) -> impl IntoResponse {
    let force_cancel_timer = body.map(|b| b.0.force_cancel_timer).unwrap_or_default();

    let Some(handle) = state.sessions.get(&session_id) else {
        return map_engine_error(Error::SessionNotFound(session_id)).into_response();
    };

    let snapshot: RecipeSnapshot = match handle.get_state().await {
        Ok(s) => s,
        Err(e) => return map_engine_error(e).into_response(),
    };
    let Some(step) = snapshot.steps.iter().find(|s| s.id == step_id) else {
        return map_engine_error(Error::StepNotFound(step_id)).into_response();
    };

    if step.status == StepStatus::Ready {
        if let Err(e) = handle.start_step(step_id.clone()).await {
            return map_engine_error(e).into_response();
        }
    }

    match handle.confirm_step_done(step_id.clone(), force_cancel_timer).await {
        Ok(()) => {
            if let Some(assistant) = state.sessions.get_assistant(&session_id) {
                assistant
                    .inject_system_message(format!("The UI confirmed step \"{step_id}\" is done."))
                    .await;
            }
            snapshot_and_message(&state, &session_id, format!("[DONE] {step_id} confirmed complete"))
                .await
                .into_response()
        }
        Err(Error::TimerActive { step_id, remaining_secs }) => {
            if let Some(assistant) = state.sessions.get_assistant(&session_id) {
                assistant
                    .inject_system_message(format!(
                        "The UI tried to confirm \"{step_id}\" but its timer still has {remaining_secs}s left. Ask the user whether to cancel the timer."
                    ))
                    .await;
            }
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "TIMER_ACTIVE",
                    "step_id": step_id,
                    "remaining_secs": remaining_secs,
                    "message": format!("[TIMER_ACTIVE] step {step_id} has {remaining_secs}s remaining on its timer"),
                })),
            )
                .into_response()
        }
        Err(e) => map_engine_error(e).into_response(),
    }
}

/// `POST /sessions/{session_id}/steps/{step_id}/start-timer`
pub async fn start_timer(
    State(state): State<AppState>,
    Path((session_id, step_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(handle) = state.sessions.get(&session_id) else {
        return map_engine_error(Error::SessionNotFound(session_id)).into_response();
    };

    let snapshot: RecipeSnapshot = match handle.get_state().await {
        Ok(s) => s,
        Err(e) => return map_engine_error(e).into_response(),
    };
    let Some(step) = snapshot.steps.iter().find(|s| s.id == step_id) else {
        return map_engine_error(Error::StepNotFound(step_id)).into_response();
    };

    if step.status == StepStatus::Ready {
        if let Err(e) = handle.start_step(step_id.clone()).await {
            return map_engine_error(e).into_response();
        }
    }

    match handle.start_timer_for_step(step_id.clone()).await {
        Ok(()) => {
            if let Some(assistant) = state.sessions.get_assistant(&session_id) {
                assistant
                    .inject_system_message(format!("The UI started the timer for \"{step_id}\"."))
                    .await;
            }
            snapshot_and_message(&state, &session_id, format!("[TIMER RUNNING] timer started for {step_id}"))
                .await
                .into_response()
        }
        Err(e) => map_engine_error(e).into_response(),
    }
}

/// `POST /sessions/{session_id}/timers/{timer_id}/cancel`
pub async fn cancel_timer(
    State(state): State<AppState>,
    Path((session_id, timer_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(handle) = state.sessions.get(&session_id) else {
        return map_engine_error(Error::SessionNotFound(session_id)).into_response();
    };

    match handle.cancel_timer(timer_id.clone()).await {
        Ok(()) => {
            if let Some(assistant) = state.sessions.get_assistant(&session_id) {
                assistant
                    .inject_system_message(format!("The UI cancelled timer \"{timer_id}\"."))
                    .await;
            }
            snapshot_and_message(&state, &session_id, format!("[DONE] timer {timer_id} cancelled"))
                .await
                .into_response()
        }
        Err(e) => map_engine_error(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        for e in [
            Error::SessionNotFound("s1".into()),
            Error::RecipeNotLoaded,
            Error::RecipeNotFound("r1".into()),
            Error::StepNotFound("st1".into()),
            Error::TimerNotFound("t1".into()),
        ] {
            let (status, _) = map_engine_error(e);
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn other_errors_map_to_400() {
        let (status, _) = map_engine_error(Error::StepNotReady("st1".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = map_engine_error(Error::TimerActive {
            step_id: "st1".into(),
            remaining_secs: 10,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
