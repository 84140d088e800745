use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use cl_domain::error::Error;
use cl_domain::recipe::{Recipe, RecipeDocument};
use cl_tools::RecipeProvider;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::event_handler;
use crate::output::{LoggingAssistantHandle, WsOutputChannel};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum InboundFrame {
    Start {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "sampleRate")]
        #[allow(dead_code)]
        sample_rate: Option<i64>,
        #[serde(default, rename = "customParameters")]
        custom_parameters: CustomParameters,
    },
    Audio {
        #[allow(dead_code)]
        data: Option<String>,
    },
    Stop {},
    Interrupt {},
}

#[derive(Debug, Default, Deserialize)]
struct CustomParameters {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default, rename = "recipeId")]
    recipe_id: Option<String>,
    #[serde(default, rename = "recipePayload")]
    recipe_payload: Option<RecipeDocument>,
    #[serde(default, rename = "resumeStepIndex")]
    #[allow(dead_code)]
    resume_step_index: Option<i64>,
}

/// `GET /v1/sessions/ws` — upgrades to WebSocket. The first inbound
/// frame must be `start`; everything else is a protocol error and the
/// connection is closed.
pub async fn session_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let Some((session_id, params)) = wait_for_start(&mut ws_stream).await else {
        tracing::warn!("session closed before a start frame arrived");
        return;
    };

    let recipe = match load_starting_recipe(&state, &params).await {
        Ok(recipe) => recipe,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "failed to load starting recipe");
            let _ = send_json(&mut ws_sink, &serde_json::json!({
                "event": "recipe_error",
                "data": { "message": e.to_string() },
            }))
            .await;
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<serde_json::Value>(64);
    state
        .sessions
        .register_output_channel(&session_id, std::sync::Arc::new(WsOutputChannel::new(outbound_tx)));
    state
        .sessions
        .register_assistant(&session_id, std::sync::Arc::new(LoggingAssistantHandle::new(session_id.clone())));

    let (sink, rx) = event_handler::channel();
    let engine = state.sessions.create(&session_id, recipe, sink).await;
    event_handler::spawn_drain(session_id.clone(), state.sessions.clone(), engine.clone(), rx);

    if let Err(e) = engine.start().await {
        tracing::warn!(session_id = %session_id, error = %e, "failed to start engine");
    }

    tracing::info!(session_id = %session_id, "session connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if send_json(&mut ws_sink, &frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                Ok(InboundFrame::Stop {}) | Ok(InboundFrame::Interrupt {}) => break,
                Ok(InboundFrame::Audio { .. }) => {
                    // STT is out of scope; audio frames are acknowledged by
                    // simply not erroring and otherwise ignored.
                }
                Ok(InboundFrame::Start { .. }) => {
                    tracing::debug!(session_id = %session_id, "ignoring duplicate start frame");
                }
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "ignoring unparseable frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.sessions.cleanup(&session_id).await;
    tracing::info!(session_id = %session_id, "session disconnected");
}

async fn wait_for_start(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<(String, CustomParameters)> {
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(InboundFrame::Start { session_id, custom_parameters, .. }) =
                    serde_json::from_str::<InboundFrame>(&text)
                {
                    return Some((session_id, custom_parameters));
                }
            }
        }
        None
    })
    .await;
    result.unwrap_or(None)
}

async fn load_starting_recipe(state: &AppState, params: &CustomParameters) -> cl_domain::error::Result<Recipe> {
    if let Some(doc) = params.recipe_payload.clone() {
        return Recipe::from_document(doc);
    }
    if params.mode.as_deref() == Some("discovery") && params.recipe_id.is_none() {
        return Err(Error::ToolInvalidArgument(
            "discovery mode requires a recipeId or recipePayload".into(),
        ));
    }
    state.recipes.load(params.recipe_id.as_deref()).await
}

async fn send_json(sink: &mut (impl SinkExt<Message> + Unpin), value: &serde_json::Value) -> Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
