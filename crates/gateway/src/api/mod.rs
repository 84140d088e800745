pub mod auth;
pub mod health;
pub mod recipes;
pub mod steps;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Builds the full API router. `/health` and the session WebSocket are
/// public; the recipe catalog and the UI-action REST surface sit behind
/// the bearer-token middleware when one is configured (dev mode when
/// not).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/v1/sessions/ws", get(ws::session_ws));

    let protected = Router::new()
        .route("/v1/recipes", get(recipes::list_recipes))
        .route("/v1/recipes/:id", get(recipes::get_recipe))
        .route("/sessions/:session_id/steps/:step_id/confirm", post(steps::confirm_step))
        .route("/sessions/:session_id/steps/:step_id/start-timer", post(steps::start_timer))
        .route("/sessions/:session_id/timers/:timer_id/cancel", post(steps::cancel_timer))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
