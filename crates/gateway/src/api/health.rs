use axum::Json;
use serde_json::{json, Value};

/// `GET /health` — liveness probe (§6.3).
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
