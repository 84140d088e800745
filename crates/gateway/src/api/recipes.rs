//! Recipe catalog routes (expansion, SPEC_FULL §4.8): a thin read-only
//! view over `RecipeRegistry` for UIs that want to browse/select a
//! recipe before opening a session.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cl_tools::RecipeProvider;
use serde_json::json;

use crate::state::AppState;

/// `GET /v1/recipes` — the catalog summary list.
pub async fn list_recipes(State(state): State<AppState>) -> impl IntoResponse {
    let recipes = state.recipes.list().await;
    Json(json!({
        "recipes": recipes.into_iter().map(|r| json!({ "id": r.id, "title": r.title })).collect::<Vec<_>>(),
    }))
}

/// `GET /v1/recipes/{id}` — the full recipe document.
pub async fn get_recipe(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.recipes.load(Some(&id)).await {
        Ok(recipe) => (
            StatusCode::OK,
            Json(json!({
                "id": recipe.id,
                "title": recipe.title,
                "estimated_total": recipe.estimated_total,
                "difficulty": recipe.difficulty,
                "locale": recipe.locale,
                "ingredients": recipe.ingredients,
                "utensils": recipe.utensils,
                "notes": recipe.notes,
                "steps": recipe.steps(),
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
