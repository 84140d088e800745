//! Tool dispatch: validates arguments, drives one engine operation, and
//! renders the status-coded string the LLM consumes (§4.5).

use std::sync::Arc;

use cl_domain::error::Error;
use cl_domain::event::EventSink;
use cl_engine::{EngineHandle, RecipeSnapshot, StepSnapshot};
use cl_sessions::SessionRegistry;
use serde_json::Value;

use crate::matching::{find_step, Matched};
use crate::provider::RecipeProvider;

/// Everything a tool call needs: which session it belongs to (injected
/// by the transport, never trusted from the model), and the shared
/// registry/recipe-source it acts through.
pub struct ToolContext {
    pub registry: Arc<SessionRegistry>,
    pub recipes: Arc<dyn RecipeProvider>,
    pub sink: Arc<dyn EventSink>,
    pub session_id: String,
}

/// Dispatches one tool call by name. `arguments` is the raw JSON object
/// from the model; any `session_id` key in it is ignored — the ambient
/// session id on `ctx` always wins.
pub async fn dispatch_tool(ctx: &ToolContext, name: &str, arguments: &Value) -> String {
    match name {
        "list_available_recipes" => list_available_recipes(ctx).await,
        "start_recipe" => start_recipe(ctx, arg_str(arguments, "recipe_id")).await,
        "stop_recipe_session" => stop_recipe_session(ctx).await,
        "get_current_step" | "repeat_step" => get_current_step(ctx).await,
        "get_recipe_state" => get_recipe_state(ctx).await,
        "start_step" => {
            start_step(ctx, arg_str(arguments, "step_id"), arg_str(arguments, "step_description")).await
        }
        "start_timer_for_step" => {
            let Some(step_id) = arg_str(arguments, "step_id") else {
                return "[ERROR] start_timer_for_step requires step_id".to_string();
            };
            start_timer_for_step(ctx, step_id).await
        }
        "confirm_step_done" => {
            confirm_step_done(
                ctx,
                arg_str(arguments, "step_id"),
                arg_str(arguments, "step_description"),
                arguments.get("force_cancel_timer").and_then(Value::as_bool).unwrap_or(false),
            )
            .await
        }
        "get_active_timers" => get_active_timers(ctx).await,
        "start_kitchen_timer" => {
            let Some(seconds) = arguments.get("seconds").and_then(Value::as_i64) else {
                return "[ERROR] start_kitchen_timer requires seconds".to_string();
            };
            let label = arg_str(arguments, "label");
            start_kitchen_timer(ctx, seconds, label)
        }
        "pause_kitchen_timer" => pause_kitchen_timer(ctx),
        "resume_kitchen_timer" => resume_kitchen_timer(ctx, arguments.get("seconds").and_then(Value::as_i64)),
        "reset_kitchen_timer" => reset_kitchen_timer(ctx, arguments.get("seconds").and_then(Value::as_i64)),
        other => format!("[ERROR] unknown tool: {other}"),
    }
}

fn arg_str(arguments: &Value, key: &str) -> Option<String> {
    arguments.get(key).and_then(Value::as_str).map(str::to_string)
}

fn engine(ctx: &ToolContext) -> Option<EngineHandle> {
    ctx.registry.get(&ctx.session_id)
}

fn describe_state(state: &RecipeSnapshot) -> String {
    let active: Vec<&str> = state
        .steps
        .iter()
        .filter(|s| matches!(s.status, cl_domain::recipe::StepStatus::Active | cl_domain::recipe::StepStatus::WaitingAck))
        .map(|s| s.id.as_str())
        .collect();
    let ready: Vec<&str> = state
        .steps
        .iter()
        .filter(|s| s.status == cl_domain::recipe::StepStatus::Ready)
        .map(|s| s.id.as_str())
        .collect();
    format!(
        "active: [{}], ready: [{}]",
        active.join(", "),
        ready.join(", ")
    )
}

fn blocked(current: impl std::fmt::Display, action: impl std::fmt::Display) -> String {
    format!("[BLOCKED]\nCurrent: {current}\nAction: {action}")
}

async fn engine_error(ctx: &ToolContext, err: Error) -> String {
    match err {
        Error::SessionNotFound(_) => "[ERROR] No session".to_string(),
        Error::RecipeNotLoaded => "[INFO] No recipe in progress".to_string(),
        Error::RecipeNotFound(id) => format!("[ERROR] recipe not found: {id}"),
        Error::StepNotFound(id) => format!("[ERROR] unknown step: {id}"),
        Error::StepNotReady(id) => {
            let current = describe_or_unknown(ctx).await;
            blocked(current, format!("wait for step {id} to become ready before starting it"))
        }
        Error::StepBlocked { step_id, blocked_by } => {
            let current = describe_or_unknown(ctx).await;
            blocked(current, format!("step {step_id} is waiting on: {}", blocked_by.join(", ")))
        }
        Error::StepAlreadyCompleted(id) => format!("[INFO] step {id} is already completed"),
        Error::TimerAlreadyRunning(id) => blocked(
            describe_or_unknown(ctx).await,
            format!("a timer is already running for {id}"),
        ),
        Error::TimerDurationError(id) => format!("[ERROR] step {id} has no timer to start"),
        Error::TimerActive { step_id, remaining_secs } => format!(
            "[TIMER_ACTIVE] step {step_id} has {remaining_secs}s remaining on its timer; pass force_cancel_timer to confirm anyway"
        ),
        Error::ToolInvalidArgument(msg) => format!("[ERROR] {msg}"),
        Error::ToolPrecondition(msg) => blocked(describe_or_unknown(ctx).await, msg),
        other => format!("[ERROR] {other}"),
    }
}

async fn describe_or_unknown(ctx: &ToolContext) -> String {
    match engine(ctx) {
        Some(handle) => match handle.get_state().await {
            Ok(state) => describe_state(&state),
            Err(_) => "unknown".to_string(),
        },
        None => "no recipe in progress".to_string(),
    }
}

async fn list_available_recipes(ctx: &ToolContext) -> String {
    let recipes = ctx.recipes.list().await;
    if recipes.is_empty() {
        return "[INFO] No recipes are available".to_string();
    }
    let lines: Vec<String> = recipes.iter().map(|r| format!("- {} ({})", r.title, r.id)).collect();
    format!("[INFO] Available recipes:\n{}", lines.join("\n"))
}

async fn start_recipe(ctx: &ToolContext, recipe_id: Option<String>) -> String {
    let recipe = match ctx.recipes.load(recipe_id.as_deref()).await {
        Ok(r) => r,
        Err(e) => return format!("[ERROR] {e}"),
    };
    let title = recipe.title.clone();
    let id = recipe.id.clone();
    let step_refs: Vec<String> = recipe.steps().iter().map(|s| format!("{}: {}", s.id, s.descr)).collect();

    let handle = ctx.registry.create(&ctx.session_id, recipe, ctx.sink.clone()).await;
    if let Err(e) = handle.start().await {
        return format!("[ERROR] failed to start recipe: {e}");
    }
    ctx.registry.set_session_recipe(&ctx.session_id, Some(id));

    format!(
        "[STARTED] Started recipe '{title}'.\nStep reference:\n{}",
        step_refs.join("\n")
    )
}

async fn stop_recipe_session(ctx: &ToolContext) -> String {
    if engine(ctx).is_none() {
        return "[INFO] No recipe in progress".to_string();
    }
    ctx.registry.cleanup(&ctx.session_id).await;
    ctx.registry.set_session_recipe(&ctx.session_id, None);
    "[DONE] Recipe session stopped".to_string()
}

async fn get_current_step(ctx: &ToolContext) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    match handle.get_state().await {
        Ok(state) => {
            let active: Vec<&StepSnapshot> = state
                .steps
                .iter()
                .filter(|s| matches!(s.status, cl_domain::recipe::StepStatus::Active | cl_domain::recipe::StepStatus::WaitingAck))
                .collect();
            let ready: Vec<&StepSnapshot> = state
                .steps
                .iter()
                .filter(|s| s.status == cl_domain::recipe::StepStatus::Ready)
                .collect();
            if active.is_empty() && ready.is_empty() {
                return "[INFO] No step is currently active or ready".to_string();
            }
            let mut lines = Vec::new();
            for s in &active {
                lines.push(format!("active: {} — {}", s.id, s.descr));
            }
            for s in &ready {
                lines.push(format!("ready: {} — {}", s.id, s.descr));
            }
            format!("[INFO] {}", lines.join("\n"))
        }
        Err(e) => engine_error(ctx, e).await,
    }
}

async fn get_recipe_state(ctx: &ToolContext) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    match handle.get_state().await {
        Ok(state) => serde_json::to_string(&state).unwrap_or_else(|_| "[ERROR] failed to serialize state".to_string()),
        Err(e) => engine_error(ctx, e).await,
    }
}

async fn start_step(ctx: &ToolContext, step_id: Option<String>, step_description: Option<String>) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    let state = match handle.get_state().await {
        Ok(s) => s,
        Err(e) => return engine_error(ctx, e).await,
    };
    let ready: Vec<&StepSnapshot> = state
        .steps
        .iter()
        .filter(|s| s.status == cl_domain::recipe::StepStatus::Ready)
        .collect();

    let resolved_id = match find_step(&ready, step_id.as_deref(), step_description.as_deref()) {
        Matched::Unique(s) => s.id.clone(),
        Matched::Ambiguous(candidates) => {
            let names: Vec<String> = candidates.iter().map(|s| format!("{} ({})", s.descr, s.id)).collect();
            return blocked(describe_state(&state), format!("specify which step: {}", names.join(", ")));
        }
        Matched::NoMatch => {
            return blocked(describe_state(&state), "no ready step matches that description");
        }
    };

    match handle.start_step(resolved_id.clone()).await {
        Ok(()) => format!("[STARTED] {resolved_id} is now active"),
        Err(e) => engine_error(ctx, e).await,
    }
}

async fn start_timer_for_step(ctx: &ToolContext, step_id: String) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    match handle.start_timer_for_step(step_id.clone()).await {
        Ok(()) => format!("[TIMER RUNNING] timer started for {step_id}"),
        Err(e) => engine_error(ctx, e).await,
    }
}

async fn confirm_step_done(
    ctx: &ToolContext,
    step_id: Option<String>,
    step_description: Option<String>,
    force_cancel_timer: bool,
) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    let state = match handle.get_state().await {
        Ok(s) => s,
        Err(e) => return engine_error(ctx, e).await,
    };
    let candidates: Vec<&StepSnapshot> = state
        .steps
        .iter()
        .filter(|s| matches!(s.status, cl_domain::recipe::StepStatus::Active | cl_domain::recipe::StepStatus::WaitingAck))
        .collect();

    let resolved_id = match find_step(&candidates, step_id.as_deref(), step_description.as_deref()) {
        Matched::Unique(s) => s.id.clone(),
        Matched::Ambiguous(candidates) => {
            let names: Vec<String> = candidates.iter().map(|s| format!("{} ({})", s.descr, s.id)).collect();
            return blocked(describe_state(&state), format!("specify which step: {}", names.join(", ")));
        }
        Matched::NoMatch => {
            if let Some(id) = step_id {
                id
            } else {
                return "[INFO] No active step matches that description".to_string();
            }
        }
    };

    match handle.confirm_step_done(resolved_id.clone(), force_cancel_timer).await {
        Ok(()) => format!("[DONE] {resolved_id} confirmed complete"),
        Err(e) => engine_error(ctx, e).await,
    }
}

async fn get_active_timers(ctx: &ToolContext) -> String {
    let Some(handle) = engine(ctx) else {
        return "[INFO] No recipe in progress".to_string();
    };
    match handle.get_state().await {
        Ok(state) => {
            let running: Vec<String> = state
                .steps
                .iter()
                .filter_map(|s| {
                    s.timer.as_ref().map(|t| {
                        format!("{}: {}s remaining", s.id, t.remaining_secs)
                    })
                })
                .collect();
            if running.is_empty() {
                "[INFO] No timers are running".to_string()
            } else {
                format!("[INFO] {}", running.join("\n"))
            }
        }
        Err(e) => engine_error(ctx, e).await,
    }
}

fn start_kitchen_timer(ctx: &ToolContext, seconds: i64, label: Option<String>) -> String {
    ctx.registry.set_kitchen_timer_state(&ctx.session_id, true, Some(seconds));
    match label {
        Some(l) => format!("[STARTED] kitchen timer '{l}' started for {seconds}s"),
        None => format!("[STARTED] kitchen timer started for {seconds}s"),
    }
}

fn pause_kitchen_timer(ctx: &ToolContext) -> String {
    ctx.registry.set_kitchen_timer_state(&ctx.session_id, false, None);
    "[DONE] kitchen timer paused".to_string()
}

fn resume_kitchen_timer(ctx: &ToolContext, seconds: Option<i64>) -> String {
    ctx.registry.set_kitchen_timer_state(&ctx.session_id, true, seconds);
    "[STARTED] kitchen timer resumed".to_string()
}

fn reset_kitchen_timer(ctx: &ToolContext, seconds: Option<i64>) -> String {
    let seconds = seconds.unwrap_or(0);
    ctx.registry.set_kitchen_timer_state(&ctx.session_id, true, Some(seconds));
    format!("[DONE] kitchen timer reset to {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::event::RecordingSink;
    use cl_domain::recipe::Recipe;

    struct FixedRecipeProvider {
        raw: &'static str,
        id: &'static str,
        title: &'static str,
    }

    #[async_trait::async_trait]
    impl RecipeProvider for FixedRecipeProvider {
        async fn list(&self) -> Vec<crate::provider::RecipeSummary> {
            vec![crate::provider::RecipeSummary {
                id: self.id.to_string(),
                title: self.title.to_string(),
            }]
        }

        async fn load(&self, _recipe_id: Option<&str>) -> cl_domain::error::Result<Recipe> {
            Recipe::from_json_str(self.raw)
        }
    }

    const ROAST_CHICKEN: &str = r#"{"recipe": {"id": "roast-chicken", "title": "Roast Chicken"}, "steps": [
        {"id": "preheat", "descr": "Preheat the oven to 425F", "type": "immediate", "auto_start": true, "next": ["roast"]},
        {"id": "roast", "descr": "Roast the chicken", "type": "timer", "duration": "PT50M", "requires_confirm": true, "depends_on": ["preheat"], "auto_start": true}
    ]}"#;

    fn ctx() -> ToolContext {
        ToolContext {
            registry: Arc::new(SessionRegistry::new()),
            recipes: Arc::new(FixedRecipeProvider {
                raw: ROAST_CHICKEN,
                id: "roast-chicken",
                title: "Roast Chicken",
            }),
            sink: Arc::new(RecordingSink::new()),
            session_id: "s1".to_string(),
        }
    }

    #[tokio::test]
    async fn list_recipes_reports_info() {
        let ctx = ctx();
        let out = list_available_recipes(&ctx).await;
        assert!(out.starts_with("[INFO]"));
        assert!(out.contains("Roast Chicken"));
    }

    #[tokio::test]
    async fn start_recipe_then_get_current_step() {
        let ctx = ctx();
        let out = start_recipe(&ctx, None).await;
        assert!(out.starts_with("[STARTED]"));
        assert!(out.contains("preheat:"));

        let out = get_current_step(&ctx).await;
        assert!(out.starts_with("[INFO]"));
        assert!(out.contains("preheat"));
    }

    #[tokio::test]
    async fn confirm_with_description_then_timer_then_blocked_confirm() {
        let ctx = ctx();
        start_recipe(&ctx, None).await;

        let out = confirm_step_done(&ctx, None, Some("preheat the oven".to_string()), false).await;
        assert!(out.starts_with("[DONE]"), "{out}");

        let out = start_timer_for_step(&ctx, "roast".to_string()).await;
        assert!(out.starts_with("[TIMER RUNNING]"), "{out}");

        let out = confirm_step_done(&ctx, Some("roast".to_string()), None, false).await;
        assert!(out.starts_with("[TIMER_ACTIVE]"), "{out}");

        let out = confirm_step_done(&ctx, Some("roast".to_string()), None, true).await;
        assert!(out.starts_with("[DONE]"), "{out}");
    }

    #[tokio::test]
    async fn tool_calls_before_start_recipe_report_no_recipe_in_progress() {
        let ctx = ctx();
        assert_eq!(get_current_step(&ctx).await, "[INFO] No recipe in progress");
        assert_eq!(stop_recipe_session(&ctx).await, "[INFO] No recipe in progress");
    }

    #[tokio::test]
    async fn start_step_on_unready_step_is_blocked() {
        let ctx = ctx();
        start_recipe(&ctx, None).await;
        let out = start_step(&ctx, Some("roast".to_string()), None).await;
        assert!(out.starts_with("[BLOCKED]"), "{out}");
    }
}
