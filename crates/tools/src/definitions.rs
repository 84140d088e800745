//! Static tool definitions exposed to the LLM (§4.5).

use cl_domain::tool::ToolDefinition;

pub fn build_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_available_recipes".into(),
            description: "Enumerate the recipes available to cook.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "start_recipe".into(),
            description: "Load a recipe and start its engine for this session.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "recipe_id": { "type": "string", "description": "Recipe id from list_available_recipes" }
                },
            }),
        },
        ToolDefinition {
            name: "stop_recipe_session".into(),
            description: "Stop and clean up the current recipe session.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "get_current_step".into(),
            description: "Describe the currently active step and any steps ready to start.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "get_recipe_state".into(),
            description: "Return a structured snapshot of the recipe (for UI consumption, not normally narrated).".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "start_step".into(),
            description: "Transition a ready step to active. Identify it by step_id or by step_description.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "step_id": { "type": "string" },
                    "step_description": { "type": "string", "description": "Natural-language description of the step to match" }
                },
            }),
        },
        ToolDefinition {
            name: "start_timer_for_step".into(),
            description: "Begin the countdown timer for a timer-type step that is already active.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "step_id": { "type": "string" }
                },
                "required": ["step_id"],
            }),
        },
        ToolDefinition {
            name: "confirm_step_done".into(),
            description: "Mark a step complete, unlocking its successors. Identify it by step_id or by step_description.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "step_id": { "type": "string" },
                    "step_description": { "type": "string" },
                    "force_cancel_timer": { "type": "boolean", "description": "Cancel a running timer for this step instead of refusing" }
                },
            }),
        },
        ToolDefinition {
            name: "get_active_timers".into(),
            description: "List every timer currently running, soonest first.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "start_kitchen_timer".into(),
            description: "Start an ad-hoc kitchen timer independent of any recipe step.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "seconds": { "type": "integer" },
                    "label": { "type": "string" }
                },
                "required": ["seconds"],
            }),
        },
        ToolDefinition {
            name: "pause_kitchen_timer".into(),
            description: "Pause the ad-hoc kitchen timer.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "resume_kitchen_timer".into(),
            description: "Resume the ad-hoc kitchen timer, optionally resetting its remaining seconds.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "seconds": { "type": "integer" }
                },
            }),
        },
        ToolDefinition {
            name: "reset_kitchen_timer".into(),
            description: "Reset the ad-hoc kitchen timer to a new duration.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "seconds": { "type": "integer" }
                },
            }),
        },
        ToolDefinition {
            name: "repeat_step".into(),
            description: "Alias for get_current_step, used when the user asks to repeat the instruction.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        },
    ]
}
