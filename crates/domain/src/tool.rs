//! Static tool schema types. Tools are defined as explicit records, not
//! reflected from handler signatures (Design Notes item 3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The LLM-facing description of a tool: name, prose description, and a
/// JSON Schema for its parameters. Produced statically from the tool
/// registry in `cl-tools`, not derived at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The result of dispatching a `ToolCall`: a status-coded string the
/// model consumes verbatim (§4.5), plus whether it represents a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ToolResult {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ToolResult {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
