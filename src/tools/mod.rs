//! Tool schema definitions and dispatch.
//!
//! Defines the tools an external chat agent can call (`ping`, the user CRUD
//! tools, and `run_workflow`) and routes [`ToolCall`]s to their
//! implementations.
//!
//! Tool errors are always returned as structured JSON strings
//! (`{"error": "..."}`), never panics or `Err` variants, so a failing call
//! cannot take down the calling session.

pub mod session;

use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::bot::{JobSpec, WorkflowOrchestrator};
use crate::config::AppConfig;
use crate::registry::{UserPatch, UserRegistry};

/// JSON-schema description of one tool.
#[derive(Clone, Debug, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

/// A tool invocation as sent by the caller.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub call_id: String,
    #[serde(alias = "name")]
    pub fn_name: String,
    #[serde(default, alias = "arguments")]
    pub fn_arguments: Value,
}

impl ToolCall {
    pub fn new(fn_name: impl Into<String>, fn_arguments: Value) -> Self {
        Self {
            call_id: String::new(),
            fn_name: fn_name.into(),
            fn_arguments,
        }
    }
}

/// Fallbacks for `run_workflow` arguments the caller leaves out.
#[derive(Clone, Debug, Default)]
pub struct JobDefaults {
    pub bot_id: Option<String>,
    pub payload: Option<Value>,
}

impl JobDefaults {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bot_id: config.bot_id.clone(),
            payload: config.payload.clone(),
        }
    }
}

/// Everything a tool implementation may touch.
#[derive(Clone)]
pub struct ToolContext {
    pub registry: UserRegistry,
    /// `None` when no remote base URL is configured; `run_workflow` then errors.
    pub orchestrator: Option<Arc<WorkflowOrchestrator>>,
    pub job_defaults: JobDefaults,
    /// Cancelled when the caller goes away; aborts in-flight workflow runs.
    pub cancel: CancellationToken,
}

/// Define the tool schemas.
pub fn define_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "ping",
            description: "Check that the tool server is responding. Returns \"pong\".",
            schema: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "create_user",
            description: "Create a new user. Returns the stored user with its generated id.",
            schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Display name"},
                    "email": {"type": "string", "description": "Email address"},
                    "role": {"type": "string", "description": "Role, defaults to \"user\""}
                },
                "required": ["name", "email"]
            }),
        },
        ToolSpec {
            name: "read_user",
            description: "Get details of a user by their id.",
            schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "The user's id"}
                },
                "required": ["user_id"]
            }),
        },
        ToolSpec {
            name: "list_users",
            description: "List all users. Takes no parameters; each entry has id, name, email and role.",
            schema: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "update_user",
            description: "Update a user's details. Only the fields given are changed.",
            schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string"},
                    "name": {"type": "string"},
                    "email": {"type": "string"},
                    "role": {"type": "string"}
                },
                "required": ["user_id"]
            }),
        },
        ToolSpec {
            name: "delete_user",
            description: "Delete a user by id.",
            schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string"}
                },
                "required": ["user_id"]
            }),
        },
        ToolSpec {
            name: "run_workflow",
            description: "Launch a remote bot workflow, wait for it to finish and return a \
                          consolidated report of every intermediate step. Omitted arguments \
                          fall back to the configured defaults.",
            schema: json!({
                "type": "object",
                "properties": {
                    "bot_id": {"type": "string", "description": "Bot to launch"},
                    "payload": {"description": "Initiating payload, any JSON value"},
                    "token": {"type": "string", "description": "Bearer token override"}
                }
            }),
        },
    ]
}

/// Dispatch a tool call to its implementation.
///
/// Always returns a `String`: a JSON payload, a plain-text message, or a
/// JSON error object `{"error": "..."}`.
pub async fn dispatch_tool_call(call: &ToolCall, ctx: &ToolContext) -> String {
    tracing::debug!(tool = %call.fn_name, call_id = %call.call_id, "Dispatching tool call");

    match call.fn_name.as_str() {
        "ping" => "pong".to_string(),
        "create_user" => dispatch_create_user(call, &ctx.registry),
        "read_user" => dispatch_read_user(call, &ctx.registry),
        "list_users" => to_json("list_users", &ctx.registry.list()),
        "update_user" => dispatch_update_user(call, &ctx.registry),
        "delete_user" => dispatch_delete_user(call, &ctx.registry),
        "run_workflow" => dispatch_run_workflow(call, ctx).await,
        unknown => error_json(format!("Unknown tool: {unknown}")),
    }
}

fn dispatch_create_user(call: &ToolCall, registry: &UserRegistry) -> String {
    let Some(name) = str_arg(call, "name") else {
        return error_json("create_user: missing or invalid 'name' argument");
    };
    let Some(email) = str_arg(call, "email") else {
        return error_json("create_user: missing or invalid 'email' argument");
    };

    match registry.create(name, email, str_arg(call, "role")) {
        Ok(user) => to_json("create_user", &user),
        Err(e) => error_json(format!("create_user: {e}")),
    }
}

fn dispatch_read_user(call: &ToolCall, registry: &UserRegistry) -> String {
    let Some(user_id) = str_arg(call, "user_id") else {
        return error_json("read_user: missing or invalid 'user_id' argument");
    };

    match registry.read(user_id) {
        Ok(user) => to_json("read_user", &user),
        Err(e) => error_json(format!("read_user: {e}")),
    }
}

fn dispatch_update_user(call: &ToolCall, registry: &UserRegistry) -> String {
    let Some(user_id) = str_arg(call, "user_id") else {
        return error_json("update_user: missing or invalid 'user_id' argument");
    };

    let patch = UserPatch {
        name: str_arg(call, "name").map(str::to_string),
        email: str_arg(call, "email").map(str::to_string),
        role: str_arg(call, "role").map(str::to_string),
    };

    match registry.update(user_id, patch) {
        Ok(user) => to_json("update_user", &user),
        Err(e) => error_json(format!("update_user: {e}")),
    }
}

fn dispatch_delete_user(call: &ToolCall, registry: &UserRegistry) -> String {
    let Some(user_id) = str_arg(call, "user_id") else {
        return error_json("delete_user: missing or invalid 'user_id' argument");
    };

    match registry.delete(user_id) {
        Ok(_) => format!("User {user_id} deleted successfully"),
        Err(e) => error_json(format!("delete_user: {e}")),
    }
}

/// Build a [`JobSpec`] from arguments plus configured defaults and run it.
async fn dispatch_run_workflow(call: &ToolCall, ctx: &ToolContext) -> String {
    let Some(orchestrator) = &ctx.orchestrator else {
        return error_json(
            "run_workflow: no remote base URL configured (set FLOWBOT_BASE_URL or --base-url)",
        );
    };

    let bot_id = match str_arg(call, "bot_id")
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .or_else(|| ctx.job_defaults.bot_id.clone())
    {
        Some(b) => b,
        None => {
            return error_json("run_workflow: missing 'bot_id' argument and no default bot configured");
        }
    };

    let payload = match call
        .fn_arguments
        .get("payload")
        .filter(|p| !p.is_null())
        .cloned()
        .or_else(|| ctx.job_defaults.payload.clone())
    {
        Some(p) => p,
        None => {
            return error_json(
                "run_workflow: missing 'payload' argument and no default payload configured",
            );
        }
    };

    let mut spec = JobSpec::new(bot_id, payload);
    if let Some(token) = str_arg(call, "token").filter(|t| !t.is_empty()) {
        spec = spec.with_token(token);
    }

    match orchestrator.run_workflow(&spec, &ctx.cancel).await {
        Ok(report) => to_json("run_workflow", &report),
        Err(e) => error_json(format!("run_workflow failed: {e}")),
    }
}

fn str_arg<'a>(call: &'a ToolCall, key: &str) -> Option<&'a str> {
    call.fn_arguments.get(key).and_then(Value::as_str)
}

fn error_json(message: impl Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

fn to_json<T: Serialize>(tool: &str, value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| error_json(format!("{tool}: failed to serialize result: {e}")))
}
