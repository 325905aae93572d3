//! JSON-lines tool session.
//!
//! Each input line is one [`ToolCall`]; each call produces exactly one output
//! line `{"call_id", "name", "output"}`. Calls run concurrently and each reply
//! is written as soon as its call finishes, so replies may come back out of
//! input order; `call_id` pairs them up. Lines that fail to parse produce an
//! `{"error": ...}` line immediately, and the session continues.
//!
//! On cancellation no further input is read; calls already in flight share
//! the same token and are answered before the session returns.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{ToolCall, ToolContext, dispatch_tool_call};

/// Serve tool calls from `reader` until EOF or cancellation.
///
/// Returns the number of lines answered.
pub async fn serve_session<R, W>(reader: R, mut writer: W, ctx: &ToolContext) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut in_flight = FuturesUnordered::new();
    let mut reading = true;
    let mut answered = 0;

    while reading || !in_flight.is_empty() {
        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled(), if reading => {
                tracing::info!(in_flight = in_flight.len(), "Session cancelled");
                reading = false;
                continue;
            }
            Some(response) = in_flight.next(), if !in_flight.is_empty() => response,
            line = lines.next_line(), if reading => {
                let Some(line) = line? else {
                    tracing::debug!("Session input closed");
                    reading = false;
                    continue;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ToolCall>(line) {
                    Ok(call) => {
                        in_flight.push(answer(call, ctx));
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Rejected tool call line: {e}");
                        json!({ "error": format!("invalid tool call: {e}") })
                    }
                }
            }
        };

        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        answered += 1;
    }

    Ok(answered)
}

async fn answer(call: ToolCall, ctx: &ToolContext) -> Value {
    let output = dispatch_tool_call(&call, ctx).await;
    json!({
        "call_id": call.call_id,
        "name": call.fn_name,
        "output": output_value(output),
    })
}

// Structured outputs are embedded as JSON; plain messages stay strings.
fn output_value(output: String) -> Value {
    match serde_json::from_str::<Value>(&output) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::PollSettings;
    use crate::bot::testing::ScriptedBackend;
    use crate::tools::JobDefaults;
    use crate::tools::tests::{context_with_settings, make_context};
    use std::time::Duration;
    use tokio::io::BufReader;

    fn ctx() -> ToolContext {
        make_context(ScriptedBackend::new(vec![]), JobDefaults::default())
    }

    // The scripted backend reports RUNNING forever, so workflows only end on
    // timeout or cancellation.
    fn slow_workflow_ctx(interval: Duration) -> ToolContext {
        context_with_settings(
            ScriptedBackend::new(vec![]),
            JobDefaults::default(),
            PollSettings::new(3, interval),
        )
    }

    const WORKFLOW_THEN_PING: &str = concat!(
        r#"{"call_id": "wf", "name": "run_workflow", "arguments": {"bot_id": "b", "payload": {}}}"#,
        "\n",
        r#"{"call_id": "p", "name": "ping"}"#,
        "\n",
    );

    async fn run(input: &str, ctx: &ToolContext) -> (usize, Vec<Value>) {
        let mut out = Vec::new();
        let answered = serve_session(BufReader::new(input.as_bytes()), &mut out, ctx)
            .await
            .unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (answered, lines)
    }

    #[tokio::test]
    async fn answers_quick_calls_in_input_order() {
        let input = concat!(
            r#"{"call_id": "1", "name": "ping"}"#,
            "\n",
            r#"{"call_id": "2", "name": "create_user", "arguments": {"name": "Ada", "email": "ada@example.com"}}"#,
            "\n",
            r#"{"call_id": "3", "name": "list_users"}"#,
            "\n",
        );
        let (answered, lines) = run(input, &ctx()).await;

        assert_eq!(answered, 3);
        assert_eq!(lines[0], json!({"call_id": "1", "name": "ping", "output": "pong"}));
        assert_eq!(lines[1]["output"]["name"], "Ada");
        assert_eq!(lines[2]["output"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_line_gets_error_and_session_continues() {
        let input = "not json\n\n{\"name\": \"ping\"}\n";
        let (answered, lines) = run(input, &ctx()).await;

        assert_eq!(answered, 2);
        assert!(lines[0]["error"].as_str().unwrap().starts_with("invalid tool call"));
        assert_eq!(lines[1]["output"], "pong");
    }

    #[tokio::test]
    async fn tool_errors_are_embedded_as_objects() {
        let (_, lines) = run("{\"name\": \"teleport\"}\n", &ctx()).await;
        assert_eq!(lines[0]["output"]["error"], "Unknown tool: teleport");
    }

    #[tokio::test]
    async fn quick_call_is_not_blocked_by_running_workflow() {
        let ctx = slow_workflow_ctx(Duration::from_millis(50));
        let (answered, lines) = run(WORKFLOW_THEN_PING, &ctx).await;

        assert_eq!(answered, 2);
        assert_eq!(lines[0], json!({"call_id": "p", "name": "ping", "output": "pong"}));
        assert_eq!(lines[1]["call_id"], "wf");
        assert!(
            lines[1]["output"]["error"]
                .as_str()
                .unwrap()
                .contains("did not finish")
        );
    }

    #[tokio::test]
    async fn cancellation_still_answers_in_flight_calls() {
        let ctx = slow_workflow_ctx(Duration::from_secs(30));
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let (answered, lines) =
            tokio::time::timeout(Duration::from_secs(5), run(WORKFLOW_THEN_PING, &ctx))
                .await
                .expect("session should end promptly after cancellation");

        assert_eq!(answered, 2);
        assert_eq!(lines[0]["call_id"], "p");
        assert_eq!(lines[1]["call_id"], "wf");
        assert!(lines[1]["output"]["error"].as_str().unwrap().contains("cancel"));
    }

    #[tokio::test]
    async fn cancelled_session_answers_nothing() {
        let ctx = ctx();
        ctx.cancel.cancel();
        let (answered, lines) = run("{\"name\": \"ping\"}\n", &ctx).await;
        assert_eq!(answered, 0);
        assert!(lines.is_empty());
    }
}
