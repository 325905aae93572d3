//! HTTP client for the remote bot-execution API.
//!
//! [`ExecutionBackend`] is the seam the poller, aggregator and orchestrator
//! are written against; [`HttpExecutionClient`] is the reqwest implementation.
//!
//! Error policy per call:
//! - `launch` fails with [`LaunchError`] and is never retried.
//! - `fetch_status` fails with [`TransientNetworkError`]; the poller retries.
//! - `fetch_step_result` never fails: problems become an error marker on the
//!   returned [`NodeResult`] so one bad step cannot abort a batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};

use super::types::{JobHandle, JobSpec, JobStatus, NodeResult};
use crate::config::AppConfig;
use crate::error::{ConfigError, LaunchError, TransientNetworkError};

/// Longest response body kept in an error, in bytes.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Remote operations needed to drive one execution.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Start a new execution. The returned handle always has a non-empty id.
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError>;

    /// Fetch the current status snapshot of an execution.
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, TransientNetworkError>;

    /// Fetch one step's payload, or an error marker describing why it could not be read.
    async fn fetch_step_result(&self, handle: &JobHandle, step: &str) -> NodeResult;
}

/// reqwest-backed [`ExecutionBackend`].
///
/// Every request carries `Authorization: Bearer <token>`. Dropping an
/// in-flight request future releases its connection back to the pool.
pub struct HttpExecutionClient {
    http: reqwest::Client,
    base_url: Url,
    default_token: Option<String>,
}

impl HttpExecutionClient {
    /// Build a client rooted at `base_url` with a per-request timeout.
    pub fn new(
        base_url: &str,
        default_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "base_url".to_string(),
            value: base_url.to_string(),
            message,
        };

        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("flowbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            default_token: default_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or(ConfigError::Missing("remote base URL (FLOWBOT_BASE_URL or --base-url)"))?;
        Self::new(
            base_url,
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Cannot fail: `new` rejected cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionClient {
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError> {
        let token = spec
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| self.default_token.clone())
            .ok_or_else(|| LaunchError::MissingCredential {
                bot_id: spec.bot_id.clone(),
            })?;

        let response = self
            .http
            .post(self.endpoint(&["executions"]))
            .bearer_auth(&token)
            .json(&json!({ "bot_id": spec.bot_id, "input": spec.payload }))
            .send()
            .await
            .map_err(|e| LaunchError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LaunchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(LaunchError::Rejected {
                status: status.as_u16(),
                body: truncate_body(text, MAX_ERROR_BODY_BYTES),
            });
        }

        let body: Value =
            serde_json::from_str(&text).map_err(|e| LaunchError::Malformed(e.to_string()))?;
        let execution_id = extract_execution_id(&body).ok_or(LaunchError::MissingExecutionId)?;

        tracing::info!(bot_id = %spec.bot_id, %execution_id, "Execution launched");
        Ok(JobHandle::new(execution_id, token))
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, TransientNetworkError> {
        let response = self
            .http
            .get(self.endpoint(&["executions", handle.execution_id()]))
            .bearer_auth(handle.token())
            .send()
            .await
            .map_err(|e| TransientNetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransientNetworkError(format!(
                "status request returned HTTP {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TransientNetworkError(format!("failed to read status body: {e}")))?;

        JobStatus::from_snapshot(body)
            .map_err(|e| TransientNetworkError(format!("undecodable status body: {e}")))
    }

    async fn fetch_step_result(&self, handle: &JobHandle, step: &str) -> NodeResult {
        let url = self.endpoint(&["executions", handle.execution_id(), "nodes", step]);

        let response = match self.http.get(url).bearer_auth(handle.token()).send().await {
            Ok(r) => r,
            Err(e) => return NodeResult::error(step, format!("request failed: {e}")),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return NodeResult::error(step, format!("failed to read body: {e}")),
        };

        if !status.is_success() {
            let body = truncate_body(text.trim().to_string(), MAX_ERROR_BODY_BYTES);
            return NodeResult::error(step, format!("HTTP {status}: {body}"));
        }

        // Non-JSON bodies are kept verbatim as a string payload.
        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        match payload.get("error") {
            Some(err) if !err.is_null() => {
                let message = err
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                NodeResult::error(step, message)
            }
            _ => NodeResult::payload(step, payload),
        }
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary, noting what was dropped.
fn truncate_body(mut text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let dropped = text.len() - end;
    text.truncate(end);
    text.push_str(&format!("... ({dropped} bytes truncated)"));
    text
}

/// Pull a non-empty execution identifier out of a launch response.
///
/// Accepts `execution_id` or `id`, as a string or a number.
fn extract_execution_id(body: &Value) -> Option<String> {
    let raw = body.get("execution_id").or_else(|| body.get("id"))?;
    let id = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}
