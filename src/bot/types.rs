//! Type definitions shared by the execution client, poller, aggregator and
//! orchestrator.
//!
//! Remote state strings are normalized into [`JobState`] as soon as a status
//! body is decoded, so nothing past the client boundary matches raw strings.
//! Report types derive [`serde::Serialize`] for JSON tool responses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Step names that mark the boundaries of a workflow graph and carry no data.
pub const SENTINEL_STEPS: [&str; 2] = ["start", "end"];

/// What to launch: a bot identifier plus its initiating payload.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSpec {
    pub bot_id: String,
    pub payload: Value,
    /// Per-call credential. Falls back to the client's configured token.
    pub token: Option<String>,
}

impl JobSpec {
    pub fn new(bot_id: impl Into<String>, payload: Value) -> Self {
        Self {
            bot_id: bot_id.into(),
            payload,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Identifies one remote execution for the lifetime of an orchestration run.
///
/// Fields are private: the execution identifier is fixed at launch and the
/// credential is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct JobHandle {
    execution_id: String,
    token: String,
}

impl JobHandle {
    pub fn new(execution_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            token: token.into(),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("execution_id", &self.execution_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Normalized remote state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    InProgress,
    Succeeded,
    Failed,
}

impl JobState {
    /// Map a remote state tag onto the three-valued outcome.
    ///
    /// Returns `None` for tags the remote API is not documented to send.
    pub fn from_remote(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" | "RUNNING" => Some(Self::InProgress),
            "SUCCEEDED" | "COMPLETED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Wire shape of a status response.
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(alias = "state")]
    status: String,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    results: Option<Map<String, Value>>,
}

/// One snapshot of remote execution state. Superseded by the next poll.
#[derive(Clone, Debug)]
pub struct JobStatus {
    /// State tag exactly as the remote sent it.
    pub raw_state: String,
    /// `None` when the tag is unrecognized.
    pub state: Option<JobState>,
    pub error: Option<Value>,
    pub results: Option<Map<String, Value>>,
    /// The full decoded response body.
    pub snapshot: Value,
}

impl JobStatus {
    /// Decode a status response body.
    pub fn from_snapshot(snapshot: Value) -> Result<Self, serde_json::Error> {
        let body = StatusBody::deserialize(&snapshot)?;
        Ok(Self {
            state: JobState::from_remote(&body.status),
            raw_state: body.status,
            error: body.error.filter(|e| !e.is_null()),
            results: body.results,
            snapshot,
        })
    }

    /// Human-readable rendering of the remote error payload.
    pub fn error_detail(&self) -> String {
        match &self.error {
            None => "unknown error".to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Object(obj)) => match obj.get("message").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => Value::Object(obj.clone()).to_string(),
            },
            Some(Value::String(_)) => "unknown error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Outcome of fetching a single step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    Payload(Value),
    Error(String),
}

/// The output of one named step of an execution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeResult {
    pub step: String,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
}

impl NodeResult {
    pub fn payload(step: impl Into<String>, payload: Value) -> Self {
        Self {
            step: step.into(),
            outcome: NodeOutcome::Payload(payload),
        }
    }

    pub fn error(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            outcome: NodeOutcome::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Error(_))
    }
}

/// Final output of one orchestration run, handed to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct ConsolidatedReport {
    pub success: bool,
    pub execution_id: String,
    pub final_state: String,
    pub steps: BTreeMap<String, NodeResult>,
    pub snapshot: Value,
    /// RFC 3339 timestamp taken before launch.
    pub started_at: String,
    /// RFC 3339 timestamp taken after the last step fetch.
    pub finished_at: String,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_remote_normalizes_known_tags() {
        assert_eq!(JobState::from_remote("PENDING"), Some(JobState::InProgress));
        assert_eq!(JobState::from_remote("queued"), Some(JobState::InProgress));
        assert_eq!(JobState::from_remote("Running"), Some(JobState::InProgress));
        assert_eq!(JobState::from_remote("SUCCEEDED"), Some(JobState::Succeeded));
        assert_eq!(JobState::from_remote("COMPLETED"), Some(JobState::Succeeded));
        assert_eq!(JobState::from_remote("FAILED"), Some(JobState::Failed));
    }

    #[test]
    fn from_remote_unknown_tag_is_none() {
        assert_eq!(JobState::from_remote("PAUSED"), None);
        assert_eq!(JobState::from_remote(""), None);
    }

    #[test]
    fn status_accepts_state_alias() {
        let status = JobStatus::from_snapshot(json!({"state": "RUNNING"})).unwrap();
        assert_eq!(status.raw_state, "RUNNING");
        assert_eq!(status.state, Some(JobState::InProgress));
        assert!(status.results.is_none());
    }

    #[test]
    fn status_without_state_field_is_rejected() {
        assert!(JobStatus::from_snapshot(json!({"results": {}})).is_err());
    }

    #[test]
    fn status_keeps_full_snapshot() {
        let body = json!({"status": "COMPLETED", "results": {"start": {}, "a": 1}, "extra": true});
        let status = JobStatus::from_snapshot(body.clone()).unwrap();
        assert_eq!(status.snapshot, body);
        assert_eq!(status.results.unwrap().len(), 2);
    }

    #[test]
    fn error_detail_variants() {
        let s = JobStatus::from_snapshot(json!({"status": "FAILED"})).unwrap();
        assert_eq!(s.error_detail(), "unknown error");

        let s = JobStatus::from_snapshot(json!({"status": "FAILED", "error": null})).unwrap();
        assert_eq!(s.error_detail(), "unknown error");

        let s = JobStatus::from_snapshot(json!({"status": "FAILED", "error": "quota exceeded"}))
            .unwrap();
        assert_eq!(s.error_detail(), "quota exceeded");

        let s = JobStatus::from_snapshot(
            json!({"status": "FAILED", "error": {"message": "node 3 crashed", "code": 7}}),
        )
        .unwrap();
        assert_eq!(s.error_detail(), "node 3 crashed");

        let s = JobStatus::from_snapshot(json!({"status": "FAILED", "error": {"code": 7}}))
            .unwrap();
        assert_eq!(s.error_detail(), r#"{"code":7}"#);
    }

    #[test]
    fn handle_debug_redacts_token() {
        let handle = JobHandle::new("exec-1", "secret-token");
        let printed = format!("{handle:?}");
        assert!(printed.contains("exec-1"));
        assert!(!printed.contains("secret-token"));
    }

    #[test]
    fn node_result_serializes_flat() {
        let ok = serde_json::to_value(NodeResult::payload("s1", json!({"v": 1}))).unwrap();
        assert_eq!(ok, json!({"step": "s1", "payload": {"v": 1}}));

        let err = serde_json::to_value(NodeResult::error("s2", "HTTP 500")).unwrap();
        assert_eq!(err, json!({"step": "s2", "error": "HTTP 500"}));
    }
}
